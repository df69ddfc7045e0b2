//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 内核对象
//!
//! 进程表、每 CPU 记录、各种锁和外部协作者都归 [`Kernel`] 所有，
//! 没有全局可变状态。各子系统的操作以 `impl Kernel<H>` 的形式分散在
//! process / sched / syscall 模块中。

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::MAX_CPUS;
use crate::hal::Hal;
use crate::process::table::ProcTable;
use crate::process::task::{Chan, Pid};
use crate::sched::cpu::Cpu;
use crate::sync::{CpuLocal, ReentrantLock, SpinLock, SpinLockGuard};

const NO_PROC: usize = usize::MAX;

/// 进程表锁的守卫
///
/// sched() / sleep() 按值接收并返回它，表示锁随上下文切换一起交接
pub type PtableGuard<'a, H> = SpinLockGuard<'a, ProcTable<H>>;

/// 内核对象
pub struct Kernel<H: Hal> {
    pub(crate) hal: H,
    pub(crate) cpus: [Cpu; MAX_CPUS],
    pub(crate) ptable: SpinLock<ProcTable<H>>,
    /// 根进程槽位
    initproc: AtomicUsize,
    /// forkret 是否还没执行过
    pub(crate) first_run: AtomicBool,
    /// 全局系统调用计数，独立于进程表锁
    pub(crate) syscall_total: spin::Mutex<u64>,
    /// 暴露给用户态的可重入锁
    pub(crate) rlock: ReentrantLock,
    /// sys_sleep 等待时钟滴答用的锁和通道
    pub(crate) ticks_lock: SpinLock<()>,
}

impl<H: Hal> Kernel<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            cpus: core::array::from_fn(|_| Cpu::new()),
            ptable: SpinLock::new("ptable", ProcTable::new()),
            initproc: AtomicUsize::new(NO_PROC),
            first_run: AtomicBool::new(true),
            syscall_total: spin::Mutex::new(0),
            rlock: ReentrantLock::new("reentrant lock"),
            ticks_lock: SpinLock::new("time", ()),
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// 获取进程表锁
    pub fn lock_table(&self) -> PtableGuard<'_, H> {
        self.ptable.lock(self)
    }

    /// 当前 CPU 的记录
    ///
    /// 调用者必须已关中断，否则可能在读取后被迁移到别的 CPU
    pub fn mycpu(&self) -> &Cpu {
        let id = CpuLocal::cpu_id(self);
        match self.cpus.get(id) {
            Some(cpu) => cpu,
            None => panic!("mycpu: cpu {} out of range", id),
        }
    }

    pub fn cpu(&self, id: usize) -> Option<&Cpu> {
        self.cpus.get(id)
    }

    /// 当前 CPU 上运行的进程槽位
    pub fn myproc(&self) -> Option<usize> {
        self.push_off();
        let slot = self.mycpu().current();
        self.pop_off();
        slot
    }

    /// 当前进程的 PID
    pub fn current_pid(&self) -> Option<Pid> {
        let slot = self.myproc()?;
        Some(self.lock_table().proc(slot).pid())
    }

    pub(crate) fn initproc(&self) -> Option<usize> {
        match self.initproc.load(Ordering::Acquire) {
            NO_PROC => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn set_initproc(&self, slot: usize) {
        self.initproc.store(slot, Ordering::Release);
    }

    /// 当前进程是否已被 kill
    pub fn killed(&self) -> bool {
        match self.myproc() {
            Some(slot) => self.lock_table().proc(slot).killed(),
            None => false,
        }
    }

    /// 等待时钟滴答的睡眠通道
    pub(crate) fn ticks_chan(&self) -> Chan {
        Chan::from_ref(&self.ticks_lock)
    }
}

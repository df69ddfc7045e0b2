//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 每 CPU 调度状态
//!
//! 对应 xv6 的 struct cpu 和 Linux 的 per-CPU runqueue：
//! - 当前运行的进程
//! - 调度器自己的上下文（swtch 切回调度循环时使用）
//! - push_off/pop_off 的嵌套深度和进入前的中断状态
//! - 正在服务的队列、在该队列上的滴答数、RR 扫描位置
//! - 本 CPU 进入系统调用的次数
//!
//! 这些字段只被所属 CPU 在关中断时修改，用原子量只是为了让 [`Cpu`] 可以放在共享的
//! [`Kernel`] 里；上下文放在 UnsafeCell 中，只在 swtch 时以裸指针形式使用。

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use super::policy::SchedQueue;
use crate::context::Context;
use crate::hal::{Arch, Hal};
use crate::kernel::Kernel;
use crate::sync::CpuLocal;

const NO_PROC: usize = usize::MAX;

/// 每 CPU 记录
pub struct Cpu {
    /// 当前进程槽位
    proc: AtomicUsize,
    /// 调度循环的上下文
    scheduler: UnsafeCell<Context>,
    /// push_off 嵌套深度
    ncli: AtomicU32,
    /// 最外层 push_off 之前中断是否打开
    intena: AtomicBool,
    queue: AtomicU8,
    queue_ticks: AtomicU32,
    rr_cursor: AtomicUsize,
    syscalls: AtomicU64,
}

// scheduler 上下文只由所属 CPU 访问
unsafe impl Sync for Cpu {}

impl Cpu {
    pub const fn new() -> Self {
        Self {
            proc: AtomicUsize::new(NO_PROC),
            scheduler: UnsafeCell::new(Context::empty()),
            ncli: AtomicU32::new(0),
            intena: AtomicBool::new(false),
            queue: AtomicU8::new(SchedQueue::Rr as u8),
            queue_ticks: AtomicU32::new(0),
            rr_cursor: AtomicUsize::new(0),
            syscalls: AtomicU64::new(0),
        }
    }

    /// 当前运行的进程槽位
    pub fn current(&self) -> Option<usize> {
        match self.proc.load(Ordering::Relaxed) {
            NO_PROC => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn set_current(&self, slot: Option<usize>) {
        self.proc.store(slot.unwrap_or(NO_PROC), Ordering::Relaxed);
    }

    /// 正在服务的队列
    pub fn queue(&self) -> SchedQueue {
        match self.queue.load(Ordering::Relaxed) {
            0 => SchedQueue::Rr,
            1 => SchedQueue::Sjf,
            _ => SchedQueue::Fcfs,
        }
    }

    pub(crate) fn set_queue(&self, queue: SchedQueue) {
        self.queue.store(queue.id(), Ordering::Relaxed);
        self.queue_ticks.store(0, Ordering::Relaxed);
    }

    /// 当前队列没有可运行进程时切到下一个队列
    pub(crate) fn advance_queue(&self) -> SchedQueue {
        let next = self.queue().next();
        self.set_queue(next);
        next
    }

    /// 在当前队列上度过的滴答数
    pub fn queue_ticks(&self) -> u32 {
        self.queue_ticks.load(Ordering::Relaxed)
    }

    pub(crate) fn tick(&self) {
        self.queue_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rr_cursor(&self) -> usize {
        self.rr_cursor.load(Ordering::Relaxed)
    }

    pub(crate) fn set_rr_cursor(&self, cursor: usize) {
        self.rr_cursor.store(cursor, Ordering::Relaxed);
    }

    pub(crate) fn scheduler_context(&self) -> *mut Context {
        self.scheduler.get()
    }

    pub fn ncli(&self) -> u32 {
        self.ncli.load(Ordering::Relaxed)
    }

    pub(crate) fn intena(&self) -> bool {
        self.intena.load(Ordering::Relaxed)
    }

    pub(crate) fn set_intena(&self, intena: bool) {
        self.intena.store(intena, Ordering::Relaxed);
    }

    /// 本 CPU 进入系统调用的次数
    pub fn syscalls(&self) -> u64 {
        self.syscalls.load(Ordering::Relaxed)
    }

    pub(crate) fn count_syscall(&self) {
        self.syscalls.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hal> CpuLocal for Kernel<H> {
    fn cpu_id(&self) -> usize {
        Arch::cpu_id(&self.hal)
    }

    fn push_off(&self) {
        let old = self.hal.intr_get();
        self.hal.intr_off();
        let c = self.mycpu();
        if c.ncli.load(Ordering::Relaxed) == 0 {
            c.intena.store(old, Ordering::Relaxed);
        }
        c.ncli.fetch_add(1, Ordering::Relaxed);
    }

    fn pop_off(&self) {
        let c = self.mycpu();
        if self.hal.intr_get() {
            panic!("pop_off - interruptible");
        }
        let depth = c.ncli.load(Ordering::Relaxed);
        if depth == 0 {
            panic!("pop_off");
        }
        c.ncli.store(depth - 1, Ordering::Relaxed);
        if depth == 1 && c.intena.load(Ordering::Relaxed) {
            self.hal.intr_on();
        }
    }

    fn current_slot(&self) -> Option<usize> {
        self.mycpu().current()
    }
}

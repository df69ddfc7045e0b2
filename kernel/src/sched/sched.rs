//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器实现
//!
//! 对应 xv6 proc.c 的 scheduler()/sched()/yield()/forkret()
//! 以及 Linux kernel/sched/core.c 的 schedule() -> context_switch()
//!
//! 每个 CPU 运行一个调度循环：
//! - 持有进程表锁，在当前队列中选出下一个进程
//! - 当前队列为空时切到下一个队列，本轮不调度
//! - 否则把选中的进程标记为 RUNNING 并 swtch 过去
//!
//! 锁交接协议：
//! - 调度器带着进程表锁切换到进程，进程从 sched() 返回后负责释放；
//!   新进程第一次运行时在 forkret() 中释放
//! - 进程带着进程表锁调用 sched() 切回调度器，调度器从 swtch 返回后负责释放
//!
//! 这两端都以 [`PtableGuard`] 按值传递来表达，守卫只会在持锁的一端被丢弃。

use core::sync::atomic::Ordering;

#[cfg(feature = "debug_log")]
use log::trace;

use crate::hal::Hal;
use crate::kernel::{Kernel, PtableGuard};
use crate::process::task::{Pid, ProcState};
use crate::sync::{CpuLocal, SpinLockGuard};

impl<H: Hal> Kernel<H> {
    /// 每 CPU 调度循环，不返回
    pub fn scheduler(&self) -> ! {
        self.push_off();
        self.mycpu().set_current(None);
        self.pop_off();

        loop {
            // 打开中断，避免所有进程都在等 I/O 时死锁
            self.hal.intr_on();
            self.schedule_once();
        }
    }

    /// 调度一轮
    ///
    /// 返回被运行的进程 PID；当前队列为空时切换队列并返回 None
    pub fn schedule_once(&self) -> Option<Pid> {
        let mut table = self.lock_table();
        let c = self.mycpu();

        let queue = c.queue();
        let mut cursor = c.rr_cursor();
        let next = table.select(queue, &mut cursor);
        c.set_rr_cursor(cursor);

        let Some(slot) = next else {
            let _next = c.advance_queue();
            #[cfg(feature = "debug_log")]
            trace!("cpu: queue {} empty, switching to {}", queue, _next);
            return None;
        };

        let pid = table.proc(slot).pid();
        let _table = self.switch_to(table, slot);
        Some(pid)
    }

    /// 切换到 `slot` 上的进程，进程让出 CPU 后返回
    fn switch_to<'a>(&'a self, mut table: PtableGuard<'a, H>, slot: usize) -> PtableGuard<'a, H> {
        let c = self.mycpu();
        c.set_current(Some(slot));

        let p = table.proc_mut(slot);
        if let (Some(pgdir), Some(kstack)) = (p.pgdir.as_ref(), p.kstack.as_ref()) {
            self.hal.switch_uvm(pgdir, kstack);
        }
        p.state = ProcState::Running;
        p.sched.wait_time = 0;

        #[cfg(feature = "debug_log")]
        trace!("cpu: switch to pid {} ({})", p.pid, p.sched.queue);

        let new = &p.context as *const _;
        unsafe { self.hal.swtch(c.scheduler_context(), new) };
        self.hal.switch_kvm();

        // 进程已经让出 CPU
        c.set_current(None);
        table
    }

    /// 从当前进程切换回调度器
    ///
    /// 调用者持有且只持有进程表锁，并已把自己的状态改为非 RUNNING。
    /// 返回时进程重新被调度，仍然持有进程表锁。
    pub fn sched<'a>(&'a self, mut table: PtableGuard<'a, H>) -> PtableGuard<'a, H> {
        let Some(cur) = self.myproc() else {
            panic!("sched: no process");
        };
        if !SpinLockGuard::holding(&table) {
            panic!("sched ptable.lock");
        }
        if self.mycpu().ncli() != 1 {
            panic!("sched locks");
        }
        if table.proc(cur).state() == ProcState::Running {
            panic!("sched running");
        }
        if self.hal.intr_get() {
            panic!("sched interruptible");
        }

        let intena = self.mycpu().intena();
        let old = &mut table.proc_mut(cur).context as *mut _;
        unsafe { self.hal.swtch(old, self.mycpu().scheduler_context()) };

        // 可能已经在另一个 CPU 上
        self.mycpu().set_intena(intena);
        table
    }

    /// 让出 CPU
    pub fn yield_now(&self) {
        let Some(cur) = self.myproc() else {
            panic!("yield: no process");
        };
        let mut table = self.lock_table();
        table.proc_mut(cur).state = ProcState::Runnable;
        let _table = self.sched(table);
    }

    /// 新进程第一次被调度时的入口，由 [`crate::hal::Arch::trampoline`] 调用
    ///
    /// 接管调度器交过来的进程表锁并释放；第一个进程还要完成文件系统初始化
    pub fn forkret(&self) {
        let table = unsafe { self.ptable.adopt(self) };
        drop(table);

        if self.first_run.swap(false, Ordering::AcqRel) {
            // 文件系统初始化可能睡眠，必须在进程上下文中进行
            self.hal.first_init();
        }
    }
}

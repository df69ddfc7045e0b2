//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 睡眠/唤醒与 wait
//!
//! 对应 xv6 proc.c 的 sleep()/wakeup()/wait()
//!
//! 核心概念：
//! - 进程睡在一个等待通道上，wakeup 唤醒该通道上的所有进程
//! - 睡眠前先获取进程表锁再释放调用者的锁，wakeup 也必须持有进程表锁，
//!   所以 "检查条件" 和 "进入 SLEEPING" 之间不会丢失唤醒
//! - 被唤醒的进程重新获取调用者的锁之后才从 sleep 返回

use log::debug;

use crate::errno::Errno;
use crate::hal::Hal;
use crate::kernel::{Kernel, PtableGuard};
use crate::sync::SpinLockGuard;

use super::task::{Chan, Pid, ProcState};

impl<H: Hal> Kernel<H> {
    /// 在 `chan` 上睡眠，睡眠期间释放 `guard` 对应的锁
    ///
    /// 返回时重新持有同一把锁。睡眠的是进程表锁本身时使用 [`Kernel::sleep_locked`]。
    pub fn sleep<'a, T>(&'a self, chan: Chan, guard: SpinLockGuard<'a, T>) -> SpinLockGuard<'a, T> {
        let Some(slot) = self.myproc() else {
            panic!("sleep");
        };

        // 先拿进程表锁，再放调用者的锁
        let table = self.lock_table();
        let lock = SpinLockGuard::unlock(guard);

        let table = self.sleep_on(slot, chan, table);

        drop(table);
        lock.lock(self)
    }

    /// 持有进程表锁时在 `chan` 上睡眠
    pub fn sleep_locked<'a>(&'a self, chan: Chan, table: PtableGuard<'a, H>) -> PtableGuard<'a, H> {
        let Some(slot) = self.myproc() else {
            panic!("sleep");
        };
        self.sleep_on(slot, chan, table)
    }

    fn sleep_on<'a>(&'a self, slot: usize, chan: Chan, mut table: PtableGuard<'a, H>) -> PtableGuard<'a, H> {
        let p = table.proc_mut(slot);
        p.chan = Some(chan);
        p.state = ProcState::Sleeping;

        let mut table = self.sched(table);

        table.proc_mut(slot).chan = None;
        table
    }

    /// 唤醒睡在 `chan` 上的所有进程
    pub fn wakeup(&self, chan: Chan) -> usize {
        self.lock_table().wakeup(chan)
    }

    /// 等待一个子进程退出并回收它，返回子进程 PID
    ///
    /// 没有子进程返回 `NoChild`，调用者已被 kill 返回 `InterruptedSystemCall`
    pub fn wait(&self) -> Result<Pid, Errno> {
        let Some(cur) = self.myproc() else {
            panic!("wait: no current process");
        };

        let mut table = self.lock_table();
        loop {
            let mut havekids = false;
            for slot in 0..table.procs().len() {
                let p = table.proc(slot);
                if p.parent != Some(cur) || !p.is_used() {
                    continue;
                }
                havekids = true;
                if p.state == ProcState::Zombie {
                    let pid = table.reap(slot, &self.hal);
                    debug!("wait: reaped {}", pid);
                    return Ok(pid);
                }
            }

            if !havekids {
                return Err(Errno::NoChild);
            }
            if table.proc(cur).killed() {
                return Err(Errno::InterruptedSystemCall);
            }

            // 子进程 exit 时用父进程的通道唤醒
            let chan = table.chan_of(cur);
            table = self.sleep_locked(chan, table);
        }
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程表
//!
//! 对应 xv6 的 ptable：NPROC 个固定槽位，由一把自旋锁保护
//! （锁在 [`crate::kernel::Kernel`] 里，这里只是被保护的数据）。
//!
//! 所有 state、队列、fcfs_entry、睡眠通道的读写都必须持有这把锁。

use crate::config::{NPROC, ROOT_PID, SCHED_RNG_SEED, SHELL_PID};
use crate::context::{Context, TrapFrame};
use crate::errno::Errno;
use crate::hal::Hal;
use crate::sched::policy::{Lcg, SchedEntity, SchedQueue};

use super::pid::{FcfsSequence, PidAllocator};
use super::task::{Chan, Pid, Proc, ProcFlags, ProcState};

/// 进程表
pub struct ProcTable<H: Hal> {
    procs: [Proc<H>; NPROC],
    pids: PidAllocator,
    fcfs: FcfsSequence,
    /// SJF 抛硬币用的随机数
    rng: Lcg,
}

impl<H: Hal> ProcTable<H> {
    pub fn new() -> Self {
        Self {
            procs: core::array::from_fn(|_| Proc::new()),
            pids: PidAllocator::new(),
            fcfs: FcfsSequence::new(),
            rng: Lcg::new(SCHED_RNG_SEED),
        }
    }

    #[inline]
    pub fn proc(&self, slot: usize) -> &Proc<H> {
        &self.procs[slot]
    }

    #[inline]
    pub fn proc_mut(&mut self, slot: usize) -> &mut Proc<H> {
        &mut self.procs[slot]
    }

    pub fn procs(&self) -> &[Proc<H>] {
        &self.procs
    }

    pub(crate) fn procs_mut(&mut self) -> &mut [Proc<H>] {
        &mut self.procs
    }

    pub(crate) fn procs_and_rng(&mut self) -> (&[Proc<H>], &mut Lcg) {
        (&self.procs, &mut self.rng)
    }

    /// 遍历已占用的槽位
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Proc<H>)> + '_ {
        self.procs.iter().enumerate().filter(|(_, p)| p.is_used())
    }

    /// `queue` 中所有 RUNNABLE 进程的调度实体
    pub(crate) fn members<'a>(
        procs: &'a [Proc<H>],
        queue: SchedQueue,
    ) -> impl Iterator<Item = (usize, &'a SchedEntity)> + 'a {
        procs
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.state == ProcState::Runnable && p.sched.queue == queue)
            .map(|(slot, p)| (slot, &p.sched))
    }

    /// 按 PID 查找槽位
    pub fn find(&self, pid: Pid) -> Option<usize> {
        self.procs.iter().position(|p| p.is_used() && p.pid == pid)
    }

    pub fn count(&self, state: ProcState) -> usize {
        self.procs.iter().filter(|p| p.state == state).count()
    }

    pub(crate) fn next_fcfs_entry(&mut self) -> u32 {
        self.fcfs.next_entry()
    }

    /// 占用一个空闲槽位
    ///
    /// 槽位进入 EMBRYO，分配 PID 并填好调度和统计的初始值；
    /// 内核栈由调用者随后分配。两个引导进程进入 RR，其余进入 FCFS。
    pub(crate) fn claim(&mut self, ticks: u32) -> Result<usize, Errno> {
        let slot = self
            .procs
            .iter()
            .position(|p| p.state == ProcState::Unused)
            .ok_or(Errno::TryAgain)?;
        let pid = self.pids.alloc().ok_or(Errno::TryAgain)?;

        let queue = if pid == ROOT_PID || pid == SHELL_PID {
            SchedQueue::Rr
        } else {
            SchedQueue::Fcfs
        };
        let fcfs_entry = match queue {
            SchedQueue::Fcfs => self.fcfs.next_entry(),
            _ => 0,
        };

        let p = &mut self.procs[slot];
        p.state = ProcState::Embryo;
        p.pid = pid;
        p.flags = ProcFlags::empty();
        p.chan = None;
        p.parent = None;
        p.sched = SchedEntity {
            queue,
            fcfs_entry,
            arrival: ticks,
            ..SchedEntity::new()
        };
        p.syscalls.reset();

        Ok(slot)
    }

    /// 睡眠通道：等待某个进程时用它在表中的地址
    pub fn chan_of(&self, slot: usize) -> Chan {
        Chan::from_ref(&self.procs[slot])
    }

    /// 唤醒所有睡在 `chan` 上的进程，返回被唤醒的数量
    ///
    /// 对应 xv6 的 wakeup1()，调用者持有进程表锁
    pub fn wakeup(&mut self, chan: Chan) -> usize {
        let mut woken = 0;
        for p in self.procs.iter_mut() {
            if p.state == ProcState::Sleeping && p.chan == Some(chan) {
                p.state = ProcState::Runnable;
                woken += 1;
            }
        }
        woken
    }

    /// 释放槽位持有的内核栈和地址空间，清空身份信息，回到 UNUSED
    ///
    /// 打开文件和当前目录在 exit 时已经释放
    pub(crate) fn release_slot(&mut self, slot: usize, hal: &H) -> Pid {
        let p = &mut self.procs[slot];
        if let Some(stack) = p.kstack.take() {
            hal.kstack_free(stack);
        }
        if let Some(pgdir) = p.pgdir.take() {
            hal.free_vm(pgdir);
        }

        let pid = p.pid;
        p.pid = 0;
        p.parent = None;
        p.name.clear();
        p.flags = ProcFlags::empty();
        p.chan = None;
        p.size = 0;
        p.context = Context::empty();
        p.tf = TrapFrame::zeroed();
        p.sched = SchedEntity::new();
        p.state = ProcState::Unused;
        pid
    }

    /// 保存的上下文属于哪个槽位
    #[cfg(test)]
    pub(crate) fn slot_of_context(&self, ctx: *const Context) -> Option<usize> {
        self.procs.iter().position(|p| core::ptr::eq(&p.context, ctx))
    }

    /// 回收一个 ZOMBIE 子进程，只在 wait() 中调用
    pub(crate) fn reap(&mut self, slot: usize, hal: &H) -> Pid {
        if self.procs[slot].state != ProcState::Zombie {
            panic!("reap: slot {} is not a zombie", slot);
        }
        self.release_slot(slot, hal)
    }
}

impl<H: Hal> Default for ProcTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 老化与队列管理
//!
//! - 每个时钟滴答，RUNNABLE 进程的 wait_time 加一，达到阈值时提升一级
//!   (FCFS → SJF → RR)，并把 wait_time 清零、arrival 记为当前滴答
//! - RUNNING 进程的 consecutive_time 加一，其它状态清零
//! - change_queue / set_bc 由用户态工具调用，手动调整调度属性

use log::{info, warn};

use crate::config::AGING_THRESHOLD;
use crate::errno::Errno;
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::process::table::ProcTable;
use crate::process::task::{Pid, ProcState};
use crate::sync::CpuLocal;

use super::policy::SchedQueue;

impl<H: Hal> ProcTable<H> {
    /// 老化扫描，返回被提升的进程数
    pub(crate) fn age(&mut self, ticks: u32) -> usize {
        let mut promoted = 0;
        for p in self.procs_mut().iter_mut() {
            if p.state != ProcState::Runnable {
                continue;
            }
            p.sched.wait_time = p.sched.wait_time.saturating_add(1);
            if p.sched.wait_time < AGING_THRESHOLD {
                continue;
            }

            let prev = p.sched.queue;
            let Some(next) = prev.promoted() else {
                continue;
            };
            p.sched.queue = next;
            p.sched.wait_time = 0;
            p.sched.arrival = ticks;
            promoted += 1;
            info!("pid:{} prev_queue:{} new_queue:{}", p.pid, prev, next);
        }
        promoted
    }

    /// 更新连续运行时间
    pub(crate) fn add_consecutive(&mut self) {
        for p in self.procs_mut().iter_mut() {
            if p.state == ProcState::Running {
                p.sched.consecutive_time = p.sched.consecutive_time.saturating_add(1);
            } else {
                p.sched.consecutive_time = 0;
            }
        }
    }
}

impl<H: Hal> Kernel<H> {
    /// 老化扫描，返回被提升的进程数
    pub fn age_processes(&self) -> usize {
        let ticks = self.hal.ticks();
        self.lock_table().age(ticks)
    }

    pub fn add_consecutive(&self) {
        self.lock_table().add_consecutive();
    }

    /// 时钟中断处理
    ///
    /// 由负责计时的 CPU 每个滴答调用一次：老化、更新连续运行时间、
    /// 唤醒 sys_sleep 中等待的进程
    pub fn clock_tick(&self) {
        let ticks = self.hal.ticks();
        let chan = self.ticks_chan();

        // sys_sleep 在持有 ticks_lock 时检查滴答数，等它进入睡眠后再唤醒
        drop(self.ticks_lock.lock(self));

        let mut table = self.lock_table();
        table.age(ticks);
        table.add_consecutive();
        table.wakeup(chan);
        drop(table);

        self.cpu_tick();
    }

    /// 本 CPU 在当前队列上的滴答数加一，每个 CPU 的时钟中断都调用
    pub fn cpu_tick(&self) {
        self.push_off();
        self.mycpu().tick();
        self.pop_off();
    }

    /// 把 `pid` 移到 `queue_id` 对应的队列
    ///
    /// 队列不变时什么都不做；进入 FCFS 时取新的 fcfs_entry
    pub fn change_queue(&self, pid: Pid, queue_id: i32) -> Result<(), Errno> {
        let Some(queue) = SchedQueue::from_id(queue_id) else {
            warn!("Invalid queue");
            return Err(Errno::InvalidArgument);
        };

        let ticks = self.hal.ticks();
        let mut table = self.lock_table();
        let slot = table.find(pid).ok_or(Errno::NoSuchProcess)?;

        let prev = table.proc(slot).sched.queue;
        if prev == queue {
            return Ok(());
        }
        let fcfs_entry = match queue {
            SchedQueue::Fcfs => Some(table.next_fcfs_entry()),
            _ => None,
        };

        let se = &mut table.proc_mut(slot).sched;
        se.queue = queue;
        se.arrival = ticks;
        if let Some(entry) = fcfs_entry {
            se.fcfs_entry = entry;
        }
        info!("pid:{} prev_q:{} new_q:{}", pid, prev.id(), queue.id());
        Ok(())
    }

    /// 设置 SJF 预估时间和可信度，可信度截断到 0..=100
    pub fn set_bc(&self, pid: Pid, burst_time: u32, confidence: u32) -> Result<(), Errno> {
        let mut table = self.lock_table();
        let slot = table.find(pid).ok_or(Errno::NoSuchProcess)?;

        let se = &mut table.proc_mut(slot).sched;
        se.burst_time = burst_time;
        se.confidence = confidence.min(100);
        Ok(())
    }
}

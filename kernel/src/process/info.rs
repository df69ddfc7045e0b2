//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程信息输出
//!
//! - `processes_info`: 所有已占用槽位的完整调度信息
//! - `list_all_processes`: 正在运行的进程及其用过的系统调用数
//! - `procdump`: 控制台调试输出，进程表锁忙时直接放弃

use alloc::string::String;
use alloc::vec::Vec;

use log::{info, warn};

use crate::errno::Errno;
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::sched::policy::SchedQueue;

use super::task::{Pid, Proc, ProcState};

/// 进程信息快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    pub name: String,
    pub pid: Pid,
    pub state: ProcState,
    pub queue: SchedQueue,
    pub wait_time: u32,
    pub confidence: u32,
    pub burst_time: u32,
    pub consecutive_time: u32,
    pub arrival: u32,
    /// 用过的不同系统调用数
    pub syscalls: usize,
}

impl ProcInfo {
    fn from_proc<H: Hal>(p: &Proc<H>) -> Self {
        Self {
            name: String::from(p.name()),
            pid: p.pid,
            state: p.state,
            queue: p.sched.queue,
            wait_time: p.sched.wait_time,
            confidence: p.sched.confidence,
            burst_time: p.sched.burst_time,
            consecutive_time: p.sched.consecutive_time,
            arrival: p.sched.arrival,
            syscalls: p.syscalls.distinct(),
        }
    }
}

impl<H: Hal> Kernel<H> {
    /// 输出并返回所有已占用槽位的信息
    pub fn processes_info(&self) -> Vec<ProcInfo> {
        let table = self.lock_table();
        let infos: Vec<ProcInfo> = table.iter().map(|(_, p)| ProcInfo::from_proc(p)).collect();
        drop(table);

        info!(".....................................");
        for p in &infos {
            info!(
                "name:{} pid:{} state:{} queue:{} wait:{} confidence:{} burst time:{} consecutive:{} arrival:{}",
                p.name,
                p.pid,
                p.state.as_str(),
                p.queue.id(),
                p.wait_time,
                p.confidence,
                p.burst_time,
                p.consecutive_time,
                p.arrival
            );
        }
        info!(".....................................");
        infos
    }

    /// 列出 RUNNING 的进程，返回数量；一个都没有时返回 `NoSuchProcess`
    pub fn list_all_processes(&self) -> Result<usize, Errno> {
        let running: Vec<(Pid, usize)> = self
            .lock_table()
            .iter()
            .filter(|(_, p)| p.state == ProcState::Running)
            .map(|(_, p)| (p.pid, p.syscalls.distinct()))
            .collect();

        for (pid, count) in &running {
            info!("Process {} with {} Syscalls", pid, count);
        }
        match running.len() {
            0 => Err(Errno::NoSuchProcess),
            n => Ok(n),
        }
    }

    /// 调试输出 "pid state name"
    ///
    /// 通常在控制台按键时调用，进程表锁被占用时不等待
    pub fn procdump(&self) -> Vec<(Pid, ProcState, String)> {
        let Some(table) = self.ptable.try_lock(self) else {
            warn!("procdump: ptable busy");
            return Vec::new();
        };
        let rows: Vec<(Pid, ProcState, String)> = table
            .iter()
            .map(|(_, p)| (p.pid, p.state, String::from(p.name())))
            .collect();
        drop(table);

        for (pid, state, name) in &rows {
            info!("{} {} {}", pid, state.short_name(), name);
        }
        rows
    }
}

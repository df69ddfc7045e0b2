//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 系统调用编号与统计
//!
//! 编号沿用 xv6 的 syscall.h，调度器与统计相关的扩展调用排在其后。
//! 每次进入系统调用时 trap 层调用 [`Kernel::syscall`]：
//! 1. 本 CPU 的计数加一
//! 2. 全局总数加一（独立的锁，不与进程表锁嵌套）
//! 3. 当前进程的按调用号统计加一

pub mod stats;
pub mod sysproc;

use alloc::vec::Vec;

use log::{info, warn};

use crate::config::MAX_CPUS;
use crate::errno::Errno;
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::process::task::Pid;
use crate::sync::CpuLocal;
use stats::SyscallEntry;

pub const SYS_FORK: usize = 1;
pub const SYS_EXIT: usize = 2;
pub const SYS_WAIT: usize = 3;
pub const SYS_PIPE: usize = 4;
pub const SYS_READ: usize = 5;
pub const SYS_KILL: usize = 6;
pub const SYS_EXEC: usize = 7;
pub const SYS_FSTAT: usize = 8;
pub const SYS_CHDIR: usize = 9;
pub const SYS_DUP: usize = 10;
pub const SYS_GETPID: usize = 11;
pub const SYS_SBRK: usize = 12;
pub const SYS_SLEEP: usize = 13;
pub const SYS_UPTIME: usize = 14;
pub const SYS_OPEN: usize = 15;
pub const SYS_WRITE: usize = 16;
pub const SYS_MKNOD: usize = 17;
pub const SYS_UNLINK: usize = 18;
pub const SYS_LINK: usize = 19;
pub const SYS_MKDIR: usize = 20;
pub const SYS_CLOSE: usize = 21;
pub const SYS_SORT_SYSCALLS: usize = 22;
pub const SYS_GET_MOST_INVOKED_SYSCALL: usize = 23;
pub const SYS_LIST_ALL_PROCESSES: usize = 24;
pub const SYS_CHANGE_QUEUE: usize = 25;
pub const SYS_PROCESSES_INFO: usize = 26;
pub const SYS_SET_BC: usize = 27;
pub const SYS_INITREENTRANTLOCK: usize = 28;
pub const SYS_ACQUIREREENTRANT: usize = 29;
pub const SYS_RELEASEREENTRANT: usize = 30;
pub const SYS_NSYSCALLS: usize = 31;

static SYSCALL_NAMES: [&str; 32] = [
    "",
    "fork",
    "exit",
    "wait",
    "pipe",
    "read",
    "kill",
    "exec",
    "fstat",
    "chdir",
    "dup",
    "getpid",
    "sbrk",
    "sleep",
    "uptime",
    "open",
    "write",
    "mknod",
    "unlink",
    "link",
    "mkdir",
    "close",
    "sort_syscalls",
    "get_most_invoked_syscall",
    "list_all_processes",
    "change_queue",
    "processes_info",
    "set_bc",
    "initreentrantlock",
    "acquirereentrant",
    "releasereentrant",
    "nsyscalls",
];

/// 系统调用名，未知编号返回 "unknown"
pub fn syscall_name(num: usize) -> &'static str {
    match SYSCALL_NAMES.get(num) {
        Some(name) if !name.is_empty() => name,
        _ => "unknown",
    }
}

/// 系统调用计数汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallTotals {
    /// 每个 CPU 上进入系统调用的次数
    pub per_cpu: [u64; MAX_CPUS],
    /// per_cpu 之和
    pub sum: u64,
    /// 全局计数（受独立的锁保护）
    pub total: u64,
}

impl<H: Hal> Kernel<H> {
    /// 记录一次系统调用
    pub fn record_syscall(&self, num: usize) {
        self.push_off();
        self.mycpu().count_syscall();
        self.pop_off();

        *self.syscall_total.lock() += 1;

        let Some(slot) = self.myproc() else {
            return;
        };
        let mut table = self.lock_table();
        if !table.proc_mut(slot).syscalls.record(num) {
            warn!("syscall {} out of accounting range", num);
        }
    }

    /// 进程调用次数最多的系统调用
    pub fn most_invoked_syscall(&self, pid: Pid) -> Result<SyscallEntry, Errno> {
        let table = self.lock_table();
        let slot = table.find(pid).ok_or(Errno::NoSuchProcess)?;
        let best = table.proc(slot).syscalls.most_invoked().ok_or(Errno::NoData)?;
        info!(
            "Most invoked syscall for process {} is {} with {} invokes",
            pid, best.name, best.count
        );
        Ok(best)
    }

    /// 按调用号升序输出进程用过的系统调用
    pub fn sort_syscalls(&self, pid: Pid) -> Result<Vec<SyscallEntry>, Errno> {
        let table = self.lock_table();
        let slot = table.find(pid).ok_or(Errno::NoSuchProcess)?;
        let sorted = table.proc(slot).syscalls.sorted();
        drop(table);

        info!("System calls for process {}:", pid);
        for entry in &sorted {
            info!("Syscall #{}: {}", entry.num, entry.name);
        }
        Ok(sorted)
    }

    /// 每 CPU 计数、它们的和，以及全局总数
    pub fn syscall_totals(&self) -> SyscallTotals {
        let mut per_cpu = [0u64; MAX_CPUS];
        for (count, cpu) in per_cpu.iter_mut().zip(self.cpus.iter()) {
            *count = cpu.syscalls();
        }
        let sum = per_cpu.iter().sum();
        let total = *self.syscall_total.lock();

        info!("{:?}, sum = {}, total = {}", per_cpu, sum, total);
        SyscallTotals { per_cpu, sum, total }
    }
}

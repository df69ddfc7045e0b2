//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 每进程系统调用统计
//!
//! - 按系统调用号计数
//! - 按第一次出现的顺序记录不同的系统调用号，最多 MAX_SYSCALLS 个

use alloc::vec::Vec;

use super::syscall_name;
use crate::config::MAX_SYSCALLS;

/// 一条统计记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallEntry {
    pub num: usize,
    pub name: &'static str,
    pub count: u32,
}

/// 系统调用统计
#[derive(Clone)]
pub struct SyscallStats {
    invokes: [u32; MAX_SYSCALLS],
    /// 第一次出现顺序
    order: [u16; MAX_SYSCALLS],
    len: usize,
}

impl SyscallStats {
    pub const fn new() -> Self {
        Self {
            invokes: [0; MAX_SYSCALLS],
            order: [0; MAX_SYSCALLS],
            len: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// 记录一次调用
    ///
    /// 超出计数表范围的调用号不计入，返回 false
    pub fn record(&mut self, num: usize) -> bool {
        if num >= MAX_SYSCALLS {
            return false;
        }
        if self.invokes[num] == 0 && self.len < MAX_SYSCALLS {
            self.order[self.len] = num as u16;
            self.len += 1;
        }
        self.invokes[num] = self.invokes[num].saturating_add(1);
        true
    }

    pub fn count(&self, num: usize) -> u32 {
        self.invokes.get(num).copied().unwrap_or(0)
    }

    /// 出现过的不同系统调用数量
    pub fn distinct(&self) -> usize {
        self.len
    }

    /// 按第一次出现顺序遍历
    pub fn entries(&self) -> impl Iterator<Item = SyscallEntry> + '_ {
        self.order[..self.len].iter().map(move |&num| {
            let num = num as usize;
            SyscallEntry {
                num,
                name: syscall_name(num),
                count: self.invokes[num],
            }
        })
    }

    /// 调用次数最多的系统调用，次数相同时取先出现的
    pub fn most_invoked(&self) -> Option<SyscallEntry> {
        let mut best: Option<SyscallEntry> = None;
        for entry in self.entries() {
            if best.map_or(true, |b| entry.count > b.count) {
                best = Some(entry);
            }
        }
        best.filter(|b| b.count > 0)
    }

    /// 按系统调用号升序排列，每个调用号一次
    ///
    /// 返回排好序的副本，记录本身保持第一次出现的顺序
    pub fn sorted(&self) -> Vec<SyscallEntry> {
        let mut entries: Vec<SyscallEntry> = self.entries().collect();
        entries.sort_by_key(|e| e.num);
        entries.dedup_by_key(|e| e.num);
        entries
    }
}

impl Default for SyscallStats {
    fn default() -> Self {
        Self::new()
    }
}

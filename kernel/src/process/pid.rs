//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! PID 与 FCFS 序号分配
//!
//! - PID 1: 根进程 (initcode / init)
//! - PID 2: 第一个 shell
//! - PID 3+: 普通进程
//!
//! 两个序号都只在持有进程表锁时修改，所以是普通整数而不是原子量。

use super::task::Pid;
use crate::config::ROOT_PID;

pub const PID_MAX_LIMIT: Pid = 4194304; // 4M

/// 单调递增的 PID 分配器
#[derive(Debug)]
pub struct PidAllocator {
    next: Pid,
}

impl PidAllocator {
    pub const fn new() -> Self {
        Self { next: ROOT_PID }
    }

    pub fn alloc(&mut self) -> Option<Pid> {
        if self.next >= PID_MAX_LIMIT {
            // TODO: 实现 PID bitmap 复用
            return None;
        }
        let pid = self.next;
        self.next += 1;
        Some(pid)
    }

    /// 下一个将被分配的 PID
    pub fn peek(&self) -> Pid {
        self.next
    }
}

/// FCFS 入队序号
///
/// 每次进程进入 FCFS 队列时取一个新序号，序号越小越先被调度
#[derive(Debug)]
pub struct FcfsSequence {
    next: u32,
}

impl FcfsSequence {
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_entry(&mut self) -> u32 {
        let entry = self.next;
        self.next = self.next.wrapping_add(1);
        entry
    }
}

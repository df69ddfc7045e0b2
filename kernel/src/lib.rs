//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程表与三级队列调度器
//!
//! 小型宏内核的进程子系统：
//! - 进程表和状态机 (UNUSED / EMBRYO / SLEEPING / RUNNABLE / RUNNING / ZOMBIE)
//! - fork / exit / wait / kill / yield，sleep / wakeup
//! - 每 CPU 调度循环，RR / SJF / FCFS 三级队列和老化提升
//! - 每进程系统调用统计，可重入锁
//!
//! 内存管理、文件系统、上下文切换汇编和时钟由嵌入方通过 [`hal::Hal`] 提供。
//! 所有状态归 [`Kernel`] 对象所有。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod context;
pub mod errno;
pub mod hal;
pub mod kernel;
pub mod process;
pub mod sched;
pub mod sync;
pub mod syscall;

#[cfg(test)]
mod tests;

pub use errno::Errno;
pub use hal::Hal;
pub use kernel::{Kernel, PtableGuard};
pub use process::{Pid, ProcState};
pub use sched::SchedQueue;

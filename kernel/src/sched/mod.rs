//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器模块
//!
//! 三级队列调度器：
//! - `cpu`: 每 CPU 记录 (struct cpu)
//! - `policy`: RR / SJF / FCFS 选择规则和调度实体
//! - `sched`: 调度循环、sched()、yield、forkret
//! - `aging`: 老化提升、连续运行时间、队列与预估值管理
//!
//! 调度入口: scheduler() -> schedule_once() -> switch_to() -> swtch

pub mod aging;
pub mod cpu;
pub mod policy;
pub mod sched;

pub use cpu::Cpu;
pub use policy::{Lcg, SchedEntity, SchedQueue};

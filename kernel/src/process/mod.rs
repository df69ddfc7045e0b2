//! 进程管理模块
//!
//! 本模块实现进程表和进程生命周期，遵循 xv6 的进程模型：
//! - `task`: 进程控制块 (struct proc)
//! - `table`: 进程表 (ptable)
//! - `pid`: PID 与 FCFS 序号分配
//! - `fork`: userinit / fork / growproc
//! - `exit`: exit / kill
//! - `wait`: sleep / wakeup / wait
//! - `info`: processes_info / list_all_processes / procdump
//!
//! 状态机：UNUSED → EMBRYO → RUNNABLE ⇄ RUNNING ⇄ SLEEPING → ZOMBIE → UNUSED

pub mod exit;
pub mod fork;
pub mod info;
pub mod pid;
pub mod table;
pub mod task;
pub mod wait;

pub use info::ProcInfo;
pub use table::ProcTable;
pub use task::{Chan, Pid, Proc, ProcFlags, ProcState};

//! 进程调度内核配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// SMP 配置
// ============================================================

/// 最大CPU数量
pub const MAX_CPUS: usize = 4;

// ============================================================
// 进程表配置
// ============================================================

/// 进程表槽位数量
pub const NPROC: usize = 64;

/// 每个进程可打开的文件数量
pub const NOFILE: usize = 16;

/// 进程名长度（字节，含结尾 0）
pub const PROC_NAME_LEN: usize = 16;

/// 每个进程可记录的不同系统调用数量
pub const MAX_SYSCALLS: usize = 64;

/// 内核栈大小（字节）
pub const KSTACK_SIZE: usize = 4096;

/// 根进程 PID
pub const ROOT_PID: u32 = 1;

/// shell 进程 PID
pub const SHELL_PID: u32 = 2;

// ============================================================
// 调度器配置
// ============================================================

/// 老化阈值（RUNNABLE 等待的时钟滴答数）
pub const AGING_THRESHOLD: u32 = 800;

/// SJF 默认预估运行时间
pub const DEFAULT_BURST_TIME: u32 = 2;

/// SJF 默认置信度 (0-100)
pub const DEFAULT_CONFIDENCE: u32 = 50;

/// SJF 随机数种子
pub const SCHED_RNG_SEED: u32 = 42;

// ============================================================
// 内存配置
// ============================================================

/// 页大小
pub const PAGE_SIZE: usize = 4096;

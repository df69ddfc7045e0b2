//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程控制块 (Process Control Block)
//!
//! 对应 xv6 的 struct proc 和 Linux 的 struct task_struct
//!
//! 关键设计要点：
//! 1. 进程控制块常驻在进程表的固定槽位中，不做动态分配
//! 2. 内核栈、页表、打开文件、当前目录都是拥有所有权的句柄，
//!    只在回收 (reap) 或 fork 失败回滚时释放一次
//! 3. 父进程用槽位编号表示，父进程退出时子进程会先被过继给根进程

use crate::config::{NOFILE, PROC_NAME_LEN};
use crate::context::{Context, TrapFrame};
use crate::hal::{Hal, KernelStack};
use crate::sched::policy::{SchedEntity, SchedQueue};
use crate::syscall::stats::SyscallStats;

/// 进程 ID
pub type Pid = u32;

/// 进程状态
///
/// 对应 xv6 的 enum procstate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcState {
    /// 空闲槽位
    Unused = 0,
    /// 槽位已被占用，正在初始化
    Embryo = 1,
    /// 在某个等待通道上睡眠
    Sleeping = 2,
    /// 就绪，等待被调度
    Runnable = 3,
    /// 正在某个 CPU 上运行
    Running = 4,
    /// 已退出，等待父进程回收
    Zombie = 5,
}

impl ProcState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcState::Unused => "UNUSED",
            ProcState::Embryo => "EMBRYO",
            ProcState::Sleeping => "SLEEPING",
            ProcState::Runnable => "RUNNABLE",
            ProcState::Running => "RUNNING",
            ProcState::Zombie => "ZOMBIE",
        }
    }

    /// procdump 使用的定宽名字
    pub fn short_name(self) -> &'static str {
        match self {
            ProcState::Unused => "unused",
            ProcState::Embryo => "embryo",
            ProcState::Sleeping => "sleep ",
            ProcState::Runnable => "runble",
            ProcState::Running => "run   ",
            ProcState::Zombie => "zombie",
        }
    }
}

bitflags::bitflags! {
    /// 进程标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProcFlags: u32 {
        /// 已被 kill，在下一个检查点退出
        const KILLED = 1 << 0;
    }
}

/// 等待通道
///
/// 睡眠的进程记录一个通道值，wakeup 唤醒通道相同的所有进程。
/// 通道通常是被等待对象的地址。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chan(usize);

impl Chan {
    pub fn from_ref<T>(obj: &T) -> Self {
        Chan(obj as *const T as usize)
    }

    pub const fn from_addr(addr: usize) -> Self {
        Chan(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }
}

/// 进程名，定长并以 0 结尾（调试用）
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProcName([u8; PROC_NAME_LEN]);

impl ProcName {
    pub const fn empty() -> Self {
        ProcName([0; PROC_NAME_LEN])
    }

    /// 设置名字，超长时在字符边界截断并保留结尾 0
    pub fn set(&mut self, name: &str) {
        let mut len = name.len().min(PROC_NAME_LEN - 1);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        self.0 = [0; PROC_NAME_LEN];
        self.0[..len].copy_from_slice(&name.as_bytes()[..len]);
    }

    pub fn clear(&mut self) {
        self.0 = [0; PROC_NAME_LEN];
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(PROC_NAME_LEN);
        core::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl core::fmt::Debug for ProcName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// 进程控制块
pub struct Proc<H: Hal> {
    pub(crate) pid: Pid,
    pub(crate) state: ProcState,
    /// 父进程槽位
    pub(crate) parent: Option<usize>,
    pub(crate) name: ProcName,
    pub(crate) flags: ProcFlags,
    /// 睡眠通道，只在 SLEEPING 时为 Some
    pub(crate) chan: Option<Chan>,

    pub(crate) kstack: Option<KernelStack>,
    pub(crate) pgdir: Option<H::PageTable>,
    /// 用户内存大小（字节）
    pub(crate) size: usize,
    /// swtch() 保存的内核上下文
    pub(crate) context: Context,
    pub(crate) tf: TrapFrame,
    pub(crate) ofile: [Option<H::File>; NOFILE],
    pub(crate) cwd: Option<H::Inode>,

    pub(crate) sched: SchedEntity,
    pub(crate) syscalls: SyscallStats,
}

impl<H: Hal> Proc<H> {
    pub fn new() -> Self {
        Self {
            pid: 0,
            state: ProcState::Unused,
            parent: None,
            name: ProcName::empty(),
            flags: ProcFlags::empty(),
            chan: None,
            kstack: None,
            pgdir: None,
            size: 0,
            context: Context::empty(),
            tf: TrapFrame::zeroed(),
            ofile: core::array::from_fn(|_| None),
            cwd: None,
            sched: SchedEntity::new(),
            syscalls: SyscallStats::new(),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn state(&self) -> ProcState {
        self.state
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn killed(&self) -> bool {
        self.flags.contains(ProcFlags::KILLED)
    }

    pub fn chan(&self) -> Option<Chan> {
        self.chan
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn trap_frame(&self) -> &TrapFrame {
        &self.tf
    }

    pub fn queue(&self) -> SchedQueue {
        self.sched.queue
    }

    pub fn sched(&self) -> &SchedEntity {
        &self.sched
    }

    pub fn syscalls(&self) -> &SyscallStats {
        &self.syscalls
    }

    pub fn open_files(&self) -> usize {
        self.ofile.iter().filter(|f| f.is_some()).count()
    }

    pub fn has_cwd(&self) -> bool {
        self.cwd.is_some()
    }

    /// 槽位是否被占用
    #[inline]
    pub fn is_used(&self) -> bool {
        self.state != ProcState::Unused
    }
}

impl<H: Hal> Default for Proc<H> {
    fn default() -> Self {
        Self::new()
    }
}

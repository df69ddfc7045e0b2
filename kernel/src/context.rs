//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 执行上下文
//!
//! - [`Context`]: 内核态上下文切换时保存的被调用者保存寄存器，
//!   布局与 `swtch` 汇编约定一致 (RISC-V: ra, sp, s0-s11)
//! - [`TrapFrame`]: 进入内核时保存的用户态寄存器，fork 时整体复制

/// 内核上下文 - swtch() 保存/恢复的寄存器
///
/// 对应 xv6 的 struct context，以及 Linux 的 cpu_context
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    /// 返回地址，swtch 返回时跳转到这里
    pub ra: usize,
    /// 内核栈指针
    pub sp: usize,

    /// 被调用者保存寄存器 s0-s11
    pub s: [usize; 12],
}

impl Context {
    pub const fn empty() -> Self {
        Self { ra: 0, sp: 0, s: [0; 12] }
    }

    /// 为新进程构造初始上下文
    ///
    /// 第一次被调度时从 `entry`（fork 返回跳板）开始执行，
    /// 栈顶按 16 字节对齐
    pub fn new(entry: usize, stack_top: usize) -> Self {
        Self {
            ra: entry,
            sp: stack_top & !0xF,
            s: [0; 12],
        }
    }
}

/// 用户态 trap 帧
///
/// 对应 xv6 的 struct trapframe 和 Linux 的 struct pt_regs
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    /// 通用寄存器 x0-x31
    pub regs: [usize; 32],
    /// 用户程序计数器 (sepc)
    pub epc: usize,
    /// 用户状态寄存器 (sstatus)
    pub status: usize,
}

impl TrapFrame {
    /// a0 寄存器下标，系统调用返回值
    pub const A0: usize = 10;
    /// sp 寄存器下标
    pub const SP: usize = 2;

    pub const fn zeroed() -> Self {
        Self { regs: [0; 32], epc: 0, status: 0 }
    }

    /// 设置系统调用返回值
    #[inline]
    pub fn set_return(&mut self, value: usize) {
        self.regs[Self::A0] = value;
    }

    #[inline]
    pub fn return_value(&self) -> usize {
        self.regs[Self::A0]
    }

    #[inline]
    pub fn set_user_sp(&mut self, sp: usize) {
        self.regs[Self::SP] = sp;
    }
}

impl Default for TrapFrame {
    fn default() -> Self {
        Self::zeroed()
    }
}

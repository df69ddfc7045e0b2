//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 硬件与外部子系统接口
//!
//! 进程表和调度器只通过这里的 trait 使用外部协作者：
//! - [`Arch`]: CPU 编号、中断开关、上下文切换汇编 (swtch)
//! - [`Memory`]: 内核栈与用户地址空间（对应 xv6 的 vm.c / kalloc.c）
//! - [`FileSystem`]: 打开文件与 inode 引用（对应 xv6 的 file.c / fs.c）
//! - [`Clock`]: 时钟滴答计数
//!
//! 同时实现四个 trait 的类型自动成为 [`Hal`]。

use crate::context::{Context, TrapFrame};

/// 内核栈
///
/// 由 [`Memory::kstack_alloc`] 分配，进程被回收时交还给 [`Memory::kstack_free`]。
/// 不实现 Clone，保证同一个栈只会被释放一次。
#[derive(Debug, PartialEq, Eq)]
pub struct KernelStack {
    base: usize,
    size: usize,
}

impl KernelStack {
    pub const fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// 栈顶（栈向低地址增长）
    #[inline]
    pub fn top(&self) -> usize {
        self.base + self.size
    }
}

/// 体系结构相关操作
pub trait Arch: Send + Sync {
    /// 当前 CPU 编号，调用者必须已关中断
    fn cpu_id(&self) -> usize;

    /// 中断是否打开
    fn intr_get(&self) -> bool;

    fn intr_on(&self);

    fn intr_off(&self);

    /// 保存当前被调用者保存寄存器到 `old`，并切换到 `new`
    ///
    /// # Safety
    ///
    /// 两个指针必须指向有效的 [`Context`]，并且调用者持有进程表锁；
    /// 锁的释放责任随切换一起交给目标上下文。
    unsafe fn swtch(&self, old: *mut Context, new: *const Context);

    /// 新进程第一次被调度时的入口地址
    ///
    /// 入口处必须调用 `Kernel::forkret`，然后返回用户态。
    fn trampoline(&self) -> usize;

    /// 初始化第一个用户进程的 trap 帧（用户态 pc、sp、状态寄存器）
    fn init_user_frame(&self, tf: &mut TrapFrame, entry: usize, user_sp: usize);
}

/// 内存管理
pub trait Memory: Send + Sync {
    /// 用户页表句柄，拥有所有权，释放时交给 [`Memory::free_vm`]
    type PageTable: Send;

    fn kstack_alloc(&self) -> Option<KernelStack>;

    fn kstack_free(&self, stack: KernelStack);

    /// 创建只包含内核映射的页表
    fn setup_kvm(&self) -> Option<Self::PageTable>;

    /// 把初始代码装入页表的第 0 页
    fn init_uvm(&self, pgdir: &mut Self::PageTable, code: &[u8]);

    /// 复制 `[0, size)` 的用户内存，得到一个新的页表
    fn copy_uvm(&self, pgdir: &Self::PageTable, size: usize) -> Option<Self::PageTable>;

    /// 从 `old_size` 增长到 `new_size`，返回新的大小
    fn alloc_uvm(&self, pgdir: &mut Self::PageTable, old_size: usize, new_size: usize) -> Option<usize>;

    /// 从 `old_size` 收缩到 `new_size`，返回新的大小
    fn dealloc_uvm(&self, pgdir: &mut Self::PageTable, old_size: usize, new_size: usize) -> usize;

    /// 释放整个用户地址空间和页表本身
    fn free_vm(&self, pgdir: Self::PageTable);

    /// 切换到进程的页表，并把内核栈设置为 trap 栈
    fn switch_uvm(&self, pgdir: &Self::PageTable, kstack: &KernelStack);

    /// 切换回内核页表
    fn switch_kvm(&self);
}

/// 文件系统
pub trait FileSystem: Send + Sync {
    /// 打开文件句柄
    type File: Send;
    /// inode 引用
    type Inode: Send;

    /// 增加引用计数，返回新的句柄
    fn file_dup(&self, file: &Self::File) -> Self::File;

    fn file_close(&self, file: Self::File);

    fn idup(&self, inode: &Self::Inode) -> Self::Inode;

    /// 释放 inode 引用，必须在 [`FileSystem::begin_op`] / [`FileSystem::end_op`] 之间调用
    fn iput(&self, inode: Self::Inode);

    fn namei(&self, path: &str) -> Option<Self::Inode>;

    /// 开始一次日志事务
    fn begin_op(&self) {}

    /// 结束一次日志事务
    fn end_op(&self) {}

    /// 需要在进程上下文中完成的文件系统初始化（可能睡眠）
    ///
    /// 只会被第一个运行的进程调用一次
    fn first_init(&self) {}
}

/// 时钟
pub trait Clock: Send + Sync {
    /// 启动以来的时钟滴答数
    fn ticks(&self) -> u32;
}

/// 外部协作者的总接口
pub trait Hal: Arch + Memory + FileSystem + Clock + 'static {}

impl<T> Hal for T where T: Arch + Memory + FileSystem + Clock + 'static {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_stack_top() {
        let stack = KernelStack::new(0x8000_0000, 4096);
        assert_eq!(stack.base(), 0x8000_0000);
        assert_eq!(stack.size(), 4096);
        assert_eq!(stack.top(), 0x8000_1000);
    }
}

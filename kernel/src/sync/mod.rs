//! 同步原语 (Synchronization Primitives)
//!
//! 遵循 xv6 / Linux 内核的锁设计：
//! - `kernel/locking/spinlock.c` - 自旋锁，持锁期间关中断 (push_off/pop_off)
//! - 可重入锁 - 同一个持有者可以重复获取的自旋锁封装
//!
//! 核心概念：
//! - 持有自旋锁时本 CPU 的中断一直关闭，避免被时钟中断抢占后死锁
//! - 关中断是嵌套计数的，最外层 pop_off 才恢复进入时的中断状态
//! - 锁只能由获取它的 CPU 释放（进程表锁的跨上下文交接除外，见 [`SpinLock::adopt`]）

pub mod reentrant;
pub mod spinlock;

pub use reentrant::ReentrantLock;
pub use spinlock::{SpinLock, SpinLockGuard};

/// 每 CPU 的中断嵌套状态
///
/// 对应 xv6 的 push_off()/pop_off() 以及 mycpu()/myproc()
pub trait CpuLocal {
    /// 当前 CPU 编号
    fn cpu_id(&self) -> usize;

    /// 关中断并增加嵌套深度，最外层记录进入前的中断状态
    fn push_off(&self);

    /// 减少嵌套深度，深度归零时恢复 push_off 之前的中断状态
    fn pop_off(&self);

    /// 当前 CPU 上运行的进程槽位，调度器自身运行时为 None
    fn current_slot(&self) -> Option<usize>;
}

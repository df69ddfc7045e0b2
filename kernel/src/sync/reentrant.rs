//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 可重入锁 (Reentrant Lock)
//!
//! 在 [`SpinLock`] 之上记录持有者和重入次数：
//! - 持有者再次获取只增加计数
//! - 其它持有者在底层自旋锁上等待，直到计数归零被完全释放
//!
//! 持有者身份是进程槽位；没有当前进程（调度器或中断上下文）时用 CPU 编号代替。

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use super::{CpuLocal, SpinLock};

const NO_OWNER: usize = 0;
const CPU_OWNER: usize = 1 << (usize::BITS - 1);

/// 可重入锁
pub struct ReentrantLock {
    lock: SpinLock<()>,
    owner: AtomicUsize,
    recursion: AtomicU32,
}

impl ReentrantLock {
    pub const fn new(name: &'static str) -> Self {
        Self {
            lock: SpinLock::new(name, ()),
            owner: AtomicUsize::new(NO_OWNER),
            recursion: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.lock.name()
    }

    /// 重新初始化，锁必须处于空闲状态
    pub fn init(&self) {
        if self.lock.is_locked() {
            panic!("reentrant lock: init while held");
        }
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.recursion.store(0, Ordering::Relaxed);
    }

    fn owner_token(cpus: &dyn CpuLocal) -> usize {
        match cpus.current_slot() {
            Some(slot) => slot + 1,
            None => CPU_OWNER | cpus.cpu_id(),
        }
    }

    /// 获取锁
    ///
    /// 底层自旋锁的 push_off 会一直保持到最外层 release，
    /// 所以持锁期间中断保持关闭
    pub fn acquire(&self, cpus: &dyn CpuLocal) {
        cpus.push_off();
        let me = Self::owner_token(cpus);

        if self.owner.load(Ordering::Acquire) != me {
            self.lock.acquire(cpus);
            if self.recursion.load(Ordering::Relaxed) != 0 {
                panic!("reentrant lock: acquire");
            }
            self.owner.store(me, Ordering::Release);
        }

        self.recursion.fetch_add(1, Ordering::Relaxed);
        cpus.pop_off();
    }

    /// 释放一次，计数归零时释放底层自旋锁
    pub fn release(&self, cpus: &dyn CpuLocal) {
        cpus.push_off();
        if self.owner.load(Ordering::Acquire) != Self::owner_token(cpus) {
            panic!("reentrant lock: release");
        }

        if self.recursion.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.owner.store(NO_OWNER, Ordering::Release);
            unsafe { self.lock.release(cpus) };
        }
        cpus.pop_off();
    }

    /// 调用者是否为当前持有者
    pub fn holding(&self, cpus: &dyn CpuLocal) -> bool {
        cpus.push_off();
        let held = self.owner.load(Ordering::Acquire) == Self::owner_token(cpus);
        cpus.pop_off();
        held
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn recursion(&self) -> u32 {
        self.recursion.load(Ordering::Relaxed)
    }
}

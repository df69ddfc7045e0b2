//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 自旋锁 (Spinlock)
//!
//! 对应 xv6 的 kernel/spinlock.c 和 Linux 的 include/linux/spinlock.h
//!
//! 和普通的用户态自旋锁不同：
//! - 获取时先 push_off 关中断，释放时 pop_off，持锁期间不会被本 CPU 的中断打断
//! - 记录持有者 CPU，同一个 CPU 重复获取直接 panic（必然死锁）
//! - 守卫 [`SpinLockGuard`] 可以被当作值传递，调度器借此表达
//!   "带锁切换上下文，由另一端负责释放" 的交接协议

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::CpuLocal;

const NO_CPU: usize = usize::MAX;

/// 自旋锁
pub struct SpinLock<T> {
    locked: AtomicBool,
    /// 调试用名字，出现在 panic 信息里
    name: &'static str,
    /// 持有者 CPU
    cpu: AtomicUsize,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for SpinLock<T> {}
unsafe impl<T: Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            name,
            cpu: AtomicUsize::new(NO_CPU),
            data: UnsafeCell::new(data),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 当前 CPU 是否持有这把锁
    ///
    /// 调用者应当已关中断，否则结果可能立刻过期
    pub fn holding(&self, cpus: &dyn CpuLocal) -> bool {
        self.locked.load(Ordering::Relaxed) && self.cpu.load(Ordering::Relaxed) == cpus.cpu_id()
    }

    /// 是否被任意 CPU 持有
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// 获取锁，返回守卫
    pub fn lock<'a>(&'a self, cpus: &'a dyn CpuLocal) -> SpinLockGuard<'a, T> {
        self.acquire(cpus);
        SpinLockGuard {
            lock: self,
            cpus,
            _not_send: PhantomData,
        }
    }

    /// 尝试获取锁，锁已被持有时立即返回 None
    pub fn try_lock<'a>(&'a self, cpus: &'a dyn CpuLocal) -> Option<SpinLockGuard<'a, T>> {
        cpus.push_off();
        if self.holding(cpus)
            || self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
        {
            cpus.pop_off();
            return None;
        }
        self.cpu.store(cpus.cpu_id(), Ordering::Relaxed);
        Some(SpinLockGuard {
            lock: self,
            cpus,
            _not_send: PhantomData,
        })
    }

    /// 不带守卫的获取，配对的释放是 [`SpinLock::release`]
    pub fn acquire(&self, cpus: &dyn CpuLocal) {
        cpus.push_off();
        if self.holding(cpus) {
            panic!("acquire {}", self.name);
        }

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }

        self.cpu.store(cpus.cpu_id(), Ordering::Relaxed);
    }

    /// 释放由 [`SpinLock::acquire`] 获取的锁
    ///
    /// # Safety
    ///
    /// 不能有仍然存活的 [`SpinLockGuard`] 指向这把锁。
    pub unsafe fn release(&self, cpus: &dyn CpuLocal) {
        if !self.holding(cpus) {
            panic!("release {}", self.name);
        }
        self.cpu.store(NO_CPU, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
        cpus.pop_off();
    }

    /// 接管当前 CPU 已经持有、但没有守卫的锁
    ///
    /// 新进程第一次运行时（forkret）调度器仍持有进程表锁，
    /// 新进程通过这里拿到守卫，随后按正常路径释放。
    ///
    /// # Safety
    ///
    /// 锁必须是在别的执行上下文里获取、并随上下文切换交给当前上下文的，
    /// 且不存在其它守卫。
    pub unsafe fn adopt<'a>(&'a self, cpus: &'a dyn CpuLocal) -> SpinLockGuard<'a, T> {
        if !self.holding(cpus) {
            panic!("adopt {}", self.name);
        }
        SpinLockGuard {
            lock: self,
            cpus,
            _not_send: PhantomData,
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    #[cfg(test)]
    pub(crate) fn data_ptr(&self) -> *mut T {
        self.data.get()
    }
}

/// 自旋锁守卫
///
/// 离开作用域时释放锁。守卫不能跨线程发送，但可以在函数之间按值传递，
/// 调度器的 sched()/sleep() 都是 "拿走守卫，切换回来后再交还"。
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    cpus: &'a dyn CpuLocal,
    _not_send: PhantomData<*const ()>,
}

impl<'a, T> SpinLockGuard<'a, T> {
    /// 释放锁，返回锁本身以便稍后重新获取
    pub fn unlock(guard: Self) -> &'a SpinLock<T> {
        let lock = guard.lock;
        drop(guard);
        lock
    }

    /// 守卫对应的锁
    pub fn spinlock(guard: &Self) -> &'a SpinLock<T> {
        guard.lock
    }

    pub fn holding(guard: &Self) -> bool {
        guard.lock.holding(guard.cpus)
    }
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // 守卫存在即代表持锁，这里是唯一的释放点
        unsafe { self.lock.release(self.cpus) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testcpu::TestCpu;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_disables_interrupts() {
        let cpu = TestCpu::new(0);
        let lock = SpinLock::new("test", 0u32);

        {
            let mut guard = lock.lock(&cpu);
            *guard += 1;
            assert!(lock.holding(&cpu));
            assert_eq!(cpu.ncli(), 1);
            assert!(!cpu.intr_enabled());
        }

        assert!(!lock.is_locked());
        assert_eq!(cpu.ncli(), 0);
        assert!(cpu.intr_enabled());
        assert_eq!(*lock.lock(&cpu), 1);
    }

    #[test]
    fn test_nested_locks_restore_interrupts_last() {
        let cpu = TestCpu::new(0);
        let a = SpinLock::new("a", ());
        let b = SpinLock::new("b", ());

        let ga = a.lock(&cpu);
        let gb = b.lock(&cpu);
        assert_eq!(cpu.ncli(), 2);
        drop(ga);
        assert!(!cpu.intr_enabled());
        drop(gb);
        assert!(cpu.intr_enabled());
    }

    #[test]
    #[should_panic(expected = "acquire test")]
    fn test_double_acquire_panics() {
        let cpu = TestCpu::new(0);
        let lock = SpinLock::new("test", ());
        let _g = lock.lock(&cpu);
        let _g2 = lock.lock(&cpu);
    }

    #[test]
    fn test_try_lock_busy() {
        let cpu0 = TestCpu::new(0);
        let cpu1 = TestCpu::new(1);
        let lock = SpinLock::new("test", ());

        let guard = lock.lock(&cpu0);
        assert!(lock.try_lock(&cpu1).is_none());
        assert_eq!(cpu1.ncli(), 0);
        assert!(lock.try_lock(&cpu0).is_none());
        assert_eq!(cpu0.ncli(), 1);
        drop(guard);

        assert!(lock.try_lock(&cpu1).is_some());
    }

    #[test]
    fn test_unlock_and_relock() {
        let cpu = TestCpu::new(0);
        let lock = SpinLock::new("test", 5u32);

        let guard = lock.lock(&cpu);
        let again = SpinLockGuard::unlock(guard);
        assert!(!again.is_locked());
        assert_eq!(*again.lock(&cpu), 5);
    }

    #[test]
    fn test_adopt_handed_over_lock() {
        let cpu = TestCpu::new(0);
        let lock = SpinLock::new("ptable", ());

        lock.acquire(&cpu);
        let guard = unsafe { lock.adopt(&cpu) };
        assert!(SpinLockGuard::holding(&guard));
        drop(guard);

        assert!(!lock.is_locked());
        assert_eq!(cpu.ncli(), 0);
    }

    #[test]
    #[should_panic(expected = "adopt ptable")]
    fn test_adopt_without_lock_panics() {
        let cpu = TestCpu::new(0);
        let lock = SpinLock::new("ptable", ());
        let _g = unsafe { lock.adopt(&cpu) };
    }

    #[test]
    fn test_mutual_exclusion_across_cpus() {
        let lock = Arc::new(SpinLock::new("counter", 0u64));

        let handles: Vec<_> = (0..4)
            .map(|id| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    let cpu = TestCpu::new(id);
                    for _ in 0..10_000 {
                        *lock.lock(&cpu) += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let cpu = TestCpu::new(0);
        assert_eq!(*lock.lock(&cpu), 40_000);
    }
}

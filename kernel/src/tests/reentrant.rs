// 测试：内核可重入锁的系统调用
//
// 测试内容：
// 1. 同一进程多次获取，同样次数的释放后锁空闲
// 2. 非持有者释放 panic
// 3. 另一个 CPU 上的进程等到完全释放后才能获取

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::mock::*;
use crate::kernel::Kernel;
use crate::syscall::{SYS_ACQUIREREENTRANT, SYS_INITREENTRANTLOCK, SYS_RELEASEREENTRANT};

#[test]
fn test_reentrant_syscalls_nest() {
    let k = boot_with_shell();
    run_as(&k, 2);

    assert_eq!(k.syscall(SYS_INITREENTRANTLOCK, [0; 6]), Some(0));
    for _ in 0..3 {
        assert_eq!(k.syscall(SYS_ACQUIREREENTRANT, [0; 6]), Some(0));
    }
    assert_eq!(k.rlock.recursion(), 3);
    assert!(k.rlock.holding(&*k));
    // 持有期间中断一直关闭
    assert_eq!(ncli(&k), 1);

    for _ in 0..3 {
        assert_eq!(k.syscall(SYS_RELEASEREENTRANT, [0; 6]), Some(0));
    }
    assert!(!k.rlock.is_locked());
    assert_eq!(k.rlock.recursion(), 0);
    assert_eq!(ncli(&k), 0);
}

#[test]
#[should_panic(expected = "reentrant lock: release")]
fn test_release_by_other_process() {
    let k = boot_with_shell();
    let child = fork_from(&k, 2);

    run_as(&k, 2);
    k.sys_acquirereentrant();
    run_as(&k, child);
    k.sys_releasereentrant();
}

#[test]
fn test_second_owner_waits_for_full_release() {
    let k = boot_with_shell();
    let child = fork_from(&k, 2);
    leave_cpu(&k);
    let shell = slot_of(&k, 2);
    let child_slot = slot_of(&k, child);

    k.mycpu().set_current(Some(shell));
    k.sys_acquirereentrant();
    k.sys_acquirereentrant();

    let acquired = AtomicBool::new(false);
    let kernel: &Kernel<MockHal> = &k;
    std::thread::scope(|s| {
        let acquired = &acquired;
        s.spawn(move || {
            set_cpu(1);
            kernel.cpu(1).unwrap().set_current(Some(child_slot));
            kernel.sys_acquirereentrant();
            acquired.store(true, Ordering::SeqCst);
            assert_eq!(kernel.rlock.recursion(), 1);
            kernel.sys_releasereentrant();
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        kernel.sys_releasereentrant();
        std::thread::sleep(Duration::from_millis(20));
        assert!(!acquired.load(Ordering::SeqCst));
        kernel.sys_releasereentrant();
    });

    assert!(acquired.load(Ordering::SeqCst));
    assert!(!k.rlock.is_locked());
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程与调度相关的系统调用
//!
//! 参数已由 trap 层从寄存器取出，这里只做类型检查并把内核内部的
//! `Result<T, Errno>` 转换为 xv6 的返回约定：失败一律为 -1。

use log::debug;

use crate::errno::Errno;
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::process::task::Pid;

use super::*;

/// 把系统调用参数转换为 PID
fn arg_pid(raw: usize) -> Result<Pid, Errno> {
    let pid = raw as isize;
    if pid <= 0 {
        return Err(Errno::InvalidArgument);
    }
    Pid::try_from(pid).map_err(|_| Errno::InvalidArgument)
}

fn ret(result: Result<isize, Errno>) -> isize {
    match result {
        Ok(value) => value,
        Err(_) => -1,
    }
}

impl<H: Hal> Kernel<H> {
    /// 系统调用入口
    ///
    /// 先记账，再分发；不属于进程/调度子系统的调用返回 None，由调用者继续分发
    pub fn syscall(&self, num: usize, args: [usize; 6]) -> Option<isize> {
        self.record_syscall(num);

        let value = match num {
            SYS_FORK => self.sys_fork(),
            SYS_EXIT => self.sys_exit(),
            SYS_WAIT => self.sys_wait(),
            SYS_KILL => self.sys_kill(args[0]),
            SYS_GETPID => self.sys_getpid(),
            SYS_SBRK => self.sys_sbrk(args[0] as isize),
            SYS_SLEEP => self.sys_sleep(args[0] as isize),
            SYS_UPTIME => self.sys_uptime(),
            SYS_SORT_SYSCALLS => self.sys_sort_syscalls(args[0]),
            SYS_GET_MOST_INVOKED_SYSCALL => self.sys_get_most_invoked_syscall(args[0]),
            SYS_LIST_ALL_PROCESSES => self.sys_list_all_processes(),
            SYS_CHANGE_QUEUE => self.sys_change_queue(args[0], args[1] as i32),
            SYS_PROCESSES_INFO => self.sys_processes_info(),
            SYS_SET_BC => self.sys_set_bc(args[0], args[1] as i32, args[2] as i32),
            SYS_INITREENTRANTLOCK => self.sys_initreentrantlock(),
            SYS_ACQUIREREENTRANT => self.sys_acquirereentrant(),
            SYS_RELEASEREENTRANT => self.sys_releasereentrant(),
            SYS_NSYSCALLS => self.sys_nsyscalls(),
            _ => {
                debug!("syscall {} ({}) not handled here", num, syscall_name(num));
                return None;
            }
        };
        Some(value)
    }

    pub fn sys_fork(&self) -> isize {
        ret(self.fork().map(|pid| pid as isize))
    }

    pub fn sys_exit(&self) -> ! {
        self.exit()
    }

    pub fn sys_wait(&self) -> isize {
        ret(self.wait().map(|pid| pid as isize))
    }

    pub fn sys_kill(&self, pid: usize) -> isize {
        ret(arg_pid(pid).and_then(|pid| self.kill(pid)).map(|_| 0))
    }

    pub fn sys_getpid(&self) -> isize {
        self.current_pid().map_or(-1, |pid| pid as isize)
    }

    /// 返回调整前的内存大小
    pub fn sys_sbrk(&self, n: isize) -> isize {
        ret(self.growproc(n).map(|old| old as isize))
    }

    /// 睡眠 n 个时钟滴答，期间被 kill 返回 -1
    pub fn sys_sleep(&self, n: isize) -> isize {
        let Ok(n) = u32::try_from(n) else {
            return -1;
        };

        let mut guard = self.ticks_lock.lock(self);
        let ticks0 = self.hal.ticks();
        while self.hal.ticks().wrapping_sub(ticks0) < n {
            if self.killed() {
                return -1;
            }
            guard = self.sleep(self.ticks_chan(), guard);
        }
        0
    }

    pub fn sys_uptime(&self) -> isize {
        self.hal.ticks() as isize
    }

    pub fn sys_sort_syscalls(&self, pid: usize) -> isize {
        ret(arg_pid(pid).and_then(|pid| self.sort_syscalls(pid)).map(|_| 0))
    }

    pub fn sys_get_most_invoked_syscall(&self, pid: usize) -> isize {
        ret(arg_pid(pid)
            .and_then(|pid| self.most_invoked_syscall(pid))
            .map(|entry| entry.num as isize))
    }

    pub fn sys_list_all_processes(&self) -> isize {
        ret(self.list_all_processes().map(|n| n as isize))
    }

    /// 非法队列号或不存在的 PID 只记录日志，仍返回 0
    /// 与 xv6 一致，参数有误时只记录日志，总是返回 0
    pub fn sys_change_queue(&self, pid: usize, queue: i32) -> isize {
        match arg_pid(pid) {
            Ok(pid) => {
                if let Err(err) = self.change_queue(pid, queue) {
                    debug!("change_queue({}, {}): {}", pid, queue, err);
                }
            }
            Err(err) => debug!("change_queue({}): {}", pid as isize, err),
        }
        0
    }

    pub fn sys_processes_info(&self) -> isize {
        self.processes_info();
        0
    }

    pub fn sys_set_bc(&self, pid: usize, burst_time: i32, confidence: i32) -> isize {
        let Ok(pid) = arg_pid(pid) else {
            return -1;
        };
        let Ok(burst_time) = u32::try_from(burst_time) else {
            return -1;
        };
        let confidence = confidence.clamp(0, 100) as u32;
        if let Err(err) = self.set_bc(pid, burst_time, confidence) {
            debug!("set_bc({}): {}", pid, err);
        }
        0
    }

    pub fn sys_initreentrantlock(&self) -> isize {
        self.rlock.init();
        0
    }

    /// 获取内核的可重入锁，持有期间本 CPU 中断关闭
    pub fn sys_acquirereentrant(&self) -> isize {
        self.rlock.acquire(self);
        0
    }

    pub fn sys_releasereentrant(&self) -> isize {
        self.rlock.release(self);
        0
    }

    /// 输出每 CPU 和全局的系统调用计数，返回全局总数
    pub fn sys_nsyscalls(&self) -> isize {
        self.syscall_totals().total as isize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_pid() {
        assert_eq!(arg_pid(5), Ok(5));
        assert_eq!(arg_pid(0), Err(Errno::InvalidArgument));
        assert_eq!(arg_pid(-3isize as usize), Err(Errno::InvalidArgument));
    }

    #[test]
    fn test_ret_conversion() {
        assert_eq!(ret(Ok(7)), 7);
        assert_eq!(ret(Err(Errno::NoChild)), -1);
    }
}

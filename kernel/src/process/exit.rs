//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程退出 (exit/kill) 实现
//!
//! 参考 xv6 proc.c 的 exit()/kill() 以及 Linux kernel/exit.c
//!
//! exit 流程:
//! 1. 关闭所有打开文件，释放当前目录（在日志事务中）
//! 2. 唤醒可能在 wait() 中睡眠的父进程
//! 3. 把子进程过继给根进程，有僵尸子进程时唤醒根进程
//! 4. 进入 ZOMBIE，切换到调度器，不再返回
//!
//! 内核栈和地址空间留给父进程在 wait() 中回收。

use log::debug;

use crate::errno::Errno;
use crate::hal::Hal;
use crate::kernel::{Kernel, PtableGuard};

use super::task::{Pid, ProcFlags, ProcState};

impl<H: Hal> Kernel<H> {
    /// 退出当前进程，不返回
    pub fn exit(&self) -> ! {
        let table = self.do_exit();
        let _table = self.sched(table);
        panic!("zombie exit");
    }

    /// exit 的主体：完成到 ZOMBIE 为止的所有工作，返回仍持有的进程表锁
    pub(crate) fn do_exit(&self) -> PtableGuard<'_, H> {
        let Some(cur) = self.myproc() else {
            panic!("exit: no current process");
        };
        if Some(cur) == self.initproc() {
            panic!("init exiting");
        }

        let (files, cwd) = {
            let mut table = self.lock_table();
            let p = table.proc_mut(cur);
            let files = core::mem::replace(&mut p.ofile, core::array::from_fn(|_| None));
            (files, p.cwd.take())
        };
        for file in files.into_iter().flatten() {
            self.hal.file_close(file);
        }
        if let Some(ip) = cwd {
            self.hal.begin_op();
            self.hal.iput(ip);
            self.hal.end_op();
        }

        let mut table = self.lock_table();

        if let Some(parent) = table.proc(cur).parent {
            let chan = table.chan_of(parent);
            table.wakeup(chan);
        }

        let Some(init) = self.initproc() else {
            panic!("exit: no init process");
        };
        let init_chan = table.chan_of(init);
        let mut zombie_orphan = false;
        for p in table.procs_mut().iter_mut() {
            if p.is_used() && p.parent == Some(cur) {
                p.parent = Some(init);
                if p.state == ProcState::Zombie {
                    zombie_orphan = true;
                }
            }
        }
        if zombie_orphan {
            table.wakeup(init_chan);
        }

        let p = table.proc_mut(cur);
        p.state = ProcState::Zombie;
        debug!("exit: pid {} is now a zombie", p.pid);
        table
    }

    /// 标记 `pid` 为已 kill，睡眠中的进程被唤醒以便尽快看到标志
    pub fn kill(&self, pid: Pid) -> Result<(), Errno> {
        let mut table = self.lock_table();
        let slot = table.find(pid).ok_or(Errno::NoSuchProcess)?;

        let p = table.proc_mut(slot);
        p.flags.insert(ProcFlags::KILLED);
        if p.state == ProcState::Sleeping {
            p.state = ProcState::Runnable;
        }
        Ok(())
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程创建 (userinit/fork) 实现
//!
//! 参考 xv6 proc.c 的 allocproc()/userinit()/fork()/growproc()
//! 以及 Linux kernel/fork.c
//!
//! fork 流程:
//! 1. 持锁分配进程槽位和内核栈 (allocproc)，槽位停在 EMBRYO
//! 2. 放开锁复制地址空间 (copy_uvm)，失败时重新加锁整体回滚
//! 3. 复制 trap 帧，子进程的返回值置 0
//! 4. 复制打开文件和当前目录（每个都是新的引用）
//! 5. 继承父进程的队列（shell 的子进程进入 RR），标记为 RUNNABLE

use log::{debug, warn};

use crate::config::{PAGE_SIZE, SHELL_PID};
use crate::context::Context;
use crate::errno::Errno;
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::sched::policy::SchedQueue;

use super::table::ProcTable;
use super::task::{Pid, ProcState};

impl<H: Hal> Kernel<H> {
    /// 分配进程槽位和内核栈
    ///
    /// 成功时槽位处于 EMBRYO，初始上下文从 fork 返回跳板开始执行；
    /// 内核栈分配失败时槽位退回 UNUSED。调用者持有进程表锁。
    pub(crate) fn allocproc(&self, table: &mut ProcTable<H>) -> Result<usize, Errno> {
        let slot = table.claim(self.hal.ticks())?;

        let Some(kstack) = self.hal.kstack_alloc() else {
            table.release_slot(slot, &self.hal);
            return Err(Errno::OutOfMemory);
        };

        let p = table.proc_mut(slot);
        p.context = Context::new(self.hal.trampoline(), kstack.top());
        p.kstack = Some(kstack);
        Ok(slot)
    }

    /// 创建根进程
    ///
    /// 根进程运行 `initcode`（一页用户内存），工作目录为 "/"，在 RR 队列中
    pub fn userinit(&self, initcode: &[u8]) -> Result<Pid, Errno> {
        if initcode.len() > PAGE_SIZE {
            return Err(Errno::InvalidArgument);
        }
        let slot = {
            let mut table = self.lock_table();
            self.allocproc(&mut table)?
        };

        // EMBRYO 槽位不会被调度，地址空间在锁外准备
        let Some(mut pgdir) = self.hal.setup_kvm() else {
            self.lock_table().release_slot(slot, &self.hal);
            return Err(Errno::OutOfMemory);
        };
        self.hal.init_uvm(&mut pgdir, initcode);
        let cwd = self.hal.namei("/");

        let mut table = self.lock_table();
        let p = table.proc_mut(slot);
        p.pgdir = Some(pgdir);
        p.size = PAGE_SIZE;
        self.hal.init_user_frame(&mut p.tf, 0, PAGE_SIZE);
        p.name.set("initcode");
        p.cwd = cwd;
        p.state = ProcState::Runnable;
        let pid = p.pid;

        self.set_initproc(slot);
        debug!("userinit: pid {} in slot {}", pid, slot);
        Ok(pid)
    }

    /// 复制当前进程
    ///
    /// 父进程得到子进程 PID，子进程从 trap 帧返回时得到 0。
    /// 资源不足时返回错误，不留下任何部分分配的状态。
    pub fn fork(&self) -> Result<Pid, Errno> {
        let Some(cur) = self.myproc() else {
            panic!("fork: no current process");
        };

        // 占下槽位，并把父进程的地址空间、打开文件和当前目录暂时取出。
        // 这些资源只有正在 fork 的父进程自己会改动，复制时不持有进程表锁。
        let (np, size, pgdir, ofile, cwd) = {
            let mut table = self.lock_table();
            let np = self.allocproc(&mut table)?;
            let parent = table.proc_mut(cur);
            let ofile = core::mem::replace(&mut parent.ofile, core::array::from_fn(|_| None));
            (np, parent.size, parent.pgdir.take(), ofile, parent.cwd.take())
        };

        let copied = pgdir
            .as_ref()
            .and_then(|pgdir| self.hal.copy_uvm(pgdir, size))
            .map(|child_pgdir| {
                let child_ofile = core::array::from_fn(|fd| ofile[fd].as_ref().map(|f| self.hal.file_dup(f)));
                let child_cwd = cwd.as_ref().map(|ip| self.hal.idup(ip));
                (child_pgdir, child_ofile, child_cwd)
            });

        let mut table = self.lock_table();
        let parent = table.proc_mut(cur);
        parent.pgdir = pgdir;
        parent.ofile = ofile;
        parent.cwd = cwd;

        let Some((child_pgdir, child_ofile, child_cwd)) = copied else {
            table.release_slot(np, &self.hal);
            warn!("fork: copy_uvm failed");
            return Err(Errno::OutOfMemory);
        };

        let parent = table.proc(cur);
        let mut tf = parent.tf;
        let name = parent.name;
        let parent_pid = parent.pid;
        let parent_queue = parent.sched.queue;

        tf.set_return(0);

        let child = table.proc_mut(np);
        child.pgdir = Some(child_pgdir);
        child.size = size;
        child.parent = Some(cur);
        child.tf = tf;
        child.ofile = child_ofile;
        child.cwd = child_cwd;
        child.name = name;
        // shell 启动的命令进入 RR，其余继承父进程的队列
        child.sched.queue = if parent_pid == SHELL_PID {
            SchedQueue::Rr
        } else {
            parent_queue
        };
        child.state = ProcState::Runnable;

        let pid = child.pid;
        debug!("fork: {} -> {} ({})", parent_pid, pid, child.sched.queue);
        Ok(pid)
    }

    /// 调整当前进程的用户内存，返回调整前的大小
    pub fn growproc(&self, n: isize) -> Result<usize, Errno> {
        let Some(cur) = self.myproc() else {
            panic!("growproc: no current process");
        };

        let mut table = self.lock_table();
        let p = table.proc_mut(cur);
        let old = p.size;
        let (Some(pgdir), Some(kstack)) = (p.pgdir.as_mut(), p.kstack.as_ref()) else {
            panic!("growproc: no address space");
        };

        let new = if n > 0 {
            let target = old.checked_add(n as usize).ok_or(Errno::OutOfMemory)?;
            self.hal.alloc_uvm(pgdir, old, target).ok_or(Errno::OutOfMemory)?
        } else if n < 0 {
            let target = old.checked_sub(n.unsigned_abs()).ok_or(Errno::InvalidArgument)?;
            self.hal.dealloc_uvm(pgdir, old, target)
        } else {
            old
        };

        self.hal.switch_uvm(pgdir, kstack);
        p.size = new;
        Ok(old)
    }
}

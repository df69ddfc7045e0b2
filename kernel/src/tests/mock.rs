// 测试用的硬件抽象层
//
// - CPU 编号和中断开关是线程局部的，每个测试线程就是一个 CPU
// - 内核栈、页表、文件、inode 只计数，用来检查泄漏
// - swtch 不真正切换：如果装了钩子，就在持有进程表锁的前提下调用它，
//   由钩子模拟 "另一端执行了一段时间再切回来"

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::KSTACK_SIZE;
use crate::context::{Context, TrapFrame};
use crate::hal::{Arch, Clock, FileSystem, KernelStack, Memory};
use crate::kernel::Kernel;
use crate::process::table::ProcTable;
use crate::process::task::{Pid, Proc, ProcState};
use crate::sync::{CpuLocal, SpinLock};

thread_local! {
    static CPU_ID: Cell<usize> = Cell::new(0);
    static INTR: Cell<bool> = Cell::new(true);
}

/// 让当前测试线程扮演 `id` 号 CPU
pub fn set_cpu(id: usize) {
    CPU_ID.with(|c| c.set(id));
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockPageTable {
    pub id: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockFile {
    pub id: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockInode {
    pub id: u32,
}

/// swtch 钩子，参数是进程表和目标槽位（None 表示切回调度器）
pub type SwitchHook = Box<dyn FnMut(&mut ProcTable<MockHal>, Option<usize>) + Send>;

pub struct MockHal {
    ticks: Arc<AtomicU32>,
    next_stack: AtomicUsize,
    next_pgdir: AtomicU32,
    kstacks: AtomicUsize,
    pgdirs: AtomicUsize,
    files: AtomicUsize,
    inodes: AtomicUsize,
    fs_ops: AtomicUsize,
    first_init: AtomicUsize,
    switches: AtomicUsize,
    pub fail_kstack: AtomicBool,
    pub fail_copy_uvm: AtomicBool,
    table: AtomicPtr<ProcTable<MockHal>>,
    ptable: AtomicPtr<SpinLock<ProcTable<MockHal>>>,
    locked_copies: AtomicUsize,
    hook: Mutex<Option<SwitchHook>>,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            ticks: Arc::new(AtomicU32::new(0)),
            next_stack: AtomicUsize::new(0x8000_0000),
            next_pgdir: AtomicU32::new(1),
            kstacks: AtomicUsize::new(0),
            pgdirs: AtomicUsize::new(0),
            files: AtomicUsize::new(0),
            inodes: AtomicUsize::new(0),
            fs_ops: AtomicUsize::new(0),
            first_init: AtomicUsize::new(0),
            switches: AtomicUsize::new(0),
            fail_kstack: AtomicBool::new(false),
            fail_copy_uvm: AtomicBool::new(false),
            table: AtomicPtr::new(std::ptr::null_mut()),
            ptable: AtomicPtr::new(std::ptr::null_mut()),
            locked_copies: AtomicUsize::new(0),
            hook: Mutex::new(None),
        }
    }

    pub fn on_switch(&self, hook: impl FnMut(&mut ProcTable<MockHal>, Option<usize>) + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn clear_hook(&self) {
        *self.hook.lock().unwrap() = None;
    }

    pub fn ticks_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.ticks)
    }

    pub fn advance(&self, n: u32) {
        self.ticks.fetch_add(n, Ordering::SeqCst);
    }

    /// 模拟 open()：得到一个新的文件句柄
    pub fn open_file(&self, id: u32) -> MockFile {
        self.files.fetch_add(1, Ordering::SeqCst);
        MockFile { id }
    }

    pub fn kstacks_live(&self) -> usize {
        self.kstacks.load(Ordering::SeqCst)
    }

    pub fn pgdirs_live(&self) -> usize {
        self.pgdirs.load(Ordering::SeqCst)
    }

    pub fn files_live(&self) -> usize {
        self.files.load(Ordering::SeqCst)
    }

    pub fn inodes_live(&self) -> usize {
        self.inodes.load(Ordering::SeqCst)
    }

    pub fn fs_ops(&self) -> usize {
        self.fs_ops.load(Ordering::SeqCst)
    }

    pub fn first_init_calls(&self) -> usize {
        self.first_init.load(Ordering::SeqCst)
    }

    pub fn switches(&self) -> usize {
        self.switches.load(Ordering::SeqCst)
    }

    /// 持有进程表锁时做过的地址空间、文件、inode 复制次数
    pub fn locked_copies(&self) -> usize {
        self.locked_copies.load(Ordering::SeqCst)
    }

    fn note_copy(&self) {
        let ptable = self.ptable.load(Ordering::SeqCst);
        // 内核在 kernel() 中装箱，测试期间地址不变
        if !ptable.is_null() && unsafe { (*ptable).is_locked() } {
            self.locked_copies.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Arch for MockHal {
    fn cpu_id(&self) -> usize {
        CPU_ID.with(|c| c.get())
    }

    fn intr_get(&self) -> bool {
        INTR.with(|i| i.get())
    }

    fn intr_on(&self) {
        INTR.with(|i| i.set(true));
    }

    fn intr_off(&self) {
        INTR.with(|i| i.set(false));
    }

    unsafe fn swtch(&self, _old: *mut Context, new: *const Context) {
        self.switches.fetch_add(1, Ordering::SeqCst);

        let table = self.table.load(Ordering::SeqCst);
        if table.is_null() {
            return;
        }
        let mut hook = self.hook.lock().unwrap();
        if let Some(hook) = hook.as_mut() {
            // 调用者持有进程表锁
            let table = &mut *table;
            let target = table.slot_of_context(new);
            hook(table, target);
        }
    }

    fn trampoline(&self) -> usize {
        0x1000
    }

    fn init_user_frame(&self, tf: &mut TrapFrame, entry: usize, user_sp: usize) {
        tf.epc = entry;
        tf.set_user_sp(user_sp);
    }
}

impl Memory for MockHal {
    type PageTable = MockPageTable;

    fn kstack_alloc(&self) -> Option<KernelStack> {
        if self.fail_kstack.load(Ordering::SeqCst) {
            return None;
        }
        self.kstacks.fetch_add(1, Ordering::SeqCst);
        let base = self.next_stack.fetch_add(KSTACK_SIZE, Ordering::SeqCst);
        Some(KernelStack::new(base, KSTACK_SIZE))
    }

    fn kstack_free(&self, _stack: KernelStack) {
        self.kstacks.fetch_sub(1, Ordering::SeqCst);
    }

    fn setup_kvm(&self) -> Option<MockPageTable> {
        self.note_copy();
        self.pgdirs.fetch_add(1, Ordering::SeqCst);
        Some(MockPageTable {
            id: self.next_pgdir.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn init_uvm(&self, _pgdir: &mut MockPageTable, _code: &[u8]) {}

    fn copy_uvm(&self, _pgdir: &MockPageTable, _size: usize) -> Option<MockPageTable> {
        if self.fail_copy_uvm.load(Ordering::SeqCst) {
            return None;
        }
        self.setup_kvm()
    }

    fn alloc_uvm(&self, _pgdir: &mut MockPageTable, _old_size: usize, new_size: usize) -> Option<usize> {
        Some(new_size)
    }

    fn dealloc_uvm(&self, _pgdir: &mut MockPageTable, _old_size: usize, new_size: usize) -> usize {
        new_size
    }

    fn free_vm(&self, _pgdir: MockPageTable) {
        self.pgdirs.fetch_sub(1, Ordering::SeqCst);
    }

    fn switch_uvm(&self, _pgdir: &MockPageTable, _kstack: &KernelStack) {}

    fn switch_kvm(&self) {}
}

impl FileSystem for MockHal {
    type File = MockFile;
    type Inode = MockInode;

    fn file_dup(&self, file: &MockFile) -> MockFile {
        self.note_copy();
        self.open_file(file.id)
    }

    fn file_close(&self, _file: MockFile) {
        self.files.fetch_sub(1, Ordering::SeqCst);
    }

    fn idup(&self, inode: &MockInode) -> MockInode {
        self.note_copy();
        self.inodes.fetch_add(1, Ordering::SeqCst);
        MockInode { id: inode.id }
    }

    fn iput(&self, _inode: MockInode) {
        self.inodes.fetch_sub(1, Ordering::SeqCst);
    }

    fn namei(&self, _path: &str) -> Option<MockInode> {
        self.note_copy();
        self.inodes.fetch_add(1, Ordering::SeqCst);
        Some(MockInode { id: 1 })
    }

    fn begin_op(&self) {
        self.fs_ops.fetch_add(1, Ordering::SeqCst);
    }

    fn first_init(&self) {
        self.first_init.fetch_add(1, Ordering::SeqCst);
    }
}

impl Clock for MockHal {
    fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::SeqCst)
    }
}

pub type TestKernel = Box<Kernel<MockHal>>;

/// 创建内核并把进程表地址交给 swtch 钩子
pub fn kernel() -> TestKernel {
    let k = Box::new(Kernel::new(MockHal::new()));
    k.hal().table.store(k.ptable.data_ptr(), Ordering::SeqCst);
    k.hal().ptable.store(&k.ptable as *const _ as *mut _, Ordering::SeqCst);
    k
}

/// 创建内核和根进程 (pid 1)
pub fn boot() -> TestKernel {
    let k = kernel();
    let pid = k.userinit(&[0x13, 0, 0, 0]).unwrap();
    assert_eq!(pid, 1);
    k
}

pub fn slot_of(k: &Kernel<MockHal>, pid: Pid) -> usize {
    k.lock_table().find(pid).unwrap()
}

pub fn state_of(k: &Kernel<MockHal>, pid: Pid) -> ProcState {
    let table = k.lock_table();
    let slot = table.find(pid).unwrap();
    table.proc(slot).state()
}

pub fn with_proc<R>(k: &Kernel<MockHal>, pid: Pid, f: impl FnOnce(&mut Proc<MockHal>) -> R) -> R {
    let mut table = k.lock_table();
    let slot = table.find(pid).unwrap();
    f(table.proc_mut(slot))
}

/// 模拟调度器把 `pid` 放到本 CPU 上运行
///
/// 之前运行的进程如果还是 RUNNING，退回 RUNNABLE
pub fn run_as(k: &Kernel<MockHal>, pid: Pid) {
    let mut table = k.lock_table();
    let slot = table.find(pid).unwrap();
    if let Some(prev) = k.mycpu().current() {
        if table.proc(prev).state() == ProcState::Running {
            table.proc_mut(prev).state = ProcState::Runnable;
        }
    }
    table.proc_mut(slot).state = ProcState::Running;
    k.mycpu().set_current(Some(slot));
}

/// 本 CPU 回到调度器
pub fn leave_cpu(k: &Kernel<MockHal>) {
    let mut table = k.lock_table();
    if let Some(prev) = k.mycpu().current() {
        if table.proc(prev).state() == ProcState::Running {
            table.proc_mut(prev).state = ProcState::Runnable;
        }
    }
    k.mycpu().set_current(None);
}

/// 以 `parent` 身份 fork
pub fn fork_from(k: &Kernel<MockHal>, parent: Pid) -> Pid {
    run_as(k, parent);
    k.fork().unwrap()
}

/// 以 `pid` 身份执行 exit 直到成为 ZOMBIE（不切换到调度器）
pub fn exit_as(k: &Kernel<MockHal>, pid: Pid) {
    run_as(k, pid);
    let table = k.do_exit();
    drop(table);
    k.mycpu().set_current(None);
}

/// 根进程 + shell (pid 2)
pub fn boot_with_shell() -> TestKernel {
    let k = boot();
    let shell = fork_from(&k, 1);
    assert_eq!(shell, 2);
    leave_cpu(&k);
    k
}

/// 所有 RUNNING 进程的数量
pub fn running(table: &ProcTable<MockHal>) -> usize {
    table.count(ProcState::Running)
}

/// 当前线程 (CPU) 的 push_off 深度
pub fn ncli(k: &Kernel<MockHal>) -> u32 {
    k.push_off();
    let depth = k.mycpu().ncli() - 1;
    k.pop_off();
    depth
}

//! 场景测试
//!
//! 在宿主机上运行，硬件抽象层由 [`mock::MockHal`] 提供：
//! 每个测试线程扮演一个 CPU，swtch 通过钩子模拟切换的另一端。
//!
//! 运行测试：
//! ```bash
//! cargo test --package procsched
//! ```

pub(crate) mod mock;

mod reentrant;

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 多级队列调度策略
//!
//! 三个队列，每个 CPU 同一时刻只服务其中一个：
//! - RR (0): 循环扫描，上次选中位置之后的第一个 RUNNABLE 进程
//! - SJF (1): 预估运行时间最短者优先，但只以 confidence% 的概率接受候选，
//!   一个都没接受时退回到预估时间最长的进程
//! - FCFS (2): fcfs_entry 最小者优先
//!
//! 这里的选择函数只看调度实体，不碰进程表锁，方便单独测试；
//! 进程表上的 [`ProcTable::select`] 负责过滤出当前队列里 RUNNABLE 的成员。

use core::fmt;

use crate::config::{DEFAULT_BURST_TIME, DEFAULT_CONFIDENCE, NPROC};
use crate::hal::Hal;
use crate::process::table::ProcTable;
use crate::process::task::ProcState;

/// 调度队列
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedQueue {
    Rr = 0,
    Sjf = 1,
    Fcfs = 2,
}

impl SchedQueue {
    pub const COUNT: usize = 3;

    /// 从系统调用参数转换，非法值返回 None
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(SchedQueue::Rr),
            1 => Some(SchedQueue::Sjf),
            2 => Some(SchedQueue::Fcfs),
            _ => None,
        }
    }

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// 空队列时 CPU 切换到的下一个队列（循环）
    pub fn next(self) -> Self {
        match self {
            SchedQueue::Rr => SchedQueue::Sjf,
            SchedQueue::Sjf => SchedQueue::Fcfs,
            SchedQueue::Fcfs => SchedQueue::Rr,
        }
    }

    /// 老化提升的目标队列，RR 已是最高级
    pub fn promoted(self) -> Option<Self> {
        match self {
            SchedQueue::Fcfs => Some(SchedQueue::Sjf),
            SchedQueue::Sjf => Some(SchedQueue::Rr),
            SchedQueue::Rr => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchedQueue::Rr => "RR",
            SchedQueue::Sjf => "SJF",
            SchedQueue::Fcfs => "FCFS",
        }
    }
}

impl fmt::Display for SchedQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 调度实体
///
/// 对应 Linux 的 struct sched_entity，保存进程在多级队列里的全部调度属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedEntity {
    /// 所在队列
    pub queue: SchedQueue,
    /// FCFS 入队序号，只在 FCFS 队列中有意义
    pub fcfs_entry: u32,
    /// SJF 预估运行时间
    pub burst_time: u32,
    /// 预估的可信度 (0-100)
    pub confidence: u32,
    /// 最近一次进入当前队列的时钟滴答
    pub arrival: u32,
    /// 上次被调度以来处于 RUNNABLE 的滴答数
    pub wait_time: u32,
    /// 连续处于 RUNNING 的滴答数
    pub consecutive_time: u32,
}

impl SchedEntity {
    pub const fn new() -> Self {
        Self {
            queue: SchedQueue::Fcfs,
            fcfs_entry: 0,
            burst_time: DEFAULT_BURST_TIME,
            confidence: DEFAULT_CONFIDENCE,
            arrival: 0,
            wait_time: 0,
            consecutive_time: 0,
        }
    }
}

impl Default for SchedEntity {
    fn default() -> Self {
        Self::new()
    }
}

/// 线性同余随机数发生器
///
/// 参数与 Numerical Recipes 的 LCG 相同，32 位回绕
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }
}

/// RR 选择
///
/// 从 `cursor` 开始循环扫描 `nslots` 个槽位，选中第一个满足 `eligible` 的，
/// 并把 `cursor` 移到它之后。没有候选时 `cursor` 保持不变。
pub fn pick_rr(nslots: usize, cursor: &mut usize, eligible: impl Fn(usize) -> bool) -> Option<usize> {
    if nslots == 0 {
        return None;
    }
    let start = *cursor % nslots;
    for i in 0..nslots {
        let slot = (start + i) % nslots;
        if eligible(slot) {
            *cursor = (slot + 1) % nslots;
            return Some(slot);
        }
    }
    None
}

/// SJF 选择
///
/// 只有比当前候选更短的成员才会抛硬币，以 confidence% 的概率成为新候选；
/// 同时记录预估时间最长的成员，没有任何候选被接受时选它。
pub fn pick_sjf<'a, I>(members: I, rng: &mut Lcg) -> Option<usize>
where
    I: IntoIterator<Item = (usize, &'a SchedEntity)>,
{
    let mut chosen: Option<(usize, u32)> = None;
    let mut longest: Option<(usize, u32)> = None;

    for (slot, se) in members {
        if chosen.map_or(true, |(_, burst)| se.burst_time < burst) && rng.next() % 100 < se.confidence {
            chosen = Some((slot, se.burst_time));
        }
        if longest.map_or(true, |(_, burst)| se.burst_time > burst) {
            longest = Some((slot, se.burst_time));
        }
    }

    chosen.or(longest).map(|(slot, _)| slot)
}

/// FCFS 选择：fcfs_entry 最小者，相同时取先出现的
pub fn pick_fcfs<'a, I>(members: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, &'a SchedEntity)>,
{
    let mut chosen: Option<(usize, u32)> = None;
    for (slot, se) in members {
        if chosen.map_or(true, |(_, entry)| se.fcfs_entry < entry) {
            chosen = Some((slot, se.fcfs_entry));
        }
    }
    chosen.map(|(slot, _)| slot)
}

impl<H: Hal> ProcTable<H> {
    /// 在 `queue` 中选出下一个要运行的进程
    ///
    /// 调用者持有进程表锁；`rr_cursor` 是本 CPU 的 RR 扫描位置
    pub(crate) fn select(&mut self, queue: SchedQueue, rr_cursor: &mut usize) -> Option<usize> {
        match queue {
            SchedQueue::Rr => pick_rr(NPROC, rr_cursor, |slot| {
                let p = self.proc(slot);
                p.state == ProcState::Runnable && p.sched.queue == SchedQueue::Rr
            }),
            SchedQueue::Sjf => {
                let (procs, rng) = self.procs_and_rng();
                pick_sjf(Self::members(procs, SchedQueue::Sjf), rng)
            }
            SchedQueue::Fcfs => pick_fcfs(Self::members(self.procs(), SchedQueue::Fcfs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(burst_time: u32, confidence: u32) -> SchedEntity {
        SchedEntity {
            queue: SchedQueue::Sjf,
            burst_time,
            confidence,
            ..SchedEntity::new()
        }
    }

    #[test]
    fn test_queue_ids() {
        assert_eq!(SchedQueue::from_id(0), Some(SchedQueue::Rr));
        assert_eq!(SchedQueue::from_id(2), Some(SchedQueue::Fcfs));
        assert_eq!(SchedQueue::from_id(3), None);
        assert_eq!(SchedQueue::from_id(-1), None);
        assert_eq!(SchedQueue::Fcfs.next(), SchedQueue::Rr);
        assert_eq!(SchedQueue::Fcfs.promoted(), Some(SchedQueue::Sjf));
        assert_eq!(SchedQueue::Rr.promoted(), None);
    }

    #[test]
    fn test_lcg_sequence() {
        let mut rng = Lcg::new(42);
        assert_eq!(rng.next(), 1_083_814_273);
        let mut again = Lcg::new(42);
        again.next();
        assert_eq!(rng.next(), again.next());
    }

    #[test]
    fn test_rr_cycles_from_cursor() {
        let runnable = [true, false, true, true];
        let mut cursor = 0;

        assert_eq!(pick_rr(4, &mut cursor, |s| runnable[s]), Some(0));
        assert_eq!(cursor, 1);
        assert_eq!(pick_rr(4, &mut cursor, |s| runnable[s]), Some(2));
        assert_eq!(pick_rr(4, &mut cursor, |s| runnable[s]), Some(3));
        assert_eq!(cursor, 0);
        assert_eq!(pick_rr(4, &mut cursor, |s| runnable[s]), Some(0));
    }

    #[test]
    fn test_rr_empty_keeps_cursor() {
        let mut cursor = 3;
        assert_eq!(pick_rr(8, &mut cursor, |_| false), None);
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_sjf_full_confidence_picks_shortest() {
        let entities = [entity(9, 100), entity(3, 100), entity(5, 100)];
        let mut rng = Lcg::new(42);
        let picked = pick_sjf(entities.iter().enumerate(), &mut rng);
        assert_eq!(picked, Some(1));
    }

    #[test]
    fn test_sjf_zero_confidence_falls_back_to_longest() {
        let entities = [entity(4, 0), entity(7, 0), entity(7, 0), entity(1, 0)];
        let mut rng = Lcg::new(42);
        let picked = pick_sjf(entities.iter().enumerate(), &mut rng);
        assert_eq!(picked, Some(1));
    }

    #[test]
    fn test_sjf_half_confidence_follows_rng() {
        // 种子 42 的 next() % 100: 73 88 67 | 94 61 32 | 95 42 | 89 84 95
        let entities = [entity(9, 50), entity(3, 50), entity(5, 50)];
        let mut rng = Lcg::new(42);
        let picks: Vec<_> = (0..4).map(|_| pick_sjf(entities.iter().enumerate(), &mut rng)).collect();
        assert_eq!(picks, vec![Some(0), Some(2), Some(1), Some(0)]);

        // 第三轮选中 3 之后，5 不比它短，不再抛硬币
        let mut expect = Lcg::new(42);
        for _ in 0..11 {
            expect.next();
        }
        assert_eq!(rng.next(), expect.next());
    }

    #[test]
    fn test_sjf_unconfident_short_job_loses() {
        let mut rng = Lcg::new(42);
        let entities = [entity(2, 0), entity(8, 100)];
        assert_eq!(pick_sjf(entities.iter().enumerate(), &mut rng), Some(1));

        let entities = [entity(8, 100), entity(2, 0)];
        assert_eq!(pick_sjf(entities.iter().enumerate(), &mut rng), Some(0));
    }

    #[test]
    fn test_sjf_empty() {
        let mut rng = Lcg::new(42);
        assert_eq!(pick_sjf(core::iter::empty(), &mut rng), None);
    }

    #[test]
    fn test_fcfs_smallest_entry() {
        let mut entities = [SchedEntity::new(); 3];
        entities[0].fcfs_entry = 7;
        entities[1].fcfs_entry = 2;
        entities[2].fcfs_entry = 5;
        assert_eq!(pick_fcfs(entities.iter().enumerate()), Some(1));
        assert_eq!(pick_fcfs(core::iter::empty()), None);
    }
}

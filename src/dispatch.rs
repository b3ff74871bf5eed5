//! Routes tasks to fixed-count execution lanes. See [`Dispatcher`] for the
//! shared interface and [`PooledDispatcher`]/[`InlineDispatcher`] for the
//! two variants the design calls for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::lane::{LaneWorker, Task};

/// Routes tasks to lanes, where a lane is identified by a `tid` in
/// `[0, lane_count())`.
///
/// Ordering guarantee: tasks submitted to the same lane by the same caller
/// are delivered in submission order. No ordering is guaranteed across
/// lanes.
pub trait Dispatcher: Send + Sync {
    /// Route `task` to lane `tid` for immediate execution.
    fn add(&self, tid: usize, task: Task);

    /// Route `task` to lane `tid`, to run no sooner than `delay` from now.
    /// `delay` is a lower bound only.
    fn add_delayed(&self, tid: usize, delay: Duration, task: Task);

    /// Stop all lanes; no new tasks are accepted afterwards. Idempotent.
    /// Callers holding stale handles simply observe no further delivery.
    fn dispose(&self);

    /// Number of lanes this dispatcher was constructed with.
    fn lane_count(&self) -> usize;

    /// Assert that `tid` names a valid lane.
    ///
    /// An out-of-range `tid` is a programmer error, treated as a fatal
    /// assertion per the design's error taxonomy, caught here rather than
    /// deferred to the lane.
    fn check_tid(&self, tid: usize) {
        assert!(
            tid < self.lane_count(),
            "tid {tid} out of range: dispatcher has {} lanes",
            self.lane_count()
        );
    }
}

/// Dispatcher backed by `lane_count` dedicated worker threads (the
/// "async pool" variant of the design).
pub struct PooledDispatcher {
    lanes: Vec<LaneWorker>,
    stopped: AtomicBool,
}

impl core::fmt::Debug for PooledDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PooledDispatcher").field("lane_count", &self.lanes.len()).finish()
    }
}

impl PooledDispatcher {
    /// Build a dispatcher with `lane_count` lanes, each a dedicated thread.
    ///
    /// # Panics
    ///
    /// Panics if `lane_count` is zero.
    pub fn new(lane_count: usize) -> Self {
        assert!(lane_count > 0, "lane_count must be at least 1");
        let lanes = (0..lane_count).map(|_| LaneWorker::new()).collect();
        Self { lanes, stopped: AtomicBool::new(false) }
    }

    /// Number of tasks queued on lane `tid` (ready + delayed), for the
    /// embedding application's own metrics.
    pub fn lane_pending_len(&self, tid: usize) -> usize {
        self.check_tid(tid);
        self.lanes[tid].pending_len()
    }
}

impl Dispatcher for PooledDispatcher {
    fn add(&self, tid: usize, task: Task) {
        self.check_tid(tid);
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        self.lanes[tid].push(task);
    }

    fn add_delayed(&self, tid: usize, delay: Duration, task: Task) {
        self.check_tid(tid);
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        self.lanes[tid].push_delayed(delay, task);
    }

    fn dispose(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        for lane in &self.lanes {
            lane.dispose();
        }
    }

    fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}

/// Dispatcher that executes every task synchronously on the caller's
/// thread. Ignores `tid` beyond the bounds check and ignores `delay`.
/// Used for deterministic tests (per the design's explicit allowance).
pub struct InlineDispatcher {
    lane_count: usize,
    stopped: AtomicBool,
}

impl core::fmt::Debug for InlineDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InlineDispatcher").field("lane_count", &self.lane_count).finish()
    }
}

impl InlineDispatcher {
    /// Build an inline dispatcher that accepts `tid` values in
    /// `[0, lane_count)`.
    ///
    /// # Panics
    ///
    /// Panics if `lane_count` is zero.
    pub fn new(lane_count: usize) -> Self {
        assert!(lane_count > 0, "lane_count must be at least 1");
        Self { lane_count, stopped: AtomicBool::new(false) }
    }
}

impl Dispatcher for InlineDispatcher {
    fn add(&self, tid: usize, task: Task) {
        self.check_tid(tid);
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        task();
    }

    fn add_delayed(&self, tid: usize, _delay: Duration, task: Task) {
        self.add(tid, task);
    }

    fn dispose(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn lane_count(&self) -> usize {
        self.lane_count
    }
}

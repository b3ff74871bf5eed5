//! The "ThreadHandler" of the source design: a single dedicated OS thread
//! draining a FIFO of immediate tasks and a deadline-ordered queue of
//! delayed tasks.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A unit of work submitted to a [`LaneWorker`] or a [`crate::Dispatcher`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Delayed {
    deadline: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // `BinaryHeap` is a max-heap; reverse the deadline comparison so the
        // earliest deadline sorts to the top, ties broken by insertion order.
        other.deadline.cmp(&self.deadline).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State {
    ready: VecDeque<Task>,
    delayed: BinaryHeap<Delayed>,
    next_seq: u64,
    stopped: bool,
}

/// Single-threaded FIFO worker with delayed-task support.
///
/// One dedicated OS thread drains `ready` in submission order, promoting
/// `delayed` entries into `ready` as their deadlines pass, and parks on a
/// condition variable (with a timeout equal to the next deadline) when
/// there is nothing to do.
pub struct LaneWorker {
    state: Arc<(Mutex<State>, Condvar)>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl core::fmt::Debug for LaneWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LaneWorker").field("pending", &self.pending_len()).finish()
    }
}

impl LaneWorker {
    /// Spawn a new lane worker on a dedicated OS thread.
    pub fn new() -> Self {
        let state = Arc::new((
            Mutex::new(State {
                ready: VecDeque::new(),
                delayed: BinaryHeap::new(),
                next_seq: 0,
                stopped: false,
            }),
            Condvar::new(),
        ));
        let worker_state = state.clone();
        let handle = std::thread::Builder::new()
            .name("signet-events-lane".to_owned())
            .spawn(move || run(worker_state))
            .expect("failed to spawn lane worker thread");
        Self { state, handle: Mutex::new(Some(handle)) }
    }

    /// Enqueue `task` for immediate execution; FIFO with respect to other
    /// `push` calls on this worker.
    pub fn push(&self, task: Task) {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        if state.stopped {
            return;
        }
        state.ready.push_back(task);
        cvar.notify_one();
    }

    /// Enqueue `task` with deadline `now + delay`.
    pub fn push_delayed(&self, delay: Duration, task: Task) {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        if state.stopped {
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.delayed.push(Delayed { deadline: Instant::now() + delay, seq, task });
        cvar.notify_one();
    }

    /// Number of tasks currently queued (ready + delayed). Exposed for the
    /// embedding application's own metrics; this crate does not apply
    /// backpressure based on it (see the open question in DESIGN.md).
    pub fn pending_len(&self) -> usize {
        let state = self.state.0.lock();
        state.ready.len() + state.delayed.len()
    }

    /// Request termination; blocks until the worker thread has exited.
    /// Idempotent: a second call finds the thread already joined and
    /// returns immediately. Tasks enqueued after this call begins are
    /// dropped rather than run.
    pub fn dispose(&self) {
        {
            let (lock, cvar) = &*self.state;
            let mut state = lock.lock();
            state.stopped = true;
            cvar.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Default for LaneWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LaneWorker {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run(state: Arc<(Mutex<State>, Condvar)>) {
    let (lock, cvar) = &*state;
    loop {
        let mut guard = lock.lock();

        let now = Instant::now();
        while matches!(guard.delayed.peek(), Some(d) if d.deadline <= now) {
            let entry = guard.delayed.pop().expect("peek confirmed an entry is present");
            guard.ready.push_back(entry.task);
        }

        if let Some(task) = guard.ready.pop_front() {
            drop(guard);
            if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
                tracing::error!(message = %panic_message(&*panic), "lane task panicked");
            }
            continue;
        }

        if guard.stopped {
            break;
        }

        match guard.delayed.peek() {
            Some(next) => {
                let wait = next.deadline.saturating_duration_since(Instant::now());
                cvar.wait_for(&mut guard, wait);
            }
            None => cvar.wait(&mut guard),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

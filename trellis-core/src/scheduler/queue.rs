//! The job queue.
//!
//! # Flush Semantics
//!
//! - Jobs run in the order they were first queued.
//! - A job runs at most once per flush cycle. Queuing a job that is pending,
//!   or that already ran in the current cycle, is a no-op.
//! - Jobs queued by jobs run in the same flush.
//! - However the flush ends (normally or by a panicking job), the queue and
//!   both flags are reset. The panic then continues to the caller of the
//!   microtask boundary.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::{debug, trace};

use super::microtask::queue_microtask;
use crate::reactive::SubscriberId;

/// A unit of deferred work, deduplicated by id.
#[derive(Clone)]
pub struct Job {
    id: SubscriberId,
    run: Rc<dyn Fn()>,
}

impl Job {
    pub fn new(id: SubscriberId, run: impl Fn() + 'static) -> Self {
        Self {
            id,
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn run(&self) {
        (self.run)();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

thread_local! {
    static QUEUE: RefCell<Vec<Job>> = const { RefCell::new(Vec::new()) };
    // Ids queued since the cycle started, including jobs that already ran.
    static SEEN: RefCell<IndexSet<SubscriberId>> = RefCell::new(IndexSet::new());
    static FLUSH_INDEX: Cell<usize> = const { Cell::new(0) };
    static FLUSH_SCHEDULED: Cell<bool> = const { Cell::new(false) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Add a job to the pending set and make sure a flush is scheduled.
pub fn queue_job(job: Job) {
    if !SEEN.with(|seen| seen.borrow_mut().insert(job.id)) {
        trace!(job = job.id.raw(), "job already queued this cycle");
        return;
    }
    QUEUE.with(|queue| queue.borrow_mut().push(job));

    if !FLUSH_SCHEDULED.with(|flag| flag.replace(true)) {
        queue_microtask(flush_jobs);
    }
}

/// Resets the queue state when a flush ends, however it ends.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = QUEUE.try_with(|queue| {
            if let Ok(mut queue) = queue.try_borrow_mut() {
                queue.clear();
            }
        });
        let _ = SEEN.try_with(|seen| {
            if let Ok(mut seen) = seen.try_borrow_mut() {
                seen.clear();
            }
        });
        let _ = FLUSH_INDEX.try_with(|index| index.set(0));
        let _ = FLUSHING.try_with(|flag| flag.set(false));
        let _ = FLUSH_SCHEDULED.try_with(|flag| flag.set(false));
    }
}

/// Run every pending job. Called from the microtask boundary; calling it
/// directly flushes synchronously. A nested call during a flush does nothing.
pub fn flush_jobs() {
    if FLUSHING.with(|flag| flag.replace(true)) {
        return;
    }
    let _guard = FlushGuard;
    FLUSH_SCHEDULED.with(|flag| flag.set(true));

    let mut index = 0;
    loop {
        let Some(job) = QUEUE.with(|queue| queue.borrow().get(index).cloned()) else {
            break;
        };
        index += 1;
        FLUSH_INDEX.with(|flush_index| flush_index.set(index));
        job.run();
    }

    debug!(jobs = index, "flush complete");
}

/// Number of jobs waiting to run.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| {
        let queue = queue.borrow();
        queue.len() - FLUSH_INDEX.with(Cell::get).min(queue.len())
    })
}

/// Whether a flush is scheduled or in progress.
pub fn is_flush_scheduled() -> bool {
    FLUSH_SCHEDULED.with(Cell::get)
}

/// Whether a flush is running right now.
pub fn is_flushing() -> bool {
    FLUSHING.with(Cell::get)
}

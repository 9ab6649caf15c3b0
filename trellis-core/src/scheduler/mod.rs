//! Job Scheduler
//!
//! Effects that should not re-run synchronously on every write (component
//! render effects, mostly) hand a [`Job`] to [`queue_job`] instead. The
//! queue deduplicates by job id and is flushed once, on the microtask
//! boundary, after the current synchronous work has finished. Ten writes in a
//! row therefore cause one re-render.
//!
//! # The microtask boundary
//!
//! There is no event loop in this crate. Deferred work is pushed onto a
//! thread-local microtask queue and runs when someone drains it:
//!
//! - explicitly, through [`run_microtasks`] (tests, embedders with their own
//!   loop), or
//! - automatically, inside a tokio `LocalSet` once [`install_local_driver`]
//!   has been called.

mod driver;
mod microtask;
mod queue;

pub use driver::{install_local_driver, next_tick, LocalDriver};
pub use microtask::{
    has_pending_microtasks, queue_microtask, run_microtasks, set_microtask_waker, MicrotaskWaker,
};
pub use queue::{flush_jobs, is_flush_scheduled, is_flushing, pending_jobs, queue_job, Job};

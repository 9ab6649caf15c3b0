//! Tokio integration.
//!
//! Inside a [`tokio::task::LocalSet`], the microtask boundary maps naturally
//! onto a spawned local task: it runs as soon as the task that queued the
//! work yields. [`install_local_driver`] wires that up, so flushes happen
//! without anyone calling [`run_microtasks`] by hand.

use std::rc::Rc;

use tracing::debug;

use super::microtask::{has_pending_microtasks, run_microtasks, set_microtask_waker, MicrotaskWaker};

/// Guard returned by [`install_local_driver`]. Dropping it restores the
/// previous waker.
#[must_use = "the driver is uninstalled when the guard is dropped"]
pub struct LocalDriver {
    previous: Option<MicrotaskWaker>,
}

/// Drain the microtask queue from a `spawn_local` task whenever work is
/// queued.
///
/// Must be called on a thread running a `LocalSet`; queuing work outside of
/// one while the driver is installed panics in `spawn_local`.
pub fn install_local_driver() -> LocalDriver {
    let waker: MicrotaskWaker = Rc::new(|| {
        tokio::task::spawn_local(async {
            run_microtasks();
        });
    });
    let previous = set_microtask_waker(Some(waker.clone()));
    debug!("local microtask driver installed");

    if has_pending_microtasks() {
        waker();
    }

    LocalDriver { previous }
}

impl Drop for LocalDriver {
    fn drop(&mut self) {
        set_microtask_waker(self.previous.take());
    }
}

/// Wait until pending microtasks (and therefore a scheduled flush) have run.
pub async fn next_tick() {
    tokio::task::yield_now().await;
    run_microtasks();
}

//! The microtask queue: work deferred until the current synchronous work is
//! done.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

/// Called when the queue goes from empty to non-empty.
pub type MicrotaskWaker = Rc<dyn Fn()>;

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
    static DRAINING: Cell<bool> = const { Cell::new(false) };
    static WAKER: RefCell<Option<MicrotaskWaker>> = const { RefCell::new(None) };
}

/// Defer `task` to the microtask boundary.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    let was_empty = MICROTASKS.with(|queue| {
        let mut queue = queue.borrow_mut();
        let was_empty = queue.is_empty();
        queue.push_back(Box::new(task));
        was_empty
    });

    if was_empty && !DRAINING.with(Cell::get) {
        wake();
    }
}

fn wake() {
    let waker = WAKER.with(|waker| waker.borrow().clone());
    if let Some(waker) = waker {
        waker();
    }
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let _ = DRAINING.try_with(|flag| flag.set(false));
    }
}

/// Run queued microtasks until the queue is empty, including tasks queued
/// while draining. Returns how many ran.
///
/// A nested call made from inside a microtask returns immediately; the outer
/// call picks up whatever was queued. If a task panics, the tasks behind it
/// stay queued.
pub fn run_microtasks() -> usize {
    if DRAINING.with(|flag| flag.replace(true)) {
        return 0;
    }
    let _guard = DrainGuard;

    let mut ran = 0;
    while let Some(task) = MICROTASKS.with(|queue| queue.borrow_mut().pop_front()) {
        task();
        ran += 1;
    }

    if ran > 0 {
        trace!(ran, "microtasks drained");
    }
    ran
}

/// Whether any microtask is waiting.
pub fn has_pending_microtasks() -> bool {
    MICROTASKS.with(|queue| !queue.borrow().is_empty())
}

/// Install the callback used to request a drain. Returns the previous one.
pub fn set_microtask_waker(waker: Option<MicrotaskWaker>) -> Option<MicrotaskWaker> {
    WAKER.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), waker))
}

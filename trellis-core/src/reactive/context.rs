//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an observed value is
//! read, the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When a computation runs, it pushes itself onto the stack through a guard;
//! dropping the guard pops it and restores the enclosing computation, even if
//! the computation panics.
//!
//! A second thread-local flag allows tracking to be paused. Bulk list
//! mutations read the list internally and must not subscribe whoever happens
//! to be running. Entering a computation always re-enables tracking, so an
//! effect triggered from inside a paused region still collects its own
//! dependencies.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Rc<dyn Subscriber>>> = RefCell::new(Vec::new());
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    previous_should_track: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any observed value that is read will
    /// register the subscriber as a dependent.
    pub(crate) fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.subscriber_id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(subscriber));
        let previous_should_track = SHOULD_TRACK.with(|flag| flag.replace(true));

        Self {
            subscriber_id,
            previous_should_track,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|s| s.subscriber_id()))
    }

    /// The subscriber that should receive a dependency right now.
    ///
    /// `None` when nothing is running or tracking is paused.
    pub(crate) fn tracking_subscriber() -> Option<Rc<dyn Subscriber>> {
        if !SHOULD_TRACK.with(Cell::get) {
            return None;
        }
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether the given subscriber is somewhere on the execution stack.
    pub(crate) fn is_running(id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|s| s.subscriber_id() == id))
    }

    /// Depth of the execution stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    entry.subscriber_id()
                );
            }
        });
        let _ = SHOULD_TRACK.try_with(|flag| flag.set(self.previous_should_track));
    }
}

/// Guard returned by [`pause_tracking`]; restores the previous flag on drop.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct TrackingPause {
    previous: bool,
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        let _ = SHOULD_TRACK.try_with(|flag| flag.set(self.previous));
    }
}

/// Suspend dependency tracking until the returned guard is dropped.
pub fn pause_tracking() -> TrackingPause {
    TrackingPause {
        previous: SHOULD_TRACK.with(|flag| flag.replace(false)),
    }
}

/// Run `f` without recording any dependency for the active computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = pause_tracking();
    f()
}

/// Whether a read right now would be recorded as a dependency.
pub fn is_tracking() -> bool {
    SHOULD_TRACK.with(Cell::get) && ReactiveContext::is_active()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::runtime::Dep;

    struct Noop(SubscriberId);

    impl Subscriber for Noop {
        fn subscriber_id(&self) -> SubscriberId {
            self.0
        }

        fn record_dependency(&self, _dep: Dep) {}

        fn notify(self: Rc<Self>) {}
    }

    fn noop_subscriber() -> Rc<dyn Subscriber> {
        Rc::new(Noop(SubscriberId::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = noop_subscriber();
        let id = sub.subscriber_id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
            assert!(ReactiveContext::is_running(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
        assert!(!ReactiveContext::is_running(id));
    }

    #[test]
    fn nested_contexts() {
        let outer = noop_subscriber();
        let inner = noop_subscriber();
        let outer_id = outer.subscriber_id();
        let inner_id = inner.subscriber_id();

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner_id));
                assert_eq!(ReactiveContext::depth(), 2);
                assert!(ReactiveContext::is_running(outer_id));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn pause_suspends_and_restores_tracking() {
        let _ctx = ReactiveContext::enter(noop_subscriber());
        assert!(is_tracking());

        {
            let _pause = pause_tracking();
            assert!(!is_tracking());
            assert!(ReactiveContext::tracking_subscriber().is_none());
        }

        assert!(is_tracking());
        assert!(!untracked(is_tracking));
    }

    #[test]
    fn entering_a_context_resumes_tracking() {
        let _pause = pause_tracking();
        {
            let _ctx = ReactiveContext::enter(noop_subscriber());
            assert!(is_tracking());
        }
        assert!(!is_tracking());
    }
}

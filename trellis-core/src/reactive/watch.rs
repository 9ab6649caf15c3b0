//! Watchers
//!
//! `watch` runs a callback with the new and previous value of a source
//! every time the source is triggered. It is a lazy [`Effect`] whose scheduler runs
//! the watch job instead of the getter.
//!
//! # Sources
//!
//! - A closure (`WatchSource::getter`): whatever it reads is tracked.
//! - A [`Signal`] or [`Computed`]: its value.
//! - An [`Observed`] container: every slot reachable from it is tracked by a
//!   deep traversal, and the callback fires on any nested write. New and old
//!   value are the same wrapper in that case.
//!
//! The callback is not gated on equality: a trigger that leaves the getter
//! result unchanged still fires it.
//!
//! # Timing
//!
//! With [`FlushTiming::Sync`] the callback runs inside the write that
//! triggered it. With [`FlushTiming::Post`] it is deferred to the microtask
//! boundary. Each write queues its own microtask, and the getter runs when
//! that microtask does.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::computed::Computed;
use super::container::Observed;
use super::effect::{Effect, EffectOptions};
use super::signal::Signal;
use super::subscriber::TargetId;
use crate::scheduler::queue_microtask;

/// When a watch callback runs relative to the triggering write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushTiming {
    /// Inline, during the write.
    #[default]
    Sync,
    /// On the microtask boundary.
    Post,
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Fire the callback once on creation, with no old value.
    pub immediate: bool,
    pub flush: FlushTiming,
}

/// What a watcher observes.
pub struct WatchSource<T> {
    getter: Box<dyn Fn() -> T>,
}

impl<T> WatchSource<T> {
    /// Watch whatever `getter` reads.
    pub fn getter(getter: impl Fn() -> T + 'static) -> Self {
        Self {
            getter: Box::new(getter),
        }
    }
}

impl<T: Clone + PartialEq + 'static> From<Signal<T>> for WatchSource<T> {
    fn from(signal: Signal<T>) -> Self {
        Self::getter(move || signal.get())
    }
}

impl<T: Clone + 'static> From<Computed<T>> for WatchSource<T> {
    fn from(computed: Computed<T>) -> Self {
        Self::getter(move || computed.get())
    }
}

impl From<Observed> for WatchSource<Observed> {
    fn from(observed: Observed) -> Self {
        Self::getter(move || {
            traverse(&observed);
            observed.clone()
        })
    }
}

/// Read every slot reachable from `root`, tracking all of them.
///
/// Uses an explicit worklist with a visited set, so cyclic structures and
/// deep nesting are fine.
pub fn traverse(root: &Observed) {
    let mut visited: HashSet<TargetId> = HashSet::new();
    let mut worklist = vec![root.clone()];

    while let Some(current) = worklist.pop() {
        if !visited.insert(current.id()) {
            continue;
        }
        for key in current.keys() {
            if let Some(nested) = current.get_nested(key) {
                worklist.push(nested);
            }
        }
    }
}

/// Registers a function to run before the next callback invocation or when
/// the watcher stops.
#[derive(Clone, Default)]
pub struct OnCleanup {
    slot: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl OnCleanup {
    pub fn register(&self, cleanup: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(cleanup));
    }

    fn run(&self) {
        let cleanup = self.slot.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

type Callback<T> = Box<dyn FnMut(&T, Option<&T>, &OnCleanup)>;

struct WatchState<T: 'static> {
    effect: RefCell<Option<Effect<T>>>,
    callback: RefCell<Callback<T>>,
    old: RefCell<Option<T>>,
    cleanup: OnCleanup,
    stopped: Cell<bool>,
}

impl<T: 'static> WatchState<T> {
    fn job(&self) {
        if self.stopped.get() {
            return;
        }
        let Some(effect) = self.effect.borrow().clone() else {
            return;
        };
        let new = effect.run();

        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            debug!("watch callback re-entered, skipping");
            return;
        };
        self.cleanup.run();
        let old = self.old.borrow_mut().take();
        callback(&new, old.as_ref(), &self.cleanup);
        *self.old.borrow_mut() = Some(new);
    }
}

trait Stop {
    fn stop(&self);
}

impl<T: 'static> Stop for WatchState<T> {
    fn stop(&self) {
        if self.stopped.replace(true) {
            return;
        }
        if let Some(effect) = self.effect.borrow_mut().take() {
            effect.dispose();
        }
        self.cleanup.run();
    }
}

/// Keeps a watcher alive. Dropping it or calling [`WatchHandle::stop`] stops
/// the watcher.
#[must_use = "the watcher stops when its handle is dropped"]
pub struct WatchHandle {
    state: Rc<dyn Stop>,
}

impl WatchHandle {
    /// Stop watching and run the pending cleanup, if any.
    pub fn stop(&self) {
        self.state.stop();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.state.stop();
    }
}

/// Call `callback(new, old, on_cleanup)` whenever `source` is triggered.
///
/// Without `immediate`, the first value is captured silently and the callback
/// fires from the first change on. With it, the callback fires right away
/// with `old = None`.
pub fn watch<T, S, F>(source: S, callback: F, options: WatchOptions) -> WatchHandle
where
    T: 'static,
    S: Into<WatchSource<T>>,
    F: FnMut(&T, Option<&T>, &OnCleanup) + 'static,
{
    let WatchSource { getter } = source.into();

    let state = Rc::new(WatchState {
        effect: RefCell::new(None),
        callback: RefCell::new(Box::new(callback)),
        old: RefCell::new(None),
        cleanup: OnCleanup::default(),
        stopped: Cell::new(false),
    });

    let weak: Weak<WatchState<T>> = Rc::downgrade(&state);
    let flush = options.flush;
    let scheduler = Rc::new(move |_: &Effect<T>| {
        let Some(state) = weak.upgrade() else {
            return;
        };
        match flush {
            FlushTiming::Sync => state.job(),
            FlushTiming::Post => {
                let weak = Rc::downgrade(&state);
                queue_microtask(move || {
                    if let Some(state) = weak.upgrade() {
                        state.job();
                    }
                });
            }
        }
    });

    let effect = Effect::with_options(
        getter,
        EffectOptions {
            lazy: true,
            scheduler: Some(scheduler),
        },
    );
    *state.effect.borrow_mut() = Some(effect.clone());

    if options.immediate {
        state.job();
    } else {
        *state.old.borrow_mut() = Some(effect.run());
    }

    WatchHandle { state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::container::{reactive, Container};
    use crate::reactive::value::Value;
    use crate::scheduler::run_microtasks;

    type Log<T> = Rc<RefCell<Vec<(T, Option<T>)>>>;

    fn recorder<T: Clone + 'static>(log: &Log<T>) -> impl FnMut(&T, Option<&T>, &OnCleanup) {
        let log = log.clone();
        move |new: &T, old: Option<&T>, _: &OnCleanup| {
            log.borrow_mut().push((new.clone(), old.cloned()));
        }
    }

    #[test]
    fn lazy_watch_captures_the_first_value_silently() {
        let source = Signal::new(1);
        let log: Log<i32> = Rc::default();
        let _handle = watch(source.clone(), recorder(&log), WatchOptions::default());

        assert!(log.borrow().is_empty());
        source.set(2);
        assert_eq!(*log.borrow(), vec![(2, Some(1))]);
    }

    #[test]
    fn immediate_watch_fires_with_no_old_value() {
        let source = Signal::new(1);
        let log: Log<i32> = Rc::default();
        let _handle = watch(
            source.clone(),
            recorder(&log),
            WatchOptions {
                immediate: true,
                ..Default::default()
            },
        );

        assert_eq!(*log.borrow(), vec![(1, None)]);
        source.set(2);
        assert_eq!(log.borrow()[1], (2, Some(1)));
    }

    #[test]
    fn getter_watch_fires_on_every_trigger() {
        let source = Signal::new(1);
        let s = source.clone();
        let log: Log<bool> = Rc::default();
        let _handle = watch(
            WatchSource::getter(move || s.get() > 5),
            recorder(&log),
            WatchOptions::default(),
        );

        source.set(2);
        assert_eq!(*log.borrow(), vec![(false, Some(false))]);
        source.set(6);
        assert_eq!(log.borrow()[1], (true, Some(false)));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn deep_watch_sees_nested_writes() {
        let inner = Container::from_pairs([("x", 1)]);
        let state = reactive(&Container::from_pairs([("inner", inner.clone())]));
        let fired = Rc::new(Cell::new(0));

        let f = fired.clone();
        let _handle = watch(
            state.clone(),
            move |_: &Observed, _: Option<&Observed>, _: &OnCleanup| f.set(f.get() + 1),
            WatchOptions::default(),
        );

        reactive(&inner).set("x", 2);
        assert_eq!(fired.get(), 1);
        state.set("other", 1);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn deep_traversal_survives_cycles() {
        let a = Container::map();
        let b = Container::from_pairs([("a", a.clone())]);
        a.insert("b", b);
        let state = reactive(&a);
        let fired = Rc::new(Cell::new(0));

        let f = fired.clone();
        let _handle = watch(
            state.clone(),
            move |_: &Observed, _: Option<&Observed>, _: &OnCleanup| f.set(f.get() + 1),
            WatchOptions::default(),
        );
        state.get_nested("b").expect("b").set("n", 1);
        assert_eq!(fired.get(), 1);

        // Break the cycle so both containers can be dropped.
        a.insert("b", Value::Null);
    }

    #[test]
    fn post_flush_queues_one_callback_per_write() {
        let source = Signal::new(0);
        let log: Log<i32> = Rc::default();
        let _handle = watch(
            source.clone(),
            recorder(&log),
            WatchOptions {
                flush: FlushTiming::Post,
                ..Default::default()
            },
        );

        source.set(1);
        source.set(2);
        assert!(log.borrow().is_empty());

        // Both callbacks read the getter at the boundary.
        run_microtasks();
        assert_eq!(*log.borrow(), vec![(2, Some(0)), (2, Some(2))]);

        source.set(3);
        run_microtasks();
        assert_eq!(log.borrow()[2], (3, Some(2)));
    }

    #[test]
    fn cleanup_runs_before_the_next_callback_and_on_stop() {
        let source = Signal::new(0);
        let cleanups = Rc::new(Cell::new(0));

        let c = cleanups.clone();
        let handle = watch(
            source.clone(),
            move |_: &i32, _: Option<&i32>, on_cleanup: &OnCleanup| {
                let c = c.clone();
                on_cleanup.register(move || c.set(c.get() + 1));
            },
            WatchOptions::default(),
        );

        source.set(1);
        assert_eq!(cleanups.get(), 0);
        source.set(2);
        assert_eq!(cleanups.get(), 1);

        handle.stop();
        assert_eq!(cleanups.get(), 2);
        source.set(3);
        assert_eq!(cleanups.get(), 2);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn watching_a_computed_value() {
        let source = Signal::new(1);
        let s = source.clone();
        let doubled = Computed::new(move || s.get() * 2);
        let log: Log<i32> = Rc::default();
        let _handle = watch(doubled, recorder(&log), WatchOptions::default());

        source.set(3);
        assert_eq!(*log.borrow(), vec![(6, Some(2))]);
    }
}

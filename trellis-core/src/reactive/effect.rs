//! Effect Implementation
//!
//! An Effect is a computation that runs whenever its dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. When any dependency changes, the effect either re-runs inline or, if
//!    it was given a scheduler, hands itself to that scheduler. The split is
//!    absolute: an effect with a scheduler never re-runs on its own.
//!
//! 3. Before re-running, the effect removes itself from every record it was
//!    subscribed to and tracks new ones during execution. A branch that is
//!    no longer taken therefore stops triggering the effect.
//!
//! # Lifetime
//!
//! Dependency records hold effects weakly. An effect lives as long as some
//! [`Effect`] handle does; dropping the last handle unsubscribes it.
//! [`Effect::dispose`] stops it while handles are still around.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::debug;

use super::context::{untracked, ReactiveContext};
use super::runtime::Dep;
use super::subscriber::{Subscriber, SubscriberId};
use crate::scheduler::Job;

/// Callback that receives an effect instead of letting it re-run.
pub type EffectScheduler<T> = Rc<dyn Fn(&Effect<T>)>;

/// Options for [`Effect::with_options`].
pub struct EffectOptions<T> {
    /// Do not run on creation.
    pub lazy: bool,
    /// Called on every trigger instead of re-running the effect.
    pub scheduler: Option<EffectScheduler<T>>,
}

impl<T> Default for EffectOptions<T> {
    fn default() -> Self {
        Self {
            lazy: false,
            scheduler: None,
        }
    }
}

struct EffectInner<T> {
    id: SubscriberId,
    body: Box<dyn Fn() -> T>,
    scheduler: Option<EffectScheduler<T>>,
    deps: RefCell<SmallVec<[Dep; 4]>>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> T {
        if self.disposed.get() {
            return untracked(|| (self.body)());
        }

        self.cleanup();
        let _ctx = ReactiveContext::enter(Rc::clone(self) as Rc<dyn Subscriber>);
        self.run_count.set(self.run_count.get() + 1);
        (self.body)()
    }
}

impl<T> EffectInner<T> {
    /// Unsubscribe from every record collected by the previous run.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id);
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn record_dependency(&self, dep: Dep) {
        self.deps.borrow_mut().push(dep);
    }

    fn notify(self: Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        match &self.scheduler {
            Some(scheduler) => scheduler(&Effect { inner: self.clone() }),
            None => {
                self.run();
            }
        }
    }
}

impl<T> Drop for EffectInner<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// A computation that tracks what it reads and re-runs when it changes.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(0);
///
/// let c = count.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {}", c.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// ```
#[must_use = "an effect stops reacting when its last handle is dropped"]
pub struct Effect<T = ()> {
    inner: Rc<EffectInner<T>>,
}

/// Create and run an effect.
pub fn effect<T: 'static>(body: impl Fn() -> T + 'static) -> Effect<T> {
    Effect::new(body)
}

/// Create an effect with options.
pub fn effect_with<T: 'static>(
    body: impl Fn() -> T + 'static,
    options: EffectOptions<T>,
) -> Effect<T> {
    Effect::with_options(body, options)
}

impl<T: 'static> Effect<T> {
    /// Create a new effect and run it immediately.
    pub fn new(body: impl Fn() -> T + 'static) -> Self {
        Self::with_options(body, EffectOptions::default())
    }

    /// Create a new effect without running it.
    ///
    /// It collects no dependencies until [`Effect::run`] is called.
    pub fn new_lazy(body: impl Fn() -> T + 'static) -> Self {
        Self::with_options(
            body,
            EffectOptions {
                lazy: true,
                scheduler: None,
            },
        )
    }

    pub fn with_options(body: impl Fn() -> T + 'static, options: EffectOptions<T>) -> Self {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                body: Box::new(body),
                scheduler: options.scheduler,
                deps: RefCell::new(SmallVec::new()),
                disposed: Cell::new(false),
                run_count: Cell::new(0),
            }),
        };

        if !options.lazy {
            effect.run();
        }

        effect
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the body now, re-collecting dependencies, and return its result.
    ///
    /// A disposed effect still runs its body, but tracks nothing.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Stop the effect: unsubscribe it and ignore future triggers.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.cleanup();
        debug!(effect = self.inner.id.raw(), "effect disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of times the body has run while tracking.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of records collected by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// A scheduler job that runs this effect, deduplicated by effect id.
    ///
    /// The job holds the effect weakly; once the effect is gone it does
    /// nothing.
    pub fn as_job(&self) -> Job {
        let weak: Weak<EffectInner<T>> = Rc::downgrade(&self.inner);
        Job::new(self.inner.id, move || {
            if let Some(inner) = weak.upgrade() {
                if !inner.disposed.get() {
                    inner.run();
                }
            }
        })
    }

    pub fn ptr_eq(&self, other: &Effect<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.inner.run_count.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

//! Computed Values
//!
//! A Computed is a cached derived value that re-evaluates only when it is
//! read after one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. A computed value wraps a lazy [`Effect`]. Nothing runs on creation.
//!
//! 2. On first read, the getter runs inside the effect, collecting its
//!    dependencies, and the result is cached.
//!
//! 3. When a dependency changes, the effect's scheduler only marks the value
//!    dirty and triggers the computed value's own [`DepKey::Value`] record.
//!    The getter does not run.
//!
//! 4. The next read sees the dirty flag and recomputes.
//!
//! Readers are notified on the clean-to-dirty transition only, so a burst of
//! writes between two reads notifies them once.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::effect::{Effect, EffectOptions};
use super::runtime::{DepKey, Runtime, TriggerOp};
use super::subscriber::TargetId;

struct ComputedInner<T> {
    target: TargetId,
    dirty: Cell<bool>,
    value: RefCell<Option<T>>,
    effect: Effect<T>,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::release_target(self.target);
    }
}

/// A lazily evaluated, cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(2);
///
/// let c = count.clone();
/// let doubled = computed(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

/// Create a computed value.
pub fn computed<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(getter)
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let effect = Effect::with_options(
                getter,
                EffectOptions {
                    lazy: true,
                    scheduler: Some(Rc::new(move |_: &Effect<T>| {
                        if let Some(inner) = weak.upgrade() {
                            inner.invalidate();
                        }
                    })),
                },
            );

            ComputedInner {
                target: TargetId::new(),
                dirty: Cell::new(true),
                value: RefCell::new(None),
                effect,
            }
        });

        Self { inner }
    }

    /// The computed value's identity in the dependency store.
    pub fn id(&self) -> TargetId {
        self.inner.target
    }

    /// Get the value, recomputing it if a dependency changed since the last
    /// read, and subscribe the running computation.
    pub fn get(&self) -> T {
        let cached = if self.inner.dirty.get() {
            None
        } else {
            self.inner.value.borrow().clone()
        };

        let value = match cached {
            Some(value) => value,
            None => {
                let value = self.inner.effect.run();
                *self.inner.value.borrow_mut() = Some(value.clone());
                self.inner.dirty.set(false);
                value
            }
        };

        Runtime::track(self.inner.target, DepKey::Value);
        value
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Number of times the getter has run.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }

    /// Get the number of computations subscribed to this value.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.target, &DepKey::Value)
    }
}

impl<T> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            Runtime::trigger(self.target, &DepKey::Value, TriggerOp::Set, None);
        }
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.target)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

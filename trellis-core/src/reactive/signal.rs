//! Signal Implementation
//!
//! A Signal is a single observed slot. It is the scalar counterpart of an
//! observed container: reading it inside a computation subscribes that
//! computation to the signal's [`DepKey::Value`] record, and writing a
//! different value triggers that record.
//!
//! [`PropRef`] is a signal-shaped view onto one key of an observed
//! container. It owns no value; reads and writes go straight through to the
//! container, so they track and trigger exactly like the container would.
//!
//! # Example
//!
//! ```rust,ignore
//! let count = signal(0);
//!
//! // Read the value
//! let value = count.get();
//!
//! // Update the value (notifies subscribers)
//! count.set(5);
//! ```

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::container::Observed;
use super::runtime::{DepKey, Runtime, TriggerOp};
use super::subscriber::TargetId;
use super::value::{Key, Value};
use crate::error::Result;

struct SignalInner<T> {
    target: TargetId,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::release_target(self.target);
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal clones the handle; every clone reads and writes the same
/// slot.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

/// Create a signal.
pub fn signal<T: Clone + PartialEq + 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                target: TargetId::new(),
                value: RefCell::new(value),
            }),
        }
    }

    /// The signal's identity in the dependency store.
    pub fn id(&self) -> TargetId {
        self.inner.target
    }

    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.target, DepKey::Value);
        self.inner.value.borrow().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the value for the duration of `f`, subscribing the running
    /// computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.target, DepKey::Value);
        f(&self.inner.value.borrow())
    }

    /// Set a new value. Subscribers are notified only if it differs from the
    /// current one.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        Runtime::trigger(self.inner.target, &DepKey::Value, TriggerOp::Set, None);
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Get the number of computations subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.target, &DepKey::Value)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.target)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// A reference to one key of an observed container.
#[derive(Debug, Clone)]
pub struct PropRef {
    source: Observed,
    key: Key,
}

impl PropRef {
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn source(&self) -> &Observed {
        &self.source
    }

    /// Read the referenced slot (tracked like [`Observed::get`]).
    pub fn get(&self) -> Value {
        self.source.get(self.key.clone())
    }

    /// Write the referenced slot (triggers like [`Observed::try_set`]).
    pub fn try_set(&self, value: impl Into<Value>) -> Result<()> {
        self.source.try_set(self.key.clone(), value)
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.source.set(self.key.clone(), value);
    }
}

impl Observed {
    /// A reference to a single key that stays connected to this container.
    pub fn to_ref(&self, key: impl Into<Key>) -> PropRef {
        PropRef {
            source: self.clone(),
            key: key.into(),
        }
    }

    /// One [`PropRef`] per current key, in order.
    pub fn to_refs(&self) -> Vec<PropRef> {
        self.keys().into_iter().map(|key| self.to_ref(key)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::container::{reactive, Container};
    use crate::reactive::effect::Effect;
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_subscribers() {
        let signal = Signal::new(0);
        let call_count = Rc::new(Cell::new(0));

        let (s, count) = (signal.clone(), call_count.clone());
        let _effect = Effect::new(move || {
            s.get();
            count.set(count.get() + 1);
        });
        assert_eq!(call_count.get(), 1);
        assert_eq!(signal.subscriber_count(), 1);

        signal.set(1);
        assert_eq!(call_count.get(), 2);

        // Same value, no notification.
        signal.set(1);
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let signal = Signal::new(0);
        let s = signal.clone();
        let _effect = Effect::new(move || {
            s.get_untracked();
        });
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn prop_ref_reads_and_writes_through() {
        let state = reactive(&Container::from_pairs([("a", 1), ("b", 2)]));
        let a = state.to_ref("a");
        let seen = Rc::new(Cell::new(0));

        let (r, s) = (a.clone(), seen.clone());
        let _effect = Effect::new(move || {
            s.set(r.get().as_int().unwrap_or_default());
        });

        state.set("a", 5);
        assert_eq!(seen.get(), 5);

        a.set(7);
        assert_eq!(state.get("a"), Value::Int(7));
        assert_eq!(seen.get(), 7);

        let refs = state.to_refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].get(), Value::Int(2));
    }
}

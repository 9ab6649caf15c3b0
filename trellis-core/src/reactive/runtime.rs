//! Reactive Runtime
//!
//! The runtime is the dependency store that connects observed values with the
//! computations reading them.
//!
//! # How It Works
//!
//! 1. When a computation reads an observed value, [`Runtime::track`] adds the
//!    running computation to the record for `(target, key)` and hands the
//!    record back to the computation so it can unsubscribe later.
//!
//! 2. When an observed value is written, [`Runtime::trigger`]:
//!    a. Collects the subscribers of the written key
//!    b. Adds the subscribers of the synthetic keys the operation affects
//!    c. Skips computations that are currently executing
//!    d. Hands each remaining subscriber either to its scheduler or runs it
//!
//! Records are created lazily and only shrink through subscriber cleanup.
//! Empty records are tolerated; a target's whole bucket is released when the
//! target itself is dropped.
//!
//! # Threading
//!
//! The store is thread-local. Every borrow of it is released before any
//! subscriber is notified, so notifications may freely track and trigger.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId, TargetId};
use super::value::Key;

/// The key half of a dependency record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A concrete property or list index.
    Key(Key),
    /// Enumeration of a map's keys.
    Iterate,
    /// Length of a list.
    Length,
    /// The single slot of a signal or computed value.
    Value,
}

impl From<Key> for DepKey {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Iterate => f.write_str("<iterate>"),
            Self::Length => f.write_str("<length>"),
            Self::Value => f.write_str("<value>"),
        }
    }
}

/// The kind of write that caused a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing key received a different value.
    Set,
    /// A key that did not exist was created.
    Add,
    /// An existing key was removed.
    Delete,
}

/// A dependency record: the ordered set of subscribers of one `(target, key)`.
#[derive(Clone, Default)]
pub(crate) struct Dep(Rc<RefCell<IndexMap<SubscriberId, Weak<dyn Subscriber>>>>);

impl Dep {
    /// Add a subscriber. Returns `false` if it was already present.
    fn insert(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let mut subs = self.0.borrow_mut();
        let id = subscriber.subscriber_id();
        if subs.contains_key(&id) {
            return false;
        }
        subs.insert(id, Rc::downgrade(subscriber));
        true
    }

    /// Remove a subscriber, keeping the order of the rest.
    pub(crate) fn remove(&self, id: SubscriberId) {
        self.0.borrow_mut().shift_remove(&id);
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }

    fn collect_into(&self, out: &mut IndexMap<SubscriberId, Weak<dyn Subscriber>>) {
        for (id, weak) in self.0.borrow().iter() {
            out.entry(*id).or_insert_with(|| weak.clone());
        }
    }
}

type TargetDeps = IndexMap<DepKey, Dep>;

thread_local! {
    static TARGETS: RefCell<HashMap<TargetId, TargetDeps>> = RefCell::new(HashMap::new());
}

/// The dependency store.
///
/// This is a per-thread singleton; all functions are associated functions.
pub struct Runtime;

impl Runtime {
    /// Record that the running computation depends on `(target, key)`.
    ///
    /// Does nothing when no computation is running or tracking is paused.
    pub fn track(target: TargetId, key: DepKey) {
        let Some(active) = ReactiveContext::tracking_subscriber() else {
            return;
        };

        let dep = TARGETS.with(|targets| {
            targets
                .borrow_mut()
                .entry(target)
                .or_default()
                .entry(key)
                .or_default()
                .clone()
        });

        if dep.insert(&active) {
            active.record_dependency(dep);
        }
    }

    /// Notify every computation affected by a write to `(target, key)`.
    ///
    /// `new_len` is the list length after the write and is only consulted
    /// when `key` is [`DepKey::Length`].
    pub fn trigger(target: TargetId, key: &DepKey, op: TriggerOp, new_len: Option<usize>) {
        let collected = TARGETS.with(|targets| {
            let targets = targets.borrow();
            let mut collected = IndexMap::new();
            let Some(deps) = targets.get(&target) else {
                return collected;
            };

            if let Some(dep) = deps.get(key) {
                dep.collect_into(&mut collected);
            }

            if let (DepKey::Length, Some(len)) = (key, new_len) {
                for (dep_key, dep) in deps {
                    if let DepKey::Key(Key::Index(index)) = dep_key {
                        if *index >= len {
                            dep.collect_into(&mut collected);
                        }
                    }
                }
            }

            if op == TriggerOp::Add && matches!(key, DepKey::Key(Key::Index(_))) {
                if let Some(dep) = deps.get(&DepKey::Length) {
                    dep.collect_into(&mut collected);
                }
            }

            if matches!(op, TriggerOp::Add | TriggerOp::Delete) {
                if let Some(dep) = deps.get(&DepKey::Iterate) {
                    dep.collect_into(&mut collected);
                }
            }

            collected
        });

        if collected.is_empty() {
            return;
        }

        trace!(%target, %key, ?op, subscribers = collected.len(), "trigger");

        for (id, weak) in collected {
            // A computation never re-triggers itself while it is executing.
            if ReactiveContext::is_running(id) {
                continue;
            }
            if let Some(subscriber) = weak.upgrade() {
                subscriber.notify();
            }
        }
    }

    /// Drop every dependency record of a target.
    ///
    /// Called when a container, signal or computed value is dropped.
    pub fn release_target(target: TargetId) {
        let _ = TARGETS.try_with(|targets| {
            if let Ok(mut targets) = targets.try_borrow_mut() {
                targets.remove(&target);
            }
        });
    }

    /// Number of live subscribers of `(target, key)`.
    pub fn subscriber_count(target: TargetId, key: &DepKey) -> usize {
        TARGETS.with(|targets| {
            targets
                .borrow()
                .get(&target)
                .and_then(|deps| deps.get(key))
                .map_or(0, Dep::len)
        })
    }

    /// Whether any dependency record exists for the target.
    pub fn has_records(target: TargetId) -> bool {
        TARGETS.with(|targets| targets.borrow().contains_key(&target))
    }
}

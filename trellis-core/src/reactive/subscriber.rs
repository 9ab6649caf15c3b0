//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! This includes effects, computed values, watchers and component renders.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::Dep;

/// Unique identifier for a subscriber.
///
/// Each subscriber (effect, computed, watcher or scheduled job) gets a unique
/// ID when created. This ID is used to key subscriber sets and to deduplicate
/// queued jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of anything that owns dependency records.
///
/// Containers, signals and computed values each allocate one. The dependency
/// store buckets its records by target, and a target releases its bucket
/// when it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A computation that can be subscribed to dependency records.
///
/// Dependency records hold subscribers weakly, so a computation that nobody
/// owns anymore simply stops being notified.
pub(crate) trait Subscriber {
    /// The subscriber's unique ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// Remember a record this subscriber was added to, so it can be
    /// unsubscribed before the next run.
    fn record_dependency(&self, dep: Dep);

    /// One of the subscriber's dependencies changed.
    fn notify(self: Rc<Self>);
}

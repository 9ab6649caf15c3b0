//! Reactive Primitives
//!
//! This module implements the reactive system: observed containers, the
//! dependency store, and the computations built on top of it.
//!
//! # Concepts
//!
//! ## Observed containers and signals
//!
//! An [`Observed`] container is a map or list whose reads are tracked and
//! whose writes trigger. A [`Signal`] is the same idea for a single value.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever something it read
//! last time changes. It can instead hand itself to a scheduler, which is
//! how component renders get batched.
//!
//! ## Computed values
//!
//! A [`Computed`] is a derived value that caches its result and recomputes
//! only when read after an input changed.
//!
//! ## Watchers
//!
//! [`watch`] calls back with the new and old value of a source.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local execution stack to detect
//! dependencies automatically. When an observed value is read, the top of the
//! stack (if tracking is not paused) is subscribed to the `(target, key)`
//! record in the [`Runtime`], and the record is handed back to the
//! computation so it can unsubscribe before its next run.

mod computed;
mod container;
mod context;
mod effect;
mod runtime;
mod signal;
mod subscriber;
mod value;
mod watch;

pub use computed::{computed, Computed};
pub use container::{
    is_observed, is_reactive, is_readonly, reactive, readonly, shallow_readonly, shallow_reactive,
    Container, Data, Flavor, Observed,
};
pub use context::{is_tracking, pause_tracking, untracked, ReactiveContext, TrackingPause};
pub use effect::{effect, effect_with, Effect, EffectOptions, EffectScheduler};
pub use runtime::{DepKey, Runtime, TriggerOp};
pub use signal::{signal, PropRef, Signal};
pub use subscriber::{SubscriberId, TargetId};
pub use value::{Key, Value};
pub use watch::{traverse, watch, FlushTiming, OnCleanup, WatchHandle, WatchOptions, WatchSource};

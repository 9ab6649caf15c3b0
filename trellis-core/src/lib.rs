//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Observed containers with automatic dependency tracking
//! - Effects, computed values and watchers built on that tracking
//! - A deduplicating job scheduler flushed on a microtask boundary
//! - A virtual node reconciler with keyed, minimum-move child diffing
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Observed containers, the dependency store and effects
//! - `scheduler`: Job queue, microtask boundary and the tokio driver
//! - `render`: Virtual nodes, the platform adapter trait and the reconciler
//!
//! Everything runs on one thread. The dependency store, the effect stack and
//! the job queue are thread-local; "concurrency" means interleaving synchronous
//! work with the deferred flush boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::reactive::{reactive, effect, Container};
//!
//! let state = reactive(&Container::from_pairs([("count", 0)]));
//!
//! let view = state.clone();
//! let _effect = effect(move || {
//!     println!("count = {}", view.get("count"));
//! });
//!
//! state.set("count", 5);
//! // Effect re-runs synchronously, prints: "count = 5"
//! ```

pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use error::{ReactiveError, Result};

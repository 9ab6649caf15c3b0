//! Error types shared by the reactive layer.
//!
//! None of these abort the runtime. Convenience methods such as
//! [`Observed::set`](crate::reactive::Observed::set) log the error through
//! `tracing` and carry on; the `try_` variants hand it back to the caller.

use thiserror::Error;

/// Errors raised by operations on observed containers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A write was attempted through a readonly wrapper.
    #[error("{operation} on key `{key}` failed: target is readonly")]
    Readonly {
        operation: &'static str,
        key: String,
    },

    /// A list-only operation was called on a map container.
    #[error("`{operation}` requires a list container")]
    NotAList { operation: &'static str },

    /// A property key was used to address a list element.
    #[error("key `{key}` is not a valid list index")]
    InvalidIndex { key: String },
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

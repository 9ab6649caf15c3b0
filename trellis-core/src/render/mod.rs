//! Rendering
//!
//! Virtual nodes, the platform adapter they are realized through, and the
//! reconciler that diffs one virtual tree against the next.
//!
//! # Overview
//!
//! - [`VNode`]: a description of one node; built fresh on every render.
//! - [`Platform`]: the host operations the reconciler needs.
//! - [`Reconciler`]: `patch`/`unmount`, including the keyed child diff.
//! - [`Renderer`]: remembers the tree per container; `render`/`hydrate`.
//! - [`ComponentDef`]: components whose renders run in reactive effects.
//! - [`MemoryPlatform`]: an in-memory host with an operation log.

mod children;
mod component;
mod hydrate;
mod lis;
mod memory;
mod platform;
mod reconciler;
mod renderer;
mod vnode;

pub use component::{
    has_props_changed, resolve_props, ComponentDef, ComponentInstance, Hook, RenderContext,
    RenderFn, SetupContext, SetupResult,
};
pub use lis::longest_increasing_subsequence;
pub use memory::{HostOp, MemoryPlatform, NodeId};
pub use platform::{HostNodeKind, Platform};
pub use reconciler::Reconciler;
pub use renderer::Renderer;
pub use vnode::{event_prop_name, is_event_prop, Children, Handler, PropValue, Props, VNode, VNodeType};

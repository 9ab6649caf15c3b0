//! The platform adapter.
//!
//! The reconciler never touches real nodes. Everything it does to the host
//! tree goes through a [`Platform`], which owns the actual node
//! representation: a DOM, a terminal buffer, or the in-memory tree of
//! [`MemoryPlatform`](super::MemoryPlatform).

use std::fmt::Debug;
use std::hash::Hash;

use super::vnode::PropValue;

/// What a host node is, as seen by hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNodeKind {
    Element(String),
    Text(String),
    Comment(String),
}

/// Operations the reconciler needs from the host.
///
/// Methods take `&self`; implementations keep their tree behind interior
/// mutability.
pub trait Platform {
    /// Handle to a host node. Cheap to clone.
    type Node: Clone + PartialEq + Eq + Hash + Debug + 'static;

    fn create_element(&self, tag: &str) -> Self::Node;

    fn create_text(&self, text: &str) -> Self::Node;

    fn create_comment(&self, text: &str) -> Self::Node;

    /// Replace the payload of a text or comment node.
    fn set_text(&self, node: &Self::Node, text: &str);

    /// Replace all children of an element with the given text.
    fn set_element_text(&self, el: &Self::Node, text: &str);

    /// Insert `node` into `parent` before `anchor`, or at the end when there
    /// is no anchor. A node that is already attached is moved.
    fn insert(&self, node: &Self::Node, parent: &Self::Node, anchor: Option<&Self::Node>);

    /// Detach `node` from its parent.
    fn remove(&self, node: &Self::Node);

    /// Apply a prop change. `new` is `None` when the prop was removed.
    fn apply_attribute(
        &self,
        el: &Self::Node,
        key: &str,
        old: Option<&PropValue>,
        new: Option<&PropValue>,
    );

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn node_kind(&self, node: &Self::Node) -> HostNodeKind;
}

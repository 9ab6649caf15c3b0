//! An in-memory platform.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Every mutation is
//! appended to an operation log, which tests inspect to check that a diff did
//! exactly the moves, mounts and removals it should have.

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::platform::{HostNodeKind, Platform};
use super::vnode::{event_prop_name, Handler, PropValue};
use crate::reactive::Value;

/// Handle to a node of a [`MemoryPlatform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    Create {
        node: NodeId,
        kind: String,
    },
    Insert {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
        /// The node was attached elsewhere before.
        moved: bool,
    },
    Remove {
        node: NodeId,
    },
    SetText {
        node: NodeId,
        text: String,
    },
    SetElementText {
        node: NodeId,
        text: String,
    },
    SetAttribute {
        node: NodeId,
        key: String,
        value: Option<String>,
    },
}

impl HostOp {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create { .. })
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Self::Insert { moved: true, .. })
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}

#[derive(Debug)]
enum Payload {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        handlers: IndexMap<String, Handler>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct HostNode {
    payload: Payload,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<HostNode>,
}

impl Tree {
    fn alloc(&mut self, payload: Payload) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(HostNode {
            payload,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> &HostNode {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut HostNode {
        &mut self.nodes[id.0]
    }

    fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.node_mut(id).parent.take() else {
            return false;
        };
        self.node_mut(parent).children.retain(|&child| child != id);
        true
    }
}

/// A [`Platform`] backed by an in-memory tree.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    tree: RefCell<Tree>,
    ops: RefCell<Vec<HostOp>>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detached element to render into. Not logged.
    pub fn create_root(&self) -> NodeId {
        self.tree.borrow_mut().alloc(Payload::Element {
            tag: "root".to_owned(),
            attrs: IndexMap::new(),
            handlers: IndexMap::new(),
        })
    }

    fn log(&self, op: HostOp) {
        trace!(?op, "host op");
        self.ops.borrow_mut().push(op);
    }

    /// The operations recorded so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.borrow().clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    /// The operation log as JSON.
    pub fn ops_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.ops.borrow())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.borrow().node(id).children.clone()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.borrow().node(id).parent
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<String> {
        match &self.tree.borrow().node(id).payload {
            Payload::Element { attrs, .. } => attrs.get(key).cloned(),
            _ => None,
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = tree.node(current);
            if let Payload::Text(text) = &node.payload {
                out.push_str(text);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Markup for the children of `id`. Empty text nodes (fragment markers)
    /// produce nothing.
    pub fn to_markup(&self, id: NodeId) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        for &child in &tree.node(id).children {
            write_markup(&tree, child, &mut out);
        }
        out
    }

    /// Call the handler registered for `event` on `id`. Returns whether one
    /// was found.
    pub fn dispatch(&self, id: NodeId, event: &str, args: &[Value]) -> bool {
        let handler = match &self.tree.borrow().node(id).payload {
            Payload::Element { handlers, .. } => handlers.get(&event_prop_name(event)).cloned(),
            _ => None,
        };
        match handler {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }
}

fn write_markup(tree: &Tree, id: NodeId, out: &mut String) {
    let node = tree.node(id);
    match &node.payload {
        Payload::Text(text) => out.push_str(text),
        Payload::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Payload::Element { tag, attrs, .. } => {
            out.push('<');
            out.push_str(tag);
            for (key, value) in attrs {
                let _ = write!(out, " {key}=\"{value}\"");
            }
            out.push('>');
            for &child in &node.children {
                write_markup(tree, child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

impl Platform for MemoryPlatform {
    type Node = NodeId;

    fn create_element(&self, tag: &str) -> NodeId {
        let node = self.tree.borrow_mut().alloc(Payload::Element {
            tag: tag.to_owned(),
            attrs: IndexMap::new(),
            handlers: IndexMap::new(),
        });
        self.log(HostOp::Create {
            node,
            kind: tag.to_owned(),
        });
        node
    }

    fn create_text(&self, text: &str) -> NodeId {
        let node = self.tree.borrow_mut().alloc(Payload::Text(text.to_owned()));
        self.log(HostOp::Create {
            node,
            kind: "#text".to_owned(),
        });
        node
    }

    fn create_comment(&self, text: &str) -> NodeId {
        let node = self.tree.borrow_mut().alloc(Payload::Comment(text.to_owned()));
        self.log(HostOp::Create {
            node,
            kind: "#comment".to_owned(),
        });
        node
    }

    fn set_text(&self, node: &NodeId, text: &str) {
        match &mut self.tree.borrow_mut().node_mut(*node).payload {
            Payload::Text(current) | Payload::Comment(current) => *current = text.to_owned(),
            Payload::Element { .. } => return,
        }
        self.log(HostOp::SetText {
            node: *node,
            text: text.to_owned(),
        });
    }

    fn set_element_text(&self, el: &NodeId, text: &str) {
        {
            let mut tree = self.tree.borrow_mut();
            for child in std::mem::take(&mut tree.node_mut(*el).children) {
                tree.node_mut(child).parent = None;
            }
            if !text.is_empty() {
                let child = tree.alloc(Payload::Text(text.to_owned()));
                tree.node_mut(child).parent = Some(*el);
                tree.node_mut(*el).children.push(child);
            }
        }
        self.log(HostOp::SetElementText {
            node: *el,
            text: text.to_owned(),
        });
    }

    fn insert(&self, node: &NodeId, parent: &NodeId, anchor: Option<&NodeId>) {
        let moved = {
            let mut tree = self.tree.borrow_mut();
            let moved = tree.detach(*node);
            let siblings = &mut tree.node_mut(*parent).children;
            let at = anchor
                .and_then(|anchor| siblings.iter().position(|child| child == anchor))
                .unwrap_or(siblings.len());
            siblings.insert(at, *node);
            tree.node_mut(*node).parent = Some(*parent);
            moved
        };
        self.log(HostOp::Insert {
            node: *node,
            parent: *parent,
            anchor: anchor.copied(),
            moved,
        });
    }

    fn remove(&self, node: &NodeId) {
        if self.tree.borrow_mut().detach(*node) {
            self.log(HostOp::Remove { node: *node });
        }
    }

    fn apply_attribute(
        &self,
        el: &NodeId,
        key: &str,
        _old: Option<&PropValue>,
        new: Option<&PropValue>,
    ) {
        let logged = {
            let mut tree = self.tree.borrow_mut();
            let Payload::Element {
                attrs, handlers, ..
            } = &mut tree.node_mut(*el).payload
            else {
                return;
            };
            match new {
                Some(PropValue::Handler(handler)) => {
                    handlers.insert(key.to_owned(), handler.clone());
                    Some("[handler]".to_owned())
                }
                Some(PropValue::Value(Value::Null)) | None => {
                    attrs.shift_remove(key);
                    handlers.shift_remove(key);
                    None
                }
                Some(PropValue::Value(value)) => {
                    let value = value.to_string();
                    attrs.insert(key.to_owned(), value.clone());
                    Some(value)
                }
            }
        };
        self.log(HostOp::SetAttribute {
            node: *el,
            key: key.to_owned(),
            value: logged,
        });
    }

    fn first_child(&self, node: &NodeId) -> Option<NodeId> {
        self.tree.borrow().node(*node).children.first().copied()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let tree = self.tree.borrow();
        let parent = tree.node(*node).parent?;
        let siblings = &tree.node(parent).children;
        let at = siblings.iter().position(|child| child == node)?;
        siblings.get(at + 1).copied()
    }

    fn node_kind(&self, node: &NodeId) -> HostNodeKind {
        match &self.tree.borrow().node(*node).payload {
            Payload::Element { tag, .. } => HostNodeKind::Element(tag.clone()),
            Payload::Text(text) => HostNodeKind::Text(text.clone()),
            Payload::Comment(text) => HostNodeKind::Comment(text.clone()),
        }
    }
}

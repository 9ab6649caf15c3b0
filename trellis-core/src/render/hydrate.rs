//! Hydration: adopting host nodes that already exist (server-rendered
//! markup) instead of creating new ones.
//!
//! The virtual tree is walked in step with the host tree. Matching nodes are
//! adopted and only event handlers are attached. A node that does not match
//! is reported and replaced by a fresh mount; leftover host children are
//! removed.

use tracing::warn;

use super::platform::{HostNodeKind, Platform};
use super::reconciler::Reconciler;
use super::vnode::{is_event_prop, Children, VNode, VNodeType};

impl<P: Platform + 'static> Reconciler<P> {
    /// Hydrate `vnode` against `node`, a child of `container`. Returns the
    /// host node after everything `vnode` adopted.
    pub(crate) fn hydrate_node(
        &self,
        node: Option<P::Node>,
        vnode: &mut VNode<P::Node>,
        container: &P::Node,
    ) -> Option<P::Node> {
        let kind = vnode.kind.clone();
        match &kind {
            VNodeType::Component(_) => {
                let next = node.as_ref().and_then(|n| self.platform.next_sibling(n));
                self.mount_component(vnode, container, next.as_ref(), node);
                self.next_host_node(vnode)
            }
            VNodeType::Fragment => {
                vnode.normalize_fragment_text();
                let start = self.platform.create_text("");
                self.platform.insert(&start, container, node.as_ref());
                let mut next = node;
                if let Children::Nodes(children) = &mut vnode.children {
                    for child in children.iter_mut() {
                        next = self.hydrate_node(next, child, container);
                    }
                }
                let end = self.platform.create_text("");
                self.platform.insert(&end, container, next.as_ref());
                vnode.el = Some(start);
                vnode.anchor = Some(end);
                next
            }
            VNodeType::Element(tag) => match node {
                Some(n) if self.is_element(&n, tag) => self.hydrate_element(n, vnode),
                other => self.hydration_mismatch(other, vnode, container),
            },
            VNodeType::Text => match node {
                Some(n) if matches!(self.platform.node_kind(&n), HostNodeKind::Text(_)) => {
                    self.adopt_text(n, vnode)
                }
                other => self.hydration_mismatch(other, vnode, container),
            },
            VNodeType::Comment => match node {
                Some(n) if matches!(self.platform.node_kind(&n), HostNodeKind::Comment(_)) => {
                    self.adopt_text(n, vnode)
                }
                other => self.hydration_mismatch(other, vnode, container),
            },
        }
    }

    fn is_element(&self, node: &P::Node, tag: &str) -> bool {
        matches!(
            self.platform.node_kind(node),
            HostNodeKind::Element(found) if found.eq_ignore_ascii_case(tag)
        )
    }

    fn adopt_text(&self, node: P::Node, vnode: &mut VNode<P::Node>) -> Option<P::Node> {
        let existing = match self.platform.node_kind(&node) {
            HostNodeKind::Text(text) | HostNodeKind::Comment(text) => text,
            HostNodeKind::Element(_) => String::new(),
        };
        if existing != vnode.text_payload() {
            warn!(
                expected = vnode.text_payload(),
                found = %existing,
                "hydration text mismatch"
            );
            self.platform.set_text(&node, vnode.text_payload());
        }
        let next = self.platform.next_sibling(&node);
        vnode.el = Some(node);
        next
    }

    fn hydrate_element(&self, el: P::Node, vnode: &mut VNode<P::Node>) -> Option<P::Node> {
        for (key, value) in &vnode.props {
            if is_event_prop(key) {
                self.platform.apply_attribute(&el, key, None, Some(value));
            }
        }

        match &mut vnode.children {
            Children::Nodes(children) => {
                let mut next = self.platform.first_child(&el);
                for child in children.iter_mut() {
                    next = self.hydrate_node(next, child, &el);
                }
                while let Some(extra) = next {
                    warn!(node = ?extra, "hydration found an extra node, removing it");
                    next = self.platform.next_sibling(&extra);
                    self.platform.remove(&extra);
                }
            }
            Children::Text(text) => {
                let existing = self
                    .platform
                    .first_child(&el)
                    .map(|child| self.platform.node_kind(&child));
                let matches =
                    matches!(&existing, Some(HostNodeKind::Text(found)) if **found == **text);
                if !matches {
                    warn!(expected = %text, "hydration text content mismatch");
                    self.platform.set_element_text(&el, text);
                }
            }
            Children::None => {}
        }

        let next = self.platform.next_sibling(&el);
        vnode.el = Some(el);
        next
    }

    fn hydration_mismatch(
        &self,
        node: Option<P::Node>,
        vnode: &mut VNode<P::Node>,
        container: &P::Node,
    ) -> Option<P::Node> {
        let found = node.as_ref().map(|n| self.platform.node_kind(n));
        warn!(expected = ?vnode.kind, ?found, "hydration mismatch, remounting");

        let next = node.as_ref().and_then(|n| self.platform.next_sibling(n));
        self.patch(None, vnode, container, node.as_ref());
        if let Some(stale) = node {
            self.platform.remove(&stale);
        }
        next
    }
}

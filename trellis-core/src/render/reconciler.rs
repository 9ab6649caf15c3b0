//! The reconciler: turns the difference between two virtual trees into
//! platform operations.
//!
//! # Dispatch
//!
//! [`Reconciler::patch`] compares an old VNode with its replacement. If the
//! two are not the same kind of node the old subtree is unmounted and the
//! new one mounted in its place. Otherwise:
//!
//! - elements keep their host node; props are diffed, then children;
//! - text and comment nodes keep their host node and update the payload if
//!   it changed;
//! - fragments diff their children directly in the parent, between a start
//!   and an end marker;
//! - components keep their instance and receive the new props; the
//!   instance's render effect takes care of re-rendering.
//!
//! Child lists are diffed in [`children`](super::children).

use std::rc::Rc;

use tracing::{debug, warn};

use super::component::ComponentInstance;
use super::platform::Platform;
use super::vnode::{Children, VNode, VNodeType};
use crate::reactive::{untracked, Effect, EffectOptions};
use crate::scheduler::queue_job;

#[derive(Clone, Copy)]
enum Tag {
    Element,
    Text,
    Comment,
    Fragment,
    Component,
}

fn tag_of<N>(vnode: &VNode<N>) -> Tag {
    match vnode.kind {
        VNodeType::Element(_) => Tag::Element,
        VNodeType::Text => Tag::Text,
        VNodeType::Comment => Tag::Comment,
        VNodeType::Fragment => Tag::Fragment,
        VNodeType::Component(_) => Tag::Component,
    }
}

/// Applies VNode diffs to a platform.
pub struct Reconciler<P: Platform> {
    pub(crate) platform: Rc<P>,
}

impl<P: Platform> Clone for Reconciler<P> {
    fn clone(&self) -> Self {
        Self {
            platform: Rc::clone(&self.platform),
        }
    }
}

impl<P: Platform + 'static> Reconciler<P> {
    pub fn new(platform: Rc<P>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Rc<P> {
        &self.platform
    }

    /// Bring the host tree from `old` to `new`, inside `container` and
    /// before `anchor` for anything that has to be mounted.
    pub fn patch(
        &self,
        old: Option<&VNode<P::Node>>,
        new: &mut VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        let mut old = old;
        let mut anchor = anchor.cloned();

        if let Some(prev) = old {
            if !prev.same_type(new) {
                if anchor.is_none() {
                    anchor = self.next_host_node(prev);
                }
                self.unmount(prev);
                old = None;
            }
        }

        match (tag_of(new), old) {
            (Tag::Element, None) => self.mount_element(new, container, anchor.as_ref()),
            (Tag::Element, Some(old)) => self.patch_element(old, new, container),
            (Tag::Text | Tag::Comment, None) => {
                let text = new.text_payload();
                let el = match tag_of(new) {
                    Tag::Text => self.platform.create_text(text),
                    _ => self.platform.create_comment(text),
                };
                self.platform.insert(&el, container, anchor.as_ref());
                new.el = Some(el);
            }
            (Tag::Text | Tag::Comment, Some(old)) => {
                new.el = old.el.clone();
                if old.text_payload() != new.text_payload() {
                    if let Some(el) = &new.el {
                        self.platform.set_text(el, new.text_payload());
                    }
                }
            }
            (Tag::Fragment, None) => {
                new.normalize_fragment_text();
                let start = self.platform.create_text("");
                let end = self.platform.create_text("");
                self.platform.insert(&start, container, anchor.as_ref());
                self.platform.insert(&end, container, anchor.as_ref());
                if let Children::Nodes(children) = &mut new.children {
                    for child in children.iter_mut() {
                        self.patch(None, child, container, Some(&end));
                    }
                }
                new.el = Some(start);
                new.anchor = Some(end);
            }
            (Tag::Fragment, Some(old)) => {
                new.normalize_fragment_text();
                new.el = old.el.clone();
                new.anchor = old.anchor.clone();
                let end = new.anchor.clone();
                self.patch_children(old, new, container, end.as_ref());
            }
            (Tag::Component, None) => self.mount_component(new, container, anchor.as_ref(), None),
            (Tag::Component, Some(old)) => self.patch_component(old, new, container, anchor.as_ref()),
        }
    }

    fn mount_element(
        &self,
        vnode: &mut VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        let VNodeType::Element(tag) = &vnode.kind else {
            return;
        };
        let el = self.platform.create_element(tag);

        match &mut vnode.children {
            Children::Text(text) => self.platform.set_element_text(&el, text),
            Children::Nodes(children) => {
                for child in children.iter_mut() {
                    self.patch(None, child, &el, None);
                }
            }
            Children::None => {}
        }

        for (key, value) in &vnode.props {
            self.platform.apply_attribute(&el, key, None, Some(value));
        }

        self.platform.insert(&el, container, anchor);
        vnode.el = Some(el);
    }

    fn patch_element(
        &self,
        old: &VNode<P::Node>,
        new: &mut VNode<P::Node>,
        container: &P::Node,
    ) {
        let Some(el) = old.el.clone() else {
            warn!(kind = ?new.kind, "patching an element that was never mounted");
            self.mount_element(new, container, None);
            return;
        };
        new.el = Some(el.clone());

        for (key, value) in &new.props {
            let previous = old.props.get(key);
            if previous != Some(value) {
                self.platform.apply_attribute(&el, key, previous, Some(value));
            }
        }
        for (key, value) in &old.props {
            if !new.props.contains_key(key) {
                self.platform.apply_attribute(&el, key, Some(value), None);
            }
        }

        self.patch_children(old, new, &el, None);
    }

    /// Tear down the host nodes of `vnode` and stop the components inside it.
    pub fn unmount(&self, vnode: &VNode<P::Node>) {
        match &vnode.kind {
            VNodeType::Fragment => {
                if let Children::Nodes(children) = &vnode.children {
                    for child in children {
                        self.unmount(child);
                    }
                }
                for marker in [&vnode.el, &vnode.anchor].into_iter().flatten() {
                    self.platform.remove(marker);
                }
            }
            VNodeType::Component(_) => {
                if let Some(instance) = &vnode.component {
                    self.unmount_component(instance);
                }
            }
            _ => {
                self.stop_components(vnode);
                if let Some(el) = &vnode.el {
                    self.platform.remove(el);
                }
            }
        }
    }

    /// Stop every component below `vnode` without touching host nodes;
    /// they go away with their ancestor.
    fn stop_components(&self, vnode: &VNode<P::Node>) {
        let Children::Nodes(children) = &vnode.children else {
            return;
        };
        for child in children {
            match &child.kind {
                VNodeType::Component(_) => {
                    if let Some(instance) = &child.component {
                        self.unmount_component(instance);
                    }
                }
                _ => self.stop_components(child),
            }
        }
    }

    /// Move the host nodes of `vnode` before `anchor`.
    pub(crate) fn move_node(
        &self,
        vnode: &VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        match &vnode.kind {
            VNodeType::Fragment => {
                if let Some(start) = &vnode.el {
                    self.platform.insert(start, container, anchor);
                }
                if let Children::Nodes(children) = &vnode.children {
                    for child in children {
                        self.move_node(child, container, anchor);
                    }
                }
                if let Some(end) = &vnode.anchor {
                    self.platform.insert(end, container, anchor);
                }
            }
            VNodeType::Component(_) => {
                if let Some(instance) = &vnode.component {
                    if let Some(sub_tree) = &*instance.sub_tree.borrow() {
                        self.move_node(sub_tree, container, anchor);
                    }
                }
            }
            _ => {
                if let Some(el) = &vnode.el {
                    self.platform.insert(el, container, anchor);
                }
            }
        }
    }

    /// The first host node `vnode` occupies.
    pub(crate) fn first_host_node(&self, vnode: &VNode<P::Node>) -> Option<P::Node> {
        match &vnode.component {
            Some(instance) => instance
                .sub_tree
                .borrow()
                .as_ref()
                .and_then(|sub_tree| self.first_host_node(sub_tree)),
            None => vnode.el.clone(),
        }
    }

    /// The last host node `vnode` occupies.
    pub(crate) fn last_host_node(&self, vnode: &VNode<P::Node>) -> Option<P::Node> {
        match (&vnode.kind, &vnode.component) {
            (_, Some(instance)) => instance
                .sub_tree
                .borrow()
                .as_ref()
                .and_then(|sub_tree| self.last_host_node(sub_tree)),
            (VNodeType::Fragment, None) => vnode.anchor.clone(),
            _ => vnode.el.clone(),
        }
    }

    /// The host node right after everything `vnode` occupies.
    pub(crate) fn next_host_node(&self, vnode: &VNode<P::Node>) -> Option<P::Node> {
        self.last_host_node(vnode)
            .and_then(|last| self.platform.next_sibling(&last))
    }

    pub(crate) fn mount_component(
        &self,
        vnode: &mut VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
        hydrate_from: Option<P::Node>,
    ) {
        let VNodeType::Component(def) = &vnode.kind else {
            return;
        };
        let instance = Rc::new(ComponentInstance::new(def.clone(), &vnode.props));
        *instance.hydrate_from.borrow_mut() = hydrate_from;
        vnode.component = Some(instance.clone());

        let weak = Rc::downgrade(&instance);
        let reconciler = self.clone();
        let container = container.clone();
        let anchor = anchor.cloned();
        let effect = Effect::with_options(
            move || {
                if let Some(instance) = weak.upgrade() {
                    reconciler.render_component(&instance, &container, anchor.as_ref());
                }
            },
            EffectOptions {
                lazy: true,
                scheduler: Some(Rc::new(|effect: &Effect| queue_job(effect.as_job()))),
            },
        );
        *instance.update.borrow_mut() = Some(effect.clone());

        debug!(component = instance.name(), "mounting component");
        effect.run();
    }

    /// Body of a component's render effect. The render closure is tracked;
    /// hooks and patching the result are not.
    fn render_component(
        &self,
        instance: &ComponentInstance<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        let mounted = instance.is_mounted.get();
        if mounted {
            instance.call_hook(|def| def.before_update.as_ref());
        } else {
            instance.call_hook(|def| def.before_mount.as_ref());
        }

        let mut sub_tree = instance.render_tree();

        untracked(|| {
            if !mounted {
                let hydrate_from = instance.hydrate_from.borrow_mut().take();
                match hydrate_from {
                    Some(node) => {
                        self.hydrate_node(Some(node), &mut sub_tree, container);
                    }
                    None => self.patch(None, &mut sub_tree, container, anchor),
                }
                *instance.sub_tree.borrow_mut() = Some(sub_tree);
                instance.is_mounted.set(true);
                instance.call_hook(|def| def.mounted.as_ref());
            } else {
                let previous = instance.sub_tree.borrow_mut().take();
                self.patch(previous.as_ref(), &mut sub_tree, container, None);
                *instance.sub_tree.borrow_mut() = Some(sub_tree);
                instance.call_hook(|def| def.updated.as_ref());
            }
        });
    }

    fn patch_component(
        &self,
        old: &VNode<P::Node>,
        new: &mut VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        let Some(instance) = old.component.clone() else {
            warn!(kind = ?new.kind, "patching a component that was never mounted");
            self.mount_component(new, container, anchor, None);
            return;
        };
        if super::component::has_props_changed(&old.props, &new.props) {
            instance.update_props(&new.props);
        }
        new.component = Some(instance);
    }

    fn unmount_component(&self, instance: &ComponentInstance<P::Node>) {
        if let Some(effect) = instance.update.borrow_mut().take() {
            effect.dispose();
        }
        let sub_tree = instance.sub_tree.borrow_mut().take();
        if let Some(sub_tree) = sub_tree {
            self.unmount(&sub_tree);
        }
        instance.is_mounted.set(false);
        debug!(component = instance.name(), "unmounted component");
    }
}

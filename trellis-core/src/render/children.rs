//! Child list diffing.
//!
//! Keyed lists (every child on both sides has a key) go through
//! [`Reconciler::patch_keyed_children`], which moves as few host nodes as
//! possible. Anything else is patched by position.
//!
//! # Keyed algorithm
//!
//! 1. Patch the common prefix, then the common suffix.
//! 2. If only new nodes remain, mount them before whatever follows them.
//!    If only old nodes remain, unmount them.
//! 3. Otherwise map each key in the remaining new range to its position and
//!    walk the remaining old range. Old nodes whose key is gone are
//!    unmounted; the rest are patched in place and their old index recorded
//!    in `source` at their new position. If a matched new position is ever
//!    smaller than the largest seen so far, nodes have to move.
//! 4. Without moves, only the new nodes left in `source` have to be mounted.
//!    With moves, the longest increasing subsequence of `source` is the
//!    largest set of nodes that are already in the right relative order.
//!    Walking the new range backwards, every other matched node is moved in
//!    front of its successor and unmatched ones are mounted there.
//!
//! Keys must be unique among siblings. Duplicates produce a wrong but
//! well-formed result.

use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use super::lis::lis_skipping_gaps;
use super::platform::Platform;
use super::reconciler::Reconciler;
use super::vnode::{Children, VNode};
use crate::reactive::Key;

impl<P: Platform + 'static> Reconciler<P> {
    /// Diff the children of `old` into `new`. `end_anchor` bounds the list
    /// when it shares its container with other nodes (fragments).
    pub(crate) fn patch_children(
        &self,
        old: &VNode<P::Node>,
        new: &mut VNode<P::Node>,
        container: &P::Node,
        end_anchor: Option<&P::Node>,
    ) {
        match (&old.children, &mut new.children) {
            (Children::Nodes(old_children), Children::Text(text)) => {
                for child in old_children {
                    self.unmount(child);
                }
                self.platform.set_element_text(container, text);
            }
            (Children::Text(old_text), Children::Text(text)) => {
                if **old_text != **text {
                    self.platform.set_element_text(container, text);
                }
            }
            (Children::None, Children::Text(text)) => {
                self.platform.set_element_text(container, text);
            }
            (Children::Nodes(old_children), Children::Nodes(new_children)) => {
                let keyed = old_children.iter().all(|c| c.key.is_some())
                    && new_children.iter().all(|c| c.key.is_some());
                if keyed {
                    self.patch_keyed_children(old_children, new_children, container, end_anchor);
                } else {
                    self.patch_unkeyed_children(old_children, new_children, container, end_anchor);
                }
            }
            (old_children, Children::Nodes(new_children)) => {
                if matches!(old_children, Children::Text(_)) {
                    self.platform.set_element_text(container, "");
                }
                for child in new_children.iter_mut() {
                    self.patch(None, child, container, end_anchor);
                }
            }
            (Children::Nodes(old_children), Children::None) => {
                for child in old_children {
                    self.unmount(child);
                }
            }
            (Children::Text(_), Children::None) => {
                self.platform.set_element_text(container, "");
            }
            (Children::None, Children::None) => {}
        }
    }

    /// Patch the overlap by position, then mount or unmount the remainder.
    fn patch_unkeyed_children(
        &self,
        old: &[VNode<P::Node>],
        new: &mut [VNode<P::Node>],
        container: &P::Node,
        end_anchor: Option<&P::Node>,
    ) {
        let common = old.len().min(new.len());
        for (old_child, new_child) in old.iter().zip(new.iter_mut()) {
            self.patch(Some(old_child), new_child, container, None);
        }
        for child in &mut new[common..] {
            self.patch(None, child, container, end_anchor);
        }
        for child in &old[common..] {
            self.unmount(child);
        }
    }

    /// The anchor for a node placed at `index` of `new`: the first host node
    /// of its successor, or the end of the list.
    fn anchor_after(
        &self,
        new: &[VNode<P::Node>],
        index: usize,
        end_anchor: Option<&P::Node>,
    ) -> Option<P::Node> {
        match new.get(index + 1) {
            Some(next) => self.first_host_node(next),
            None => end_anchor.cloned(),
        }
    }

    pub(crate) fn patch_keyed_children(
        &self,
        old: &[VNode<P::Node>],
        new: &mut [VNode<P::Node>],
        container: &P::Node,
        end_anchor: Option<&P::Node>,
    ) {
        // Ends are exclusive.
        let mut start = 0;
        let mut old_end = old.len();
        let mut new_end = new.len();

        // 1. Common prefix.
        while start < old_end && start < new_end && old[start].key == new[start].key {
            self.patch(Some(&old[start]), &mut new[start], container, None);
            start += 1;
        }

        // 2. Common suffix.
        while start < old_end && start < new_end && old[old_end - 1].key == new[new_end - 1].key {
            self.patch(Some(&old[old_end - 1]), &mut new[new_end - 1], container, None);
            old_end -= 1;
            new_end -= 1;
        }

        // 3. Only additions or only removals left.
        if start == old_end {
            if start < new_end {
                let anchor = match new.get(new_end) {
                    Some(next) => self.first_host_node(next),
                    None => end_anchor.cloned(),
                };
                for child in &mut new[start..new_end] {
                    self.patch(None, child, container, anchor.as_ref());
                }
            }
            return;
        }
        if start == new_end {
            for child in &old[start..old_end] {
                self.unmount(child);
            }
            return;
        }

        // 4. Unknown sequence.
        let count = new_end - start;
        let key_index: HashMap<Key, usize> = (start..new_end)
            .filter_map(|i| new[i].key.clone().map(|key| (key, i)))
            .collect();

        let mut source: SmallVec<[Option<usize>; 16]> = smallvec![None; count];
        let mut moved = false;
        let mut max_position = 0;
        let mut patched = 0;

        for (i, old_child) in old.iter().enumerate().take(old_end).skip(start) {
            if patched >= count {
                self.unmount(old_child);
                continue;
            }
            let position = old_child.key.as_ref().and_then(|key| key_index.get(key)).copied();
            match position {
                Some(k) => {
                    self.patch(Some(old_child), &mut new[k], container, None);
                    source[k - start] = Some(i);
                    if k < max_position {
                        moved = true;
                    } else {
                        max_position = k;
                    }
                    patched += 1;
                }
                None => self.unmount(old_child),
            }
        }

        if moved {
            let stable = lis_skipping_gaps(&source);
            let mut cursor = stable.len();
            for i in (0..count).rev() {
                let index = start + i;
                let anchor = self.anchor_after(new, index, end_anchor);
                match source[i] {
                    None => self.patch(None, &mut new[index], container, anchor.as_ref()),
                    Some(_) if cursor > 0 && stable[cursor - 1] == i => cursor -= 1,
                    Some(_) => self.move_node(&new[index], container, anchor.as_ref()),
                }
            }
        } else {
            // Each new node goes before the next node that is already in
            // place, so mounting left to right keeps the order.
            let mut anchors: SmallVec<[Option<P::Node>; 16]> = smallvec![None; count];
            let mut next = match new.get(new_end) {
                Some(node) => self.first_host_node(node),
                None => end_anchor.cloned(),
            };
            for i in (0..count).rev() {
                anchors[i] = next.clone();
                if source[i].is_some() {
                    next = self.first_host_node(&new[start + i]);
                }
            }
            for i in 0..count {
                if source[i].is_none() {
                    let anchor = anchors[i].take();
                    self.patch(None, &mut new[start + i], container, anchor.as_ref());
                }
            }
        }
    }
}

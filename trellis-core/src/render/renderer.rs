//! The renderer: the entry point that owns a platform and remembers what was
//! rendered into each container.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::platform::Platform;
use super::reconciler::Reconciler;
use super::vnode::VNode;

/// Renders virtual trees into host containers.
///
/// # Example
///
/// ```rust,ignore
/// let renderer = Renderer::new(MemoryPlatform::new());
/// let root = renderer.platform().create_root();
///
/// renderer.render(Some(VNode::element("p").text_child("hello")), &root);
/// assert_eq!(renderer.platform().to_markup(root), "<p>hello</p>");
///
/// renderer.render(None, &root);
/// assert_eq!(renderer.platform().to_markup(root), "");
/// ```
pub struct Renderer<P: Platform> {
    reconciler: Reconciler<P>,
    roots: Rc<RefCell<HashMap<P::Node, VNode<P::Node>>>>,
}

impl<P: Platform> Clone for Renderer<P> {
    fn clone(&self) -> Self {
        Self {
            reconciler: self.reconciler.clone(),
            roots: Rc::clone(&self.roots),
        }
    }
}

impl<P: Platform + 'static> Renderer<P> {
    pub fn new(platform: P) -> Self {
        Self::with_platform(Rc::new(platform))
    }

    pub fn with_platform(platform: Rc<P>) -> Self {
        Self {
            reconciler: Reconciler::new(platform),
            roots: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn platform(&self) -> &Rc<P> {
        self.reconciler.platform()
    }

    pub fn reconciler(&self) -> &Reconciler<P> {
        &self.reconciler
    }

    /// Render `vnode` into `container`, diffing against whatever was
    /// rendered there before. `None` unmounts the previous tree.
    pub fn render(&self, vnode: Option<VNode<P::Node>>, container: &P::Node) {
        let previous = self.roots.borrow_mut().remove(container);
        match vnode {
            Some(mut vnode) => {
                self.reconciler
                    .patch(previous.as_ref(), &mut vnode, container, None);
                self.roots.borrow_mut().insert(container.clone(), vnode);
            }
            None => {
                if let Some(previous) = previous {
                    debug!(?container, "unmounting root");
                    self.reconciler.unmount(&previous);
                }
            }
        }
    }

    /// Adopt the host nodes already inside `container` for `vnode`.
    pub fn hydrate(&self, mut vnode: VNode<P::Node>, container: &P::Node) {
        let first = self.platform().first_child(container);
        self.reconciler.hydrate_node(first, &mut vnode, container);
        self.roots.borrow_mut().insert(container.clone(), vnode);
    }

    /// See [`Reconciler::patch`].
    pub fn patch(
        &self,
        old: Option<&VNode<P::Node>>,
        new: &mut VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        self.reconciler.patch(old, new, container, anchor);
    }

    /// See [`Reconciler::unmount`].
    pub fn unmount(&self, vnode: &VNode<P::Node>) {
        self.reconciler.unmount(vnode);
    }

    /// Run `f` with the tree currently rendered into `container`.
    pub fn with_root<R>(
        &self,
        container: &P::Node,
        f: impl FnOnce(Option<&VNode<P::Node>>) -> R,
    ) -> R {
        f(self.roots.borrow().get(container))
    }
}

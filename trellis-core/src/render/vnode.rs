//! Virtual Nodes
//!
//! A [`VNode`] describes one node of the tree a render produces. VNodes are
//! built fresh on every render and thrown away after they have been diffed
//! against the next render; the only state carried forward is the realized
//! platform node (`el`), the fragment end marker and the component instance.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::{ComponentDef, ComponentInstance};
use crate::reactive::{Key, Value};

/// An event handler attached through an `on*` prop.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&[Value])>);

impl Handler {
    pub fn new(f: impl Fn(&[Value]) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) {
        (self.0)(args);
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// The value of a prop: plain data or an event handler.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Value(Value),
    Handler(Handler),
}

impl PropValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Handler(_) => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(handler) => Some(handler),
            Self::Value(_) => None,
        }
    }
}

impl<T: Into<Value>> From<T> for PropValue {
    fn from(value: T) -> Self {
        Self::Value(value.into())
    }
}

/// Props in declaration order.
pub type Props = IndexMap<Rc<str>, PropValue>;

/// Whether a prop name denotes an event handler (`onClick`, `onUpdate`, ...).
pub fn is_event_prop(name: &str) -> bool {
    name.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| !c.is_ascii_lowercase())
}

/// The prop name a handler for `event` is stored under: `click` -> `onClick`.
pub fn event_prop_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "on".to_owned(),
    }
}

/// What kind of node a VNode describes.
pub enum VNodeType<N> {
    Element(Rc<str>),
    Text,
    Comment,
    Fragment,
    Component(Rc<ComponentDef<N>>),
}

impl<N> VNodeType<N> {
    /// Two VNodes are the same node across renders only if this holds.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Text, Self::Text)
            | (Self::Comment, Self::Comment)
            | (Self::Fragment, Self::Fragment) => true,
            (Self::Component(a), Self::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<N> Clone for VNodeType<N> {
    fn clone(&self) -> Self {
        match self {
            Self::Element(tag) => Self::Element(tag.clone()),
            Self::Text => Self::Text,
            Self::Comment => Self::Comment,
            Self::Fragment => Self::Fragment,
            Self::Component(def) => Self::Component(def.clone()),
        }
    }
}

impl<N> fmt::Debug for VNodeType<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(tag) => write!(f, "Element({tag})"),
            Self::Text => f.write_str("Text"),
            Self::Comment => f.write_str("Comment"),
            Self::Fragment => f.write_str("Fragment"),
            Self::Component(def) => write!(f, "Component({})", def.name()),
        }
    }
}

/// Children of a VNode.
#[derive(Debug, Clone, Default)]
pub enum Children<N> {
    #[default]
    None,
    /// Raw text: the element's text content, or the payload of a text or
    /// comment node.
    Text(Rc<str>),
    Nodes(Vec<VNode<N>>),
}

impl<N> Children<N> {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[VNode<N>]> {
        match self {
            Self::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// One node of a virtual tree.
///
/// # Example
///
/// ```rust,ignore
/// let list = VNode::element("ul").children(
///     items.iter().map(|item| VNode::element("li").key(item.id).text_child(&item.label)),
/// );
/// ```
#[derive(Debug)]
pub struct VNode<N> {
    pub kind: VNodeType<N>,
    pub key: Option<Key>,
    pub props: Props,
    pub children: Children<N>,
    /// The realized platform node. For fragments, the start marker.
    pub el: Option<N>,
    /// The end marker of a fragment.
    pub anchor: Option<N>,
    pub component: Option<Rc<ComponentInstance<N>>>,
}

impl<N> VNode<N> {
    fn with_kind(kind: VNodeType<N>) -> Self {
        Self {
            kind,
            key: None,
            props: Props::new(),
            children: Children::None,
            el: None,
            anchor: None,
            component: None,
        }
    }

    pub fn element(tag: impl Into<Rc<str>>) -> Self {
        Self::with_kind(VNodeType::Element(tag.into()))
    }

    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::with_kind(VNodeType::Text).text_child(text)
    }

    pub fn comment(text: impl Into<Rc<str>>) -> Self {
        Self::with_kind(VNodeType::Comment).text_child(text)
    }

    pub fn fragment(children: impl IntoIterator<Item = VNode<N>>) -> Self {
        Self::with_kind(VNodeType::Fragment).children(children)
    }

    pub fn component(def: &Rc<ComponentDef<N>>) -> Self {
        Self::with_kind(VNodeType::Component(Rc::clone(def)))
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<Rc<str>>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Attach a handler for `event`, stored as the `on<Event>` prop.
    pub fn on(mut self, event: &str, handler: impl Fn(&[Value]) + 'static) -> Self {
        self.props.insert(
            Rc::from(event_prop_name(event)),
            PropValue::Handler(Handler::new(handler)),
        );
        self
    }

    /// Set a text payload. On a fragment the text becomes a single text
    /// child, since a fragment has no element of its own to hold it.
    pub fn text_child(mut self, text: impl Into<Rc<str>>) -> Self {
        self.children = Children::Text(text.into());
        self.normalize_fragment_text();
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNode<N>>) -> Self {
        self.children = Children::Nodes(children.into_iter().collect());
        self
    }

    pub fn child(mut self, child: VNode<N>) -> Self {
        match &mut self.children {
            Children::Nodes(nodes) => nodes.push(child),
            _ => self.children = Children::Nodes(vec![child]),
        }
        self
    }

    /// Turn a fragment's text payload into a text child node.
    pub(crate) fn normalize_fragment_text(&mut self) {
        if !matches!(self.kind, VNodeType::Fragment) {
            return;
        }
        let text = match &self.children {
            Children::Text(text) => text.clone(),
            _ => return,
        };
        self.children = Children::Nodes(vec![VNode::text(text)]);
    }

    pub fn same_type(&self, other: &VNode<N>) -> bool {
        self.kind.same_as(&other.kind)
    }

    /// The text payload of a text or comment node.
    pub fn text_payload(&self) -> &str {
        self.children.as_text().unwrap_or("")
    }

    pub fn el(&self) -> Option<&N> {
        self.el.as_ref()
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, VNodeType::Component(_))
    }
}

impl<N: Clone> Clone for VNode<N> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            key: self.key.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            el: self.el.clone(),
            anchor: self.anchor.clone(),
            component: self.component.clone(),
        }
    }
}

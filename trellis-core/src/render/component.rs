//! Components
//!
//! A [`ComponentDef`] is a reusable piece of UI: declared props, optional
//! local state, a `setup` step and a render closure. Mounting a component
//! VNode creates a [`ComponentInstance`] whose render runs inside an
//! [`Effect`]. The effect's scheduler queues a job, so any number of writes
//! to the state the render read cause a single re-render on the next flush.
//!
//! # Props and attrs
//!
//! Props passed to a component are split: names listed in the definition's
//! `props` and `on*` handlers are props, everything else is an attr. Data
//! props live in a shallow reactive container so renders track them;
//! handlers are kept aside and reached through [`SetupContext::emit`].

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use super::vnode::{event_prop_name, is_event_prop, Handler, PropValue, Props, VNode};
use crate::reactive::{
    reactive, shallow_reactive, untracked, Container, Effect, Key, Observed, Value,
};

/// Builds the tree of a component.
pub type RenderFn<N> = Rc<dyn Fn(&RenderContext<'_, N>) -> VNode<N>>;

/// A lifecycle hook.
pub type Hook<N> = Rc<dyn Fn(&RenderContext<'_, N>)>;

type SetupFn<N> = Rc<dyn Fn(&Observed, &SetupContext) -> SetupResult<N>>;

/// What `setup` hands back.
pub enum SetupResult<N> {
    /// A render closure, used instead of the definition's `render`.
    Render(RenderFn<N>),
    /// State exposed to the render context.
    State(Observed),
    None,
}

/// A component definition.
///
/// # Example
///
/// ```rust,ignore
/// let counter = Rc::new(
///     ComponentDef::new("Counter")
///         .data(|| Container::from_pairs([("count", 0)]))
///         .render(|ctx| {
///             VNode::element("span").text_child(ctx.get("count").to_string())
///         }),
/// );
/// ```
pub struct ComponentDef<N> {
    name: Rc<str>,
    props: Vec<Rc<str>>,
    data: Option<Rc<dyn Fn() -> Container>>,
    setup: Option<SetupFn<N>>,
    render: Option<RenderFn<N>>,
    pub(crate) before_mount: Option<Hook<N>>,
    pub(crate) mounted: Option<Hook<N>>,
    pub(crate) before_update: Option<Hook<N>>,
    pub(crate) updated: Option<Hook<N>>,
}

impl<N> ComponentDef<N> {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            props: Vec::new(),
            data: None,
            setup: None,
            render: None,
            before_mount: None,
            mounted: None,
            before_update: None,
            updated: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare the props this component accepts.
    pub fn props<S: Into<Rc<str>>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.props = names.into_iter().map(Into::into).collect();
        self
    }

    /// Local state, created per instance and made reactive.
    pub fn data(mut self, data: impl Fn() -> Container + 'static) -> Self {
        self.data = Some(Rc::new(data));
        self
    }

    pub fn setup(
        mut self,
        setup: impl Fn(&Observed, &SetupContext) -> SetupResult<N> + 'static,
    ) -> Self {
        self.setup = Some(Rc::new(setup));
        self
    }

    pub fn render(mut self, render: impl Fn(&RenderContext<'_, N>) -> VNode<N> + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    pub fn before_mount(mut self, hook: impl Fn(&RenderContext<'_, N>) + 'static) -> Self {
        self.before_mount = Some(Rc::new(hook));
        self
    }

    pub fn mounted(mut self, hook: impl Fn(&RenderContext<'_, N>) + 'static) -> Self {
        self.mounted = Some(Rc::new(hook));
        self
    }

    pub fn before_update(mut self, hook: impl Fn(&RenderContext<'_, N>) + 'static) -> Self {
        self.before_update = Some(Rc::new(hook));
        self
    }

    pub fn updated(mut self, hook: impl Fn(&RenderContext<'_, N>) + 'static) -> Self {
        self.updated = Some(Rc::new(hook));
        self
    }

    fn declares(&self, name: &str) -> bool {
        self.props.iter().any(|declared| &**declared == name)
    }
}

impl<N> fmt::Debug for ComponentDef<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("props", &self.props)
            .finish()
    }
}

/// Split raw VNode props into component props and attrs.
pub fn resolve_props<N>(def: &ComponentDef<N>, raw: &Props) -> (Props, Props) {
    let mut props = Props::new();
    let mut attrs = Props::new();
    for (key, value) in raw {
        if def.declares(key) || is_event_prop(key) {
            props.insert(key.clone(), value.clone());
        } else {
            attrs.insert(key.clone(), value.clone());
        }
    }
    (props, attrs)
}

/// Whether a component needs its props forwarded.
pub fn has_props_changed(prev: &Props, next: &Props) -> bool {
    prev.len() != next.len() || next.iter().any(|(key, value)| prev.get(key) != Some(value))
}

type HandlerMap = Rc<RefCell<IndexMap<Rc<str>, Handler>>>;

/// Handed to `setup`.
pub struct SetupContext {
    attrs: Props,
    handlers: HandlerMap,
    component: Rc<str>,
}

impl SetupContext {
    pub fn attrs(&self) -> &Props {
        &self.attrs
    }

    /// Call the `on<Event>` handler the parent passed, if any.
    pub fn emit(&self, event: &str, args: &[Value]) {
        emit(&self.handlers, &self.component, event, args);
    }
}

fn emit(handlers: &HandlerMap, component: &str, event: &str, args: &[Value]) {
    let name = event_prop_name(event);
    let handler = handlers.borrow().get(name.as_str()).cloned();
    match handler {
        Some(handler) => handler.call(args),
        None => warn!(component, event, "event is not handled"),
    }
}

/// A mounted component.
pub struct ComponentInstance<N> {
    def: Rc<ComponentDef<N>>,
    props: Observed,
    attrs: RefCell<Props>,
    handlers: HandlerMap,
    state: Option<Observed>,
    setup_state: Option<Observed>,
    render: Option<RenderFn<N>>,
    pub(crate) sub_tree: RefCell<Option<VNode<N>>>,
    pub(crate) is_mounted: Cell<bool>,
    pub(crate) update: RefCell<Option<Effect>>,
    /// Host node to adopt instead of mounting, during hydration.
    pub(crate) hydrate_from: RefCell<Option<N>>,
}

impl<N> ComponentInstance<N> {
    pub(crate) fn new(def: Rc<ComponentDef<N>>, raw_props: &Props) -> Self {
        let (props, attrs) = resolve_props(&def, raw_props);

        let data = Container::map();
        let mut handlers = IndexMap::new();
        for (key, value) in props {
            match value {
                PropValue::Value(value) => data.insert(key, value),
                PropValue::Handler(handler) => {
                    handlers.insert(key, handler);
                }
            }
        }
        let props = shallow_reactive(&data);
        let handlers: HandlerMap = Rc::new(RefCell::new(handlers));

        let state = def.data.as_ref().map(|data| reactive(&data()));

        let mut render = def.render.clone();
        let mut setup_state = None;
        if let Some(setup) = &def.setup {
            let ctx = SetupContext {
                attrs: attrs.clone(),
                handlers: handlers.clone(),
                component: def.name.clone(),
            };
            match untracked(|| setup(&props, &ctx)) {
                SetupResult::Render(f) => {
                    if render.is_some() {
                        warn!(
                            component = %def.name,
                            "setup returned a render function, render option is ignored"
                        );
                    }
                    render = Some(f);
                }
                SetupResult::State(state) => setup_state = Some(state),
                SetupResult::None => {}
            }
        }

        Self {
            def,
            props,
            attrs: RefCell::new(attrs),
            handlers,
            state,
            setup_state,
            render,
            sub_tree: RefCell::new(None),
            is_mounted: Cell::new(false),
            update: RefCell::new(None),
            hydrate_from: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn def(&self) -> &Rc<ComponentDef<N>> {
        &self.def
    }

    /// The shallow reactive props.
    pub fn props(&self) -> &Observed {
        &self.props
    }

    pub fn attrs(&self) -> Ref<'_, Props> {
        self.attrs.borrow()
    }

    pub fn state(&self) -> Option<&Observed> {
        self.state.as_ref()
    }

    pub fn setup_state(&self) -> Option<&Observed> {
        self.setup_state.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    /// The tree produced by the last render.
    pub fn sub_tree(&self) -> Ref<'_, Option<VNode<N>>> {
        self.sub_tree.borrow()
    }

    /// How many times the component has rendered.
    pub fn render_count(&self) -> usize {
        self.update.borrow().as_ref().map_or(0, Effect::run_count)
    }

    pub fn emit(&self, event: &str, args: &[Value]) {
        emit(&self.handlers, &self.def.name, event, args);
    }

    pub(crate) fn render_tree(&self) -> VNode<N> {
        let ctx = RenderContext { instance: self };
        match &self.render {
            Some(render) => render(&ctx),
            None => {
                warn!(component = %self.def.name, "component has no render function");
                VNode::comment("")
            }
        }
    }

    pub(crate) fn call_hook(&self, pick: impl Fn(&ComponentDef<N>) -> Option<&Hook<N>>) {
        if let Some(hook) = pick(&self.def) {
            let ctx = RenderContext { instance: self };
            untracked(|| hook(&ctx));
        }
    }

    /// Forward new props from the parent. Only data props that changed
    /// trigger a re-render.
    pub(crate) fn update_props(&self, raw_props: &Props) {
        let (next, attrs) = resolve_props(&self.def, raw_props);
        *self.attrs.borrow_mut() = attrs;

        let mut handlers = IndexMap::new();
        for (key, value) in &next {
            match value {
                PropValue::Value(value) => self.props.set(key, value.clone()),
                PropValue::Handler(handler) => {
                    handlers.insert(key.clone(), handler.clone());
                }
            }
        }
        *self.handlers.borrow_mut() = handlers;

        let stale: Vec<Key> = untracked(|| self.props.keys())
            .into_iter()
            .filter(|key| {
                next.get(&*key.as_prop())
                    .and_then(PropValue::as_value)
                    .is_none()
            })
            .collect();
        for key in stale {
            self.props.delete(key);
        }
    }
}

impl<N> fmt::Debug for ComponentInstance<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.def.name)
            .field("is_mounted", &self.is_mounted.get())
            .finish()
    }
}

/// What render closures and hooks see: a merged view of state, props and
/// setup state.
pub struct RenderContext<'a, N> {
    instance: &'a ComponentInstance<N>,
}

impl<N> RenderContext<'_, N> {
    /// Look up `key` in state, then props, then setup state. A missing key is
    /// reported and reads as null.
    pub fn get(&self, key: &str) -> Value {
        let instance = self.instance;
        if let Some(state) = instance.state.as_ref().filter(|s| s.has(key)) {
            return state.get(key);
        }
        if instance.props.has(key) {
            return instance.props.get(key);
        }
        if let Some(setup_state) = instance.setup_state.as_ref().filter(|s| s.has(key)) {
            return setup_state.get(key);
        }
        warn!(component = %instance.def.name, key, "property is not defined");
        Value::Null
    }

    /// Write `key` in state or setup state. Props are read-only here.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let instance = self.instance;
        if let Some(state) = instance.state.as_ref().filter(|s| s.has(key)) {
            state.set(key, value);
        } else if instance.props.has(key) {
            warn!(component = %instance.def.name, key, "props should not be mutated");
        } else if let Some(setup_state) = instance.setup_state.as_ref().filter(|s| s.has(key)) {
            setup_state.set(key, value);
        } else {
            warn!(component = %instance.def.name, key, "property is not defined");
        }
    }

    pub fn props(&self) -> &Observed {
        &self.instance.props
    }

    pub fn state(&self) -> Option<&Observed> {
        self.instance.state.as_ref()
    }

    pub fn attrs(&self) -> Props {
        self.instance.attrs.borrow().clone()
    }

    pub fn emit(&self, event: &str, args: &[Value]) {
        self.instance.emit(event, args);
    }

    pub fn instance(&self) -> &ComponentInstance<N> {
        self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Def = ComponentDef<u32>;

    fn raw(pairs: &[(&str, PropValue)]) -> Props {
        pairs
            .iter()
            .map(|(k, v)| (Rc::from(*k), v.clone()))
            .collect()
    }

    #[test]
    fn props_and_attrs_are_split() {
        let def = Def::new("Item").props(["title"]);
        let handler = PropValue::Handler(Handler::new(|_| {}));
        let (props, attrs) = resolve_props(
            &def,
            &raw(&[
                ("title", "x".into()),
                ("class", "item".into()),
                ("onSelect", handler),
            ]),
        );

        assert_eq!(props.keys().map(|k| &**k).collect::<Vec<_>>(), ["title", "onSelect"]);
        assert_eq!(attrs.keys().map(|k| &**k).collect::<Vec<_>>(), ["class"]);
    }

    #[test]
    fn props_change_detection() {
        let a = raw(&[("title", "x".into())]);
        assert!(!has_props_changed(&a, &a.clone()));
        assert!(has_props_changed(&a, &raw(&[("title", "y".into())])));
        assert!(has_props_changed(&a, &raw(&[])));
    }

    #[test]
    fn render_context_lookup_order() {
        let def = Rc::new(
            Def::new("Lookup")
                .props(["shared", "title"])
                .data(|| Container::from_pairs([("shared", "state")]))
                .setup(|_, _| {
                    SetupResult::State(reactive(&Container::from_pairs([("extra", 1)])))
                }),
        );
        let instance = ComponentInstance::new(
            def,
            &raw(&[("shared", "prop".into()), ("title", "t".into())]),
        );
        let ctx = RenderContext {
            instance: &instance,
        };

        assert_eq!(ctx.get("shared"), Value::from("state"));
        assert_eq!(ctx.get("title"), Value::from("t"));
        assert_eq!(ctx.get("extra"), Value::Int(1));
        assert_eq!(ctx.get("missing"), Value::Null);

        ctx.set("title", "changed");
        assert_eq!(ctx.get("title"), Value::from("t"));

        ctx.set("extra", 2);
        assert_eq!(ctx.get("extra"), Value::Int(2));
    }

    #[test]
    fn emit_reaches_the_parent_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let handler = PropValue::Handler(Handler::new(move |args| {
            s.borrow_mut().extend_from_slice(args);
        }));

        let def = Rc::new(Def::new("Emitter").setup(|_, ctx| {
            ctx.emit("ready", &[Value::Int(1)]);
            SetupResult::None
        }));
        let instance = ComponentInstance::new(def, &raw(&[("onReady", handler)]));
        instance.emit("ready", &[Value::Int(2)]);
        instance.emit("unknown", &[]);

        assert_eq!(*seen.borrow(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn update_props_drops_missing_keys() {
        let def = Rc::new(Def::new("Item").props(["a", "b"]));
        let instance = ComponentInstance::new(def, &raw(&[("a", 1.into()), ("b", 2.into())]));

        instance.update_props(&raw(&[("a", 3.into())]));
        assert_eq!(instance.props().get("a"), Value::Int(3));
        assert!(!instance.props().has("b"));
    }
}

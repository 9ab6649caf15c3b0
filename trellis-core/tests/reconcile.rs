//! Integration Tests for the Reconciler
//!
//! These tests render into a `MemoryPlatform` and inspect both the resulting
//! markup and the log of host operations a diff produced.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::reactive::{reactive, Container, DepKey, Key, Observed, Runtime, Value};
use trellis_core::render::{
    Children, ComponentDef, ComponentInstance, HostOp, MemoryPlatform, NodeId, Platform,
    RenderContext, Renderer, VNode,
};
use trellis_core::scheduler::run_microtasks;

type Node = VNode<NodeId>;

fn setup() -> (Renderer<MemoryPlatform>, NodeId) {
    let renderer = Renderer::new(MemoryPlatform::new());
    let root = renderer.platform().create_root();
    (renderer, root)
}

fn item(key: usize) -> Node {
    VNode::element("li").key(key).text_child(key.to_string())
}

fn list(keys: &[usize]) -> Node {
    VNode::element("ul").children(keys.iter().map(|&k| item(k)))
}

fn markup_of(keys: &[usize]) -> String {
    let items: String = keys.iter().map(|k| format!("<li>{k}</li>")).collect();
    format!("<ul>{items}</ul>")
}

fn count(ops: &[HostOp], pred: fn(&HostOp) -> bool) -> usize {
    ops.iter().filter(|op| pred(op)).count()
}

fn root_component(
    renderer: &Renderer<MemoryPlatform>,
    root: &NodeId,
) -> Rc<ComponentInstance<NodeId>> {
    renderer
        .with_root(root, |vnode| vnode.and_then(|v| v.component.clone()))
        .expect("root is a mounted component")
}

/// Rendering the same tree twice touches nothing.
#[test]
fn identical_render_is_a_no_op() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2, 3])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(list(&[1, 2, 3])), &root);
    assert!(renderer.platform().ops().is_empty());
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[1, 2, 3]));
}

/// Swapping two middle items is exactly one move.
#[test]
fn swap_is_a_single_move() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2, 3, 4])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(list(&[1, 3, 2, 4])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(ops.len(), 1, "{ops:?}");
    assert!(ops[0].is_move());
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[1, 3, 2, 4]));
}

/// Appending mounts only the new item.
#[test]
fn append_mounts_only_the_new_item() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2, 3])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(list(&[1, 2, 3, 4])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(count(&ops, HostOp::is_create), 1);
    assert_eq!(count(&ops, HostOp::is_insert), 1);
    assert_eq!(count(&ops, HostOp::is_move), 0);
    assert_eq!(count(&ops, HostOp::is_remove), 0);
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[1, 2, 3, 4]));
}

/// Prepending mounts the new item before the first existing one.
#[test]
fn prepend_mounts_before_existing_items() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(list(&[0, 1, 2])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(count(&ops, HostOp::is_create), 1);
    assert_eq!(count(&ops, HostOp::is_move), 0);
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[0, 1, 2]));
}

/// Removing from the middle unmounts exactly that item.
#[test]
fn removal_unmounts_only_the_removed_item() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2, 3])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(list(&[1, 3])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].is_remove());
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[1, 3]));
}

/// Reversing n items moves n - 1 of them.
#[test]
fn reverse_moves_all_but_one() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2, 3, 4, 5])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(list(&[5, 4, 3, 2, 1])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(count(&ops, HostOp::is_move), 4);
    assert_eq!(count(&ops, HostOp::is_create), 0);
    assert_eq!(count(&ops, HostOp::is_remove), 0);
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[5, 4, 3, 2, 1]));
}

/// Additions, removals and moves in one diff.
#[test]
fn mixed_diff_reaches_the_target_order() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2, 3, 4, 5])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(list(&[1, 5, 6, 3, 2])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(count(&ops, HostOp::is_create), 1);
    assert_eq!(count(&ops, HostOp::is_remove), 1);
    assert_eq!(count(&ops, HostOp::is_move), 2);
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[1, 5, 6, 3, 2]));
}

/// Every permutation of four items is reached without creating or removing.
#[test]
fn all_permutations_reuse_host_nodes() {
    let base = [1, 2, 3, 4];
    let mut permutations = Vec::new();
    for a in 0..4 {
        for b in 0..4 {
            for c in 0..4 {
                for d in 0..4 {
                    let idx = [a, b, c, d];
                    let mut seen = idx.to_vec();
                    seen.sort_unstable();
                    seen.dedup();
                    if seen.len() == 4 {
                        permutations.push(idx.map(|i| base[i]));
                    }
                }
            }
        }
    }
    assert_eq!(permutations.len(), 24);

    for target in permutations {
        let (renderer, root) = setup();
        renderer.render(Some(list(&base)), &root);
        let ul = renderer.platform().children(root)[0];
        let mut before = renderer.platform().children(ul);
        before.sort_unstable();
        renderer.platform().clear_ops();

        renderer.render(Some(list(&target)), &root);
        let ops = renderer.platform().take_ops();
        assert_eq!(count(&ops, HostOp::is_create), 0, "{target:?}");
        assert_eq!(count(&ops, HostOp::is_remove), 0, "{target:?}");
        assert_eq!(renderer.platform().to_markup(root), markup_of(&target));
        let mut after = renderer.platform().children(ul);
        after.sort_unstable();
        assert_eq!(after, before);
    }
}

/// Keyed fragments move their markers along with their children.
#[test]
fn keyed_fragments_reorder() {
    let (renderer, root) = setup();
    let group = |key: usize| {
        VNode::fragment([
            VNode::element("dt").text_child(format!("t{key}")),
            VNode::element("dd").text_child(format!("d{key}")),
        ])
        .key(key)
    };
    let view = |keys: &[usize]| VNode::element("dl").children(keys.iter().map(|&k| group(k)));

    renderer.render(Some(view(&[1, 2])), &root);
    assert_eq!(
        renderer.platform().to_markup(root),
        "<dl><dt>t1</dt><dd>d1</dd><dt>t2</dt><dd>d2</dd></dl>"
    );

    renderer.render(Some(view(&[2, 3, 1])), &root);
    assert_eq!(
        renderer.platform().to_markup(root),
        "<dl><dt>t2</dt><dd>d2</dd><dt>t3</dt><dd>d3</dd><dt>t1</dt><dd>d1</dd></dl>"
    );
}

/// Text inside a fragment lives between the markers, next to its siblings.
#[test]
fn fragment_text_keeps_its_siblings() {
    let (renderer, root) = setup();
    let view = |fragment: Node| {
        VNode::element("p").children([
            VNode::element("b").text_child("x"),
            fragment,
            VNode::element("i").text_child("y"),
        ])
    };

    renderer.render(Some(view(VNode::fragment([]).text_child("one"))), &root);
    assert_eq!(renderer.platform().to_markup(root), "<p><b>x</b>one<i>y</i></p>");
    renderer.platform().clear_ops();

    // A text payload assigned directly is handled the same way.
    let mut fragment = VNode::fragment([]);
    fragment.children = Children::Text("two".into());
    renderer.render(Some(view(fragment)), &root);
    assert_eq!(renderer.platform().to_markup(root), "<p><b>x</b>two<i>y</i></p>");

    let ops = renderer.platform().take_ops();
    assert_eq!(ops.len(), 1, "{ops:?}");
    assert!(matches!(ops[0], HostOp::SetText { .. }));
    assert!(!ops.iter().any(|op| matches!(op, HostOp::SetElementText { .. })));
}

/// Unkeyed children are patched by position.
#[test]
fn unkeyed_children_patch_by_position() {
    let (renderer, root) = setup();
    let view = |items: &[&str]| {
        VNode::element("ul").children(items.iter().map(|t| VNode::element("li").text_child(*t)))
    };

    renderer.render(Some(view(&["a", "b", "c"])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(view(&["a", "x"])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(count(&ops, HostOp::is_remove), 1);
    assert_eq!(count(&ops, HostOp::is_move), 0);
    assert!(ops
        .iter()
        .any(|op| matches!(op, HostOp::SetElementText { text, .. } if text == "x")));
    assert_eq!(renderer.platform().to_markup(root), "<ul><li>a</li><li>x</li></ul>");
}

/// Text children switch between text and node lists.
#[test]
fn children_switch_between_text_and_nodes() {
    let (renderer, root) = setup();
    renderer.render(Some(VNode::element("div").text_child("plain")), &root);
    assert_eq!(renderer.platform().to_markup(root), "<div>plain</div>");

    renderer.render(
        Some(VNode::element("div").children([VNode::element("b").text_child("bold")])),
        &root,
    );
    assert_eq!(renderer.platform().to_markup(root), "<div><b>bold</b></div>");

    renderer.render(Some(VNode::element("div").text_child("again")), &root);
    assert_eq!(renderer.platform().to_markup(root), "<div>again</div>");
}

/// Props are diffed; removed props are cleared.
#[test]
fn attributes_are_diffed() {
    let (renderer, root) = setup();
    renderer.render(
        Some(VNode::element("a").prop("href", "/x").prop("class", "link")),
        &root,
    );
    let el = renderer.platform().children(root)[0];
    assert_eq!(renderer.platform().attribute(el, "href").as_deref(), Some("/x"));
    renderer.platform().clear_ops();

    renderer.render(Some(VNode::element("a").prop("href", "/y")), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(ops.len(), 2, "{ops:?}");
    assert_eq!(renderer.platform().attribute(el, "href").as_deref(), Some("/y"));
    assert_eq!(renderer.platform().attribute(el, "class"), None);
}

/// Event handlers are attached and dispatchable.
#[test]
fn event_handlers_dispatch() {
    let (renderer, root) = setup();
    let clicks = Rc::new(Cell::new(0));
    let sink = clicks.clone();
    renderer.render(
        Some(VNode::element("button").on("click", move |_| sink.set(sink.get() + 1))),
        &root,
    );

    let button = renderer.platform().children(root)[0];
    assert!(renderer.platform().dispatch(button, "click", &[]));
    assert!(!renderer.platform().dispatch(button, "hover", &[]));
    assert_eq!(clicks.get(), 1);
}

/// A different root type replaces the host node in place.
#[test]
fn type_change_replaces_node() {
    let (renderer, root) = setup();
    renderer.render(
        Some(VNode::element("div").children([
            VNode::element("p").text_child("one"),
            VNode::element("hr"),
        ])),
        &root,
    );
    renderer.render(
        Some(VNode::element("div").children([
            VNode::element("span").text_child("one"),
            VNode::element("hr"),
        ])),
        &root,
    );
    assert_eq!(
        renderer.platform().to_markup(root),
        "<div><span>one</span><hr></hr></div>"
    );
}

/// Rendering nothing unmounts the previous tree.
#[test]
fn render_none_unmounts() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&[1, 2])), &root);
    renderer.render(None, &root);

    assert_eq!(renderer.platform().to_markup(root), "");
    assert!(renderer.with_root(&root, |vnode| vnode.is_none()));
}

fn counter(store: &Observed, renders: &Rc<Cell<usize>>) -> Rc<ComponentDef<NodeId>> {
    let store = store.clone();
    let renders = renders.clone();
    Rc::new(ComponentDef::new("Counter").render(move |_| {
        renders.set(renders.get() + 1);
        VNode::element("span").text_child(store.get("count").to_string())
    }))
}

/// State writes re-render a component once, on the next flush.
#[test]
fn component_rerenders_once_per_flush() {
    let (renderer, root) = setup();
    let store = reactive(&Container::from_pairs([("count", 0)]));
    let renders = Rc::new(Cell::new(0));

    renderer.render(Some(VNode::component(&counter(&store, &renders))), &root);
    assert_eq!(renderer.platform().to_markup(root), "<span>0</span>");

    for value in 1..=10 {
        store.set("count", value);
    }
    assert_eq!(renderer.platform().to_markup(root), "<span>0</span>");

    run_microtasks();
    assert_eq!(renderer.platform().to_markup(root), "<span>10</span>");
    assert_eq!(renders.get(), 2);
    assert_eq!(root_component(&renderer, &root).render_count(), 2);
}

/// Local state declared through `data` drives renders.
#[test]
fn component_local_state() {
    let (renderer, root) = setup();
    let def: Rc<ComponentDef<NodeId>> = Rc::new(
        ComponentDef::new("Toggle")
            .data(|| Container::from_pairs([("on", false)]))
            .render(|ctx| {
                let label = if ctx.get("on").as_bool().unwrap_or(false) { "on" } else { "off" };
                VNode::element("b").text_child(label)
            }),
    );
    renderer.render(Some(VNode::component(&def)), &root);
    assert_eq!(renderer.platform().to_markup(root), "<b>off</b>");

    let instance = root_component(&renderer, &root);
    instance.state().expect("data state").set("on", true);
    run_microtasks();
    assert_eq!(renderer.platform().to_markup(root), "<b>on</b>");
}

/// New props from a parent re-render the child in the same flush.
#[test]
fn props_flow_from_parent_to_child() {
    let (renderer, root) = setup();
    let store = reactive(&Container::from_pairs([("label", "first")]));

    let child: Rc<ComponentDef<NodeId>> = Rc::new(
        ComponentDef::new("Label")
            .props(["label"])
            .render(|ctx| VNode::element("em").text_child(ctx.get("label").to_string())),
    );
    let parent: Rc<ComponentDef<NodeId>> = {
        let store = store.clone();
        let child = child.clone();
        Rc::new(ComponentDef::new("Parent").render(move |_| {
            VNode::element("div").children([VNode::component(&child)
                .prop("label", store.get("label"))
                .prop("title", "attr")])
        }))
    };

    renderer.render(Some(VNode::component(&parent)), &root);
    assert_eq!(renderer.platform().to_markup(root), "<div><em>first</em></div>");

    store.set("label", "second");
    run_microtasks();
    assert_eq!(renderer.platform().to_markup(root), "<div><em>second</em></div>");
}

/// A child's emitted event reaches the handler its parent passed.
#[test]
fn emit_calls_parent_handler() {
    let (renderer, root) = setup();
    let received = Rc::new(RefCell::new(Vec::new()));

    let child: Rc<ComponentDef<NodeId>> = Rc::new(
        ComponentDef::new("Ready")
            .render(|_| VNode::element("i"))
            .mounted(|ctx| ctx.emit("ready", &[Value::from(7)])),
    );
    let sink = received.clone();
    renderer.render(
        Some(VNode::component(&child).on("ready", move |args| {
            sink.borrow_mut().extend_from_slice(args)
        })),
        &root,
    );

    assert_eq!(*received.borrow(), vec![Value::from(7)]);
}

fn record(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl Fn(&RenderContext<'_, NodeId>) {
    let log = log.clone();
    move |_| log.borrow_mut().push(name)
}

/// Hooks run around renders in lifecycle order.
#[test]
fn lifecycle_hooks_run_in_order() {
    let (renderer, root) = setup();
    let store = reactive(&Container::from_pairs([("n", 0)]));
    let log = Rc::new(RefCell::new(Vec::new()));

    let push = |name| record(&log, name);
    let def: Rc<ComponentDef<NodeId>> = {
        let store = store.clone();
        let log = log.clone();
        Rc::new(
            ComponentDef::new("Hooks")
                .before_mount(push("before_mount"))
                .mounted(push("mounted"))
                .before_update(push("before_update"))
                .updated(push("updated"))
                .render(move |_| {
                    log.borrow_mut().push("render");
                    VNode::element("p").text_child(store.get("n").to_string())
                }),
        )
    };

    renderer.render(Some(VNode::component(&def)), &root);
    assert_eq!(*log.borrow(), ["before_mount", "render", "mounted"]);

    log.borrow_mut().clear();
    store.set("n", 1);
    run_microtasks();
    assert_eq!(*log.borrow(), ["before_update", "render", "updated"]);
}

/// Unmounting a component stops its render effect.
#[test]
fn unmount_stops_component_effect() {
    let (renderer, root) = setup();
    let store = reactive(&Container::from_pairs([("count", 0)]));
    let renders = Rc::new(Cell::new(0));

    renderer.render(Some(VNode::component(&counter(&store, &renders))), &root);
    let instance = root_component(&renderer, &root);
    renderer.render(None, &root);

    assert!(!instance.is_mounted());
    assert_eq!(renderer.platform().to_markup(root), "");
    let key = DepKey::from(Key::from("count"));
    assert_eq!(Runtime::subscriber_count(store.id(), &key), 0);

    store.set("count", 1);
    run_microtasks();
    assert_eq!(renders.get(), 1);
}

/// Components inside a keyed list move with their host nodes.
#[test]
fn keyed_components_move() {
    let (renderer, root) = setup();
    let row: Rc<ComponentDef<NodeId>> = Rc::new(
        ComponentDef::new("Row")
            .props(["id"])
            .render(|ctx| VNode::element("li").text_child(ctx.get("id").to_string())),
    );
    let view = |ids: &[usize]| {
        VNode::element("ul").children(
            ids.iter()
                .map(|&id| VNode::component(&row).key(id).prop("id", id as i64)),
        )
    };

    renderer.render(Some(view(&[1, 2, 3])), &root);
    renderer.platform().clear_ops();

    renderer.render(Some(view(&[3, 1, 2])), &root);
    let ops = renderer.platform().take_ops();
    assert_eq!(count(&ops, HostOp::is_create), 0);
    assert_eq!(count(&ops, HostOp::is_move), 1);
    assert_eq!(renderer.platform().to_markup(root), markup_of(&[3, 1, 2]));
}

fn server_markup(platform: &MemoryPlatform, root: NodeId) -> NodeId {
    let p = platform.create_element("p");
    let text = platform.create_text("hello");
    platform.insert(&text, &p, None);
    platform.insert(&p, &root, None);
    platform.clear_ops();
    p
}

/// Hydration adopts matching nodes and only attaches handlers.
#[test]
fn hydrate_adopts_existing_nodes() {
    let (renderer, root) = setup();
    let p = server_markup(renderer.platform(), root);
    let clicks = Rc::new(Cell::new(0));
    let sink = clicks.clone();

    renderer.hydrate(
        VNode::element("p")
            .prop("class", "greeting")
            .on("click", move |_| sink.set(sink.get() + 1))
            .text_child("hello"),
        &root,
    );

    let ops = renderer.platform().take_ops();
    assert_eq!(count(&ops, HostOp::is_create), 0);
    assert_eq!(count(&ops, HostOp::is_insert), 0);
    assert_eq!(renderer.platform().attribute(p, "class"), None);
    assert!(renderer.platform().dispatch(p, "click", &[]));
    assert_eq!(clicks.get(), 1);

    renderer.render(Some(VNode::element("p").text_child("bye")), &root);
    assert_eq!(renderer.platform().to_markup(root), "<p>bye</p>");
    assert_eq!(renderer.platform().children(root), vec![p]);
}

/// A mismatching node is replaced by a fresh mount.
#[test]
fn hydrate_replaces_mismatched_nodes() {
    let (renderer, root) = setup();
    let p = server_markup(renderer.platform(), root);

    renderer.hydrate(VNode::element("section").text_child("hello"), &root);
    assert_eq!(renderer.platform().to_markup(root), "<section>hello</section>");
    assert_eq!(renderer.platform().parent(p), None);
}

/// Hydrated components stay reactive.
#[test]
fn hydrate_component_then_update() {
    let (renderer, root) = setup();
    let platform = renderer.platform();
    let span = platform.create_element("span");
    let text = platform.create_text("0");
    platform.insert(&text, &span, None);
    platform.insert(&span, &root, None);
    platform.clear_ops();

    let store = reactive(&Container::from_pairs([("count", 0)]));
    let renders = Rc::new(Cell::new(0));
    renderer.hydrate(VNode::component(&counter(&store, &renders)), &root);
    assert_eq!(count(&platform.take_ops(), HostOp::is_create), 0);

    store.set("count", 1);
    run_microtasks();
    assert_eq!(platform.to_markup(root), "<span>1</span>");
    assert_eq!(platform.children(root), vec![span]);
}

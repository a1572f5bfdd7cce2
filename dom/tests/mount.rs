// =============================================================================
// Mount engine integration tests
// =============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cinder_signals::{state, Scope};
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use futures::FutureExt;

use cinder_dom::dom::Document;
use cinder_dom::render::{AttrValue, Children, Mounter, UiNode};
use cinder_dom::session::SessionContext;
use cinder_dom::NodeId;

fn setup() -> (Rc<Document>, Rc<Mounter>, NodeId, Scope, LocalPool) {
    let doc = Document::new();
    let session = SessionContext::new();
    let scope = Scope::new();
    let pool = LocalPool::new();
    let root = doc.create_element("host-root");
    doc.append(doc.root(), root);
    let mounter = Mounter::new(
        doc.clone(),
        session,
        scope.clone(),
        root,
        pool.spawner(),
        Rc::new(RefCell::new(Vec::new())),
    );
    (doc, mounter, root, scope, pool)
}

#[test]
fn static_tree_mounts_once() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let ui = UiNode::element(
        "div",
        vec![("class".to_string(), "box".into())],
        Children::node(UiNode::element("p", vec![], "hello".into())),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let div = doc.query_selector("div.box").unwrap();
    assert_eq!(doc.text_content(div), "hello");
}

#[test]
fn reactive_text_replaces_only_its_own_nodes() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let count = state(1);
    let count_in = count.clone();
    let ui = UiNode::element(
        "div",
        vec![],
        Children::List(vec![
            UiNode::element("span", vec![], "before".into()),
            UiNode::fragment(Children::dynamic(move || {
                Children::Text(count_in.get().to_string())
            })),
            UiNode::element("span", vec![], "after".into()),
        ]),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let div = doc.query_selector("div").unwrap();
    let before = doc.children(div);
    assert_eq!(before.len(), 3);
    assert_eq!(doc.text_content(div), "before1after");

    count.set(2);

    let after = doc.children(div);
    assert_eq!(after.len(), 3);
    // The sibling spans keep their identity; only the text node between
    // them was replaced.
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);
    assert_ne!(after[1], before[1]);
    assert_eq!(doc.text_content(div), "before2after");
}

#[test]
fn every_write_rerenders_even_with_equal_value() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let count = state(7);
    let count_in = count.clone();
    let ui = UiNode::element(
        "div",
        vec![],
        Children::dynamic(move || Children::Text(count_in.get().to_string())),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let div = doc.query_selector("div").unwrap();
    let first_text = doc.children(div)[0];

    count.set(7);
    let second_text = doc.children(div)[0];
    assert_ne!(first_text, second_text, "writes are equality-free");
    assert_eq!(doc.text_content(div), "7");
}

#[test]
fn detached_anchor_parent_falls_back_to_component_root() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let rows = state(vec!["a".to_string(), "b".to_string()]);
    let rows_in = rows.clone();
    let ui = UiNode::element(
        "ul",
        vec![],
        Children::dynamic(move || {
            Children::List(
                rows_in
                    .get()
                    .into_iter()
                    .map(|row| UiNode::element("li", vec![], Children::Text(row)))
                    .collect(),
            )
        }),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let ul = doc.query_selector("ul").unwrap();
    assert_eq!(doc.children(ul).len(), 2);

    // A sibling effect replaced the shared container; the anchor's parent
    // is gone from the tree.
    doc.detach(ul);

    rows.set(vec!["x".to_string()]);

    // Future insertions resolve relative to the component root.
    let items: Vec<_> = doc
        .children(root)
        .into_iter()
        .filter(|&n| doc.tag(n).as_deref() == Some("li"))
        .collect();
    assert_eq!(items.len(), 1);
    assert_eq!(doc.text_content(items[0]), "x");
}

#[test]
fn reactive_attribute_updates_through_effect() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let active = state(false);
    let active_in = active.clone();
    let ui = UiNode::element(
        "button",
        vec![(
            "aria-pressed".to_string(),
            AttrValue::dynamic(move || AttrValue::Static(active_in.get().to_string())),
        )],
        Children::Empty,
    );
    pool.run_until(mounter.mount(ui, root, false));

    let button = doc.query_selector("button").unwrap();
    assert_eq!(doc.attribute(button, "aria-pressed").as_deref(), Some("false"));

    active.set(true);
    assert_eq!(doc.attribute(button, "aria-pressed").as_deref(), Some("true"));
}

#[test]
fn boolean_sentinels_toggle_presence() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let disabled = state(true);
    let disabled_in = disabled.clone();
    let ui = UiNode::element(
        "input",
        vec![(
            "disabled".to_string(),
            AttrValue::dynamic(move || disabled_in.get().into()),
        )],
        Children::Empty,
    );
    pool.run_until(mounter.mount(ui, root, false));

    let input = doc.query_selector("input").unwrap();
    assert!(doc.has_attribute(input, "disabled"));
    assert_eq!(doc.attribute(input, "disabled").as_deref(), Some(""));

    disabled.set(false);
    assert!(!doc.has_attribute(input, "disabled"));
}

#[test]
fn event_handlers_receive_native_event_or_detail() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let natives = Rc::new(Cell::new(0));
    let details = Rc::new(RefCell::new(Vec::new()));
    let natives_in = natives.clone();
    let details_in = details.clone();

    let ui = UiNode::element(
        "button",
        vec![(
            "onClick".to_string(),
            AttrValue::handler(move |arg| match arg {
                cinder_dom::render::EventArg::Native(_) => natives_in.set(natives_in.get() + 1),
                cinder_dom::render::EventArg::Detail(detail) => {
                    details_in.borrow_mut().push(detail.clone())
                }
            }),
        )],
        Children::Empty,
    );
    pool.run_until(mounter.mount(ui, root, false));

    let button = doc.query_selector("button").unwrap();
    doc.dispatch(button, &cinder_dom::Event::native("click"));
    assert_eq!(natives.get(), 1);

    doc.dispatch(
        button,
        &cinder_dom::Event::custom("click", serde_json::json!({"x": 1})),
    );
    assert_eq!(*details.borrow(), vec![serde_json::json!({"x": 1})]);
}

#[test]
fn ref_attribute_captures_the_node() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let reference = state(None::<NodeId>);
    let ui = UiNode::element(
        "canvas",
        vec![("ref".to_string(), AttrValue::Ref(reference.clone()))],
        Children::Empty,
    );
    pool.run_until(mounter.mount(ui, root, false));

    let canvas = doc.query_selector("canvas").unwrap();
    assert_eq!(reference.get(), Some(canvas));
}

#[test]
fn raw_html_appends_verbatim() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let ui = UiNode::element(
        "div",
        vec![],
        Children::RawHtml("<b>bold</b><i>italic</i>".to_string()),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let div = doc.query_selector("div").unwrap();
    assert_eq!(doc.children(div).len(), 2);
    assert_eq!(doc.outer_html(div), "<div><b>bold</b><i>italic</i></div>");
}

#[test]
fn slot_marker_becomes_projection_point() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let ui = UiNode::element("div", vec![], Children::Slot);
    pool.run_until(mounter.mount(ui, root, false));

    assert!(doc.query_selector("slot").is_some());
}

#[test]
fn portal_redirects_into_target() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let elsewhere = doc.create_element("aside");
    doc.append(doc.root(), elsewhere);

    let ui = UiNode::element(
        "div",
        vec![],
        Children::Portal {
            target: elsewhere,
            child: Box::new(Children::node(UiNode::element(
                "p",
                vec![],
                "teleported".into(),
            ))),
        },
    );
    pool.run_until(mounter.mount(ui, root, false));

    assert_eq!(doc.text_content(elsewhere), "teleported");
}

#[test]
fn svg_subtree_inherits_namespace() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let ui = UiNode::element(
        "svg",
        vec![],
        Children::node(UiNode::element(
            "use",
            vec![("href".to_string(), "#icon".into())],
            Children::Empty,
        )),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let svg = doc.query_selector("svg").unwrap();
    let use_el = doc.query_selector("use").unwrap();
    assert!(doc.is_svg(svg));
    assert!(doc.is_svg(use_el));
    assert_eq!(doc.attribute(use_el, "href").as_deref(), Some("#icon"));
}

#[test]
fn pending_child_suspends_without_blocking_siblings() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let (sender, receiver) = oneshot::channel::<()>();
    let slow = UiNode::element(
        "section",
        vec![],
        Children::Pending(
            async move {
                let _ = receiver.await;
                Children::Text("slow".to_string())
            }
            .boxed_local(),
        ),
    );
    let fast = UiNode::element("p", vec![], "fast".into());

    let ui = UiNode::fragment(Children::List(vec![slow, fast]));
    let spawner = pool.spawner();
    spawner
        .spawn_local(mounter.mount(ui, root, false).map(|_| ()))
        .unwrap();
    pool.run_until_stalled();

    // The sibling is mounted; the suspended node is not.
    assert!(doc.query_selector("p").is_some());
    assert!(doc.query_selector("section").is_none());

    sender.send(()).unwrap();
    pool.run_until_stalled();

    let section = doc.query_selector("section").unwrap();
    assert_eq!(doc.text_content(section), "slow");
}

#[test]
fn dynamic_pending_defers_anchor_swap() {
    let (doc, mounter, root, _scope, mut pool) = setup();

    let generation = state(0);
    let generation_in = generation.clone();
    let ui = UiNode::element(
        "div",
        vec![],
        Children::dynamic(move || {
            let generation = generation_in.get();
            if generation == 0 {
                Children::Text("first".to_string())
            } else {
                Children::Pending(
                    async move { Children::Text(format!("gen {generation}")) }.boxed_local(),
                )
            }
        }),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let div = doc.query_selector("div").unwrap();
    assert_eq!(doc.text_content(div), "first");

    // The write returns immediately; the swap happens at resolution.
    generation.set(1);
    assert_eq!(doc.text_content(div), "first");

    pool.run_until_stalled();
    assert_eq!(doc.text_content(div), "gen 1");
}

#[test]
fn scope_reset_stops_rerendering() {
    let (doc, mounter, root, scope, mut pool) = setup();

    let count = state(0);
    let count_in = count.clone();
    let ui = UiNode::element(
        "div",
        vec![],
        Children::dynamic(move || Children::Text(count_in.get().to_string())),
    );
    pool.run_until(mounter.mount(ui, root, false));

    let div = doc.query_selector("div").unwrap();
    assert_eq!(doc.text_content(div), "0");

    scope.reset();
    count.set(5);
    assert_eq!(doc.text_content(div), "0");
}

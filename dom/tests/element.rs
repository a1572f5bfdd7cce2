// =============================================================================
// Component instance lifecycle integration tests
// =============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::executor::LocalPool;
use serde_json::{json, Value};

use cinder_dom::dom::Document;
use cinder_dom::element::{CustomElementCallbacks, ElementDefinition};
use cinder_dom::render::{Children, UiNode};
use cinder_dom::session::SessionContext;
use cinder_dom::{MountError, NodeId, StyleSheet};

fn host(doc: &Rc<Document>, attrs: &[(&str, &str)]) -> NodeId {
    let host = doc.create_element("x-widget");
    for (name, value) in attrs {
        doc.set_attribute(host, name, value);
    }
    doc.append(doc.root(), host);
    host
}

#[test]
fn connect_renders_props_into_shadow_root() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[("name", "ada"), ("count", "3")]);

    let definition = ElementDefinition::new(|props, _ctx| {
        let name = props.cell("name").unwrap();
        let count = props.cell("count").unwrap();
        Ok(Children::node(UiNode::element(
            "p",
            vec![],
            Children::dynamic(move || {
                Children::Text(format!(
                    "{} x{}",
                    name.get().as_str().unwrap_or_default(),
                    count.get()
                ))
            }),
        )))
    })
    .observed_attributes(&["name", "count"]);

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let shadow = doc.shadow_root(host).unwrap();
    assert_eq!(doc.text_content(shadow), "ada x3");
}

#[test]
fn attribute_change_updates_cell_in_place() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[("label", "old")]);

    let definition = ElementDefinition::new(|props, _ctx| {
        let label = props.cell("label").unwrap();
        Ok(Children::dynamic(move || {
            Children::Text(label.get().as_str().unwrap_or_default().to_string())
        }))
    })
    .observed_attributes(&["label"]);

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let shadow = doc.shadow_root(host).unwrap();
    assert_eq!(doc.text_content(shadow), "old");
    let cell_before = instance.props().unwrap().cell("label").unwrap();

    doc.set_attribute(host, "label", "new");
    pool.run_until(instance.attribute_changed("label", Some("old"), Some("new")))
        .unwrap();

    assert_eq!(doc.text_content(shadow), "new");
    // Same cell object, updated in place.
    let cell_after = instance.props().unwrap().cell("label").unwrap();
    assert_eq!(cell_before.get(), cell_after.get());
    assert_eq!(cell_after.get(), json!("new"));
}

#[test]
fn key_change_forces_full_remount() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[("key", "1")]);

    let mounts = Rc::new(Cell::new(0));
    let mounts_in = mounts.clone();
    let definition = ElementDefinition::new(move |_props, _ctx| {
        mounts_in.set(mounts_in.get() + 1);
        Ok(Children::Text("body".to_string()))
    });

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();
    assert_eq!(mounts.get(), 1);

    // Unrelated attribute: no remount.
    pool.run_until(instance.attribute_changed("title", None, Some("t")))
        .unwrap();
    assert_eq!(mounts.get(), 1);

    // Identity change: teardown + remount.
    pool.run_until(instance.attribute_changed("key", Some("1"), Some("2")))
        .unwrap();
    assert_eq!(mounts.get(), 2);
}

#[test]
fn error_render_receives_the_error_as_state() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[]);

    let definition = ElementDefinition::new(|_props, _ctx| {
        Err(MountError::new("boom"))
    })
    .error(|props, _ctx| {
        let error = props.cell("error").unwrap();
        Ok(Children::dynamic(move || {
            Children::Text(format!(
                "failed: {}",
                error.get().as_str().unwrap_or_default()
            ))
        }))
    });

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let shadow = doc.shadow_root(host).unwrap();
    assert_eq!(doc.text_content(shadow), "failed: boom");
}

#[test]
fn error_without_error_render_propagates() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[]);

    let definition =
        ElementDefinition::new(|_props, _ctx| Err(MountError::new("fatal")));

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    let result = pool.run_until(instance.connected());
    assert!(result.is_err());
}

#[test]
fn suspense_renders_first_then_primary_replaces_it() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[]);

    let definition = ElementDefinition::new(|_props, _ctx| {
        Ok(Children::Text("ready".to_string()))
    })
    .suspense(|_props, _ctx| Ok(Children::Text("loading".to_string())));

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let shadow = doc.shadow_root(host).unwrap();
    assert_eq!(doc.text_content(shadow), "ready");
}

#[test]
fn on_event_attribute_dispatches_custom_event() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[]);

    // A parent listening on the host hears the re-emitted event.
    let heard = Rc::new(RefCell::new(Vec::new()));
    {
        let heard = heard.clone();
        doc.add_event_listener(
            host,
            "save",
            Rc::new(move |event| {
                heard.borrow_mut().push(event.detail.clone().unwrap_or(Value::Null))
            }),
        );
    }

    let emitter_slot: Rc<RefCell<Option<cinder_dom::element::EventEmitter>>> =
        Rc::new(RefCell::new(None));
    let emitter_in = emitter_slot.clone();
    let definition = ElementDefinition::new(move |props, _ctx| {
        *emitter_in.borrow_mut() = props.emitter("onSave");
        Ok(Children::Empty)
    })
    .observed_attributes(&["onSave"]);

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let emitter = emitter_slot.borrow().clone().unwrap();
    emitter(Some(json!({"id": 9})));

    assert_eq!(*heard.borrow(), vec![json!({"id": 9})]);
}

#[test]
fn on_mount_callbacks_run_after_mount_completes() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[]);

    let order = Rc::new(RefCell::new(Vec::new()));
    let order_in = order.clone();
    let definition = ElementDefinition::new(move |_props, ctx| {
        let order = order_in.clone();
        ctx.on_mount(move || order.borrow_mut().push("mounted"));
        order_in.borrow_mut().push("render");
        Ok(Children::Text("x".to_string()))
    });

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    assert_eq!(*order.borrow(), vec!["render", "mounted"]);
}

#[test]
fn scoped_css_rerenders_with_reactive_values() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[]);

    let color = cinder_signals::state("red".to_string());
    let color_in = color.clone();
    let definition = ElementDefinition::new(move |_props, ctx| {
        let color = color_in.clone();
        ctx.css(move || format!("p {{ color: {}; }}", color.get()));
        Ok(Children::node(UiNode::element("p", vec![], "hi".into())))
    });

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let shadow = doc.shadow_root(host).unwrap();
    let style = doc
        .children(shadow)
        .into_iter()
        .find(|&n| doc.tag(n).as_deref() == Some("style"))
        .unwrap();
    assert_eq!(doc.text_content(style), "p { color: red; }");

    color.set("blue".to_string());
    assert_eq!(doc.text_content(style), "p { color: blue; }");
}

#[test]
fn ambient_stylesheets_adopt_with_import_fallback() {
    let doc = Document::new();
    doc.add_style_sheet(StyleSheet::inline(vec!["body { margin: 0; }".into()]));
    doc.add_style_sheet(StyleSheet::external(
        "https://cdn.example/theme.css",
        vec![],
        false,
    ));

    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[]);

    let definition = ElementDefinition::new(|_props, _ctx| Ok(Children::Empty));
    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let shadow = doc.shadow_root(host).unwrap();
    let sheets = doc.adopted_sheets(shadow);
    assert_eq!(sheets.len(), 1);
    assert_eq!(
        sheets[0].css_text(),
        "body { margin: 0; }@import url('https://cdn.example/theme.css');"
    );
}

#[test]
fn disconnect_kills_live_subscriptions() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[("n", "1")]);

    let definition = ElementDefinition::new(|props, _ctx| {
        let n = props.cell("n").unwrap();
        Ok(Children::dynamic(move || {
            Children::Text(n.get().to_string())
        }))
    })
    .observed_attributes(&["n"]);

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let shadow = doc.shadow_root(host).unwrap();
    assert_eq!(doc.text_content(shadow), "1");

    let cell = instance.props().unwrap().cell("n").unwrap();
    instance.disconnected();

    // Writes after disconnect reach no effect.
    cell.set(json!(2));
    assert_eq!(doc.text_content(shadow), "1");
}

#[test]
fn use_id_prefers_server_assigned_ids() {
    let doc = Document::new();
    let session = SessionContext::new();
    let mut pool = LocalPool::new();
    let host = host(&doc, &[("data-id-1", "srv-1")]);

    let ids = Rc::new(RefCell::new(Vec::new()));
    let ids_in = ids.clone();
    let definition = ElementDefinition::new(move |_props, ctx| {
        ids_in.borrow_mut().push(ctx.use_id());
        ids_in.borrow_mut().push(ctx.use_id());
        Ok(Children::Empty)
    });

    let instance = definition.instantiate(doc.clone(), session, host, pool.spawner());
    pool.run_until(instance.connected()).unwrap();

    let ids = ids.borrow();
    assert_eq!(ids[0], "srv-1");
    assert!(ids[1].starts_with("uid-"));
}

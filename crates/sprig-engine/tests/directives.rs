//! Integration tests - directives against a live tree
//!
//! Markup → engine → reactive updates, evaluated by the reference
//! expression language.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{Page, settle};
use sprig_engine::DiagnosticKind;
use sprig_reactive::{Value, scheduler};

// ============================================================================
// TEXT, VISIBILITY AND STATE
// ============================================================================

#[test]
fn test_text_follows_state() {
    let page = Page::start(r#"<div id="root" r-data="{ count: 1 }"><span id="out" r-text="count * 2"></span></div>"#);
    assert_eq!(page.text("out"), "2");

    page.state("root").set("count", Value::Number(5.0));
    // Writes are batched until the flush runs
    assert_eq!(page.text("out"), "2");
    settle();
    assert_eq!(page.text("out"), "10");
}

#[test]
fn test_show_toggles_display() {
    let page = Page::start(r#"<div id="root" r-data="{ visible: false }"><p id="msg" r-show="visible">hi</p></div>"#);
    assert!(!page.displayed("msg"));

    page.state("root").set("visible", Value::Bool(true));
    settle();
    assert!(page.displayed("msg"));
}

#[test]
fn test_nested_state_sees_outer_keys() {
    let page = Page::start(
        r#"<div id="outer" r-data="{ user: 'ana' }">
             <div id="inner" r-data="{ greeting: 'hi' }"><p id="line" r-text="greeting + ' ' + user"></p></div>
           </div>"#,
    );
    assert_eq!(page.text("line"), "hi ana");

    page.state("outer").set("user", Value::string("ivo"));
    settle();
    assert_eq!(page.text("line"), "hi ivo");
    assert!(!page.state("inner").has("user"));
}

#[test]
fn test_empty_state_expression_installs_empty_record() {
    let page = Page::start(r#"<div id="root" r-data><button id="btn" @click="clicked = true"></button></div>"#);
    page.click("btn");
    assert!(page.state("root").get("clicked").is_truthy());
}

#[test]
fn test_state_gets_helpers() {
    let page = Page::start(r#"<div id="root" r-data="{ a: 1 }"></div>"#);
    let state = page.state("root");
    assert!(matches!(state.get("$nextTick"), Value::Function(_)));
    assert!(matches!(state.get("$el"), Value::Handle(_)));
}

#[test]
fn test_provided_global_drives_bindings() {
    let page = Page::load(r#"<div id="root" r-data="app"><h1 id="title" r-text="title"></h1></div>"#);
    let app = page
        .engine
        .provide("app", Value::from_json(&serde_json::json!({ "title": "Inbox" })));
    page.engine.start();
    settle();
    assert_eq!(page.text("title"), "Inbox");

    app.as_observable().unwrap().set("title", Value::string("Archive"));
    settle();
    assert_eq!(page.text("title"), "Archive");
}

// ============================================================================
// UPDATE SEMANTICS
// ============================================================================

#[test]
fn test_rerender_is_idempotent() {
    let page = Page::start(r#"<div id="root" r-data="{ name: 'ana' }"><span id="out" r-text="name"></span></div>"#);
    let state = page.state("root");
    let out = page.find("out");
    let registered = state.observer_count("name");

    for _ in 0..3 {
        state.notify("name");
        settle();
    }
    assert_eq!(page.text("out"), "ana");
    assert_eq!(state.observer_count("name"), registered);
    assert_eq!(page.engine.binding_count(out), 1);
}

#[test]
fn test_unchanged_write_schedules_nothing() {
    let page = Page::start(r#"<div id="root" r-data="{ a: 1 }"><span id="out" r-text="a"></span></div>"#);
    let before = scheduler::flush_count();

    page.state("root").set("a", Value::Number(1.0));
    assert_eq!(scheduler::pending_count(), 0);
    settle();
    assert_eq!(scheduler::flush_count(), before);
}

#[test]
fn test_writes_in_one_turn_render_once() {
    let page = Page::load(
        r#"<div id="root" r-data="{ a: 1, b: 2, c: 3 }"><span id="sum" r-text="count(a + b + c)"></span></div>"#,
    );
    let renders = Rc::new(Cell::new(0));
    let counter = renders.clone();
    page.engine.provide(
        "count",
        Value::function("count", move |_, args| {
            counter.set(counter.get() + 1);
            Ok(args.first().cloned().unwrap_or_default())
        }),
    );
    page.engine.start();
    settle();
    assert_eq!(page.text("sum"), "6");
    assert_eq!(renders.get(), 1);

    let state = page.state("root");
    let before = scheduler::flush_count();
    state.set("a", Value::Number(10.0));
    state.set("b", Value::Number(20.0));
    state.set("c", Value::Number(30.0));
    settle();

    assert_eq!(page.text("sum"), "60");
    assert_eq!(renders.get(), 2);
    assert_eq!(scheduler::flush_count(), before + 1);
}

#[test]
fn test_effect_reruns_on_state_change() {
    let page = Page::load(r#"<div id="root" r-data="{ count: 0 }" r-effect="record(count)"></div>"#);
    let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = seen.clone();
    page.engine.provide(
        "record",
        Value::function("record", move |_, args| {
            sink.borrow_mut().push(args.first().map(Value::to_number).unwrap_or_default());
            Ok(Value::Undefined)
        }),
    );
    page.engine.start();
    settle();
    assert_eq!(*seen.borrow(), vec![0.0]);

    page.state("root").set("count", Value::Number(3.0));
    settle();
    assert_eq!(*seen.borrow(), vec![0.0, 3.0]);
}

// ============================================================================
// ATTRIBUTE BINDINGS
// ============================================================================

#[test]
fn test_attribute_bindings() {
    let page = Page::start(
        r#"<div id="root" r-data="{ on: false, color: 'red', url: '/a', busy: true }">
             <p id="p" class="base" :class="{ active: on }" :style="{ backgroundColor: color }"></p>
             <a id="link" :href="url"></a>
             <button id="btn" r-bind:disabled="busy"></button>
           </div>"#,
    );
    let (p, btn) = (page.find("p"), page.find("btn"));
    {
        let tree = page.tree.borrow();
        assert!(tree.has_class(p, "base"));
        assert!(!tree.has_class(p, "active"));
        assert_eq!(tree.style_property(p, "background-color").as_deref(), Some("red"));
        assert!(tree.disabled(btn));
    }
    assert_eq!(page.attribute("link", "href").as_deref(), Some("/a"));

    let state = page.state("root");
    state.set("on", Value::Bool(true));
    state.set("color", Value::string("blue"));
    state.set("url", Value::Null);
    state.set("busy", Value::Bool(false));
    settle();

    let tree = page.tree.borrow();
    assert!(tree.has_class(p, "base"));
    assert!(tree.has_class(p, "active"));
    assert_eq!(tree.style_property(p, "background-color").as_deref(), Some("blue"));
    assert!(!tree.disabled(btn));
    drop(tree);
    assert_eq!(page.attribute("link", "href"), None);
}

// ============================================================================
// TWO-WAY VALUES
// ============================================================================

#[test]
fn test_model_round_trip() {
    let page = Page::start(
        r#"<div id="root" r-data="{ name: 'ana' }"><input id="name" r-model="name"><span id="out" r-text="name"></span></div>"#,
    );
    assert_eq!(page.value("name"), "ana");
    assert_eq!(page.text("out"), "ana");

    page.type_into("name", "ivo");
    assert_eq!(page.state("root").get("name").as_str(), Some("ivo"));
    settle();
    assert_eq!(page.text("out"), "ivo");

    page.state("root").set("name", Value::string("zoe"));
    settle();
    assert_eq!(page.value("name"), "zoe");
    assert_eq!(page.text("out"), "zoe");
}

#[test]
fn test_model_checkbox_and_number() {
    let page = Page::start(
        r#"<div id="root" r-data="{ done: true, form: null }">
             <input id="done" type="checkbox" r-model="done">
             <input id="qty" type="number" r-model="form.qty">
           </div>"#,
    );
    let done = page.find("done");
    assert!(page.tree.borrow().checked(done));

    page.tree.borrow_mut().set_checked(done, false).unwrap();
    page.dispatch("done", sprig_dom::Event::input());
    assert!(!page.state("root").get("done").is_truthy());

    page.type_into("qty", "42");
    let form = page.state("root").get("form");
    assert_eq!(form.get_property("qty").unwrap().to_number(), 42.0);
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_key_modifier_filters_and_prevents() {
    let page = Page::start(
        r#"<div id="root" r-data="{ submitted: false }"><input id="field" @keydown.enter.prevent="submitted = true"></div>"#,
    );
    assert!(page.key("field", "a"));
    assert!(!page.state("root").get("submitted").is_truthy());

    assert!(!page.key("field", "Enter"));
    assert!(page.state("root").get("submitted").is_truthy());
}

#[test]
fn test_stop_modifier_and_event_record() {
    let page = Page::start(
        r#"<div id="root" r-data="{ outer: 0, inner: 0, last: '' }">
             <div id="wrap" @click="outer++">
               <button id="inner" @click.stop="inner++"></button>
               <button id="plain" r-on:click="last = $event.type; $event.preventDefault()"></button>
             </div>
           </div>"#,
    );
    let state = page.state("root");

    page.click("inner");
    assert_eq!(state.get("inner").to_number(), 1.0);
    assert_eq!(state.get("outer").to_number(), 0.0);

    assert!(!page.click("plain"));
    assert_eq!(state.get("last").as_str(), Some("click"));
    assert_eq!(state.get("outer").to_number(), 1.0);
}

#[test]
fn test_event_updates_render() {
    let page = Page::start(
        r#"<div id="root" r-data="{ count: 0 }"><button id="inc" @click="count++"></button><span id="out" r-text="count"></span></div>"#,
    );
    page.click("inc");
    page.click("inc");
    settle();
    assert_eq!(page.text("out"), "2");
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_failing_expression_is_not_fatal() {
    let page = Page::start(
        r#"<div id="root" r-data="{ ok: 'fine' }"><p id="bad" r-text="missing()" :title="ok"></p><p id="good" r-text="ok"></p></div>"#,
    );
    assert_eq!(page.text("bad"), "");
    assert_eq!(page.attribute("bad", "title").as_deref(), Some("fine"));
    assert_eq!(page.text("good"), "fine");

    let diagnostics = page.diagnostics.take();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Evaluation);
    assert_eq!(diagnostics[0].expression, "missing()");

    page.state("root").set("ok", Value::string("still"));
    settle();
    assert_eq!(page.text("good"), "still");
    // Bindings next to the failing one on the same element keep updating
    assert_eq!(page.attribute("bad", "title").as_deref(), Some("still"));
}

#[test]
fn test_huge_list_index_is_reported() {
    let page = Page::start(
        r#"<div id="root" r-data="{ items: [1, 2] }"><button id="grow" @click="items[4000000000] = 1"></button><span id="n" r-text="items.length"></span></div>"#,
    );
    page.click("grow");
    settle();

    let diagnostics = page.diagnostics.take();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Evaluation);
    assert_eq!(diagnostics[0].expression, "items[4000000000] = 1");
    assert_eq!(page.text("n"), "2");
}

#[test]
fn test_absent_path_is_silent() {
    let page = Page::start(r#"<div id="root" r-data="{ user: null }"><p id="name" r-text="user.name"></p></div>"#);
    assert_eq!(page.text("name"), "");
    assert!(page.diagnostics.is_empty());

    page.state("root")
        .set("user", Value::from_json(&serde_json::json!({ "name": "ana" })));
    settle();
    assert_eq!(page.text("name"), "ana");
}

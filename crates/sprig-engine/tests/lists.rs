//! Integration tests - list expansion

mod common;

use common::{Page, settle};
use sprig_engine::DiagnosticKind;
use sprig_reactive::{Value, scheduler};

const NUMBERS: &str = r#"<ul id="list" r-data="{ items: [1, 2, 3] }"><template r-for="item in items"><li r-text="item"></li></template></ul>"#;

// ============================================================================
// RENDERING
// ============================================================================

#[test]
fn test_list_renders_each_item() {
    let page = Page::start(NUMBERS);
    assert_eq!(page.child_texts("list"), vec!["1", "2", "3"]);

    // The template is gone, a marker stands in its place
    let list = page.find("list");
    let tree = page.tree.borrow();
    assert!(tree.elements_by_tag("template").is_empty());
    assert_eq!(tree.children(list).len(), 4);
}

#[test]
fn test_push_rerenders_list() {
    let page = Page::start(NUMBERS);
    let items = page.state("list").get("items");
    let items = items.as_observable().unwrap();

    let before = scheduler::flush_count();
    items.push(vec![Value::Number(4.0)]);
    settle();

    assert_eq!(page.child_texts("list"), vec!["1", "2", "3", "4"]);
    assert_eq!(scheduler::flush_count(), before + 1);
}

#[test]
fn test_list_operations_from_events() {
    let page = Page::start(
        r#"<div id="root" r-data="{ items: ['b', 'a'] }">
             <button id="add" @click="items.push('c')"></button>
             <button id="sort" @click="items.sort()"></button>
             <button id="drop" @click="items.shift()"></button>
             <ul id="list"><template r-for="item in items"><li r-text="item"></li></template></ul>
           </div>"#,
    );
    assert_eq!(page.child_texts("list"), vec!["b", "a"]);

    page.click("add");
    settle();
    assert_eq!(page.child_texts("list"), vec!["b", "a", "c"]);

    page.click("sort");
    settle();
    assert_eq!(page.child_texts("list"), vec!["a", "b", "c"]);

    page.click("drop");
    settle();
    assert_eq!(page.child_texts("list"), vec!["b", "c"]);
}

#[test]
fn test_replacing_collection_rerenders() {
    let page = Page::start(NUMBERS);
    page.state("list")
        .set("items", Value::from_json(&serde_json::json!([7, 8])));
    settle();
    assert_eq!(page.child_texts("list"), vec!["7", "8"]);
}

#[test]
fn test_non_list_renders_nothing() {
    let page = Page::start(NUMBERS);
    page.state("list").set("items", Value::Null);
    settle();
    assert!(page.child_texts("list").is_empty());
    assert!(page.diagnostics.is_empty());
}

#[test]
fn test_replaced_collection_is_forgotten() {
    let page = Page::start(
        r#"<div id="root" r-data="{ items: [1, 2] }">
             <button id="keep" @click="items = items.filter(x => x > 1)"></button>
             <span id="count" r-text="items.length"></span>
             <ul id="list"><template r-for="item in items"><li r-text="item"></li></template></ul>
           </div>"#,
    );
    let old = page.state("root").get("items");
    let old = old.as_observable().unwrap().clone();
    assert!(old.observer_count("length") > 0);

    page.click("keep");
    settle();
    assert_eq!(page.child_texts("list"), vec!["2"]);
    assert_eq!(old.observer_count("length"), 0);
    assert_eq!(old.observer_count("push"), 0);

    let before = scheduler::flush_count();
    old.push(vec![Value::Number(3.0)]);
    settle();
    assert_eq!(scheduler::flush_count(), before);
    assert_eq!(page.child_texts("list"), vec!["2"]);
    assert_eq!(page.text("count"), "1");
}

// ============================================================================
// ITEM SCOPES
// ============================================================================

#[test]
fn test_index_alias_and_default() {
    let page = Page::start(
        r#"<div r-data="{ names: ['ana', 'ivo'] }">
             <ol id="explicit"><template r-for="(name, i) in names"><li r-text="i + ':' + name"></li></template></ol>
             <ol id="implicit"><template r-for="name in names"><li r-text="index"></li></template></ol>
           </div>"#,
    );
    assert_eq!(page.child_texts("explicit"), vec!["0:ana", "1:ivo"]);
    assert_eq!(page.child_texts("implicit"), vec!["0", "1"]);
}

#[test]
fn test_item_shadows_enclosing_name() {
    let page = Page::start(
        r#"<ul id="list" r-data="{ item: 'outer', label: 'L', items: ['x', 'y'] }">
             <template r-for="item in items"><li r-text="label + ':' + item"></li></template>
           </ul>"#,
    );
    assert_eq!(page.child_texts("list"), vec!["L:x", "L:y"]);

    page.state("list").set("label", Value::string("M"));
    settle();
    assert_eq!(page.child_texts("list"), vec!["M:x", "M:y"]);
}

#[test]
fn test_item_writes_reach_records() {
    let page = Page::start(
        r#"<div id="root" r-data="{ todos: [{ title: 'a', done: false }] }">
             <ul id="list"><template r-for="todo in todos">
               <li><button @click="todo.done = true"></button><span r-text="todo.title"></span></li>
             </template></ul>
           </div>"#,
    );
    let list = page.find("list");
    let button = {
        let tree = page.tree.borrow();
        let li = tree.element_children(list)[0];
        tree.element_children(li)[0]
    };
    let mut click = sprig_dom::Event::new("click");
    sprig_dom::dispatch_event(&page.tree, button, &mut click);

    let todos = page.state("root").get("todos");
    let first = todos.get_property("0").unwrap();
    assert!(first.get_property("done").unwrap().is_truthy());
}

// ============================================================================
// GRAMMAR
// ============================================================================

#[test]
fn test_bad_list_grammar_is_reported() {
    let page = Page::start(
        r#"<div r-data="{ items: [] }"><template id="tpl" r-for="items"><li></li></template></div>"#,
    );
    let diagnostics = page.diagnostics.take();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Grammar);
    // The template is left in place
    assert!(page.tree.borrow().element_by_id("tpl").is_some());
}

#[test]
fn test_list_on_non_template_is_reported() {
    let page = Page::start(
        r#"<div r-data="{ items: [1] }"><p id="p" r-for="item in items" r-text="'kept'"></p></div>"#,
    );
    let diagnostics = page.diagnostics.take();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Grammar);
    assert_eq!(page.text("p"), "kept");
}

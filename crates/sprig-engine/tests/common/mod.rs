//! Shared fixture: a markup page driven by the reference evaluator

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sprig_dom::{DomTree, Event, NodeId, dispatch_event};
use sprig_engine::{CollectingSink, Config, Engine};
use sprig_expr::ScriptEvaluator;
use sprig_reactive::{Observable, event_loop};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Page {
    pub tree: Rc<RefCell<DomTree>>,
    pub engine: Engine<DomTree>,
    pub diagnostics: CollectingSink,
}

impl Page {
    /// Load `markup` under the document without starting the engine
    pub fn load(markup: &str) -> Self {
        init_tracing();
        let mut tree = DomTree::new();
        tree.load_markup(NodeId::ROOT, markup).unwrap();
        let tree = Rc::new(RefCell::new(tree));
        let diagnostics = CollectingSink::new();
        let engine = Engine::new(tree.clone(), Rc::new(ScriptEvaluator::new()), Config::default())
            .with_diagnostics(Rc::new(diagnostics.clone()));
        Self {
            tree,
            engine,
            diagnostics,
        }
    }

    /// Load, start and let every queued update run
    pub fn start(markup: &str) -> Self {
        let page = Self::load(markup);
        page.engine.start();
        settle();
        page
    }

    pub fn find(&self, id: &str) -> NodeId {
        self.tree
            .borrow()
            .element_by_id(id)
            .unwrap_or_else(|| panic!("no element #{id}"))
    }

    pub fn text(&self, id: &str) -> String {
        let node = self.find(id);
        self.tree.borrow().text_content(node)
    }

    pub fn attribute(&self, id: &str, name: &str) -> Option<String> {
        let node = self.find(id);
        self.tree.borrow().get_attribute(node, name).map(str::to_string)
    }

    pub fn displayed(&self, id: &str) -> bool {
        let node = self.find(id);
        self.tree.borrow().is_displayed(node)
    }

    /// Texts of the element children of `#id`
    pub fn child_texts(&self, id: &str) -> Vec<String> {
        let node = self.find(id);
        let tree = self.tree.borrow();
        tree.element_children(node)
            .into_iter()
            .map(|child| tree.text_content(child))
            .collect()
    }

    /// Dispatch `event` at `#id`; false if a listener prevented the default
    pub fn dispatch(&self, id: &str, mut event: Event) -> bool {
        let node = self.find(id);
        dispatch_event(&self.tree, node, &mut event)
    }

    pub fn click(&self, id: &str) -> bool {
        self.dispatch(id, Event::new("click"))
    }

    pub fn key(&self, id: &str, key: &str) -> bool {
        self.dispatch(id, Event::key("keydown", key))
    }

    /// Simulate typing: set the control value, then fire `input`
    pub fn type_into(&self, id: &str, value: &str) {
        let node = self.find(id);
        self.tree.borrow_mut().set_value(node, value).unwrap();
        self.dispatch(id, Event::input());
    }

    pub fn value(&self, id: &str) -> String {
        let node = self.find(id);
        self.tree.borrow().value(node)
    }

    /// Nearest state visible from `#id`
    pub fn state(&self, id: &str) -> Observable {
        let node = self.find(id);
        self.engine
            .scope_of(node)
            .and_then(|scope| scope.nearest_state())
            .unwrap_or_else(|| panic!("#{id} has no state"))
    }
}

/// Drain microtasks and timers
pub fn settle() {
    event_loop::run_until_idle();
}

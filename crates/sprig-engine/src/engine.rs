//! Engine - Main entry point

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use sprig_reactive::{EvalContext, EvalError, Evaluator, ReactiveError, Scope, Value, scheduler};

use crate::binding::Binding;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
use crate::directive::DirectiveError;
use crate::list::ListState;
use crate::surface::Surface;
use crate::Config;

/// Name of the deferred-callback helper in every scope
pub const NEXT_TICK: &str = "$nextTick";
/// Name of the current-element handle
pub const ELEMENT: &str = "$el";

/// State shared by the engine and every callback it installs.
///
/// Callbacks hold it weakly; dropping the [`Engine`] silences them.
pub(crate) struct Runtime<S: Surface> {
    pub surface: Rc<RefCell<S>>,
    pub evaluator: Rc<dyn Evaluator>,
    pub config: Config,
    pub sink: RefCell<Rc<dyn DiagnosticSink>>,
    /// Host-provided bindings at the root of every scope chain
    pub globals: Scope,
    /// Processed-node set
    pub processed: RefCell<HashSet<S::Node>>,
    /// Scope resolved for each processed element
    pub scopes: RefCell<HashMap<S::Node, Scope>>,
    pub bindings: RefCell<HashMap<S::Node, Vec<Rc<Binding<S>>>>>,
    /// Nodes whose descendants wait on a pending initializer
    pub suspended: RefCell<HashSet<S::Node>>,
    /// List placeholders by template node
    pub lists: RefCell<HashMap<S::Node, ListState<S>>>,
    /// Watcher pause flag
    pub paused: Cell<bool>,
    pub watching: Cell<bool>,
}

impl<S: Surface> Runtime<S> {
    /// Context for evaluating on `node`
    pub fn context(&self, node: S::Node, event: Option<Value>) -> EvalContext {
        let ctx = EvalContext::for_element(Value::handle(node));
        match event {
            Some(event) => ctx.with_event(event),
            None => ctx,
        }
    }

    /// Evaluate one expression. Absence yields `undefined` silently, any
    /// other failure is reported and yields `undefined`.
    pub fn evaluate(&self, node: S::Node, expression: &str, scope: &Scope) -> Value {
        let result = self.evaluator.evaluate(expression, scope, &self.context(node, None));
        self.settle(expression, result)
    }

    /// Execute statements with the same error policy as [`Self::evaluate`]
    pub fn execute(&self, node: S::Node, statements: &str, scope: &Scope, event: Option<Value>) -> Value {
        let result = self.evaluator.execute(statements, scope, &self.context(node, event));
        self.settle(statements, result)
    }

    fn settle(&self, expression: &str, result: Result<Value, EvalError>) -> Value {
        match result {
            Ok(value) => value,
            Err(err) if err.is_absence() => {
                tracing::trace!(expression, error = %err, "absent value");
                Value::Undefined
            }
            Err(err) => {
                self.report(DiagnosticKind::Evaluation, expression, err.to_string());
                Value::Undefined
            }
        }
    }

    pub fn report(&self, kind: DiagnosticKind, expression: &str, message: String) {
        let sink = self.sink.borrow().clone();
        sink.report(Diagnostic {
            kind,
            expression: expression.to_string(),
            message,
        });
    }

    /// Keep `binding` alive until its node is torn down
    pub fn keep(&self, binding: Rc<Binding<S>>) {
        self.bindings
            .borrow_mut()
            .entry(binding.node)
            .or_default()
            .push(binding);
    }

    /// Release every binding in the subtree under `root` (inclusive),
    /// forgetting scopes and processed markers. List placeholders found on
    /// the way release their rendered instances too.
    pub fn teardown(&self, root: S::Node) {
        let nodes = {
            let surface = self.surface.borrow();
            let mut nodes = Vec::new();
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                nodes.push(node);
                stack.extend(surface.children(node).into_iter().rev());
            }
            nodes
        };
        for node in nodes {
            self.release_node(node);
        }
    }

    fn release_node(&self, node: S::Node) {
        self.processed.borrow_mut().remove(&node);
        self.suspended.borrow_mut().remove(&node);
        self.scopes.borrow_mut().remove(&node);
        let bindings = self.bindings.borrow_mut().remove(&node).unwrap_or_default();
        for binding in bindings {
            binding.release(&mut self.surface.borrow_mut());
        }

        let list = {
            let mut lists = self.lists.borrow_mut();
            let template = lists
                .iter()
                .find(|(template, list)| **template == node || list.marker == node)
                .map(|(template, _)| *template);
            template.and_then(|t| lists.remove(&t).map(|list| (t, list)))
        };
        if let Some((template, list)) = list {
            tracing::debug!(?template, instances = list.instances.len(), "list released");
            if template != node {
                self.release_node(template);
            }
            for instance in list.instances {
                self.teardown(instance);
            }
        }
    }

    /// Nearest ancestor scope of `node`
    pub fn ancestor_scope(&self, node: S::Node) -> Option<Scope> {
        let surface = self.surface.borrow();
        let scopes = self.scopes.borrow();
        let mut current = surface.parent(node);
        while let Some(ancestor) = current {
            if let Some(scope) = scopes.get(&ancestor) {
                return Some(scope.clone());
            }
            current = surface.parent(ancestor);
        }
        None
    }

    /// Whether an ancestor of `node` is waiting on a pending initializer
    pub fn under_suspended(&self, node: S::Node) -> bool {
        let suspended = self.suspended.borrow();
        if suspended.is_empty() {
            return false;
        }
        let surface = self.surface.borrow();
        let mut current = surface.parent(node);
        while let Some(ancestor) = current {
            if suspended.contains(&ancestor) {
                return true;
            }
            current = surface.parent(ancestor);
        }
        false
    }

    /// Walk every state-declaring node in document order, then watch
    pub fn start(self: &Rc<Self>) {
        if self.watching.get() {
            return;
        }
        let roots = self
            .surface
            .borrow()
            .elements_with_attribute(&self.config.attribute("data"));
        tracing::info!(roots = roots.len(), "Sprig engine starting");
        for root in roots {
            self.visit(root, None);
        }
        self.start_watcher();
    }
}

/// The Sprig binding engine
pub struct Engine<S: Surface> {
    pub(crate) runtime: Rc<Runtime<S>>,
}

impl<S: Surface> Engine<S> {
    /// Create an engine over `surface`, evaluating directives with `evaluator`
    pub fn new(surface: Rc<RefCell<S>>, evaluator: Rc<dyn Evaluator>, config: Config) -> Self {
        tracing::info!(prefix = %config.prefix, "Sprig engine {} initialized", crate::VERSION);
        let globals = Scope::locals([(NEXT_TICK.to_string(), scheduler::next_tick_function())], None);
        Self {
            runtime: Rc::new(Runtime {
                surface,
                evaluator,
                config,
                sink: RefCell::new(Rc::new(TracingSink) as Rc<dyn DiagnosticSink>),
                globals,
                processed: RefCell::new(HashSet::new()),
                scopes: RefCell::new(HashMap::new()),
                bindings: RefCell::new(HashMap::new()),
                suspended: RefCell::new(HashSet::new()),
                lists: RefCell::new(HashMap::new()),
                paused: Cell::new(false),
                watching: Cell::new(false),
            }),
        }
    }

    /// Route diagnostics to `sink` instead of the log
    pub fn with_diagnostics(self, sink: Rc<dyn DiagnosticSink>) -> Self {
        *self.runtime.sink.borrow_mut() = sink;
        self
    }

    pub fn config(&self) -> &Config {
        &self.runtime.config
    }

    /// Bind `name` in the globals scope. Structured values are wrapped;
    /// the stored value is returned so the host can keep mutating it.
    pub fn provide(&self, name: &str, value: Value) -> Value {
        let value = value.wrap();
        self.runtime.globals.define(name, value.clone());
        value
    }

    /// The globals scope
    pub fn globals(&self) -> &Scope {
        &self.runtime.globals
    }

    /// Process every state-declaring element, then start watching for
    /// insertions. Calling it again is a no-op.
    pub fn start(&self) {
        self.runtime.start();
    }

    /// Start now if the document has loaded, otherwise once it fires
    /// `DOMContentLoaded`
    pub fn auto_start(&self) {
        if !self.runtime.surface.borrow().is_loading() {
            self.start();
            return;
        }
        tracing::debug!("document loading, deferring start");
        let weak = Rc::downgrade(&self.runtime);
        let mut surface = self.runtime.surface.borrow_mut();
        let document = surface.document();
        surface.add_listener(
            document,
            "DOMContentLoaded",
            Rc::new(move |_: &mut S::Event| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.start();
                }
            }),
        );
    }

    /// Attach directives to `node` and its descendants. Without a scope
    /// the nearest ancestor's scope (else the globals) is used.
    pub fn process_node(&self, node: S::Node, scope: Option<Scope>) {
        self.runtime.visit(node, scope);
    }

    /// Scope resolved for a processed element
    pub fn scope_of(&self, node: S::Node) -> Option<Scope> {
        self.runtime.scopes.borrow().get(&node).cloned()
    }

    pub fn is_processed(&self, node: S::Node) -> bool {
        self.runtime.processed.borrow().contains(&node)
    }

    /// Release every binding in the subtree under `node`
    pub fn teardown(&self, node: S::Node) {
        tracing::debug!(?node, "teardown");
        self.runtime.teardown(node);
    }

    /// Whether insertion records are currently being discarded
    pub fn watcher_paused(&self) -> bool {
        self.runtime.paused.get()
    }

    /// Number of live bindings on `node`
    pub fn binding_count(&self, node: S::Node) -> usize {
        self.runtime.bindings.borrow().get(&node).map_or(0, Vec::len)
    }
}

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Surface error: {0}")]
    Surface(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Reactive error: {0}")]
    Reactive(#[from] ReactiveError),

    #[error("Directive error: {0}")]
    Directive(#[from] DirectiveError),
}

impl EngineError {
    pub(crate) fn surface(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EngineError::Surface(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_dom::{DomError, DomTree, NodeId};

    struct NullEvaluator;

    impl Evaluator for NullEvaluator {
        fn evaluate(&self, expr: &str, _: &Scope, _: &EvalContext) -> Result<Value, EvalError> {
            match expr {
                "missing.x" => Err(EvalError::Absent {
                    property: "x".into(),
                    base: "undefined",
                }),
                "boom()" => Err(EvalError::Reference("boom".into())),
                other => Ok(Value::string(other)),
            }
        }

        fn execute(&self, statements: &str, scope: &Scope, ctx: &EvalContext) -> Result<Value, EvalError> {
            self.evaluate(statements, scope, ctx)
        }

        fn free_identifiers(&self, _: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn engine() -> (Engine<DomTree>, crate::CollectingSink) {
        let sink = crate::CollectingSink::new();
        let engine = Engine::new(
            Rc::new(RefCell::new(DomTree::new())),
            Rc::new(NullEvaluator),
            Config::default(),
        )
        .with_diagnostics(Rc::new(sink.clone()));
        (engine, sink)
    }

    #[test]
    fn test_error_policy() {
        let (engine, sink) = engine();
        let runtime = &engine.runtime;
        let scope = Scope::root();
        assert!(runtime.evaluate(NodeId::ROOT, "missing.x", &scope).is_undefined());
        assert!(sink.is_empty());
        assert!(runtime.evaluate(NodeId::ROOT, "boom()", &scope).is_undefined());
        let reported = sink.take();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind, DiagnosticKind::Evaluation);
        assert_eq!(reported[0].expression, "boom()");
    }

    #[test]
    fn test_provide_wraps_structured_values() {
        let (engine, _) = engine();
        let app = engine.provide("app", Value::from_json(&serde_json::json!({"n": 1})));
        assert!(app.as_observable().is_some());
        assert!(engine.globals().lookup("app").unwrap().same(&app));
        assert!(engine.globals().lookup(NEXT_TICK).is_some());
        let n = engine.provide("n", Value::Number(2.0));
        assert_eq!(n.to_number(), 2.0);
    }

    #[test]
    fn test_surface_error_converts() {
        let err = EngineError::surface(DomError::NotFound(NodeId(7)));
        assert!(err.to_string().contains("not found"));
        let err: anyhow::Error = err.into();
        assert!(err.to_string().starts_with("Surface error"));
    }
}

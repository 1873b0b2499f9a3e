//! Directive Processor
//!
//! One handler per directive kind. Reactive handlers build a [`Binding`]
//! whose update evaluates the expression, applies the result to the
//! surface and registers the expression's root variables as dependencies.
//! Evaluation always finishes before the surface is borrowed.

use std::cell::Cell;
use std::rc::Rc;

use sprig_reactive::observable::LIST_OPERATIONS;
use sprig_reactive::{Observable, Pending, Scope, Settled, Task, Value, scheduler};

use crate::binding::Binding;
use crate::diagnostics::DiagnosticKind;
use crate::directive::{Directive, Modifier};
use crate::engine::{ELEMENT, EngineError, NEXT_TICK, Runtime};
use crate::surface::{Surface, SurfaceEvent};

/// Outcome of a state-init directive
pub(crate) enum StateInit {
    /// The node has its own state scope
    Installed(Scope),
    /// Not structured; the enclosing scope stays
    Inherited,
    /// Initializer is still pending
    Deferred(Pending),
}

/// Per-element value of a generic attribute binding
enum AttributeUpdate {
    ClassText(String),
    ClassTokens(Vec<(String, bool)>),
    StyleText(String),
    StyleProperties(Vec<(String, String)>),
    Flag(bool),
    Set(String),
    Remove,
    Skip,
}

impl<S: Surface> Runtime<S> {
    // === State ===

    pub(crate) fn init_state(&self, node: S::Node, expression: &str, scope: &Scope) -> Result<StateInit, EngineError> {
        let value = if expression.trim().is_empty() {
            Value::empty_record()
        } else {
            self.evaluate(node, expression, scope)
        };
        match value {
            Value::Pending(pending) => Ok(StateInit::Deferred(pending)),
            value if value.is_structured() => Ok(StateInit::Installed(self.install_state(node, value, scope)?)),
            _ => Ok(StateInit::Inherited),
        }
    }

    /// Wrap `value` and install it as `node`'s own scope
    pub(crate) fn install_state(&self, node: S::Node, value: Value, parent: &Scope) -> Result<Scope, EngineError> {
        let state = Observable::new(value)?;
        if !state.has(NEXT_TICK) {
            state.set(NEXT_TICK, scheduler::next_tick_function());
        }
        if !state.has(ELEMENT) {
            state.set(ELEMENT, Value::handle(node));
        }
        tracing::debug!(?node, keys = state.len(), "state installed");
        Ok(Scope::with_state(state, Some(parent)))
    }

    /// Run an initializer; returns the future it yielded, if any
    pub(crate) fn run_init(&self, node: S::Node, statements: &str, scope: &Scope) -> Option<Pending> {
        match self.execute(node, statements, scope, None) {
            Value::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    // === Dependencies ===

    /// Register `binding` on exactly the observables its expression reads now
    pub(crate) fn track_dependencies(&self, binding: &Binding<S>) {
        binding.retrack(self.dependencies(binding));
    }

    fn dependencies(&self, binding: &Binding<S>) -> Vec<(Observable, String)> {
        let mut dependencies = Vec::new();
        for name in self.evaluator.free_identifiers(&binding.expression) {
            if name.starts_with('$') || name.starts_with('_') {
                continue;
            }
            let Some(value) = binding.scope.lookup(&name) else {
                continue;
            };
            if value.is_undefined() {
                continue;
            }
            if let Some(state) = binding.scope.defining_state(&name) {
                dependencies.push((state, name));
            }
            if let Some(list) = value.as_observable().filter(|obs| obs.is_list()) {
                dependencies.push((list.clone(), "length".to_string()));
                for op in LIST_OPERATIONS {
                    dependencies.push((list.clone(), op.to_string()));
                }
            }
        }
        dependencies
    }

    /// Keys of the nearest state an effect re-runs on, read or not
    fn state_keys(scope: &Scope) -> Vec<(Observable, String)> {
        let Some(state) = scope.nearest_state() else {
            return Vec::new();
        };
        state
            .keys()
            .into_iter()
            .filter(|key| !key.starts_with('$') && !key.starts_with('_'))
            .map(|key| (state.clone(), key))
            .collect()
    }

    // === Effect ===

    pub(crate) fn bind_effect(self: &Rc<Self>, node: S::Node, statements: &str, scope: &Scope) {
        let weak = Rc::downgrade(self);
        let binding = Binding::new(node, Directive::Effect, statements, scope.clone(), move |binding| {
            if let Some(runtime) = weak.upgrade() {
                runtime.execute(binding.node, &binding.expression, &binding.scope, None);
                let mut dependencies = Self::state_keys(&binding.scope);
                dependencies.extend(runtime.dependencies(binding));
                binding.retrack(dependencies);
            }
            Ok(())
        });
        binding.retrack(Self::state_keys(scope));
        scheduler::enqueue(binding.task().clone());
        self.keep(binding);
    }

    // === Reactive renders ===

    /// Build a reactive binding, run it once and keep it
    fn bind_reactive(
        self: &Rc<Self>,
        node: S::Node,
        directive: Directive,
        expression: &str,
        scope: &Scope,
        apply: impl Fn(&Runtime<S>, S::Node, Value) -> Result<(), EngineError> + 'static,
    ) -> Rc<Binding<S>> {
        let weak = Rc::downgrade(self);
        let binding = Binding::new(node, directive, expression, scope.clone(), move |binding| {
            let Some(runtime) = weak.upgrade() else {
                return Ok(());
            };
            let value = runtime.evaluate(binding.node, &binding.expression, &binding.scope);
            let applied = apply(&runtime, binding.node, value);
            runtime.track_dependencies(binding);
            applied?;
            Ok(())
        });
        if let Err(err) = binding.update() {
            tracing::warn!(?node, directive = %binding.directive, error = %err, "initial render failed");
        }
        self.keep(binding.clone());
        binding
    }

    pub(crate) fn bind_show(self: &Rc<Self>, node: S::Node, expression: &str, scope: &Scope) {
        self.bind_reactive(node, Directive::Show, expression, scope, |runtime, node, value| {
            runtime
                .surface
                .borrow_mut()
                .set_displayed(node, value.is_truthy())
                .map_err(EngineError::surface)
        });
    }

    pub(crate) fn bind_text(self: &Rc<Self>, node: S::Node, expression: &str, scope: &Scope) {
        self.bind_reactive(node, Directive::Text, expression, scope, |runtime, node, value| {
            let text = if value.is_nullish() {
                String::new()
            } else {
                value.display_string()
            };
            runtime
                .surface
                .borrow_mut()
                .set_text(node, &text)
                .map_err(EngineError::surface)
        });
    }

    pub(crate) fn bind_attribute(self: &Rc<Self>, node: S::Node, attribute: &str, expression: &str, scope: &Scope) {
        let directive = Directive::Bind {
            attribute: attribute.to_string(),
        };
        let name = attribute.to_string();
        self.bind_reactive(node, directive, expression, scope, move |runtime, node, value| {
            let update = attribute_update(&name, &value);
            let mut surface = runtime.surface.borrow_mut();
            apply_attribute(&mut *surface, node, &name, update).map_err(EngineError::surface)
        });
    }

    // === Two-way value ===

    pub(crate) fn bind_model(self: &Rc<Self>, node: S::Node, path: &str, scope: &Scope) {
        let path = path.trim();
        let binding = self.bind_reactive(node, Directive::Model, path, scope, |runtime, node, value| {
            let mut surface = runtime.surface.borrow_mut();
            let rendered = match surface.input_type(node).as_str() {
                "checkbox" => surface.set_checked(node, value.is_truthy()),
                "radio" => {
                    let own = Value::string(surface.value(node));
                    surface.set_checked(node, own.same(&value))
                }
                _ => {
                    let text = if value.is_nullish() {
                        String::new()
                    } else {
                        value.display_string()
                    };
                    surface.set_value(node, &text)
                }
            };
            rendered.map_err(EngineError::surface)
        });

        let weak = Rc::downgrade(self);
        let weak_binding = Rc::downgrade(&binding);
        let listener = Rc::new(move |_: &mut S::Event| {
            let (Some(runtime), Some(binding)) = (weak.upgrade(), weak_binding.upgrade()) else {
                return;
            };
            let value = {
                let surface = runtime.surface.borrow();
                match surface.input_type(binding.node).as_str() {
                    "checkbox" => Value::Bool(surface.checked(binding.node)),
                    "number" | "range" => Value::Number(parse_number(&surface.value(binding.node))),
                    _ => Value::string(surface.value(binding.node)),
                }
            };
            if let Err(err) = write_path(&binding.scope, &binding.expression, value) {
                runtime.report(DiagnosticKind::Evaluation, &binding.expression, err.to_string());
            }
        });
        let id = self
            .surface
            .borrow_mut()
            .add_listener(node, &self.config.model_event, listener);
        binding.add_listener(id);
    }

    // === Events ===

    pub(crate) fn bind_event(
        self: &Rc<Self>,
        node: S::Node,
        event: &str,
        modifiers: Vec<Modifier>,
        statements: &str,
        scope: &Scope,
    ) {
        let directive = Directive::On {
            event: event.to_string(),
            modifiers: modifiers.clone(),
        };
        // Event bindings are not reactive; the task is never registered
        let binding = Binding::new(node, directive, statements, scope.clone(), |_| Ok(()));
        let weak = Rc::downgrade(self);
        let weak_binding = Rc::downgrade(&binding);
        let listener = Rc::new(move |event: &mut S::Event| {
            for modifier in &modifiers {
                if let Some(key) = modifier.required_key() {
                    if event.key() != Some(key) {
                        return;
                    }
                }
            }
            if modifiers.contains(&Modifier::Prevent) {
                event.prevent_default();
            }
            if modifiers.contains(&Modifier::Stop) {
                event.stop_propagation();
            }
            let (Some(runtime), Some(binding)) = (weak.upgrade(), weak_binding.upgrade()) else {
                return;
            };
            let flags = EventFlags::default();
            let value = flags.event_value(&*event, binding.node);
            runtime.execute(binding.node, &binding.expression, &binding.scope, Some(value));
            flags.apply(event);
        });
        let id = self.surface.borrow_mut().add_listener(node, event, listener);
        binding.add_listener(id);
        self.keep(binding);
    }

    /// Resume the children of `node` once its initializer settles
    pub(crate) fn suspend_children(self: &Rc<Self>, node: S::Node, statements: &str, pending: Pending, scope: Scope) {
        tracing::debug!(?node, "children suspended on initializer");
        self.suspended.borrow_mut().insert(node);
        let weak = Rc::downgrade(self);
        let statements = statements.to_string();
        pending.on_settle(move |outcome| {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            if let Settled::Rejected(reason) = outcome {
                runtime.report(DiagnosticKind::AsyncRejected, &statements, reason);
                return;
            }
            let weak = Rc::downgrade(&runtime);
            scheduler::enqueue(Task::new(move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.resume_children(node, &scope);
                }
                Ok(())
            }));
        });
    }
}

/// `preventDefault`/`stopPropagation` requests made by a statement
#[derive(Default, Clone)]
struct EventFlags {
    prevent: Rc<Cell<bool>>,
    stop: Rc<Cell<bool>>,
}

impl EventFlags {
    /// The `$event` record
    fn event_value<N: Copy + 'static>(&self, event: &impl SurfaceEvent, node: N) -> Value {
        let prevent = self.prevent.clone();
        let stop = self.stop.clone();
        Value::record([
            ("type".to_string(), Value::string(event.event_type())),
            ("key".to_string(), event.key().map(Value::string).unwrap_or_default()),
            ("currentTarget".to_string(), Value::handle(node)),
            (
                "preventDefault".to_string(),
                Value::function("preventDefault", move |_, _| {
                    prevent.set(true);
                    Ok(Value::Undefined)
                }),
            ),
            (
                "stopPropagation".to_string(),
                Value::function("stopPropagation", move |_, _| {
                    stop.set(true);
                    Ok(Value::Undefined)
                }),
            ),
        ])
    }

    fn apply(&self, event: &mut impl SurfaceEvent) {
        if self.prevent.get() {
            event.prevent_default();
        }
        if self.stop.get() {
            event.stop_propagation();
        }
    }
}

fn attribute_update(attribute: &str, value: &Value) -> AttributeUpdate {
    let is_record = matches!(value, Value::Record(_)) || value.as_observable().is_some_and(|o| !o.is_list());
    match attribute {
        "class" => match value {
            Value::String(s) => AttributeUpdate::ClassText(s.to_string()),
            _ if is_record => AttributeUpdate::ClassTokens(
                value
                    .keys()
                    .into_iter()
                    .map(|key| {
                        let on = value.get_property(&key).is_ok_and(|v| v.is_truthy());
                        (key, on)
                    })
                    .collect(),
            ),
            _ => AttributeUpdate::Skip,
        },
        "style" => match value {
            Value::String(s) => AttributeUpdate::StyleText(s.to_string()),
            _ if is_record => AttributeUpdate::StyleProperties(
                value
                    .keys()
                    .into_iter()
                    .map(|key| {
                        let v = value.get_property(&key).unwrap_or_default();
                        let text = if v.is_nullish() { String::new() } else { v.display_string() };
                        (css_property_name(&key), text)
                    })
                    .collect(),
            ),
            _ => AttributeUpdate::Skip,
        },
        "disabled" | "checked" | "selected" => AttributeUpdate::Flag(value.is_truthy()),
        _ => match value {
            Value::Undefined | Value::Null | Value::Bool(false) => AttributeUpdate::Remove,
            other => AttributeUpdate::Set(other.display_string()),
        },
    }
}

fn apply_attribute<S: Surface>(
    surface: &mut S,
    node: S::Node,
    attribute: &str,
    update: AttributeUpdate,
) -> Result<(), S::Error> {
    match update {
        AttributeUpdate::ClassText(text) => surface.set_attribute(node, "class", &text),
        AttributeUpdate::ClassTokens(tokens) => {
            for (token, on) in tokens {
                if on {
                    surface.add_class(node, &token)?;
                } else {
                    surface.remove_class(node, &token)?;
                }
            }
            Ok(())
        }
        AttributeUpdate::StyleText(css) => surface.set_style_text(node, &css),
        AttributeUpdate::StyleProperties(properties) => {
            for (name, value) in properties {
                surface.set_style_property(node, &name, &value)?;
            }
            Ok(())
        }
        AttributeUpdate::Flag(on) => {
            if on {
                surface.set_attribute(node, attribute, "")?;
            } else {
                surface.remove_attribute(node, attribute)?;
            }
            match attribute {
                "disabled" => surface.set_disabled(node, on),
                "checked" => surface.set_checked(node, on),
                _ => surface.set_selected(node, on),
            }
        }
        AttributeUpdate::Set(text) => surface.set_attribute(node, attribute, &text),
        AttributeUpdate::Remove => surface.remove_attribute(node, attribute),
        AttributeUpdate::Skip => Ok(()),
    }
}

/// `backgroundColor` → `background-color`
fn css_property_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

/// Number input value; NaN when empty or unparsable
fn parse_number(text: &str) -> f64 {
    text.trim().parse().unwrap_or(f64::NAN)
}

/// Write `value` at a dotted `path`, creating intermediate records when
/// they are absent or falsy
fn write_path(scope: &Scope, path: &str, value: Value) -> Result<(), sprig_reactive::EvalError> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };
    let Some((first, middle)) = parents.split_first() else {
        scope.assign(last, value);
        return Ok(());
    };

    let mut current = scope.lookup(first).unwrap_or_default();
    if !current.is_truthy() {
        scope.assign(first, Value::empty_record());
        current = scope.lookup(first).unwrap_or_default();
    }
    for segment in middle {
        let mut next = current.get_property(segment)?;
        if !next.is_truthy() {
            current.set_property(segment, Value::empty_record())?;
            next = current.get_property(segment)?;
        }
        current = next;
    }
    current.set_property(last, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(json: serde_json::Value) -> (Observable, Scope) {
        let obs = Observable::new(Value::from_json(&json)).unwrap();
        let scope = Scope::with_state(obs.clone(), None);
        (obs, scope)
    }

    #[test]
    fn test_write_path_creates_records() {
        let (obs, scope) = state(serde_json::json!({"settings": null}));
        write_path(&scope, "settings.steps.count", Value::Number(3.0)).unwrap();
        let settings = obs.get("settings");
        assert!(settings.as_observable().is_some());
        let count = settings
            .get_property("steps")
            .and_then(|steps| steps.get_property("count"))
            .unwrap();
        assert_eq!(count.to_number(), 3.0);
    }

    #[test]
    fn test_write_path_single_segment() {
        let (obs, scope) = state(serde_json::json!({"name": "ana"}));
        write_path(&scope, "name", Value::string("ivo")).unwrap();
        assert_eq!(obs.get("name").as_str(), Some("ivo"));
    }

    #[test]
    fn test_class_record_update() {
        let value = Value::from_json(&serde_json::json!({"active": true, "hidden": 0}));
        let AttributeUpdate::ClassTokens(tokens) = attribute_update("class", &value) else {
            panic!("expected per-token update");
        };
        assert_eq!(tokens, vec![("active".to_string(), true), ("hidden".to_string(), false)]);
    }

    #[test]
    fn test_generic_attribute_values() {
        assert!(matches!(attribute_update("href", &Value::Null), AttributeUpdate::Remove));
        assert!(matches!(attribute_update("href", &Value::Bool(false)), AttributeUpdate::Remove));
        assert!(matches!(
            attribute_update("tabindex", &Value::Number(0.0)),
            AttributeUpdate::Set(ref s) if s == "0"
        ));
        assert!(matches!(attribute_update("disabled", &Value::string("yes")), AttributeUpdate::Flag(true)));
        assert!(matches!(attribute_update("class", &Value::Number(1.0)), AttributeUpdate::Skip));
    }

    #[test]
    fn test_css_property_name() {
        assert_eq!(css_property_name("backgroundColor"), "background-color");
        assert_eq!(css_property_name("color"), "color");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert!(parse_number("").is_nan());
        assert!(parse_number("4x").is_nan());
    }
}

//! Observable wrapper
//!
//! Wraps a record or list so reads and writes go through explicit
//! accessors, with a per-key registry of update tasks. Nested records are
//! wrapped lazily on first read and the wrapper is stored back.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::scheduler::{self, Task};
use crate::value::{self, ListRef, RecordRef, Value};
use crate::{EvalError, ReactiveError};

/// Registration function (`__observe(key, callback)`)
pub const OBSERVE_KEY: &str = "__observe";
/// Trigger function (`__notify(key)`)
pub const NOTIFY_KEY: &str = "__notify";
/// Marker, always `true` on a wrapper
pub const MARKER_KEY: &str = "__isObservable";
/// Unwrapped target
pub const RAW_KEY: &str = "__raw";

/// Mutating list operations, each firing `length` then its own key
pub const LIST_OPERATIONS: [&str; 7] = ["push", "pop", "shift", "unshift", "splice", "sort", "reverse"];

/// Wrap a structured value. Wrappers, scalars, callables, futures and
/// handles pass through unchanged.
pub fn wrap(value: Value) -> Value {
    match value {
        Value::Record(map) => Value::Observable(Observable::from_target(Target::Record(map))),
        Value::List(items) => Value::Observable(Observable::from_target(Target::List(items))),
        other => other,
    }
}

enum Target {
    Record(RecordRef),
    List(ListRef),
}

struct Inner {
    target: Target,
    registry: RefCell<IndexMap<String, Vec<Task>>>,
}

/// Wrapped record or list
#[derive(Clone)]
pub struct Observable(Rc<Inner>);

impl Observable {
    /// Wrap a record or list (or return an existing wrapper)
    pub fn new(value: Value) -> Result<Observable, ReactiveError> {
        match wrap(value) {
            Value::Observable(obs) => Ok(obs),
            other => Err(ReactiveError::NotStructured(other.type_of())),
        }
    }

    fn from_target(target: Target) -> Self {
        Observable(Rc::new(Inner {
            target,
            registry: RefCell::new(IndexMap::new()),
        }))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.0.target, Target::List(_))
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The unwrapped target
    pub fn raw(&self) -> Value {
        match &self.0.target {
            Target::Record(map) => Value::Record(map.clone()),
            Target::List(items) => Value::List(items.clone()),
        }
    }

    /// Read `key`. Reserved introspection keys return their helpers.
    pub fn get(&self, key: &str) -> Value {
        match key {
            MARKER_KEY => return Value::Bool(true),
            RAW_KEY => return self.raw(),
            OBSERVE_KEY => return self.observe_function(),
            NOTIFY_KEY => return self.notify_function(),
            _ => {}
        }
        match &self.0.target {
            Target::Record(map) => {
                let stored = map.borrow().get(key).cloned();
                match stored {
                    Some(value @ (Value::Record(_) | Value::List(_))) => {
                        let wrapped = wrap(value);
                        map.borrow_mut().insert(key.to_string(), wrapped.clone());
                        wrapped
                    }
                    Some(value) => value,
                    None => Value::Undefined,
                }
            }
            // List reads pass straight through to the elements
            Target::List(items) => Value::List(items.clone()).get_property(key).unwrap_or_default(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        match &self.0.target {
            Target::Record(map) => map.borrow().contains_key(key),
            Target::List(items) => {
                key == "length" || key.parse::<usize>().is_ok_and(|i| i < items.borrow().len())
            }
        }
    }

    /// Own keys (record keys, or list indices)
    pub fn keys(&self) -> Vec<String> {
        match &self.0.target {
            Target::Record(map) => map.borrow().keys().cloned().collect(),
            Target::List(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
        }
    }

    /// Number of keys (records) or elements (lists)
    pub fn len(&self) -> usize {
        match &self.0.target {
            Target::Record(map) => map.borrow().len(),
            Target::List(items) => items.borrow().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List elements, as stored
    pub fn items(&self) -> Vec<Value> {
        match &self.0.target {
            Target::List(items) => items.borrow().clone(),
            Target::Record(_) => Vec::new(),
        }
    }

    /// Write `key`, notifying only when the stored value changes identity.
    /// Plain records are wrapped on the way in; plain lists are stored raw.
    /// A rejected list write is logged and leaves the list unchanged.
    pub fn set(&self, key: &str, value: Value) {
        if let Err(err) = self.try_set(key, value) {
            tracing::warn!(key, error = %err, "write rejected");
        }
    }

    /// [`Self::set`], surfacing rejected list writes (out-of-range index
    /// or `length`) instead of logging them
    pub fn try_set(&self, key: &str, value: Value) -> Result<(), EvalError> {
        let value = match value {
            Value::Record(_) => wrap(value),
            other => other,
        };
        let old = match &self.0.target {
            Target::Record(map) => map
                .borrow_mut()
                .insert(key.to_string(), value.clone())
                .unwrap_or_default(),
            Target::List(items) => {
                let old = Value::List(items.clone()).get_property(key).unwrap_or_default();
                value::set_list_slot(&mut items.borrow_mut(), key, value.clone())?;
                old
            }
        };
        if !old.same(&value) {
            self.notify(key);
        }
        Ok(())
    }

    /// Register `task` under `key`. Registering the same task twice is a no-op.
    pub fn observe(&self, key: &str, task: Task) {
        let mut registry = self.0.registry.borrow_mut();
        let tasks = registry.entry(key.to_string()).or_default();
        if !tasks.iter().any(|t| t.same(&task)) {
            tasks.push(task);
        }
    }

    /// Drop `task` from `key`; returns false if it was not registered
    pub fn unobserve(&self, key: &str, task: &Task) -> bool {
        let mut registry = self.0.registry.borrow_mut();
        let Some(tasks) = registry.get_mut(key) else {
            return false;
        };
        let before = tasks.len();
        tasks.retain(|t| !t.same(task));
        let removed = before != tasks.len();
        if tasks.is_empty() {
            registry.shift_remove(key);
        }
        removed
    }

    pub fn observer_count(&self, key: &str) -> usize {
        self.0.registry.borrow().get(key).map_or(0, Vec::len)
    }

    /// Hand every task registered under `key` to the scheduler
    pub fn notify(&self, key: &str) {
        let tasks = self.0.registry.borrow().get(key).cloned().unwrap_or_default();
        tracing::trace!(key, observers = tasks.len(), "notify");
        for task in tasks {
            scheduler::enqueue(task);
        }
    }

    fn observe_function(&self) -> Value {
        let weak = Rc::downgrade(&self.0);
        Value::function(OBSERVE_KEY, move |_this, args| {
            if let (Some(obs), Some(Value::Function(callback))) = (upgrade(&weak), args.get(1)) {
                let key = args.first().map(Value::display_string).unwrap_or_default();
                obs.observe(&key, Task::from_function(callback.clone()));
            }
            Ok(Value::Undefined)
        })
    }

    fn notify_function(&self) -> Value {
        let weak = Rc::downgrade(&self.0);
        Value::function(NOTIFY_KEY, move |_this, args| {
            if let Some(obs) = upgrade(&weak) {
                let key = args.first().map(Value::display_string).unwrap_or_default();
                obs.notify(&key);
            }
            Ok(Value::Undefined)
        })
    }

    // === List operations ===

    fn with_list<R>(&self, op: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        let Target::List(items) = &self.0.target else {
            return None;
        };
        let result = f(&mut items.borrow_mut());
        self.notify("length");
        self.notify(op);
        Some(result)
    }

    /// Append; returns the new length
    pub fn push(&self, values: Vec<Value>) -> Option<usize> {
        self.with_list("push", |items| {
            items.extend(values);
            items.len()
        })
    }

    /// Remove the last element
    pub fn pop(&self) -> Option<Value> {
        self.with_list("pop", |items| items.pop().unwrap_or_default())
    }

    /// Remove the first element
    pub fn shift(&self) -> Option<Value> {
        self.with_list("shift", |items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
    }

    /// Prepend; returns the new length
    pub fn unshift(&self, values: Vec<Value>) -> Option<usize> {
        self.with_list("unshift", |items| {
            items.splice(0..0, values);
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start` (negative counts from the
    /// end) and insert `values` there. Returns the removed elements.
    pub fn splice(
        &self,
        start: isize,
        delete_count: Option<usize>,
        values: Vec<Value>,
    ) -> Option<Vec<Value>> {
        self.with_list("splice", |items| {
            let len = items.len();
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                (start as usize).min(len)
            };
            let end = start + delete_count.unwrap_or(len - start).min(len - start);
            items.splice(start..end, values).collect()
        })
    }

    /// Sort with a comparator. The comparator may read the list; it runs
    /// against a snapshot with no borrow held.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Option<()> {
        let Target::List(items) = &self.0.target else {
            return None;
        };
        let mut sorted = items.borrow().clone();
        sorted.sort_by(compare);
        self.with_list("sort", |items| *items = sorted)
    }

    /// Default sort: by display string, `undefined` last
    pub fn sort(&self) -> Option<()> {
        self.sort_by(default_order)
    }

    pub fn reverse(&self) -> Option<()> {
        self.with_list("reverse", |items| items.reverse())
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<Observable> {
    weak.upgrade().map(Observable)
}

/// JS default sort order
pub fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.display_string().cmp(&b.display_string()),
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.target {
            Target::Record(map) => {
                write!(f, "Observable{:?}", map.borrow().keys().collect::<Vec<_>>())
            }
            Target::List(items) => write!(f, "Observable[{}]", items.borrow().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop;
    use std::cell::Cell;

    fn counter() -> (Task, Rc<Cell<u32>>) {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let task = Task::new(move || {
            h.set(h.get() + 1);
            Ok(())
        });
        (task, hits)
    }

    fn state(json: serde_json::Value) -> Observable {
        Observable::new(Value::from_json(&json)).unwrap()
    }

    #[test]
    fn test_wrap_is_idempotent() {
        let obs = wrap(Value::empty_record());
        let again = wrap(obs.clone());
        assert!(obs.same(&again));
        assert!(obs.get_property(MARKER_KEY).unwrap().is_truthy());
    }

    #[test]
    fn test_non_structured_pass_through() {
        let f = Value::function("f", |_, _| Ok(Value::Null));
        assert!(wrap(f.clone()).same(&f));
        assert!(matches!(wrap(Value::Number(1.0)), Value::Number(_)));
        assert!(matches!(
            Observable::new(Value::Null),
            Err(ReactiveError::NotStructured("object"))
        ));
    }

    #[test]
    fn test_nested_wrapped_lazily_and_stable() {
        let obs = state(serde_json::json!({"user": {"name": "ana"}}));
        let raw = obs.raw();
        assert!(matches!(raw.get_property("user").unwrap(), Value::Record(_)));

        let first = obs.get("user");
        let second = obs.get("user");
        assert!(first.as_observable().is_some());
        assert!(first.same(&second));
        assert!(matches!(raw.get_property("user").unwrap(), Value::Observable(_)));
    }

    #[test]
    fn test_equal_write_does_not_notify() {
        let obs = state(serde_json::json!({"count": 1}));
        let (task, hits) = counter();
        obs.observe("count", task);

        obs.set("count", Value::Number(1.0));
        assert_eq!(scheduler::pending_count(), 0);

        obs.set("count", Value::Number(2.0));
        event_loop::run_microtasks();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_write_wraps_records_not_lists() {
        let obs = state(serde_json::json!({}));
        obs.set("profile", Value::empty_record());
        obs.set("tags", Value::list(vec![]));
        let raw = obs.raw();
        assert!(matches!(raw.get_property("profile").unwrap(), Value::Observable(_)));
        assert!(matches!(raw.get_property("tags").unwrap(), Value::List(_)));
        assert!(obs.get("tags").as_observable().is_some());
    }

    #[test]
    fn test_push_fires_length_then_push() {
        let list = Observable::new(Value::list(vec![1.into(), 2.into()])).unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));
        for key in ["length", "push"] {
            let o = order.clone();
            list.observe(key, Task::new(move || {
                o.borrow_mut().push(key);
                Ok(())
            }));
        }

        assert_eq!(list.push(vec![3.into()]), Some(3));
        event_loop::run_microtasks();
        assert_eq!(*order.borrow(), vec!["length", "push"]);
    }

    #[test]
    fn test_splice_and_sort() {
        let list = Observable::new(Value::from_json(&serde_json::json!([3, 1, 2, 5]))).unwrap();
        let removed = list.splice(-2, Some(1), vec![Value::Number(4.0)]).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].to_number(), 2.0);
        list.sort();
        assert_eq!(list.raw().display_string(), "1,3,4,5");
        list.reverse();
        assert_eq!(list.get("0").to_number(), 5.0);
        assert_eq!(list.get("length").to_number(), 4.0);
    }

    #[test]
    fn test_reserved_helpers() {
        let obs = state(serde_json::json!({"a": 1}));
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let callback = Value::function("cb", move |_, _| {
            h.set(h.get() + 1);
            Ok(Value::Undefined)
        });
        obs.get(OBSERVE_KEY)
            .call(&Value::Undefined, &["a".into(), callback.clone()])
            .unwrap();
        obs.get(OBSERVE_KEY)
            .call(&Value::Undefined, &["a".into(), callback])
            .unwrap();
        assert_eq!(obs.observer_count("a"), 1);

        obs.get(NOTIFY_KEY).call(&Value::Undefined, &["a".into()]).unwrap();
        event_loop::run_microtasks();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unobserve() {
        let obs = state(serde_json::json!({"a": 1}));
        let (task, hits) = counter();
        obs.observe("a", task.clone());
        assert!(obs.unobserve("a", &task));
        obs.set("a", Value::Number(5.0));
        event_loop::run_microtasks();
        assert_eq!(hits.get(), 0);
        assert_eq!(obs.observer_count("a"), 0);
    }

    #[test]
    fn test_out_of_range_list_write_is_rejected() {
        let list = wrap(Value::list(vec![Value::Number(1.0)]));
        let obs = list.as_observable().unwrap();
        let (task, hits) = counter();
        obs.observe("length", task);

        assert!(matches!(obs.try_set("4000000000", Value::Number(1.0)), Err(EvalError::Type(_))));
        obs.set("length", Value::Number(1e15));
        event_loop::run_microtasks();
        assert_eq!(obs.len(), 1);
        assert_eq!(hits.get(), 0);
    }
}

//! Dynamic values
//!
//! The value domain shared by the evaluator, scopes and observables.
//! Records and lists are shared by reference; everything else is a
//! cheap clone.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::observable::{self, Observable};
use crate::pending::Pending;
use crate::EvalError;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Insertion-ordered record storage
pub type Map = IndexMap<String, Value>;

/// Shared record handle
pub type RecordRef = Rc<RefCell<Map>>;

/// Shared list handle
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Host or evaluator callable. Receives `this` and the arguments.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, EvalError>;

/// Callable value
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    body: Rc<NativeFn>,
}

impl Function {
    pub fn new(
        name: &str,
        body: impl Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, EvalError> {
        (self.body)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }

    /// Identity usable as a map key
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.body) as *const () as usize
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[function {}]", self.name)
    }
}

/// Dynamic value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// Plain (unwrapped) record
    Record(RecordRef),
    /// Plain (unwrapped) list
    List(ListRef),
    /// Wrapped record or list
    Observable(Observable),
    Function(Function),
    Pending(Pending),
    /// Opaque host handle (surface nodes, events). Never wrapped.
    Handle(Rc<dyn Any>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn record(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Record(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn empty_record() -> Self {
        Value::Record(Rc::new(RefCell::new(Map::new())))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn function(
        name: &str,
        body: impl Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Value::Function(Function::new(name, body))
    }

    pub fn handle<T: Any>(inner: T) -> Self {
        Value::Handle(Rc::new(inner))
    }

    /// Borrow the payload of a `Handle` of type `T`
    pub fn downcast_handle<T: Any + Clone>(&self) -> Option<T> {
        match self {
            Value::Handle(h) => h.downcast_ref::<T>().cloned(),
            _ => None,
        }
    }

    /// Build a value from JSON. Objects become plain records, arrays plain lists.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::record(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            ),
        }
    }

    /// Snapshot as JSON. Observables are read through their raw target;
    /// callables, futures and handles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
                serde_json::Value::from(*n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Record(map) => serde_json::Value::Object(
                map.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.borrow().iter().map(Value::to_json).collect())
            }
            Value::Observable(obs) => obs.raw().to_json(),
            Value::Function(_) | Value::Pending(_) | Value::Handle(_) => serde_json::Value::Null,
        }
    }

    /// JS `typeof`
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null
            | Value::Record(_)
            | Value::List(_)
            | Value::Observable(_)
            | Value::Pending(_)
            | Value::Handle(_) => "object",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Record or list, wrapped or not
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Record(_) | Value::List(_) | Value::Observable(_))
    }

    pub fn is_list(&self) -> bool {
        match self {
            Value::List(_) => true,
            Value::Observable(obs) => obs.is_list(),
            _ => false,
        }
    }

    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Value::Observable(obs) => Some(obs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// JS truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Strict identity (`===`)
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Observable(a), Value::Observable(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Pending(a), Value::Pending(b)) => a.ptr_eq(b),
            (Value::Handle(a), Value::Handle(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality (`==`)
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                if self.is_structured() || other.is_structured() {
                    return self.same(other);
                }
                self.to_number() == other.to_number()
            }
            _ => self.same(other),
        }
    }

    /// JS `ToNumber`
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// JS `ToString`, as used for text bindings and attribute values
    pub fn display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Record(_) | Value::Handle(_) | Value::Pending(_) => "[object Object]".to_string(),
            Value::List(items) => join_items(&items.borrow()),
            Value::Observable(obs) => match obs.raw() {
                Value::List(items) => join_items(&items.borrow()),
                _ => "[object Object]".to_string(),
            },
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        }
    }

    /// Read a property. Reading from `undefined`/`null` is an absence error.
    pub fn get_property(&self, key: &str) -> Result<Value, EvalError> {
        match self {
            Value::Undefined | Value::Null => Err(EvalError::Absent {
                property: key.to_string(),
                base: self.type_name(),
            }),
            Value::String(s) => Ok(match key {
                "length" => Value::Number(s.chars().count() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_default(),
            }),
            Value::Record(map) => Ok(map.borrow().get(key).cloned().unwrap_or_default()),
            Value::List(items) => {
                let items = items.borrow();
                Ok(match key {
                    "length" => Value::Number(items.len() as f64),
                    _ => key
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or_default(),
                })
            }
            Value::Observable(obs) => Ok(obs.get(key)),
            Value::Function(f) if key == "name" => Ok(Value::string(f.name())),
            _ => Ok(Value::Undefined),
        }
    }

    /// Write a property. Writing to `undefined`/`null` is an absence error;
    /// writes to other primitives are ignored.
    pub fn set_property(&self, key: &str, value: Value) -> Result<(), EvalError> {
        match self {
            Value::Undefined | Value::Null => Err(EvalError::Absent {
                property: key.to_string(),
                base: self.type_name(),
            }),
            Value::Record(map) => {
                map.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            Value::List(items) => set_list_slot(&mut items.borrow_mut(), key, value),
            Value::Observable(obs) => obs.try_set(key, value),
            _ => Ok(()),
        }
    }

    /// Invoke a callable
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, EvalError> {
        match self {
            Value::Function(f) => f.call(this, args),
            other => Err(EvalError::Type(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }

    /// Elements of a list (wrapped lists yield wrapped elements)
    pub fn list_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.borrow().clone()),
            Value::Observable(obs) if obs.is_list() => Some(obs.items()),
            _ => None,
        }
    }

    /// Own keys of a record (wrapped or not)
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Record(map) => map.borrow().keys().cloned().collect(),
            Value::Observable(obs) => obs.keys(),
            _ => Vec::new(),
        }
    }

    /// Unwrap an observable to its raw target
    pub fn raw(&self) -> Value {
        match self {
            Value::Observable(obs) => obs.raw(),
            other => other.clone(),
        }
    }

    /// Wrap structured values (see [`observable::wrap`])
    pub fn wrap(self) -> Value {
        observable::wrap(self)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::List(_) => "array",
            Value::Observable(obs) if obs.is_list() => "array",
            other => other.type_of(),
        }
    }
}

/// Largest number of slots a single index or `length` write may add
const MAX_LIST_GROWTH: usize = 1 << 20;

/// Write an index or `length` of a dense list. Writes that would grow the
/// list past [`MAX_LIST_GROWTH`] new slots, or that the allocator refuses,
/// are range errors and leave the list untouched.
pub(crate) fn set_list_slot(items: &mut Vec<Value>, key: &str, value: Value) -> Result<(), EvalError> {
    if key == "length" {
        let len = value.to_number();
        if !(len.is_finite() && len >= 0.0 && len.fract() == 0.0 && len < u32::MAX as f64) {
            return Err(EvalError::Type(format!("invalid array length {}", format_number(len))));
        }
        let len = len as usize;
        reserve_slots(items, len)?;
        items.resize(len, Value::Undefined);
    } else if let Ok(index) = key.parse::<usize>() {
        if index >= items.len() {
            let len = index
                .checked_add(1)
                .ok_or_else(|| EvalError::Type(format!("invalid array index {index}")))?;
            reserve_slots(items, len)?;
            items.resize(len, Value::Undefined);
        }
        items[index] = value;
    }
    Ok(())
}

fn reserve_slots(items: &mut Vec<Value>, len: usize) -> Result<(), EvalError> {
    let Some(extra) = len.checked_sub(items.len()) else {
        return Ok(());
    };
    if extra > MAX_LIST_GROWTH {
        return Err(EvalError::Type(format!(
            "invalid array length {len}: grows the list by more than {MAX_LIST_GROWTH} slots"
        )));
    }
    items
        .try_reserve(extra)
        .map_err(|e| EvalError::Type(format!("invalid array length {len}: {e}")))
}

fn join_items(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.display_string() })
        .collect::<Vec<_>>()
        .join(",")
}

/// JS number formatting (`1` -> "1", `1.5` -> "1.5", `1e21` -> "1e+21").
/// Magnitudes outside `[1e-6, 1e21)` use exponent form.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if (1e-6..1e21).contains(&n.abs()) {
        n.to_string()
    } else {
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
            _ => formatted,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Observable> for Value {
    fn from(obs: Observable) -> Self {
        Value::Observable(obs)
    }
}

impl From<Pending> for Value {
    fn from(p: Pending) -> Self {
        Value::Pending(p)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Record(map) => write!(f, "Record{:?}", map.borrow().keys().collect::<Vec<_>>()),
            Value::List(items) => write!(f, "List({})", items.borrow().len()),
            Value::Observable(obs) => write!(f, "{obs:?}"),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Pending(p) => write!(f, "{p:?}"),
            Value::Handle(_) => f.write_str("[handle]"),
            other => f.write_str(&other.display_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::empty_record().is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-2.5e30), "-2.5e+30");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(Value::list(vec![1.into(), Value::Null, "a".into()]).display_string(), "1,,a");
    }

    #[test]
    fn test_equality() {
        let rec = Value::empty_record();
        assert!(rec.same(&rec.clone()));
        assert!(!rec.same(&Value::empty_record()));
        assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));

        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::string("1").loose_eq(&Value::Number(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
    }

    #[test]
    fn test_property_access() {
        let v = Value::from_json(&serde_json::json!({"user": {"name": "ana"}, "tags": ["a", "b"]}));
        let user = v.get_property("user").unwrap();
        assert_eq!(user.get_property("name").unwrap().as_str(), Some("ana"));
        assert_eq!(v.get_property("tags").unwrap().get_property("length").unwrap().to_number(), 2.0);

        let missing = v.get_property("nope").unwrap();
        assert!(matches!(missing.get_property("x"), Err(EvalError::Absent { .. })));
    }

    #[test]
    fn test_list_slot_writes_are_bounded() {
        let list = Value::list(vec![1.into()]);
        list.set_property("2", 3.into()).unwrap();
        assert_eq!(list.display_string(), "1,,3");
        list.set_property("length", 1.into()).unwrap();
        assert_eq!(list.display_string(), "1");

        assert!(matches!(list.set_property("4000000000", 1.into()), Err(EvalError::Type(_))));
        assert!(matches!(list.set_property(&usize::MAX.to_string(), 1.into()), Err(EvalError::Type(_))));
        assert!(matches!(list.set_property("length", Value::Number(1e12)), Err(EvalError::Type(_))));
        assert!(matches!(list.set_property("length", Value::Number(-1.0)), Err(EvalError::Type(_))));
        assert_eq!(list.display_string(), "1");
    }

    #[test]
    fn test_json_round_trip_shape() {
        let json = serde_json::json!({"a": [1, 2.5, null], "b": true});
        assert_eq!(Value::from_json(&json).to_json(), json);
    }
}

//! Built-in methods and globals
//!
//! String, number and list methods dispatched on the receiver type, and
//! the handful of global objects directive expressions commonly reach for
//! (`Math`, `JSON`, `Object`, `console`, ...).

use std::cell::RefCell;
use std::cmp::Ordering;

use sprig_reactive::{EvalError, Observable, Pending, Value, event_loop};

/// Receiver method
pub(crate) type Method = fn(&Value, &[Value]) -> Result<Value, EvalError>;

/// Look up a built-in method for `receiver`
pub(crate) fn method(receiver: &Value, name: &str) -> Option<Method> {
    match receiver {
        Value::String(_) => string_method(name),
        Value::Number(_) => number_method(name),
        list if list.is_list() => list_method(name),
        _ => None,
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Relative index as used by `slice`: negatives count from the end
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        len.saturating_sub((-n) as usize)
    } else {
        (n as usize).min(len)
    }
}

// === Strings ===

fn string_method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "toUpperCase" => |s, _| Ok(Value::string(receiver_str(s).to_uppercase())),
        "toLowerCase" => |s, _| Ok(Value::string(receiver_str(s).to_lowercase())),
        "trim" => |s, _| Ok(Value::string(receiver_str(s).trim())),
        "toString" => |s, _| Ok(s.clone()),
        "includes" => |s, args| Ok(Value::Bool(receiver_str(s).contains(&*arg(args, 0).display_string()))),
        "startsWith" => |s, args| Ok(Value::Bool(receiver_str(s).starts_with(&*arg(args, 0).display_string()))),
        "endsWith" => |s, args| Ok(Value::Bool(receiver_str(s).ends_with(&*arg(args, 0).display_string()))),
        "indexOf" => |s, args| {
            let haystack = receiver_str(s);
            let needle = arg(args, 0).display_string();
            Ok(Value::Number(match haystack.find(&needle) {
                Some(byte) => haystack[..byte].chars().count() as f64,
                None => -1.0,
            }))
        },
        "slice" => |s, args| {
            let chars: Vec<char> = receiver_str(s).chars().collect();
            let start = relative_index(&arg(args, 0), chars.len(), 0);
            let end = relative_index(&arg(args, 1), chars.len(), chars.len());
            Ok(Value::string(chars.get(start..end.max(start)).unwrap_or_default().iter().collect::<String>()))
        },
        "split" => |s, args| {
            let text = receiver_str(s);
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::string(text)],
                sep => {
                    let sep = sep.display_string();
                    if sep.is_empty() {
                        text.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        text.split(&*sep).map(Value::string).collect()
                    }
                }
            };
            Ok(Value::list(parts))
        },
        "replace" => |s, args| {
            let pattern = arg(args, 0).display_string();
            let replacement = arg(args, 1).display_string();
            Ok(Value::string(receiver_str(s).replacen(&*pattern, &replacement, 1)))
        },
        _ => return None,
    };
    Some(method)
}

fn receiver_str(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

// === Numbers ===

fn number_method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "toFixed" => |n, args| {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Ok(Value::string(format!("{:.*}", digits, n.to_number())))
        },
        "toString" => |n, _| Ok(Value::string(n.display_string())),
        _ => return None,
    };
    Some(method)
}

// === Lists ===

/// Mutating methods go through a wrapper so observed lists notify
/// `length` and the operation key. Plain lists get a throwaway wrapper
/// with no observers.
fn list_wrapper(list: &Value) -> Result<Observable, EvalError> {
    match list {
        Value::Observable(obs) => Ok(obs.clone()),
        other => Observable::new(other.clone()).map_err(|e| EvalError::Type(e.to_string())),
    }
}

fn items(list: &Value) -> Vec<Value> {
    list.list_items().unwrap_or_default()
}

/// `includes`/`indexOf` equality: strict, except NaN matches NaN
fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.same(b),
    }
}

/// Call `callback(item, index, list)` for each element until `stop`
/// returns true; yields the index it stopped at.
fn scan(
    list: &Value,
    args: &[Value],
    mut stop: impl FnMut(&Value, Value) -> bool,
) -> Result<Option<usize>, EvalError> {
    let callback = arg(args, 0);
    for (index, item) in items(list).into_iter().enumerate() {
        let result = callback.call(&Value::Undefined, &[item.clone(), Value::Number(index as f64), list.clone()])?;
        if stop(&item, result) {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn list_method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "push" => |list, args| {
            let len = list_wrapper(list)?.push(args.to_vec()).unwrap_or_default();
            Ok(Value::Number(len as f64))
        },
        "unshift" => |list, args| {
            let len = list_wrapper(list)?.unshift(args.to_vec()).unwrap_or_default();
            Ok(Value::Number(len as f64))
        },
        "pop" => |list, _| Ok(list_wrapper(list)?.pop().unwrap_or_default()),
        "shift" => |list, _| Ok(list_wrapper(list)?.shift().unwrap_or_default()),
        "splice" => |list, args| {
            let start = arg(args, 0).to_number();
            let start = if start.is_nan() { 0 } else { start as isize };
            let delete_count = args.get(1).map(|n| {
                let n = n.to_number();
                if n.is_nan() || n < 0.0 { 0 } else { n as usize }
            });
            let values = args.get(2..).unwrap_or_default().to_vec();
            let removed = list_wrapper(list)?.splice(start, delete_count, values).unwrap_or_default();
            Ok(Value::list(removed))
        },
        "reverse" => |list, _| {
            list_wrapper(list)?.reverse();
            Ok(list.clone())
        },
        "sort" => |list, args| {
            let obs = list_wrapper(list)?;
            match arg(args, 0) {
                Value::Function(compare) => {
                    let failure = RefCell::new(None);
                    obs.sort_by(|a, b| {
                        if failure.borrow().is_some() {
                            return Ordering::Equal;
                        }
                        match compare.call(&Value::Undefined, &[a.clone(), b.clone()]) {
                            Ok(result) => result.to_number().partial_cmp(&0.0).unwrap_or(Ordering::Equal),
                            Err(err) => {
                                *failure.borrow_mut() = Some(err);
                                Ordering::Equal
                            }
                        }
                    });
                    if let Some(err) = failure.into_inner() {
                        return Err(err);
                    }
                }
                _ => {
                    obs.sort();
                }
            }
            Ok(list.clone())
        },
        "includes" => |list, args| {
            let needle = arg(args, 0);
            Ok(Value::Bool(items(list).iter().any(|v| same_value_zero(v, &needle))))
        },
        "indexOf" => |list, args| {
            let needle = arg(args, 0);
            let index = items(list).iter().position(|v| same_value_zero(v, &needle));
            Ok(Value::Number(index.map_or(-1.0, |i| i as f64)))
        },
        "join" => |list, args| {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                sep => sep.display_string(),
            };
            let joined = items(list)
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.display_string() })
                .collect::<Vec<_>>()
                .join(&sep);
            Ok(Value::string(joined))
        },
        "slice" => |list, args| {
            let all = items(list);
            let start = relative_index(&arg(args, 0), all.len(), 0);
            let end = relative_index(&arg(args, 1), all.len(), all.len());
            Ok(Value::list(all.get(start..end.max(start)).unwrap_or_default().to_vec()))
        },
        "concat" => |list, args| {
            let mut all = items(list);
            for extra in args {
                match extra.list_items() {
                    Some(more) => all.extend(more),
                    None => all.push(extra.clone()),
                }
            }
            Ok(Value::list(all))
        },
        "map" => |list, args| {
            let callback = arg(args, 0);
            let mapped = items(list)
                .into_iter()
                .enumerate()
                .map(|(i, item)| callback.call(&Value::Undefined, &[item, Value::Number(i as f64), list.clone()]))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(mapped))
        },
        "filter" => |list, args| {
            let mut kept = Vec::new();
            scan(list, args, |item, result| {
                if result.is_truthy() {
                    kept.push(item.clone());
                }
                false
            })?;
            Ok(Value::list(kept))
        },
        "forEach" => |list, args| {
            scan(list, args, |_, _| false)?;
            Ok(Value::Undefined)
        },
        "find" => |list, args| {
            let index = scan(list, args, |_, result| result.is_truthy())?;
            Ok(index.and_then(|i| items(list).get(i).cloned()).unwrap_or_default())
        },
        "findIndex" => |list, args| {
            let index = scan(list, args, |_, result| result.is_truthy())?;
            Ok(Value::Number(index.map_or(-1.0, |i| i as f64)))
        },
        "some" => |list, args| {
            Ok(Value::Bool(scan(list, args, |_, result| result.is_truthy())?.is_some()))
        },
        "every" => |list, args| {
            Ok(Value::Bool(scan(list, args, |_, result| !result.is_truthy())?.is_none()))
        },
        _ => return None,
    };
    Some(method)
}

// === Globals ===

/// Resolve a global name not defined by any scope
pub(crate) fn global(name: &str) -> Option<Value> {
    Some(match name {
        "NaN" => Value::Number(f64::NAN),
        "Infinity" => Value::Number(f64::INFINITY),
        "Math" => math(),
        "JSON" => json(),
        "Object" => object(),
        "Array" => Value::record([function("isArray", |_, args| Ok(Value::Bool(arg(args, 0).is_list())))]),
        "Promise" => promise(),
        "console" => console(),
        "Number" => Value::function("Number", |_, args| {
            Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
        }),
        "String" => Value::function("String", |_, args| {
            Ok(Value::string(args.first().map(Value::display_string).unwrap_or_default()))
        }),
        "Boolean" => Value::function("Boolean", |_, args| Ok(Value::Bool(arg(args, 0).is_truthy()))),
        "isNaN" => Value::function("isNaN", |_, args| Ok(Value::Bool(arg(args, 0).to_number().is_nan()))),
        "parseInt" => Value::function("parseInt", |_, args| {
            let radix = match arg(args, 1).to_number() {
                r if (2.0..=36.0).contains(&r) => r as u32,
                _ => 10,
            };
            Ok(Value::Number(parse_int(&arg(args, 0).display_string(), radix)))
        }),
        "parseFloat" => Value::function("parseFloat", |_, args| {
            Ok(Value::Number(parse_float(&arg(args, 0).display_string())))
        }),
        "setTimeout" => Value::function("setTimeout", |_, args| {
            let callback = arg(args, 0);
            let delay = arg(args, 1).to_number();
            let delay = if delay.is_finite() && delay > 0.0 { delay as u64 } else { 0 };
            let id = event_loop::set_timeout(
                move || {
                    if let Err(err) = callback.call(&Value::Undefined, &[]) {
                        tracing::error!(error = %err, "timer callback failed");
                    }
                },
                delay,
            );
            Ok(Value::Number(f64::from(id.0)))
        }),
        "clearTimeout" => Value::function("clearTimeout", |_, args| {
            let id = arg(args, 0).to_number();
            if id.is_finite() && id >= 0.0 {
                event_loop::clear_timeout(event_loop::TimerId(id as u32));
            }
            Ok(Value::Undefined)
        }),
        _ => return None,
    })
}

fn function(
    name: &str,
    body: impl Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
) -> (String, Value) {
    (name.to_string(), Value::function(name, body))
}

fn numeric(name: &str, op: fn(f64) -> f64) -> (String, Value) {
    function(name, move |_, args| Ok(Value::Number(op(arg(args, 0).to_number()))))
}

fn math() -> Value {
    Value::record([
        ("PI".to_string(), Value::Number(std::f64::consts::PI)),
        numeric("floor", f64::floor),
        numeric("ceil", f64::ceil),
        numeric("round", |n| (n + 0.5).floor()),
        numeric("trunc", f64::trunc),
        numeric("abs", f64::abs),
        numeric("sqrt", f64::sqrt),
        function("pow", |_, args| {
            Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
        }),
        function("min", |_, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::INFINITY, nan_min)))
        }),
        function("max", |_, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, nan_max)))
        }),
    ])
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }
}

fn json() -> Value {
    Value::record([
        function("stringify", |_, args| match arg(args, 0) {
            Value::Undefined | Value::Function(_) => Ok(Value::Undefined),
            value => serde_json::to_string(&value.to_json())
                .map(Value::from)
                .map_err(|e| EvalError::Thrown(format!("JSON.stringify: {e}"))),
        }),
        function("parse", |_, args| {
            serde_json::from_str::<serde_json::Value>(&arg(args, 0).display_string())
                .map(|json| Value::from_json(&json))
                .map_err(|e| EvalError::Thrown(format!("JSON.parse: {e}")))
        }),
    ])
}

fn object() -> Value {
    Value::record([
        function("keys", |_, args| {
            let target = arg(args, 0);
            let keys = if target.is_list() {
                (0..items(&target).len()).map(|i| Value::string(i.to_string())).collect()
            } else {
                target.keys().into_iter().map(Value::from).collect()
            };
            Ok(Value::list(keys))
        }),
        function("values", |_, args| {
            let target = arg(args, 0);
            let values = target
                .keys()
                .iter()
                .map(|k| target.get_property(k))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(values))
        }),
        function("entries", |_, args| {
            let target = arg(args, 0);
            let entries = target
                .keys()
                .into_iter()
                .map(|k| {
                    let value = target.get_property(&k)?;
                    Ok(Value::list(vec![Value::from(k), value]))
                })
                .collect::<Result<Vec<_>, EvalError>>()?;
            Ok(Value::list(entries))
        }),
        function("assign", |_, args| {
            let target = arg(args, 0);
            for source in args.iter().skip(1) {
                for key in source.keys() {
                    target.set_property(&key, source.get_property(&key)?)?;
                }
            }
            Ok(target)
        }),
    ])
}

fn promise() -> Value {
    Value::record([
        function("resolve", |_, args| Ok(Value::Pending(Pending::resolved(arg(args, 0))))),
        function("reject", |_, args| {
            Ok(Value::Pending(Pending::rejected(arg(args, 0).display_string())))
        }),
    ])
}

fn console_line(args: &[Value]) -> String {
    args.iter().map(Value::display_string).collect::<Vec<_>>().join(" ")
}

fn console() -> Value {
    Value::record([
        function("log", |_, args| {
            tracing::info!(target: "sprig::console", "{}", console_line(args));
            Ok(Value::Undefined)
        }),
        function("warn", |_, args| {
            tracing::warn!(target: "sprig::console", "{}", console_line(args));
            Ok(Value::Undefined)
        }),
        function("error", |_, args| {
            tracing::error!(target: "sprig::console", "{}", console_line(args));
            Ok(Value::Undefined)
        }),
    ])
}

fn parse_int(text: &str, radix: u32) -> f64 {
    let text = text.trim_start();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) if radix == 16 || radix == 10 => (16, hex),
        _ => (radix, digits),
    };
    let mut value: Option<f64> = None;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else { break };
        value = Some(value.unwrap_or(0.0) * f64::from(radix) + f64::from(d));
    }
    match value {
        Some(v) if negative => -v,
        Some(v) => v,
        None => f64::NAN,
    }
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = text.as_bytes();
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 || matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }
    // Back off a dangling exponent or sign
    let mut candidate = &text[..end];
    while !candidate.is_empty() {
        if let Ok(n) = candidate.parse::<f64>() {
            return n;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    if text.starts_with("Infinity") {
        f64::INFINITY
    } else if text.starts_with("-Infinity") {
        f64::NEG_INFINITY
    } else {
        f64::NAN
    }
}

//! Directive vocabulary
//!
//! Maps attribute names to directives. With the default prefix:
//!
//! | attribute                         | directive |
//! |-----------------------------------|-----------|
//! | `r-data`                          | state initialization |
//! | `r-init`                          | (possibly async) initializer |
//! | `r-for`                           | list expansion on a `<template>` |
//! | `r-effect`                        | side-effect statement |
//! | `r-show` / `r-text` / `r-model`   | visibility / text / two-way value |
//! | `r-bind:<attr>`, `:<attr>`        | attribute binding (`:key` is reserved) |
//! | `r-on:<event>.<mods>`, `@<event>` | event binding |

use std::fmt;

use crate::Config;

/// Attribute name reserved for keyed rendering and never bound
const RESERVED_BIND: &str = "key";

/// Directive parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("expected `<item> in <collection>` or `(<item>, <index>) in <collection>`, got `{0}`")]
    ListSyntax(String),

    #[error("invalid alias `{0}` in list directive")]
    InvalidAlias(String),

    #[error("list directive requires a template element")]
    NotATemplate,
}

/// Event modifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    Enter,
    Escape,
    Space,
    Tab,
    /// Suppress the default action
    Prevent,
    /// Halt propagation
    Stop,
    /// Anything else; accepted and ignored
    Other(String),
}

impl Modifier {
    fn parse(name: &str) -> Self {
        match name {
            "enter" => Modifier::Enter,
            "escape" => Modifier::Escape,
            "space" => Modifier::Space,
            "tab" => Modifier::Tab,
            "prevent" => Modifier::Prevent,
            "stop" => Modifier::Stop,
            other => Modifier::Other(other.to_string()),
        }
    }

    /// Key the event must carry for a key-filter modifier
    pub fn required_key(&self) -> Option<&'static str> {
        match self {
            Modifier::Enter => Some("Enter"),
            Modifier::Escape => Some("Escape"),
            Modifier::Space => Some(" "),
            Modifier::Tab => Some("Tab"),
            _ => None,
        }
    }
}

/// One directive kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Data,
    Init,
    For,
    Effect,
    Show,
    Text,
    Model,
    Bind { attribute: String },
    On { event: String, modifiers: Vec<Modifier> },
}

impl Directive {
    /// Recognise an attribute name; `None` for plain attributes
    pub fn parse(name: &str, config: &Config) -> Option<Directive> {
        if let Some(rest) = name.strip_prefix(config.prefix.as_str()) {
            return match rest {
                "data" => Some(Directive::Data),
                "init" => Some(Directive::Init),
                "for" => Some(Directive::For),
                "effect" => Some(Directive::Effect),
                "show" => Some(Directive::Show),
                "text" => Some(Directive::Text),
                "model" => Some(Directive::Model),
                _ => {
                    if let Some(attribute) = rest.strip_prefix("bind:") {
                        Self::bind(attribute)
                    } else if let Some(event) = rest.strip_prefix("on:") {
                        Self::on(event)
                    } else {
                        None
                    }
                }
            };
        }
        if let Some(attribute) = name.strip_prefix(config.bind_shorthand) {
            return if attribute == RESERVED_BIND { None } else { Self::bind(attribute) };
        }
        name.strip_prefix(config.event_shorthand).and_then(Self::on)
    }

    fn bind(attribute: &str) -> Option<Directive> {
        (!attribute.is_empty()).then(|| Directive::Bind {
            attribute: attribute.to_string(),
        })
    }

    fn on(spec: &str) -> Option<Directive> {
        let mut parts = spec.split('.');
        let event = parts.next().filter(|e| !e.is_empty())?;
        Some(Directive::On {
            event: event.to_string(),
            modifiers: parts.map(Modifier::parse).collect(),
        })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Data => write!(f, "data"),
            Directive::Init => write!(f, "init"),
            Directive::For => write!(f, "for"),
            Directive::Effect => write!(f, "effect"),
            Directive::Show => write!(f, "show"),
            Directive::Text => write!(f, "text"),
            Directive::Model => write!(f, "model"),
            Directive::Bind { attribute } => write!(f, "bind:{attribute}"),
            Directive::On { event, .. } => write!(f, "on:{event}"),
        }
    }
}

/// The directives found on one element, in application order
#[derive(Debug, Clone, Default)]
pub struct DirectiveSet {
    pub data: Option<String>,
    pub init: Option<String>,
    pub list: Option<String>,
    pub effect: Option<String>,
    pub show: Option<String>,
    pub text: Option<String>,
    pub model: Option<String>,
    /// `(attribute, expression)` in attribute order
    pub binds: Vec<(String, String)>,
    /// `(event, modifiers, statement)` in attribute order
    pub events: Vec<(String, Vec<Modifier>, String)>,
}

impl DirectiveSet {
    pub fn from_attributes(attributes: Vec<(String, String)>, config: &Config) -> Self {
        let mut set = DirectiveSet::default();
        for (name, value) in attributes {
            let Some(directive) = Directive::parse(&name, config) else {
                continue;
            };
            match directive {
                Directive::Data => set.data = Some(value),
                Directive::Init => set.init = Some(value),
                Directive::For => set.list = Some(value),
                Directive::Effect => set.effect = Some(value),
                Directive::Show => set.show = Some(value),
                Directive::Text => set.text = Some(value),
                Directive::Model => set.model = Some(value),
                Directive::Bind { attribute } => set.binds.push((attribute, value)),
                Directive::On { event, modifiers } => set.events.push((event, modifiers, value)),
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
            && self.init.is_none()
            && self.list.is_none()
            && self.effect.is_none()
            && self.show.is_none()
            && self.text.is_none()
            && self.model.is_none()
            && self.binds.is_empty()
            && self.events.is_empty()
    }
}

/// Parsed list directive: `item in items` or `(item, i) in items`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpec {
    pub item: String,
    pub index: String,
    pub collection: String,
}

impl ListSpec {
    pub fn parse(source: &str, default_index: &str) -> Result<ListSpec, DirectiveError> {
        let syntax = || DirectiveError::ListSyntax(source.to_string());
        let (aliases, collection) = split_in(source).ok_or_else(syntax)?;

        let (item, index) = match aliases.strip_prefix('(').and_then(|a| a.strip_suffix(')')) {
            Some(inner) => {
                let mut parts = inner.split(',').map(str::trim);
                let item = parts.next().unwrap_or_default();
                let index = parts.next().filter(|i| !i.is_empty()).unwrap_or(default_index);
                if parts.next().is_some() {
                    return Err(syntax());
                }
                (item, index)
            }
            None => (aliases, default_index),
        };
        for alias in [item, index] {
            if !is_identifier(alias) {
                return Err(DirectiveError::InvalidAlias(alias.to_string()));
            }
        }

        Ok(ListSpec {
            item: item.to_string(),
            index: index.to_string(),
            collection: collection.to_string(),
        })
    }
}

/// Split at the first ` in ` surrounded by whitespace
fn split_in(source: &str) -> Option<(&str, &str)> {
    for (at, _) in source.match_indices("in") {
        let before = &source[..at];
        let after = &source[at + 2..];
        let spaced = before.ends_with(char::is_whitespace) && after.starts_with(char::is_whitespace);
        if spaced && !before.trim().is_empty() && !after.trim().is_empty() {
            return Some((before.trim(), after.trim()));
        }
    }
    None
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str) -> Option<Directive> {
        Directive::parse(name, &Config::default())
    }

    #[test]
    fn test_prefixed_names() {
        assert_eq!(parse("r-text"), Some(Directive::Text));
        assert_eq!(parse("r-for"), Some(Directive::For));
        assert_eq!(
            parse("r-bind:href"),
            Some(Directive::Bind { attribute: "href".into() })
        );
        assert_eq!(parse("r-unknown"), None);
        assert_eq!(parse("r-bind:"), None);
        assert_eq!(parse("class"), None);
    }

    #[test]
    fn test_shorthands() {
        assert_eq!(parse(":class"), Some(Directive::Bind { attribute: "class".into() }));
        assert_eq!(parse(":key"), None);
        assert_eq!(
            parse("@keydown.enter.prevent"),
            Some(Directive::On {
                event: "keydown".into(),
                modifiers: vec![Modifier::Enter, Modifier::Prevent],
            })
        );
        assert_eq!(
            parse("r-on:click.stop.once"),
            Some(Directive::On {
                event: "click".into(),
                modifiers: vec![Modifier::Stop, Modifier::Other("once".into())],
            })
        );
        assert_eq!(parse("@"), None);
    }

    #[test]
    fn test_custom_prefix() {
        let config = Config {
            prefix: "x-".into(),
            ..Config::default()
        };
        assert_eq!(Directive::parse("x-show", &config), Some(Directive::Show));
        assert_eq!(Directive::parse("r-show", &config), None);
    }

    #[test]
    fn test_directive_set_order() {
        let attrs = vec![
            ("@click".to_string(), "a()".to_string()),
            (":title".to_string(), "t".to_string()),
            ("r-text".to_string(), "msg".to_string()),
            (":href".to_string(), "url".to_string()),
            ("id".to_string(), "x".to_string()),
        ];
        let set = DirectiveSet::from_attributes(attrs, &Config::default());
        assert_eq!(set.text.as_deref(), Some("msg"));
        assert_eq!(set.binds, vec![("title".into(), "t".into()), ("href".into(), "url".into())]);
        assert_eq!(set.events.len(), 1);
        assert!(!set.is_empty());
        assert!(DirectiveSet::from_attributes(vec![], &Config::default()).is_empty());
    }

    #[test]
    fn test_list_grammar() {
        let spec = ListSpec::parse("item in items", "index").unwrap();
        assert_eq!((spec.item.as_str(), spec.index.as_str()), ("item", "index"));
        assert_eq!(spec.collection, "items");

        let spec = ListSpec::parse("(todo, i) in todos.filter(t => t.open)", "index").unwrap();
        assert_eq!((spec.item.as_str(), spec.index.as_str()), ("todo", "i"));
        assert_eq!(spec.collection, "todos.filter(t => t.open)");

        let spec = ListSpec::parse("(row) in  inbox", "n").unwrap();
        assert_eq!((spec.item.as_str(), spec.index.as_str(), spec.collection.as_str()), ("row", "n", "inbox"));
    }

    #[test]
    fn test_list_grammar_errors() {
        assert!(matches!(ListSpec::parse("items", "index"), Err(DirectiveError::ListSyntax(_))));
        assert!(matches!(ListSpec::parse("item in ", "index"), Err(DirectiveError::ListSyntax(_))));
        assert!(matches!(ListSpec::parse("(a, b, c) in xs", "index"), Err(DirectiveError::ListSyntax(_))));
        assert!(matches!(ListSpec::parse("a.b in xs", "index"), Err(DirectiveError::InvalidAlias(_))));
    }
}

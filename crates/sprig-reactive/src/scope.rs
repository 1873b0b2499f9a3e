//! Scope model
//!
//! Chained variable environments. Each link owns one frame: either the
//! wrapped state declared by a data-initialization directive, or a small
//! set of local bindings (list item and index aliases, host globals).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::observable::Observable;
use crate::value::Value;

/// One link's own bindings
pub enum Frame {
    /// Wrapped state; names resolve to its keys
    State(Observable),
    /// Plain local bindings
    Locals(RefCell<IndexMap<String, Value>>),
}

impl Frame {
    fn has(&self, name: &str) -> bool {
        match self {
            Frame::State(obs) => obs.has(name),
            Frame::Locals(locals) => locals.borrow().contains_key(name),
        }
    }

    fn get(&self, name: &str) -> Value {
        match self {
            Frame::State(obs) => obs.get(name),
            Frame::Locals(locals) => locals.borrow().get(name).cloned().unwrap_or_default(),
        }
    }

    fn set(&self, name: &str, value: Value) {
        match self {
            Frame::State(obs) => obs.set(name, value),
            Frame::Locals(locals) => {
                locals.borrow_mut().insert(name.to_string(), value);
            }
        }
    }
}

struct ScopeInner {
    frame: Frame,
    parent: Option<Scope>,
}

/// Shared handle to a scope chain link
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

impl Scope {
    fn link(frame: Frame, parent: Option<&Scope>) -> Self {
        Scope(Rc::new(ScopeInner {
            frame,
            parent: parent.cloned(),
        }))
    }

    /// An empty root scope
    pub fn root() -> Self {
        Self::locals(Vec::<(String, Value)>::new(), None)
    }

    /// A scope whose frame is `state`
    pub fn with_state(state: Observable, parent: Option<&Scope>) -> Self {
        Self::link(Frame::State(state), parent)
    }

    /// A scope with its own local bindings
    pub fn locals(bindings: impl IntoIterator<Item = (String, Value)>, parent: Option<&Scope>) -> Self {
        Self::link(Frame::Locals(RefCell::new(bindings.into_iter().collect())), parent)
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.0.parent.as_ref()
    }

    pub fn frame(&self) -> &Frame {
        &self.0.frame
    }

    /// This link's own state, if it is a state frame
    pub fn state(&self) -> Option<&Observable> {
        match &self.0.frame {
            Frame::State(obs) => Some(obs),
            Frame::Locals(_) => None,
        }
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.frame.has(name)
    }

    /// Walk the chain from this link outwards
    pub fn chain(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(self), |s| s.parent())
    }

    /// The link that defines `name`
    pub fn defining(&self, name: &str) -> Option<&Scope> {
        self.chain().find(|s| s.has_own(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.defining(name).is_some()
    }

    /// Resolve `name`; `None` when no link defines it
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.defining(name).map(|s| s.0.frame.get(name))
    }

    /// The observable that defines `name`, when it is a state frame
    pub fn defining_state(&self, name: &str) -> Option<Observable> {
        self.defining(name).and_then(Scope::state).cloned()
    }

    /// The nearest state frame on the chain
    pub fn nearest_state(&self) -> Option<Observable> {
        self.chain().find_map(Scope::state).cloned()
    }

    /// Assign `name`: write to the link that defines it, else to the
    /// nearest state frame, else to this link.
    pub fn assign(&self, name: &str, value: Value) {
        let target = self
            .defining(name)
            .or_else(|| self.chain().find(|s| s.state().is_some()))
            .unwrap_or(self);
        target.0.frame.set(name, value);
    }

    /// Bind `name` in this link's own frame
    pub fn define(&self, name: &str, value: Value) {
        self.0.frame.set(name, value);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.frame {
            Frame::State(obs) => format!("{obs:?}"),
            Frame::Locals(locals) => format!("Locals{:?}", locals.borrow().keys().collect::<Vec<_>>()),
        };
        f.debug_struct("Scope")
            .field("frame", &kind)
            .field("depth", &(self.chain().count() - 1))
            .finish()
    }
}

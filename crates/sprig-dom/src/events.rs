//! DOM Events
//!
//! Event objects, listener handles and bubbling dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{DomTree, NodeId};

/// Listener callback. Receives the event being dispatched.
pub type EventListener = Rc<dyn Fn(&mut Event)>;

/// Handle returned when a listener is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// DOM event
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
    pub current_target: Option<NodeId>,
    /// Keyboard key for key events (`"Enter"`, `"Escape"`, `" "`, `"Tab"`, ...)
    pub key: Option<String>,
    pub bubbles: bool,
    pub cancelable: bool,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    /// Create a bubbling, cancelable event
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            target: NodeId::NONE,
            current_target: None,
            key: None,
            bubbles: true,
            cancelable: true,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Create a keyboard event carrying `key`
    pub fn key(event_type: &str, key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new(event_type)
        }
    }

    /// Create an `input` event
    pub fn input() -> Self {
        Self::new("input")
    }

    /// Prevent default action
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// Stop propagation
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Check if default was prevented
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Dispatch `event` at `target`, bubbling through its ancestors.
///
/// Listeners are collected before each invocation so they may freely
/// borrow the tree. Returns `false` if a listener prevented the default.
pub fn dispatch_event(tree: &RefCell<DomTree>, target: NodeId, event: &mut Event) -> bool {
    event.target = target;

    let path = {
        let tree = tree.borrow();
        let mut path = vec![target];
        if event.bubbles {
            let mut current = tree.parent(target);
            while let Some(node) = current {
                path.push(node);
                current = tree.parent(node);
            }
        }
        path
    };

    for node in path {
        let listeners = tree.borrow().listeners_for(node, &event.event_type);
        event.current_target = Some(node);
        for listener in listeners {
            listener(event);
        }
        if event.propagation_stopped {
            break;
        }
    }

    event.current_target = None;
    !event.default_prevented
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_dispatch_bubbles_until_stopped() {
        let tree = RefCell::new(DomTree::new());
        let (outer, inner) = {
            let mut t = tree.borrow_mut();
            let outer = t.create_element("div");
            let inner = t.create_element("button");
            t.append_child(NodeId::ROOT, outer).unwrap();
            t.append_child(outer, inner).unwrap();
            (outer, inner)
        };

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        tree.borrow_mut()
            .add_event_listener(outer, "click", Rc::new(move |_e: &mut Event| h.set(h.get() + 1)));

        let mut event = Event::new("click");
        dispatch_event(&tree, inner, &mut event);
        assert_eq!(hits.get(), 1);

        tree.borrow_mut()
            .add_event_listener(inner, "click", Rc::new(|e: &mut Event| e.stop_propagation()));
        let mut event = Event::new("click");
        dispatch_event(&tree, inner, &mut event);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_prevent_default_reported() {
        let tree = RefCell::new(DomTree::new());
        let form = tree.borrow_mut().create_element("form");
        tree.borrow_mut()
            .add_event_listener(form, "submit", Rc::new(|e: &mut Event| e.prevent_default()));

        let mut event = Event::new("submit");
        assert!(!dispatch_event(&tree, form, &mut event));
        assert!(event.is_default_prevented());
    }
}

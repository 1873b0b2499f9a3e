//! Two-state future
//!
//! A value that is either waiting or settled (resolved / rejected).
//! Continuations always run on the microtask queue, never inline.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::event_loop;
use crate::value::Value;

/// Outcome of a settled future
#[derive(Debug, Clone)]
pub enum Settled {
    Resolved(Value),
    Rejected(String),
}

impl Settled {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Settled::Rejected(_))
    }
}

type Continuation = Box<dyn FnOnce(Settled)>;

enum State {
    Waiting(Vec<Continuation>),
    Settled(Settled),
}

/// Shared two-state future
#[derive(Clone)]
pub struct Pending(Rc<RefCell<State>>);

impl Default for Pending {
    fn default() -> Self {
        Self::new()
    }
}

impl Pending {
    pub fn new() -> Self {
        Pending(Rc::new(RefCell::new(State::Waiting(Vec::new()))))
    }

    pub fn resolved(value: Value) -> Self {
        Pending(Rc::new(RefCell::new(State::Settled(Settled::Resolved(value)))))
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Pending(Rc::new(RefCell::new(State::Settled(Settled::Rejected(reason.into())))))
    }

    pub fn resolve(&self, value: Value) {
        self.settle(Settled::Resolved(value));
    }

    pub fn reject(&self, reason: impl Into<String>) {
        self.settle(Settled::Rejected(reason.into()));
    }

    /// Settle once; later calls are ignored
    fn settle(&self, outcome: Settled) {
        let continuations = {
            let mut state = self.0.borrow_mut();
            if matches!(*state, State::Settled(_)) {
                return;
            }
            match std::mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Waiting(list) => list,
                State::Settled(_) => Vec::new(),
            }
        };
        for continuation in continuations {
            let outcome = outcome.clone();
            event_loop::queue_microtask(move || continuation(outcome));
        }
    }

    /// Run `continuation` after settlement, as a microtask
    pub fn on_settle(&self, continuation: impl FnOnce(Settled) + 'static) {
        let mut state = self.0.borrow_mut();
        match &mut *state {
            State::Waiting(list) => list.push(Box::new(continuation)),
            State::Settled(outcome) => {
                let outcome = outcome.clone();
                event_loop::queue_microtask(move || continuation(outcome));
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.0.borrow(), State::Waiting(_))
    }

    pub fn outcome(&self) -> Option<Settled> {
        match &*self.0.borrow() {
            State::Waiting(_) => None,
            State::Settled(outcome) => Some(outcome.clone()),
        }
    }

    pub fn ptr_eq(&self, other: &Pending) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome() {
            None => f.write_str("Pending(waiting)"),
            Some(outcome) => write!(f, "Pending({outcome:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_continuation_deferred_to_microtask() {
        let pending = Pending::new();
        let seen = Rc::new(Cell::new(false));
        let s = seen.clone();
        pending.on_settle(move |outcome| {
            assert!(matches!(outcome, Settled::Resolved(Value::Number(n)) if n == 7.0));
            s.set(true);
        });

        pending.resolve(Value::Number(7.0));
        assert!(!seen.get());
        event_loop::run_microtasks();
        assert!(seen.get());
    }

    #[test]
    fn test_settles_once() {
        let pending = Pending::new();
        pending.reject("nope");
        pending.resolve(Value::Null);
        assert!(pending.outcome().is_some_and(|o| o.is_rejected()));
    }

    #[test]
    fn test_already_settled_still_deferred() {
        let pending = Pending::resolved(Value::Undefined);
        let seen = Rc::new(Cell::new(false));
        let s = seen.clone();
        pending.on_settle(move |_| s.set(true));
        assert!(!seen.get());
        event_loop::run_microtasks();
        assert!(seen.get());
    }
}

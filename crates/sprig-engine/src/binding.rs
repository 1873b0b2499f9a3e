//! Directive bindings
//!
//! A [`Binding`] ties one directive on one node to the reactive model. It
//! owns the update [`Task`] handed to observables, remembers every
//! `(observable, key)` it registered under and every listener it attached,
//! and releases them all on teardown.
//!
//! Observables only ever hold the task, and the task only holds a weak
//! reference back to its binding, so a dropped binding goes quiet instead
//! of keeping its scope alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use sprig_reactive::{Observable, Scope, Task};

use crate::directive::Directive;
use crate::surface::Surface;

/// Live binding of one directive
pub(crate) struct Binding<S: Surface> {
    pub node: S::Node,
    pub directive: Directive,
    pub expression: String,
    pub scope: Scope,
    task: Task,
    registrations: RefCell<Vec<(Observable, String)>>,
    listeners: RefCell<Vec<S::ListenerId>>,
}

impl<S: Surface> Binding<S> {
    /// Create a binding whose task runs `update`
    pub fn new(
        node: S::Node,
        directive: Directive,
        expression: &str,
        scope: Scope,
        update: impl Fn(&Binding<S>) -> anyhow::Result<()> + 'static,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Binding<S>>| {
            let this = this.clone();
            let task = Task::new(move || match this.upgrade() {
                Some(binding) => update(&binding),
                None => Ok(()),
            });
            Binding {
                node,
                directive,
                expression: expression.to_string(),
                scope,
                task,
                registrations: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
            }
        })
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Run the update now
    pub fn update(&self) -> anyhow::Result<()> {
        self.task.run()
    }

    /// Make `dependencies` the binding's registrations: pairs no longer
    /// read are unobserved, new ones observed, repeats collapsed
    pub fn retrack(&self, dependencies: Vec<(Observable, String)>) {
        let mut next: Vec<(Observable, String)> = Vec::with_capacity(dependencies.len());
        for (observable, key) in dependencies {
            if !contains(&next, &observable, &key) {
                next.push((observable, key));
            }
        }
        let previous = self.registrations.take();
        for (observable, key) in &previous {
            if !contains(&next, observable, key) {
                observable.unobserve(key, &self.task);
            }
        }
        for (observable, key) in &next {
            observable.observe(key, self.task.clone());
        }
        *self.registrations.borrow_mut() = next;
    }

    #[cfg(test)]
    pub fn registration_count(&self) -> usize {
        self.registrations.borrow().len()
    }

    pub fn add_listener(&self, id: S::ListenerId) {
        self.listeners.borrow_mut().push(id);
    }

    /// Drop every registration and detach every listener
    pub fn release(&self, surface: &mut S) {
        for (observable, key) in self.registrations.take() {
            observable.unobserve(&key, &self.task);
        }
        for id in self.listeners.take() {
            surface.remove_listener(self.node, id);
        }
        tracing::trace!(node = ?self.node, directive = %self.directive, "binding released");
    }
}

fn contains(registrations: &[(Observable, String)], observable: &Observable, key: &str) -> bool {
    registrations
        .iter()
        .any(|(obs, k)| k == key && obs.ptr_eq(observable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_dom::{DomTree, NodeId};
    use sprig_reactive::Value;
    use std::cell::Cell;

    fn state() -> Observable {
        Observable::new(Value::from_json(&serde_json::json!({"a": 1, "b": 2}))).unwrap()
    }

    fn keys(obs: &Observable, names: &[&str]) -> Vec<(Observable, String)> {
        names.iter().map(|k| (obs.clone(), k.to_string())).collect()
    }

    #[test]
    fn test_retrack_is_deduplicated() {
        let obs = state();
        let binding: Rc<Binding<DomTree>> =
            Binding::new(NodeId::ROOT, Directive::Text, "a", Scope::root(), |_| Ok(()));
        binding.retrack(keys(&obs, &["a", "a", "b"]));
        binding.retrack(keys(&obs, &["a", "b"]));
        assert_eq!(binding.registration_count(), 2);
        assert_eq!(obs.observer_count("a"), 1);
    }

    #[test]
    fn test_retrack_drops_stale_keys() {
        let obs = state();
        let other = state();
        let binding: Rc<Binding<DomTree>> =
            Binding::new(NodeId::ROOT, Directive::Text, "a", Scope::root(), |_| Ok(()));
        binding.retrack(keys(&obs, &["a", "b"]));
        binding.retrack(keys(&other, &["a"]));
        assert_eq!(obs.observer_count("a"), 0);
        assert_eq!(obs.observer_count("b"), 0);
        assert_eq!(other.observer_count("a"), 1);
        assert_eq!(binding.registration_count(), 1);
    }

    #[test]
    fn test_release_unobserves_and_detaches() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let obs = state();
        let binding: Rc<Binding<DomTree>> =
            Binding::new(div, Directive::Show, "a", Scope::root(), |_| Ok(()));
        binding.retrack(keys(&obs, &["a"]));
        let id = tree.add_event_listener(div, "click", Rc::new(|_| {}));
        binding.add_listener(id);

        binding.release(&mut tree);
        assert_eq!(obs.observer_count("a"), 0);
        assert_eq!(tree.listener_count(div), 0);
        assert_eq!(binding.registration_count(), 0);
    }

    #[test]
    fn test_dropped_binding_goes_quiet() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let binding: Rc<Binding<DomTree>> =
            Binding::new(NodeId::ROOT, Directive::Text, "a", Scope::root(), move |_| {
                r.set(r.get() + 1);
                Ok(())
            });
        let task = binding.task().clone();
        task.run().unwrap();
        drop(binding);
        task.run().unwrap();
        assert_eq!(runs.get(), 1);
    }
}

//! Tree Walker
//!
//! Depth-first attachment. Each element is processed at most once until
//! it is torn down; directives apply in a fixed order (state, initializer,
//! list, effect, visibility, text, value, attribute bindings, events) and
//! children inherit the resolved scope.

use std::rc::Rc;

use sprig_reactive::{Pending, Scope, Settled};

use crate::diagnostics::DiagnosticKind;
use crate::directive::{DirectiveError, DirectiveSet};
use crate::engine::Runtime;
use crate::processor::StateInit;
use crate::surface::Surface;

impl<S: Surface> Runtime<S> {
    /// Process `node` and its element descendants
    pub(crate) fn visit(self: &Rc<Self>, node: S::Node, inherited: Option<Scope>) {
        let directives = {
            let surface = self.surface.borrow();
            if !surface.is_element(node) {
                return;
            }
            DirectiveSet::from_attributes(surface.attributes(node), &self.config)
        };
        if inherited.is_none() && self.under_suspended(node) {
            tracing::trace!(?node, "ancestor pending, left for later");
            return;
        }
        if !self.processed.borrow_mut().insert(node) {
            return;
        }
        let mut scope = inherited
            .or_else(|| self.ancestor_scope(node))
            .unwrap_or_else(|| self.globals.clone());

        if let Some(expression) = &directives.data {
            match self.init_state(node, expression, &scope) {
                Ok(StateInit::Installed(own)) => scope = own,
                Ok(StateInit::Inherited) => {}
                Ok(StateInit::Deferred(pending)) => {
                    self.scopes.borrow_mut().insert(node, scope.clone());
                    self.defer_state(node, pending, scope, directives);
                    return;
                }
                Err(err) => tracing::warn!(?node, error = %err, "state initialization failed"),
            }
        }
        self.scopes.borrow_mut().insert(node, scope.clone());
        self.attach(node, scope, &directives);
    }

    /// Everything after state initialization
    fn attach(self: &Rc<Self>, node: S::Node, scope: Scope, directives: &DirectiveSet) {
        let suspended = directives
            .init
            .as_deref()
            .and_then(|statements| self.run_init(node, statements, &scope).map(|p| (statements, p)));

        if let Some(expression) = &directives.list {
            let is_template = self.surface.borrow().tag_name(node).as_deref() == Some("template");
            if is_template {
                self.expand_list(node, expression, &scope);
                return;
            }
            self.report(
                DiagnosticKind::Grammar,
                expression,
                DirectiveError::NotATemplate.to_string(),
            );
        }

        if let Some(statements) = &directives.effect {
            self.bind_effect(node, statements, &scope);
        }
        if let Some(expression) = &directives.show {
            self.bind_show(node, expression, &scope);
        }
        if let Some(expression) = &directives.text {
            self.bind_text(node, expression, &scope);
        }
        if let Some(path) = &directives.model {
            self.bind_model(node, path, &scope);
        }
        for (attribute, expression) in &directives.binds {
            self.bind_attribute(node, attribute, expression, &scope);
        }
        for (event, modifiers, statements) in &directives.events {
            self.bind_event(node, event, modifiers.clone(), statements, &scope);
        }

        if let Some((statements, pending)) = suspended {
            self.suspend_children(node, statements, pending, scope);
            return;
        }
        let children = self.surface.borrow().element_children(node);
        for child in children {
            self.visit(child, Some(scope.clone()));
        }
    }

    /// Wait for a pending state initializer, then continue as usual
    fn defer_state(self: &Rc<Self>, node: S::Node, pending: Pending, enclosing: Scope, directives: DirectiveSet) {
        tracing::debug!(?node, "state initializer pending");
        self.suspended.borrow_mut().insert(node);
        let weak = Rc::downgrade(self);
        pending.on_settle(move |outcome| {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            let expression = directives.data.clone().unwrap_or_default();
            let value = match outcome {
                Settled::Resolved(value) => value,
                Settled::Rejected(reason) => {
                    runtime.report(DiagnosticKind::AsyncRejected, &expression, reason);
                    return;
                }
            };
            if !runtime.processed.borrow().contains(&node) {
                return;
            }
            runtime.suspended.borrow_mut().remove(&node);
            let scope = if value.is_structured() {
                match runtime.install_state(node, value, &enclosing) {
                    Ok(scope) => scope,
                    Err(err) => {
                        tracing::warn!(?node, error = %err, "deferred state rejected");
                        enclosing
                    }
                }
            } else {
                enclosing
            };
            runtime.scopes.borrow_mut().insert(node, scope.clone());
            // Descendants reached while pending were bound to the wrong scope
            runtime.release_children(node);
            runtime.attach(node, scope, &directives);
        });
    }

    /// Re-attach the children of `node` from scratch with `scope`
    pub(crate) fn resume_children(self: &Rc<Self>, node: S::Node, scope: &Scope) {
        if !self.processed.borrow().contains(&node) {
            return;
        }
        tracing::debug!(?node, "initializer settled, attaching children");
        self.suspended.borrow_mut().remove(&node);
        self.release_children(node);
        let children = self.surface.borrow().children(node);
        for child in children {
            self.visit(child, Some(scope.clone()));
        }
    }

    /// Tear down every child subtree of `node`, clearing processed markers
    fn release_children(&self, node: S::Node) {
        let children = self.surface.borrow().children(node);
        for child in children {
            self.teardown(child);
        }
    }
}

//! List expansion
//!
//! A `<template>` carrying the list directive is swapped for a marker
//! node. Every render tears down the previous instances, clones the first
//! element of the template content once per collection element, walks
//! each clone with an item scope and inserts it before the marker. The
//! watcher is paused while this happens and resumes after a grace delay.

use std::rc::Rc;

use sprig_reactive::{Scope, Value, event_loop};

use crate::binding::Binding;
use crate::diagnostics::DiagnosticKind;
use crate::directive::{Directive, ListSpec};
use crate::engine::{EngineError, Runtime};
use crate::surface::Surface;

/// One expanded list placeholder
pub(crate) struct ListState<S: Surface> {
    /// Anchor that replaced the template
    pub marker: S::Node,
    pub parent: S::Node,
    /// Rendered clones, in order
    pub instances: Vec<S::Node>,
}

impl<S: Surface> Runtime<S> {
    /// Replace `template` by a marker and render it against `scope`
    pub(crate) fn expand_list(self: &Rc<Self>, template: S::Node, expression: &str, scope: &Scope) {
        let spec = match ListSpec::parse(expression, &self.config.default_index_alias) {
            Ok(spec) => spec,
            Err(err) => {
                self.report(DiagnosticKind::Grammar, expression, err.to_string());
                return;
            }
        };
        if self.lists.borrow().contains_key(&template) {
            return;
        }
        let (parent, marker) = match self.place_marker(template) {
            Ok(Some(placed)) => placed,
            Ok(None) => {
                tracing::debug!(?template, "detached list template left alone");
                return;
            }
            Err(err) => {
                tracing::warn!(?template, error = %err, "cannot place list marker");
                return;
            }
        };
        self.lists.borrow_mut().insert(
            template,
            ListState {
                marker,
                parent,
                instances: Vec::new(),
            },
        );
        tracing::debug!(?template, item = %spec.item, collection = %spec.collection, "list expanded");

        let weak = Rc::downgrade(self);
        let collection = spec.collection.clone();
        let binding = Binding::new(template, Directive::For, &collection, scope.clone(), move |binding| {
            if let Some(runtime) = weak.upgrade() {
                runtime.render_list(binding, &spec);
            }
            Ok(())
        });
        if let Err(err) = binding.update() {
            tracing::warn!(?template, error = %err, "initial list render failed");
        }
        self.keep(binding);
    }

    fn place_marker(&self, template: S::Node) -> Result<Option<(S::Node, S::Node)>, EngineError> {
        let mut surface = self.surface.borrow_mut();
        let Some(parent) = surface.parent(template) else {
            return Ok(None);
        };
        let marker = surface.create_marker(&self.config.attribute("for"));
        surface
            .insert_before(parent, marker, Some(template))
            .map_err(EngineError::surface)?;
        surface.remove(template);
        Ok(Some((parent, marker)))
    }

    fn render_list(self: &Rc<Self>, binding: &Binding<S>, spec: &ListSpec) {
        let template = binding.node;
        let collection = self.evaluate(template, &spec.collection, &binding.scope);

        let (parent, marker, previous) = {
            let mut lists = self.lists.borrow_mut();
            let Some(list) = lists.get_mut(&template) else {
                return;
            };
            (list.parent, list.marker, std::mem::take(&mut list.instances))
        };

        self.paused.set(true);
        for instance in previous {
            self.teardown(instance);
            self.surface.borrow_mut().remove(instance);
        }
        self.track_dependencies(binding);

        let Some(items) = collection.list_items() else {
            self.paused.set(false);
            return;
        };

        let mut rendered = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let item_scope = Scope::locals(
                [
                    (spec.item.clone(), item),
                    (spec.index.clone(), Value::Number(index as f64)),
                ],
                Some(&binding.scope),
            );
            match self.render_item(template, parent, marker, item_scope) {
                Ok(Some(instance)) => rendered.push(instance),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(?template, index, error = %err, "list item render failed");
                    break;
                }
            }
        }
        tracing::trace!(?template, count = rendered.len(), "list rendered");
        if let Some(list) = self.lists.borrow_mut().get_mut(&template) {
            list.instances = rendered;
        }
        self.resume_watcher_later();
    }

    fn render_item(
        self: &Rc<Self>,
        template: S::Node,
        parent: S::Node,
        marker: S::Node,
        scope: Scope,
    ) -> Result<Option<S::Node>, EngineError> {
        let clone = self
            .surface
            .borrow_mut()
            .clone_template_item(template)
            .map_err(EngineError::surface)?;
        let Some(clone) = clone else {
            return Ok(None);
        };
        self.visit(clone, Some(scope));
        self.surface
            .borrow_mut()
            .insert_before(parent, clone, Some(marker))
            .map_err(EngineError::surface)?;
        Ok(Some(clone))
    }

    fn resume_watcher_later(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        event_loop::set_timeout(
            move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.paused.set(false);
                    tracing::trace!("watcher resumed");
                }
            },
            self.config.watcher_grace_ms,
        );
    }
}

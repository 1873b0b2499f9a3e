//! Live-mutation watcher
//!
//! After the initial walk the engine observes element insertions under
//! the document. Records are drained on a microtask; each inserted element
//! and every element descendant carrying a directive is walked without a
//! scope override. Records drained while the watcher is paused are dropped.

use std::rc::Rc;

use sprig_reactive::event_loop;

use crate::directive::Directive;
use crate::engine::Runtime;
use crate::surface::Surface;

impl<S: Surface> Runtime<S> {
    pub(crate) fn start_watcher(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let notify: Rc<dyn Fn()> = Rc::new(move || {
            let weak = weak.clone();
            event_loop::queue_microtask(move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.deliver_insertions();
                }
            });
        });
        let mut surface = self.surface.borrow_mut();
        let document = surface.document();
        surface.observe_insertions(document, notify);
        self.watching.set(true);
        tracing::debug!("watcher started");
    }

    fn deliver_insertions(self: &Rc<Self>) {
        let inserted = self.surface.borrow_mut().take_inserted();
        if self.paused.get() {
            tracing::trace!(discarded = inserted.len(), "watcher paused, records dropped");
            return;
        }
        for node in inserted {
            for element in self.directive_elements(node) {
                self.visit(element, None);
            }
        }
    }

    /// `root` and its element descendants that carry a directive, in
    /// document order
    fn directive_elements(&self, root: S::Node) -> Vec<S::Node> {
        let surface = self.surface.borrow();
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !surface.is_element(node) {
                continue;
            }
            let carries_directive = surface
                .attributes(node)
                .iter()
                .any(|(name, _)| Directive::parse(name, &self.config).is_some());
            if carries_directive {
                found.push(node);
            }
            stack.extend(surface.element_children(node).into_iter().rev());
        }
        found
    }
}

//! Surface capabilities
//!
//! Everything the engine does to the user-interface tree goes through
//! [`Surface`]. The engine holds the surface as `Rc<RefCell<S>>` and never
//! keeps a borrow across expression evaluation or listener invocation, so
//! an implementation is free to call back into listeners while borrowed
//! only through its own dispatch (see [`sprig_dom::dispatch_event`]).

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use sprig_dom::{DomError, DomTree, Event, ListenerId, MutationObserverInit, NodeId, ReadyState};

/// Event delivered to engine listeners
pub trait SurfaceEvent {
    fn event_type(&self) -> &str;
    /// Keyboard key (`"Enter"`, `" "`, ...), if any
    fn key(&self) -> Option<&str>;
    fn prevent_default(&mut self);
    fn stop_propagation(&mut self);
}

/// Listener callback registered by the engine
pub type Listener<E> = Rc<dyn Fn(&mut E)>;

/// Capability set of a tree-structured UI surface
pub trait Surface: 'static {
    type Node: Copy + Eq + Hash + fmt::Debug + 'static;
    type ListenerId: Copy + fmt::Debug + 'static;
    type Event: SurfaceEvent;
    type Error: std::error::Error + Send + Sync + 'static;

    // === Structure ===

    /// Root of the observed document
    fn document(&self) -> Self::Node;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    /// All child nodes (text and markers included)
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;
    fn element_children(&self, node: Self::Node) -> Vec<Self::Node>;
    fn is_element(&self, node: Self::Node) -> bool;
    /// Lower-case tag name of an element
    fn tag_name(&self, node: Self::Node) -> Option<String>;
    /// `(name, value)` pairs in attribute order
    fn attributes(&self, node: Self::Node) -> Vec<(String, String)>;

    // === Attributes & content ===

    fn get_attribute(&self, node: Self::Node, name: &str) -> Option<String>;
    fn has_attribute(&self, node: Self::Node, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }
    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str) -> Result<(), Self::Error>;
    fn remove_attribute(&mut self, node: Self::Node, name: &str) -> Result<(), Self::Error>;
    fn set_text(&mut self, node: Self::Node, text: &str) -> Result<(), Self::Error>;
    fn set_displayed(&mut self, node: Self::Node, displayed: bool) -> Result<(), Self::Error>;
    fn add_class(&mut self, node: Self::Node, token: &str) -> Result<(), Self::Error>;
    fn remove_class(&mut self, node: Self::Node, token: &str) -> Result<(), Self::Error>;
    /// Replace the inline style
    fn set_style_text(&mut self, node: Self::Node, css: &str) -> Result<(), Self::Error>;
    /// Merge one inline style property
    fn set_style_property(&mut self, node: Self::Node, name: &str, value: &str) -> Result<(), Self::Error>;

    // === Form state ===

    /// Lower-case input type (`"text"` when absent)
    fn input_type(&self, node: Self::Node) -> String;
    fn value(&self, node: Self::Node) -> String;
    fn set_value(&mut self, node: Self::Node, value: &str) -> Result<(), Self::Error>;
    fn checked(&self, node: Self::Node) -> bool;
    fn set_checked(&mut self, node: Self::Node, checked: bool) -> Result<(), Self::Error>;
    fn set_selected(&mut self, node: Self::Node, selected: bool) -> Result<(), Self::Error>;
    fn set_disabled(&mut self, node: Self::Node, disabled: bool) -> Result<(), Self::Error>;

    // === Listeners ===

    fn add_listener(
        &mut self,
        node: Self::Node,
        event_type: &str,
        listener: Listener<Self::Event>,
    ) -> Self::ListenerId;
    fn remove_listener(&mut self, node: Self::Node, listener: Self::ListenerId);

    // === Templates & insertion ===

    /// Deep clone of the first element of a template's content
    fn clone_template_item(&mut self, template: Self::Node) -> Result<Option<Self::Node>, Self::Error>;
    /// Content-less anchor node
    fn create_marker(&mut self, label: &str) -> Self::Node;
    /// Insert `node` under `parent` before `reference` (append when `None`)
    fn insert_before(
        &mut self,
        parent: Self::Node,
        node: Self::Node,
        reference: Option<Self::Node>,
    ) -> Result<(), Self::Error>;
    /// Detach `node` from its parent
    fn remove(&mut self, node: Self::Node);

    // === Observation & document ===

    /// Record element insertions under `root`; `notify` fires (possibly
    /// while the surface is borrowed) when a first record is queued.
    fn observe_insertions(&mut self, root: Self::Node, notify: Rc<dyn Fn()>);
    /// Drain the nodes inserted since the last call
    fn take_inserted(&mut self) -> Vec<Self::Node>;
    fn is_loading(&self) -> bool;
    /// Connected elements carrying `name`, in document order
    fn elements_with_attribute(&self, name: &str) -> Vec<Self::Node>;
}

impl SurfaceEvent for Event {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn prevent_default(&mut self) {
        Event::prevent_default(self);
    }

    fn stop_propagation(&mut self) {
        Event::stop_propagation(self);
    }
}

impl Surface for DomTree {
    type Node = NodeId;
    type ListenerId = ListenerId;
    type Event = Event;
    type Error = DomError;

    fn document(&self) -> NodeId {
        NodeId::ROOT
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        DomTree::parent(self, node)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        DomTree::children(self, node)
    }

    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        DomTree::element_children(self, node)
    }

    fn is_element(&self, node: NodeId) -> bool {
        DomTree::is_element(self, node)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        DomTree::tag_name(self, node).map(str::to_string)
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        DomTree::attributes(self, node)
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        DomTree::get_attribute(self, node, name).map(str::to_string)
    }

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        DomTree::has_attribute(self, node, name)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        DomTree::set_attribute(self, node, name, value)
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        DomTree::remove_attribute(self, node, name)
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.set_text_content(node, text)
    }

    fn set_displayed(&mut self, node: NodeId, displayed: bool) -> Result<(), DomError> {
        DomTree::set_displayed(self, node, displayed)
    }

    fn add_class(&mut self, node: NodeId, token: &str) -> Result<(), DomError> {
        DomTree::add_class(self, node, token)
    }

    fn remove_class(&mut self, node: NodeId, token: &str) -> Result<(), DomError> {
        DomTree::remove_class(self, node, token)
    }

    fn set_style_text(&mut self, node: NodeId, css: &str) -> Result<(), DomError> {
        DomTree::set_attribute(self, node, "style", css)
    }

    fn set_style_property(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        DomTree::set_style_property(self, node, name, value)
    }

    fn input_type(&self, node: NodeId) -> String {
        self.get(node)
            .and_then(|n| n.as_element())
            .map(|e| e.input_type())
            .unwrap_or_default()
    }

    fn value(&self, node: NodeId) -> String {
        DomTree::value(self, node)
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        DomTree::set_value(self, node, value)
    }

    fn checked(&self, node: NodeId) -> bool {
        DomTree::checked(self, node)
    }

    fn set_checked(&mut self, node: NodeId, checked: bool) -> Result<(), DomError> {
        DomTree::set_checked(self, node, checked)
    }

    fn set_selected(&mut self, node: NodeId, selected: bool) -> Result<(), DomError> {
        DomTree::set_selected(self, node, selected)
    }

    fn set_disabled(&mut self, node: NodeId, disabled: bool) -> Result<(), DomError> {
        DomTree::set_disabled(self, node, disabled)
    }

    fn add_listener(&mut self, node: NodeId, event_type: &str, listener: Listener<Event>) -> ListenerId {
        self.add_event_listener(node, event_type, listener)
    }

    fn remove_listener(&mut self, node: NodeId, listener: ListenerId) {
        self.remove_event_listener(node, listener);
    }

    fn clone_template_item(&mut self, template: NodeId) -> Result<Option<NodeId>, DomError> {
        let Some(content) = self.template_content(template) else {
            return Ok(None);
        };
        match DomTree::element_children(self, content).first() {
            Some(&first) => self.clone_node(first, true).map(Some),
            None => Ok(None),
        }
    }

    fn create_marker(&mut self, label: &str) -> NodeId {
        self.create_comment(label)
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> Result<(), DomError> {
        DomTree::insert_before(self, parent, node, reference)
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn observe_insertions(&mut self, root: NodeId, notify: Rc<dyn Fn()>) {
        let options = MutationObserverInit {
            child_list: true,
            subtree: true,
        };
        self.observe(root, options, notify);
    }

    fn take_inserted(&mut self) -> Vec<NodeId> {
        self.take_records()
            .into_iter()
            .flat_map(|record| record.added_nodes)
            .collect()
    }

    fn is_loading(&self) -> bool {
        self.ready_state() == ReadyState::Loading
    }

    fn elements_with_attribute(&self, name: &str) -> Vec<NodeId> {
        DomTree::elements_with_attribute(self, name)
    }
}

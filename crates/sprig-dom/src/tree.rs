//! DOM Tree (arena-based allocation)
//!
//! All nodes live in one `Vec<Node>`; `NodeId` indexes into it. Removed
//! nodes stay allocated (detached) so stale ids never alias a new node.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::events::{EventListener, ListenerId};
use crate::observer::{MutationObserver, MutationObserverInit, MutationRecord};
use crate::{DOMTokenList, DomError, DomResult, Node, NodeData, NodeId, StyleDeclaration};

/// Document loading state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Loading,
    Interactive,
    Complete,
}

struct ListenerEntry {
    id: ListenerId,
    event_type: String,
    listener: EventListener,
}

/// Arena-based DOM tree
pub struct DomTree {
    nodes: Vec<Node>,
    listeners: HashMap<NodeId, Vec<ListenerEntry>>,
    next_listener: u32,
    observer: Option<MutationObserver>,
    ready_state: ReadyState,
}

impl fmt::Debug for DomTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomTree")
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.values().map(Vec::len).sum::<usize>())
            .field("observer", &self.observer)
            .field("ready_state", &self.ready_state)
            .finish()
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a tree holding only the document node (`NodeId::ROOT`)
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::document()],
            listeners: HashMap::new(),
            next_listener: 0,
            observer: None,
            ready_state: ReadyState::Loading,
        }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes ever allocated
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound(id))
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    // === Creation ===

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Node::element(tag))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.alloc(Node::text(content))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.alloc(Node::comment(content))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(Node::fragment())
    }

    // === Navigation ===

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_valid())
    }

    /// All child nodes in order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.get(id).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        while let Some(node) = self.get(current) {
            out.push(current);
            current = node.next_sibling;
        }
        out
    }

    /// Element children in order
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Descendants in document (pre-)order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }
        out
    }

    /// True if `node` is `ancestor` or lies beneath it
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// True if the node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(NodeId::ROOT, id)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_element)
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.as_element().map(|e| e.tag.as_str())
    }

    // === Mutation ===

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end when `None`).
    ///
    /// Inserting a fragment moves its children. A node that is already
    /// attached elsewhere is detached first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.node(parent)?;
        let child_node = self.node(child)?;
        if matches!(child_node.data, NodeData::Document) || self.contains(child, parent) {
            return Err(DomError::HierarchyRequest(child, parent));
        }
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(DomError::NotAChild(r, parent));
            }
        }

        let moved = if matches!(child_node.data, NodeData::Fragment) {
            let kids = self.children(child);
            for kid in &kids {
                self.unlink(*kid);
            }
            kids
        } else {
            self.unlink(child);
            vec![child]
        };

        for node in &moved {
            self.link(parent, *node, reference);
        }
        self.record_insertion(parent, &moved);
        Ok(())
    }

    /// Remove `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild(child, parent));
        }
        self.unlink(child);
        Ok(())
    }

    /// Detach a node from wherever it is. No-op for detached nodes.
    pub fn detach(&mut self, id: NodeId) {
        self.unlink(id);
    }

    fn link(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let prev = match reference {
            Some(r) => self.nodes[r.index()].prev_sibling,
            None => self.nodes[parent.index()].last_child,
        };
        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = reference.unwrap_or(NodeId::NONE);
        }
        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        match reference {
            Some(r) => self.nodes[r.index()].prev_sibling = child,
            None => self.nodes[parent.index()].last_child = child,
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if !parent.is_valid() {
            return;
        }
        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }
        let node = &mut self.nodes[id.index()];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    // === Attributes ===

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id)?.as_element()?.get_attr(name)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get(id)
            .and_then(Node::as_element)
            .is_some_and(|e| e.has_attr(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let el = self.element_mut(id)?;
        el.set_attr(name, value);
        match name {
            "value" if el.tag != "option" => el.value = value.to_string(),
            "checked" => el.checked = true,
            "selected" => el.selected = true,
            "disabled" => el.disabled = true,
            _ => {}
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<()> {
        let el = self.element_mut(id)?;
        el.remove_attr(name);
        match name {
            "checked" => el.checked = false,
            "selected" => el.selected = false,
            "disabled" => el.disabled = false,
            _ => {}
        }
        Ok(())
    }

    /// `(name, value)` pairs in attribute order
    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.get(id)
            .and_then(Node::as_element)
            .map(|e| {
                e.attrs
                    .iter()
                    .map(|a| (a.name.clone(), a.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn element_mut(&mut self, id: NodeId) -> DomResult<&mut crate::ElementData> {
        self.get_mut(id)
            .ok_or(DomError::NotFound(id))?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(id))
    }

    fn element(&self, id: NodeId) -> DomResult<&crate::ElementData> {
        self.node(id)?.as_element().ok_or(DomError::NotAnElement(id))
    }

    // === Text ===

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Text(t)) | Some(NodeData::Comment(t)) => t.clone(),
            Some(_) => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| self.get(d).and_then(Node::as_text))
                .collect(),
            None => String::new(),
        }
    }

    /// Replace all children with a single text node (none for `""`)
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        match &mut self.get_mut(id).ok_or(DomError::NotFound(id))?.data {
            NodeData::Text(t) | NodeData::Comment(t) => {
                *t = text.to_string();
                return Ok(());
            }
            _ => {}
        }
        for child in self.children(id) {
            self.unlink(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.link(id, node, None);
        }
        Ok(())
    }

    // === Class tokens ===

    pub fn class_list(&self, id: NodeId) -> DOMTokenList {
        DOMTokenList::from_string(self.get_attribute(id, "class").unwrap_or(""))
    }

    pub fn has_class(&self, id: NodeId, token: &str) -> bool {
        self.class_list(id).contains(token)
    }

    pub fn add_class(&mut self, id: NodeId, token: &str) -> DomResult<()> {
        let mut list = self.class_list(id);
        if list.add(token) {
            self.set_attribute(id, "class", &list.value())?;
        }
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, token: &str) -> DomResult<()> {
        let mut list = self.class_list(id);
        if list.remove(token) {
            self.set_attribute(id, "class", &list.value())?;
        }
        Ok(())
    }

    // === Inline style ===

    pub fn style(&self, id: NodeId) -> StyleDeclaration {
        StyleDeclaration::parse(self.get_attribute(id, "style").unwrap_or(""))
    }

    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        self.style(id).get(name).map(str::to_string)
    }

    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let mut decl = self.style(id);
        decl.set(name, value);
        if decl.is_empty() {
            self.remove_attribute(id, "style")
        } else {
            self.set_attribute(id, "style", &decl.to_css_text())
        }
    }

    /// Toggle `display: none`
    pub fn set_displayed(&mut self, id: NodeId, displayed: bool) -> DomResult<()> {
        self.set_style_property(id, "display", if displayed { "" } else { "none" })
    }

    pub fn is_displayed(&self, id: NodeId) -> bool {
        self.style_property(id, "display").as_deref() != Some("none")
    }

    // === Form properties ===

    pub fn value(&self, id: NodeId) -> String {
        self.element(id).map(|e| e.value.clone()).unwrap_or_default()
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) -> DomResult<()> {
        let tag = self.element(id)?.tag.clone();
        if tag == "select" {
            for option in self.descendants(id) {
                if self.tag_name(option) == Some("option") {
                    let option_value = self
                        .get_attribute(option, "value")
                        .map(str::to_string)
                        .unwrap_or_else(|| self.text_content(option));
                    self.element_mut(option)?.selected = option_value == value;
                }
            }
        }
        self.element_mut(id)?.value = value.to_string();
        Ok(())
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id).is_ok_and(|e| e.checked)
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> DomResult<()> {
        self.element_mut(id)?.checked = checked;
        Ok(())
    }

    pub fn selected(&self, id: NodeId) -> bool {
        self.element(id).is_ok_and(|e| e.selected)
    }

    pub fn set_selected(&mut self, id: NodeId, selected: bool) -> DomResult<()> {
        self.element_mut(id)?.selected = selected;
        Ok(())
    }

    pub fn disabled(&self, id: NodeId) -> bool {
        self.element(id).is_ok_and(|e| e.disabled)
    }

    pub fn set_disabled(&mut self, id: NodeId, disabled: bool) -> DomResult<()> {
        self.element_mut(id)?.disabled = disabled;
        Ok(())
    }

    // === Templates & cloning ===

    /// Content fragment of a `<template>` element, created on first access.
    /// `None` for anything that is not a template.
    pub fn template_content(&mut self, id: NodeId) -> Option<NodeId> {
        let existing = self.get(id)?.as_element().filter(|e| e.is_template())?.template_content;
        if existing.is_some() {
            return existing;
        }
        let fragment = self.create_fragment();
        self.element_mut(id).ok()?.template_content = Some(fragment);
        Some(fragment)
    }

    /// Copy a node (and its subtree when `deep`). Attributes, form
    /// properties and template content are copied; listeners are not.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> DomResult<NodeId> {
        let mut data = self.node(id)?.data.clone();
        if let NodeData::Element(el) = &mut data {
            if let Some(content) = el.template_content {
                el.template_content = Some(self.clone_node(content, true)?);
            }
        }
        let copy = self.alloc(Node {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        });
        if deep {
            for child in self.children(id) {
                let child_copy = self.clone_node(child, true)?;
                self.link(copy, child_copy, None);
            }
        }
        Ok(copy)
    }

    // === Event listeners ===

    pub fn add_event_listener(
        &mut self,
        id: NodeId,
        event_type: &str,
        listener: EventListener,
    ) -> ListenerId {
        let lid = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.entry(id).or_default().push(ListenerEntry {
            id: lid,
            event_type: event_type.to_string(),
            listener,
        });
        lid
    }

    /// Remove a listener; returns false if it was not registered on `id`
    pub fn remove_event_listener(&mut self, id: NodeId, listener: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(&id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != listener);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.listeners.remove(&id);
        }
        removed
    }

    /// Listeners for `event_type` on `id`, in registration order
    pub fn listeners_for(&self, id: NodeId, event_type: &str) -> Vec<EventListener> {
        self.listeners
            .get(&id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.event_type == event_type)
                    .map(|e| e.listener.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn listener_count(&self, id: NodeId) -> usize {
        self.listeners.get(&id).map_or(0, Vec::len)
    }

    // === Mutation observation ===

    /// Start recording insertions under `root`. Replaces any previous observer.
    pub fn observe(&mut self, root: NodeId, options: MutationObserverInit, notify: Rc<dyn Fn()>) {
        self.observer = Some(MutationObserver::new(root, options, notify));
    }

    pub fn disconnect(&mut self) {
        self.observer = None;
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        self.observer
            .as_mut()
            .map(MutationObserver::take_records)
            .unwrap_or_default()
    }

    fn record_insertion(&mut self, parent: NodeId, added: &[NodeId]) {
        let Some(observer) = &self.observer else {
            return;
        };
        let options = observer.options();
        let root = observer.root();
        let in_scope = parent == root || (options.subtree && self.contains(root, parent));
        // Only element insertions are interesting to observers here
        let has_element = added.iter().any(|n| self.is_element(*n));
        if !options.child_list || !in_scope || !has_element {
            return;
        }
        let record = MutationRecord {
            target: parent,
            added_nodes: added.to_vec(),
        };
        if let Some(observer) = self.observer.as_mut() {
            observer.push_record(record);
        }
    }

    // === Document ===

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        tracing::debug!(?state, "document ready state changed");
        self.ready_state = state;
    }

    /// Connected elements carrying `name`, in document order
    pub fn elements_with_attribute(&self, name: &str) -> Vec<NodeId> {
        self.descendants(NodeId::ROOT)
            .into_iter()
            .filter(|id| self.has_attribute(*id, name))
            .collect()
    }

    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(NodeId::ROOT)
            .into_iter()
            .find(|id| self.get_attribute(*id, "id") == Some(value))
    }

    /// Connected elements with the given tag, in document order
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.descendants(NodeId::ROOT)
            .into_iter()
            .filter(|id| self.tag_name(*id) == Some(tag.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_append_and_order() {
        let mut tree = DomTree::new();
        let ul = tree.create_element("ul");
        tree.append_child(NodeId::ROOT, ul).unwrap();
        let a = tree.create_element("li");
        let c = tree.create_element("li");
        let b = tree.create_element("li");
        tree.append_child(ul, a).unwrap();
        tree.append_child(ul, c).unwrap();
        tree.insert_before(ul, b, Some(c)).unwrap();

        assert_eq!(tree.children(ul), vec![a, b, c]);
        assert_eq!(tree.parent(b), Some(ul));

        tree.remove_child(ul, b).unwrap();
        assert_eq!(tree.children(ul), vec![a, c]);
        assert_eq!(tree.parent(b), None);
    }

    #[test]
    fn test_hierarchy_errors() {
        let mut tree = DomTree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("div");
        tree.append_child(outer, inner).unwrap();

        assert_eq!(
            tree.append_child(inner, outer),
            Err(DomError::HierarchyRequest(outer, inner))
        );
        let stray = tree.create_element("p");
        assert_eq!(
            tree.insert_before(outer, stray, Some(stray)),
            Err(DomError::NotAChild(stray, outer))
        );
    }

    #[test]
    fn test_fragment_insertion_moves_children() {
        let mut tree = DomTree::new();
        let host = tree.create_element("div");
        let frag = tree.create_fragment();
        let a = tree.create_element("span");
        let b = tree.create_element("span");
        tree.append_child(frag, a).unwrap();
        tree.append_child(frag, b).unwrap();

        tree.append_child(host, frag).unwrap();
        assert_eq!(tree.children(host), vec![a, b]);
        assert!(tree.children(frag).is_empty());
    }

    #[test]
    fn test_text_content() {
        let mut tree = DomTree::new();
        let p = tree.create_element("p");
        tree.set_text_content(p, "hello").unwrap();
        assert_eq!(tree.text_content(p), "hello");
        tree.set_text_content(p, "").unwrap();
        assert!(tree.children(p).is_empty());
    }

    #[test]
    fn test_class_and_style() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        tree.add_class(div, "a").unwrap();
        tree.add_class(div, "b").unwrap();
        tree.remove_class(div, "a").unwrap();
        assert_eq!(tree.get_attribute(div, "class"), Some("b"));

        tree.set_displayed(div, false).unwrap();
        assert!(!tree.is_displayed(div));
        tree.set_displayed(div, true).unwrap();
        assert!(tree.is_displayed(div));
        assert!(!tree.has_attribute(div, "style"));
    }

    #[test]
    fn test_clone_copies_template_content() {
        let mut tree = DomTree::new();
        let template = tree.create_element("template");
        let content = tree.template_content(template).unwrap();
        let li = tree.create_element("li");
        tree.set_attribute(li, "class", "item").unwrap();
        tree.append_child(content, li).unwrap();

        let copy = tree.clone_node(template, true).unwrap();
        let copy_content = tree.template_content(copy).unwrap();
        assert_ne!(copy_content, content);
        let copied_li = tree.children(copy_content)[0];
        assert_ne!(copied_li, li);
        assert_eq!(tree.get_attribute(copied_li, "class"), Some("item"));
    }

    #[test]
    fn test_insertion_records_only_under_root() {
        let mut tree = DomTree::new();
        let body = tree.create_element("body");
        tree.append_child(NodeId::ROOT, body).unwrap();

        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        tree.observe(
            body,
            MutationObserverInit { child_list: true, subtree: true },
            Rc::new(move || f.set(f.get() + 1)),
        );

        let detached = tree.create_element("div");
        let inner = tree.create_element("span");
        tree.append_child(detached, inner).unwrap();
        assert!(tree.take_records().is_empty());

        tree.append_child(body, detached).unwrap();
        let text = tree.create_text("x");
        tree.append_child(body, text).unwrap();

        let records = tree.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].added_nodes, vec![detached]);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_select_value_marks_option() {
        let mut tree = DomTree::new();
        let select = tree.create_element("select");
        let a = tree.create_element("option");
        tree.set_attribute(a, "value", "a").unwrap();
        let b = tree.create_element("option");
        tree.set_attribute(b, "value", "b").unwrap();
        tree.append_child(select, a).unwrap();
        tree.append_child(select, b).unwrap();

        tree.set_value(select, "b").unwrap();
        assert!(!tree.selected(a));
        assert!(tree.selected(b));
        assert_eq!(tree.value(select), "b");
    }
}

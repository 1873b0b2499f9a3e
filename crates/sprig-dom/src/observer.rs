//! Mutation observation
//!
//! A single child-list observer per tree. Insertions under the observed
//! root are queued as records; the first record of a batch fires the
//! notify hook so the host can schedule delivery (microtask style).

use std::fmt;
use std::rc::Rc;

use crate::NodeId;

/// Mutation observer options
#[derive(Debug, Clone, Copy, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub subtree: bool,
}

/// Mutation record (child-list only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
}

/// Mutation observer
pub struct MutationObserver {
    root: NodeId,
    options: MutationObserverInit,
    records: Vec<MutationRecord>,
    notify: Rc<dyn Fn()>,
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("records", &self.records.len())
            .finish()
    }
}

impl MutationObserver {
    pub fn new(root: NodeId, options: MutationObserverInit, notify: Rc<dyn Fn()>) -> Self {
        Self {
            root,
            options,
            records: Vec::new(),
            notify,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn options(&self) -> MutationObserverInit {
        self.options
    }

    /// Queue a record, firing the notify hook when the queue was empty
    pub fn push_record(&mut self, record: MutationRecord) {
        let was_empty = self.records.is_empty();
        self.records.push(record);
        if was_empty {
            (self.notify)();
        }
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }
}

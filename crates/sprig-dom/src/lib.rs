//! Sprig DOM - In-memory surface tree
//!
//! Arena-based element tree used as the reference surface for the Sprig
//! binding engine. Provides the capability set the engine needs:
//! attributes, text, class tokens, inline style, form properties,
//! template content cloning, event listeners and insertion records.

mod classlist;
mod events;
mod markup;
mod node;
mod observer;
mod style;
mod tree;

pub use classlist::DOMTokenList;
pub use events::{Event, EventListener, ListenerId, dispatch_event};
pub use node::{Attribute, ElementData, Node, NodeData};
pub use observer::{MutationObserver, MutationObserverInit, MutationRecord};
pub use style::StyleDeclaration;
pub use tree::{DomTree, ReadyState};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Document root node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this ID points at a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result type for tree operations
pub type DomResult<T> = Result<T, DomError>;

/// Tree operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node {0} not found")]
    NotFound(NodeId),

    #[error("hierarchy request error: {0} cannot be inserted into {1}")]
    HierarchyRequest(NodeId, NodeId),

    #[error("node {0} is not a child of {1}")]
    NotAChild(NodeId, NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("malformed markup at byte {offset}: {message}")]
    Markup { offset: usize, message: String },
}

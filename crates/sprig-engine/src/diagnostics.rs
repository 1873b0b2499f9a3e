//! Diagnostics channel
//!
//! Failures inside directive expressions are never fatal. They are turned
//! into [`Diagnostic`]s and handed to a [`DiagnosticSink`]; the directive
//! yields `undefined` and the walk continues.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Expression or statement failed (other than an absence error)
    Evaluation,
    /// Malformed directive; the directive is a no-op
    Grammar,
    /// An async initializer rejected; its subtree stays unprocessed
    AsyncRejected,
}

/// One reported failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Source text of the offending directive
    pub expression: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} in `{}`: {}", self.kind, self.expression, self.message)
    }
}

/// Receiver of diagnostics
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Default sink: logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.kind {
            DiagnosticKind::AsyncRejected => tracing::error!(
                expression = %diagnostic.expression,
                "async initializer rejected: {}",
                diagnostic.message
            ),
            kind => tracing::warn!(
                ?kind,
                expression = %diagnostic.expression,
                "{}",
                diagnostic.message
            ),
        }
    }
}

/// Sink that keeps every diagnostic, for hosts and tests
#[derive(Debug, Default, Clone)]
pub struct CollectingSink(Rc<RefCell<Vec<Diagnostic>>>);

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Snapshot of everything reported so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.0.borrow().clone()
    }

    /// Drain everything reported so far
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "diagnostic collected");
        self.0.borrow_mut().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_shares_storage() {
        let sink = CollectingSink::new();
        let handle = sink.clone();
        sink.report(Diagnostic {
            kind: DiagnosticKind::Grammar,
            expression: "items".into(),
            message: "bad".into(),
        });
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.take()[0].kind, DiagnosticKind::Grammar);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_serializes_for_hosts() {
        let diagnostic = Diagnostic {
            kind: DiagnosticKind::AsyncRejected,
            expression: "load()".into(),
            message: "offline".into(),
        };
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "async_rejected");
        assert_eq!(json["message"], "offline");
    }
}

//! Evaluator contract
//!
//! The directive engine never parses expressions itself; it hands source
//! text to an injected [`Evaluator`] together with a scope and context.

use crate::scope::Scope;
use crate::value::Value;

/// Expression evaluation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Reading through `undefined`/`null`. Expected; callers swallow it.
    #[error("cannot read properties of {base} (reading '{property}')")]
    Absent { property: String, base: &'static str },

    #[error("{0} is not defined")]
    Reference(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    /// Error raised by a host function
    #[error("{0}")]
    Thrown(String),
}

impl EvalError {
    /// True for the expected dereference-of-nothing failure
    pub fn is_absence(&self) -> bool {
        matches!(self, EvalError::Absent { .. })
    }
}

/// Per-evaluation context
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Current element handle (`$el` when the scope does not define it)
    pub element: Option<Value>,
    /// Triggering event (`$event`)
    pub event: Option<Value>,
}

impl EvalContext {
    pub fn for_element(element: Value) -> Self {
        Self {
            element: Some(element),
            event: None,
        }
    }

    pub fn with_event(mut self, event: Value) -> Self {
        self.event = Some(event);
        self
    }
}

/// Injected expression evaluator
pub trait Evaluator {
    /// Evaluate a single expression
    fn evaluate(&self, expr: &str, scope: &Scope, ctx: &EvalContext) -> Result<Value, EvalError>;

    /// Execute statements; yields the value of the last one (or of `return`)
    fn execute(&self, statements: &str, scope: &Scope, ctx: &EvalContext)
        -> Result<Value, EvalError>;

    /// Root identifiers the expression reads, in first-occurrence order
    fn free_identifiers(&self, expr: &str) -> Vec<String>;
}

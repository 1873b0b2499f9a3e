//! Sprig Reactive - state, scheduling and scopes
//!
//! - [`Value`]: dynamic value domain
//! - [`Observable`]: wrapped record/list with a per-key task registry
//! - [`scheduler`]: coalescing update queue flushed once per turn
//! - [`event_loop`]: thread-local microtasks and virtual-clock timers
//! - [`Pending`]: two-state future
//! - [`Scope`]: chained environments
//! - [`Evaluator`]: injected expression evaluator contract

pub mod event_loop;
mod evaluator;
pub mod observable;
mod pending;
pub mod scheduler;
mod scope;
mod value;

pub use evaluator::{EvalContext, EvalError, Evaluator};
pub use observable::{Observable, wrap};
pub use pending::{Pending, Settled};
pub use scheduler::Task;
pub use scope::{Frame, Scope};
pub use value::{Function, ListRef, Map, RecordRef, Value, format_number};

/// Reactive layer errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReactiveError {
    #[error("cannot observe a value of type {0}")]
    NotStructured(&'static str),
}

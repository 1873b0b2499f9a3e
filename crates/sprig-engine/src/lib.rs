//! Sprig Engine - Attribute-driven reactive bindings
//!
//! Keeps a surface tree in sync with observable state:
//! - Directive attributes (`r-data`, `r-text`, `:attr`, `@event`, `r-for`, ...)
//! - Per-key dependency registration on [`sprig_reactive::Observable`]s
//! - Batched re-renders through the update scheduler
//! - A watcher that attaches directives to inserted nodes
//!
//! The engine talks to the tree only through [`Surface`], which
//! `sprig_dom::DomTree` implements, and to expressions only through an
//! injected [`sprig_reactive::Evaluator`].

mod binding;
mod config;
pub mod diagnostics;
pub mod directive;
mod engine;
mod list;
mod processor;
pub mod surface;
mod walker;
mod watcher;

pub use config::Config;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
pub use directive::{Directive, DirectiveError, ListSpec, Modifier};
pub use engine::{ELEMENT, Engine, EngineError, NEXT_TICK};
pub use surface::{Listener, Surface, SurfaceEvent};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

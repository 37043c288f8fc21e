//! nql-core: the nQL query language and single-threaded execution runtime.
//!
//! This crate is the engine only: a lexer/parser for the pipeline grammar, a
//! predicate evaluator, windowed aggregation and bidirectional correlation
//! contexts, a scheduler adapter, and the `World` that ties lifecycle, caching
//! and emission together. File tailing, wire parsers and sinks live one layer
//! up, in `nql-adapters`.

pub mod aggregation;
pub mod config;
pub mod correlation;
pub mod error;
pub mod event;
pub mod executor;
pub mod lexer;
pub mod predicate;
pub mod query;
pub mod scheduler;
pub mod validate;
pub mod value;
pub mod world;

pub use error::{EngineError, Result};
pub use event::{Event, EventKind};
pub use executor::execute;
pub use predicate::Predicate;
pub use query::{AggFunc, Query, ShowFields, Window};
pub use validate::{validate, FieldDiagnostic};
pub use world::{World, WorldState};

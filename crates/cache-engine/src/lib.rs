//! Orchestration layer: composes the cache store, the query builder, and the
//! upstream client into the single entry point a tool-call dispatcher calls
//! into (spec.md §2 item 3).

pub mod engine;
pub mod error;
pub mod shaper;

pub use engine::Engine;
pub use error::EngineError;
pub use shaper::{CompactTable, Encoding, ListEnvelope, MutationEnvelope, ShapedRecords};

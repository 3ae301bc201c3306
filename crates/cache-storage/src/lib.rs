//! Persistent SQLite-backed cache.
//!
//! Provides the [`Storage`] trait and its SQLite implementation
//! ([`SqliteStore`]), composed from the Schema Registry, Field Codec,
//! Record Store, Metadata Caches, Invalidation Coordinator, and
//! Performance Tracker.

pub mod codec;
pub mod error;
pub mod invalidation;
pub mod metadata;
pub mod performance;
pub mod records;
pub mod registry;
pub mod sqlite;
pub mod traits;
pub mod ttl;
pub mod usage;

pub use error::StorageError;
pub use invalidation::{cascade, InvalidationAction, InvalidationEvent};
pub use metadata::{
    fuzzy_match, CachedDeletedRecord, CachedMember, CachedSolution, CachedTableMeta, CachedTeam, CachedView,
};
pub use performance::{PerformanceTracker, TablePerformance, UsageReport, TOKENS_SAVED_PER_HIT};
pub use records::RawRecord;
pub use registry::RegistryRow;
pub use sqlite::{SqliteStore, CURRENT_SCHEMA_VERSION};
pub use traits::Storage;
pub use ttl::TtlOverride;
pub use usage::{ApiCall, ApiStatsSummary};

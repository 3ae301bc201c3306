//! Domain types shared by the cache middleware crates.
//!
//! Nothing here touches SQL or HTTP; this crate defines the vocabulary
//! (field types, record values, the operator grammar, the filter-tree AST)
//! that `cache-storage`, `cache-query`, `cache-upstream` and `cache-engine`
//! build on.

pub mod error;
pub mod field;
pub mod filter;
pub mod operator;
pub mod resource;
pub mod session;
pub mod table;
pub mod timezone;
pub mod value;

pub use error::CoreError;
pub use field::{ColumnDef, ColumnType, FieldDescriptor, FieldParams, FieldType};
pub use filter::{FilterCondition, FilterGroup, FilterNode, FilterValue, LogicalOp};
pub use operator::Operator;
pub use resource::{MutationLevel, ResourceKind, TtlConfig};
pub use session::generate_session_id;
pub use table::{FieldMapping, TableDescriptor};
pub use timezone::TimezoneConfig;
pub use value::{ColumnValue, EncodedColumns, FieldValue};

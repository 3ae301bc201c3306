//! SQLite backend: connection management and fixed-schema DDL.

mod schema;
mod store;

pub use schema::CURRENT_SCHEMA_VERSION;
pub use store::SqliteStore;

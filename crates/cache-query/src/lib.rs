//! Chainable query builder and portable filter-tree translation over the
//! dynamic cache tables.
//!
//! [`compile`] turns one operator/value pair into SQL given a table's field
//! catalogue; [`translator`] recurses that over a whole filter tree;
//! [`builder`] is the `&mut self`-chainable entry point both sit behind.

pub mod builder;
pub mod compile;
pub mod error;
pub mod translator;

pub use builder::{Query, SortDirection};
pub use compile::{compile_condition, resolve_principal_column, Compiled};
pub use error::QueryError;
pub use translator::translate;

//! Client boundary for the remote no-code workspace API (spec.md §6).
//!
//! [`UpstreamClient`] is the trait the engine depends on; [`HttpUpstreamClient`]
//! is a thin synchronous `ureq` implementation. Retry policy, TLS tuning, and
//! the pre-signed-URL file-upload helper are explicitly out of scope
//! (spec.md §1) -- the trait boundary is what this crate guarantees.

pub mod client;
pub mod error;
pub mod http;
pub mod model;

pub use client::UpstreamClient;
pub use error::UpstreamError;
pub use http::HttpUpstreamClient;
pub use model::{
    BulkRecordFailure, BulkRecordOp, BulkRecordResult, CommentDto, DeletedRecordDto, MemberDto, PageRequest,
    RecordDto, RecordPage, SolutionDto, TableDto, TeamDto, ViewDto,
};

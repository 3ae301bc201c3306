//! Environment and file configuration for the cache middleware (spec.md §6).
//!
//! [`load_config`] layers built-in defaults, an optional YAML file, and
//! `CACHE_`-prefixed environment variables into one [`CacheConfig`], the way
//! `beads-config::config` loads `.beads/config.yaml` -- typed struct, sane
//! defaults, an explicit error type -- but through `figment` instead of a
//! single hand-rolled `serde_yaml` read.

pub mod config;
pub mod error;

pub use config::{load_config, CacheConfig, ObjectStorageConfig, TtlDefaults};
pub use error::ConfigError;

//! Configuration types and loading for the cache middleware.
//!
//! The main entry point is [`CacheConfig`], loaded by [`load_config`] from
//! three layers, lowest to highest precedence: built-in defaults, an
//! optional YAML file, then environment variables (`CACHE_` prefixed).

use std::collections::HashMap;
use std::path::PathBuf;

use cache_core::resource::{ResourceKind, TtlConfig};
use cache_core::TimezoneConfig;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Per-resource-kind TTL overrides, keyed by [`ResourceKind`]'s serde name
/// (`"record"`, `"solution"`, ...). Missing entries fall back to
/// [`ResourceKind::default_ttl_seconds`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TtlDefaults(pub HashMap<String, i64>);

impl TtlDefaults {
    /// Resolves the TTL, in seconds, for `kind`: an override if present,
    /// otherwise the spec-defined default tier.
    pub fn seconds_for(&self, kind: ResourceKind) -> i64 {
        let key = TtlConfig::for_resource(kind);
        self.0
            .get(resource_kind_key(kind))
            .copied()
            .unwrap_or(key.seconds)
    }
}

fn resource_kind_key(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Record => "record",
        ResourceKind::Solution => "solution",
        ResourceKind::Table => "table",
        ResourceKind::Member => "member",
        ResourceKind::Team => "team",
        ResourceKind::DeletedRecord => "deleted_record",
        ResourceKind::View => "view",
    }
}

/// Optional object-storage destination for the secure file-attachment
/// helper (spec.md §6). `None` when no bucket is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ObjectStorageConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
}

impl ObjectStorageConfig {
    fn is_unset(&self) -> bool {
        self.bucket.is_none() && self.region.is_none() && self.profile.is_none()
    }
}

/// Top-level configuration recognised per spec.md §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Static token used to authenticate upstream API calls.
    pub upstream_api_key: Option<String>,
    /// Account header sent with every upstream request.
    pub account_id: Option<String>,
    /// Path to the single-file SQLite database backing the cache.
    #[serde(default = "default_cache_file_path")]
    pub cache_file_path: PathBuf,
    /// Per-resource-kind TTL overrides.
    #[serde(default)]
    pub ttl_defaults: TtlDefaults,
    /// Caller's email address, used as a best-effort timezone hint when no
    /// explicit `timezone` override is set.
    pub user_email: Option<String>,
    /// Explicit timezone override: an IANA name, a fixed offset (`+0700`),
    /// or the symbolic `utc`/`system`.
    pub timezone: Option<String>,
    /// `tracing`/`tracing-subscriber` `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional object-storage destination for the file-attachment helper.
    #[serde(default)]
    pub object_storage: ObjectStorageConfig,
}

fn default_cache_file_path() -> PathBuf {
    PathBuf::from("cache.sqlite3")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            upstream_api_key: None,
            account_id: None,
            cache_file_path: default_cache_file_path(),
            ttl_defaults: TtlDefaults::default(),
            user_email: None,
            timezone: None,
            log_level: default_log_level(),
            object_storage: ObjectStorageConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Returns the upstream API key or an error naming the missing key.
    pub fn require_api_key(&self) -> Result<&str> {
        self.upstream_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired { key: "upstream_api_key".to_string() })
    }

    /// Returns the account id or an error naming the missing key.
    pub fn require_account_id(&self) -> Result<&str> {
        self.account_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired { key: "account_id".to_string() })
    }

    /// Resolves the timezone to normalise date-only filter values against
    /// (spec.md §4.4): an explicit `timezone` override wins; failing that,
    /// a coarse heuristic over the user-email domain's country TLD; failing
    /// that, UTC.
    pub fn resolve_timezone(&self) -> Result<TimezoneConfig> {
        if let Some(raw) = &self.timezone {
            return TimezoneConfig::parse(raw)
                .ok_or_else(|| ConfigError::InvalidValue { key: "timezone".to_string(), reason: format!("unrecognised timezone {raw:?}") });
        }
        if let Some(email) = &self.user_email {
            if let Some(tz) = timezone_hint_from_email(email) {
                return Ok(tz);
            }
        }
        Ok(TimezoneConfig::Utc)
    }

    /// Resolves the TTL, in seconds, for one resource kind.
    pub fn ttl_seconds(&self, kind: ResourceKind) -> i64 {
        self.ttl_defaults.seconds_for(kind)
    }
}

/// A coarse, best-effort timezone guess from an email address's country-code
/// top-level domain. Only covers a handful of common TLDs; anything else
/// (including generic TLDs like `.com`/`.io`) yields `None` so the caller
/// falls back to UTC rather than guessing wrong.
fn timezone_hint_from_email(email: &str) -> Option<TimezoneConfig> {
    let domain = email.rsplit_once('@')?.1;
    let tld = domain.rsplit_once('.')?.1.to_ascii_lowercase();
    let named = match tld.as_str() {
        "uk" => "Europe/London",
        "de" => "Europe/Berlin",
        "fr" => "Europe/Paris",
        "jp" => "Asia/Tokyo",
        "au" => "Australia/Sydney",
        "in" => "Asia/Kolkata",
        _ => return None,
    };
    TimezoneConfig::parse(named)
}

/// Loads configuration by layering, lowest to highest precedence:
/// [`CacheConfig::default`], an optional YAML file at `file_path` (if it
/// exists), then `CACHE_`-prefixed environment variables.
pub fn load_config(file_path: Option<&std::path::Path>) -> Result<CacheConfig> {
    let mut figment = Figment::from(Serialized::defaults(CacheConfig::default()));
    if let Some(path) = file_path {
        if path.exists() {
            tracing::debug!(path = %path.display(), "merging config file layer");
            figment = figment.merge(Yaml::file(path));
        }
    }
    figment = figment.merge(Env::prefixed("CACHE_").split("__"));
    let config: CacheConfig = figment.extract()?;
    tracing::info!(cache_file_path = %config.cache_file_path.display(), log_level = %config.log_level, "configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_required_values() {
        let cfg = CacheConfig::default();
        assert!(cfg.require_api_key().is_err());
        assert!(cfg.require_account_id().is_err());
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn ttl_falls_back_to_resource_kind_default() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.ttl_seconds(ResourceKind::Record), 12 * 3600);
        assert_eq!(cfg.ttl_seconds(ResourceKind::View), 30 * 24 * 3600);
    }

    #[test]
    fn ttl_override_takes_precedence() {
        let mut cfg = CacheConfig::default();
        cfg.ttl_defaults.0.insert("record".to_string(), 60);
        assert_eq!(cfg.ttl_seconds(ResourceKind::Record), 60);
    }

    #[test]
    fn explicit_timezone_wins_over_email_hint() {
        let mut cfg = CacheConfig::default();
        cfg.timezone = Some("America/Los_Angeles".to_string());
        cfg.user_email = Some("person@example.co.uk".to_string());
        assert_eq!(cfg.resolve_timezone().unwrap(), TimezoneConfig::parse("America/Los_Angeles").unwrap());
    }

    #[test]
    fn email_hint_used_when_no_explicit_override() {
        let mut cfg = CacheConfig::default();
        cfg.user_email = Some("person@example.co.uk".to_string());
        assert_eq!(cfg.resolve_timezone().unwrap(), TimezoneConfig::parse("Europe/London").unwrap());
    }

    #[test]
    fn no_hints_resolves_to_utc() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.resolve_timezone().unwrap(), TimezoneConfig::Utc);
    }

    #[test]
    fn invalid_explicit_timezone_is_rejected() {
        let mut cfg = CacheConfig::default();
        cfg.timezone = Some("Not/AZone".to_string());
        let err = cfg.resolve_timezone().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn env_layer_overrides_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        std::fs::write(&file_path, "log_level: debug\naccount_id: from-file\n").unwrap();

        std::env::set_var("CACHE_ACCOUNT_ID", "from-env");
        let cfg = load_config(Some(&file_path)).unwrap();
        std::env::remove_var("CACHE_ACCOUNT_ID");

        assert_eq!(cfg.account_id.as_deref(), Some("from-env"));
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn missing_file_falls_back_to_defaults_and_env() {
        let cfg = load_config(Some(std::path::Path::new("/nonexistent/path/config.yaml"))).unwrap();
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn object_storage_defaults_to_unset() {
        let cfg = CacheConfig::default();
        assert!(cfg.object_storage.is_unset());
    }
}

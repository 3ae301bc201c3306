//! Per-table TTL configuration (spec.md §3's TTL config entity, backed by
//! `cache_ttl_config`). Falls back to [`ResourceKind::default_ttl_seconds`]
//! when a table has no explicit override.

use cache_core::resource::MutationLevel;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::error::{Result, StorageError};
use crate::sqlite::SqliteStore;

/// A per-table TTL override row.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlOverride {
    pub table_id: String,
    pub seconds: i64,
    pub mutation_level: MutationLevel,
    pub notes: String,
}

impl SqliteStore {
    /// Reads the TTL override for `table_id`, if one has been set.
    pub fn get_ttl_override(&self, table_id: &str) -> Result<Option<TtlOverride>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT table_id, ttl_seconds, mutation_level, notes FROM cache_ttl_config WHERE table_id = ?1",
            params![table_id],
            |row| {
                let level_token: String = row.get(2)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, level_token, row.get::<_, String>(3)?))
            },
        )
        .optional()?
        .map(|(table_id, seconds, level_token, notes)| {
            let mutation_level = MutationLevel::parse(&level_token)
                .ok_or_else(|| StorageError::Internal(format!("unknown mutation level {level_token:?}")))?;
            Ok(TtlOverride { table_id, seconds, mutation_level, notes })
        })
        .transpose()
    }

    /// Inserts or replaces the TTL override for `table_id`.
    pub fn set_ttl_override(&self, table_id: &str, seconds: i64, mutation_level: MutationLevel, notes: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO cache_ttl_config (table_id, ttl_seconds, mutation_level, notes, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(table_id) DO UPDATE SET
                ttl_seconds = excluded.ttl_seconds,
                mutation_level = excluded.mutation_level,
                notes = excluded.notes,
                updated_at = excluded.updated_at",
            params![table_id, seconds, mutation_level.as_str(), notes, now],
        )?;
        Ok(())
    }

    /// Removes a table's TTL override, reverting it to the resource-kind
    /// default the next time it's consulted.
    pub fn clear_ttl_override(&self, table_id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM cache_ttl_config WHERE table_id = ?1", params![table_id])?;
        Ok(())
    }

    /// Resolves the TTL, in seconds, to use for `table_id`: the stored
    /// override if present, otherwise `default_seconds`.
    pub fn resolve_ttl_seconds(&self, table_id: &str, default_seconds: i64) -> Result<i64> {
        Ok(self.get_ttl_override(table_id)?.map(|o| o.seconds).unwrap_or(default_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_core::resource::ResourceKind;

    #[test]
    fn unset_table_has_no_override() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_ttl_override("tbl_1").unwrap(), None);
        assert_eq!(store.resolve_ttl_seconds("tbl_1", 3600).unwrap(), 3600);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_ttl_override("tbl_1", 7200, MutationLevel::Low, "rarely changes").unwrap();
        let got = store.get_ttl_override("tbl_1").unwrap().unwrap();
        assert_eq!(got.seconds, 7200);
        assert_eq!(got.mutation_level, MutationLevel::Low);
        assert_eq!(got.notes, "rarely changes");
        assert_eq!(store.resolve_ttl_seconds("tbl_1", 60).unwrap(), 7200);
    }

    #[test]
    fn set_twice_overwrites_not_duplicates() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_ttl_override("tbl_1", 100, MutationLevel::High, "").unwrap();
        store.set_ttl_override("tbl_1", 200, MutationLevel::VeryLow, "stable now").unwrap();
        let got = store.get_ttl_override("tbl_1").unwrap().unwrap();
        assert_eq!(got.seconds, 200);
        assert_eq!(got.mutation_level, MutationLevel::VeryLow);
    }

    #[test]
    fn clear_reverts_to_default() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_ttl_override("tbl_1", 100, MutationLevel::High, "").unwrap();
        store.clear_ttl_override("tbl_1").unwrap();
        assert_eq!(store.get_ttl_override("tbl_1").unwrap(), None);
    }

    #[test]
    fn default_from_resource_kind_matches_spec_tiers() {
        let cfg = cache_core::resource::TtlConfig::for_resource(ResourceKind::Record);
        assert_eq!(cfg.seconds, 12 * 3600);
    }
}

//! Metadata Caches (E, spec.md §4.5): fixed-schema caches for solutions,
//! the table list, members, teams, deleted records, and views.

use chrono::{Duration, Utc};
use rusqlite::{functions::FunctionFlags, params, OptionalExtension};
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::sqlite::SqliteStore;

/// A cached solution row.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSolution {
    pub id: String,
    pub name: String,
    pub data: Value,
}

/// A cached table-list row (scoped to a solution).
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTableMeta {
    pub id: String,
    pub solution_id: String,
    pub name: String,
    pub data: Value,
}

/// A cached member row.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMember {
    pub id: String,
    pub solution_id: String,
    pub name: String,
    pub email: String,
    pub deleted_date: Option<String>,
    pub data: Value,
}

/// A cached team row.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTeam {
    pub id: String,
    pub solution_id: String,
    pub name: String,
    pub member_ids: Vec<String>,
    pub data: Value,
}

/// A cached deleted-record row.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDeletedRecord {
    pub id: String,
    pub table_id: String,
    pub data: Value,
}

/// A cached view row.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedView {
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub data: Value,
}

/// Folds full Latin diacritics (NFKD, strip combining marks) and lowercases,
/// the pre-processing step spec.md §4.5's fuzzy match needs before the
/// edit-distance/substring check.
fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Bounded Levenshtein distance: returns `None` as soon as it's certain the
/// distance exceeds `max`, so the common \"obviously different\" case is cheap.
fn edit_distance_within(a: &str, b: &str, max: usize) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return false;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut cur = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            cur.push((prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost));
        }
        prev = cur;
    }
    prev[b.len()] <= max
}

/// `fuzzy_match(text, query) → 0|1` (spec.md §4.5): case-insensitive,
/// diacritic-insensitive, permits up to 2 edit-distance typos or substring
/// containment.
pub fn fuzzy_match(text: &str, query: &str) -> bool {
    let text = fold(text);
    let query = fold(query);
    if query.is_empty() {
        return true;
    }
    if text.contains(&query) {
        return true;
    }
    edit_distance_within(&text, &query, 2)
}

fn register_fuzzy_match(conn: &rusqlite::Connection) -> Result<()> {
    conn.create_scalar_function(
        "fuzzy_match",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: String = ctx.get(0)?;
            let query: String = ctx.get(1)?;
            Ok(fuzzy_match(&text, &query) as i64)
        },
    )?;
    Ok(())
}

impl SqliteStore {
    /// Registers the `fuzzy_match` SQL function on this connection
    /// (spec.md §9: a runtime-registered host function, not an inline
    /// `LIKE '%x%'`).
    pub fn register_sql_functions(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        register_fuzzy_match(&conn)
    }

    // -- Solutions ------------------------------------------------------

    pub fn put_solutions(&self, rows: &[CachedSolution], ttl_seconds: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let cached_at = Utc::now();
        let expires_at = cached_at + Duration::seconds(ttl_seconds);
        let tx = conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO cached_solutions (id, name, data, cached_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.name, row.data.to_string(), cached_at.to_rfc3339(), expires_at.to_rfc3339()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_solutions(&self, query: Option<&str>) -> Result<Vec<CachedSolution>> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let sql = match query {
            Some(_) => {
                "SELECT id, name, data FROM cached_solutions \
                 WHERE expires_at > ?1 AND fuzzy_match(name, ?2) = 1"
            }
            None => "SELECT id, name, data FROM cached_solutions WHERE expires_at > ?1",
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = match query {
            Some(q) => stmt.query_map(params![now, q], scan_solution)?.collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt.query_map(params![now], scan_solution)?.collect::<std::result::Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    pub fn get_solution(&self, id: &str) -> Result<Option<CachedSolution>> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        Ok(conn
            .query_row(
                "SELECT id, name, data FROM cached_solutions WHERE id = ?1 AND expires_at > ?2",
                params![id, now],
                scan_solution,
            )
            .optional()?)
    }

    pub fn solutions_valid(&self) -> Result<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cached_solutions WHERE expires_at > ?1",
            params![now],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn invalidate_solutions(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("UPDATE cached_solutions SET expires_at = '1970-01-01T00:00:00Z'", [])?;
        Ok(())
    }

    // -- Tables (table list) ---------------------------------------------

    pub fn put_tables(&self, rows: &[CachedTableMeta], ttl_seconds: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let cached_at = Utc::now();
        let expires_at = cached_at + Duration::seconds(ttl_seconds);
        let tx = conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO cached_tables (id, solution_id, name, data, cached_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.id,
                    row.solution_id,
                    row.name,
                    row.data.to_string(),
                    cached_at.to_rfc3339(),
                    expires_at.to_rfc3339()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_tables(&self, solution_id: Option<&str>) -> Result<Vec<CachedTableMeta>> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let rows = match solution_id {
            Some(sid) => {
                let mut stmt = conn.prepare(
                    "SELECT id, solution_id, name, data FROM cached_tables WHERE expires_at > ?1 AND solution_id = ?2",
                )?;
                stmt.query_map(params![now, sid], scan_table_meta)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT id, solution_id, name, data FROM cached_tables WHERE expires_at > ?1")?;
                stmt.query_map(params![now], scan_table_meta)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    pub fn tables_valid(&self, solution_id: Option<&str>) -> Result<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let count: i64 = match solution_id {
            Some(sid) => conn.query_row(
                "SELECT COUNT(*) FROM cached_tables WHERE expires_at > ?1 AND solution_id = ?2",
                params![now, sid],
                |r| r.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM cached_tables WHERE expires_at > ?1", params![now], |r| {
                r.get(0)
            })?,
        };
        Ok(count > 0)
    }

    pub fn invalidate_tables(&self, solution_id: Option<&str>) -> Result<()> {
        let conn = self.lock_conn()?;
        match solution_id {
            Some(sid) => {
                conn.execute(
                    "UPDATE cached_tables SET expires_at = '1970-01-01T00:00:00Z' WHERE solution_id = ?1",
                    params![sid],
                )?;
            }
            None => {
                conn.execute("UPDATE cached_tables SET expires_at = '1970-01-01T00:00:00Z'", [])?;
            }
        }
        Ok(())
    }

    // -- Members -----------------------------------------------------------

    pub fn put_members(&self, rows: &[CachedMember], ttl_seconds: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let cached_at = Utc::now();
        let expires_at = cached_at + Duration::seconds(ttl_seconds);
        let tx = conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO cached_members
                    (id, solution_id, name, email, deleted_date, data, cached_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.solution_id,
                    row.name,
                    row.email,
                    row.deleted_date,
                    row.data.to_string(),
                    cached_at.to_rfc3339(),
                    expires_at.to_rfc3339()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Lists cached members for a solution. Soft-deleted rows (non-null
    /// `deleted_date`) are filtered out unless `include_deleted` is set
    /// (spec.md §4.5).
    pub fn list_members(&self, solution_id: &str, include_deleted: bool) -> Result<Vec<CachedMember>> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let sql = if include_deleted {
            "SELECT id, solution_id, name, email, deleted_date, data FROM cached_members \
             WHERE expires_at > ?1 AND solution_id = ?2"
        } else {
            "SELECT id, solution_id, name, email, deleted_date, data FROM cached_members \
             WHERE expires_at > ?1 AND solution_id = ?2 AND deleted_date IS NULL"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![now, solution_id], scan_member)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn members_valid(&self, solution_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cached_members WHERE expires_at > ?1 AND solution_id = ?2",
            params![now, solution_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn invalidate_members(&self, solution_id: Option<&str>) -> Result<()> {
        let conn = self.lock_conn()?;
        match solution_id {
            Some(sid) => {
                conn.execute(
                    "UPDATE cached_members SET expires_at = '1970-01-01T00:00:00Z' WHERE solution_id = ?1",
                    params![sid],
                )?;
            }
            None => {
                conn.execute("UPDATE cached_members SET expires_at = '1970-01-01T00:00:00Z'", [])?;
            }
        }
        Ok(())
    }

    // -- Teams ---------------------------------------------------------------

    pub fn put_teams(&self, rows: &[CachedTeam], ttl_seconds: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let cached_at = Utc::now();
        let expires_at = cached_at + Duration::seconds(ttl_seconds);
        let tx = conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO cached_teams (id, solution_id, name, member_ids, data, cached_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.solution_id,
                    row.name,
                    serde_json::to_string(&row.member_ids)?,
                    row.data.to_string(),
                    cached_at.to_rfc3339(),
                    expires_at.to_rfc3339()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Lists teams for a solution with only the member *count* hydrated
    /// (token reduction per spec.md §4.5); use [`Self::get_team`] for the
    /// full member-hydrated view of one team.
    pub fn list_teams(&self, solution_id: &str) -> Result<Vec<(CachedTeam, usize)>> {
        let teams = {
            let conn = self.lock_conn()?;
            let now = Utc::now().to_rfc3339();
            let mut stmt = conn.prepare(
                "SELECT id, solution_id, name, member_ids, data FROM cached_teams \
                 WHERE expires_at > ?1 AND solution_id = ?2",
            )?;
            stmt.query_map(params![now, solution_id], scan_team)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(teams.into_iter().map(|t| { let count = t.member_ids.len(); (t, count) }).collect())
    }

    /// Hydrates a single team's member id list by joining with the members
    /// cache (spec.md §4.5).
    pub fn get_team(&self, id: &str) -> Result<Option<(CachedTeam, Vec<CachedMember>)>> {
        let team = {
            let conn = self.lock_conn()?;
            let now = Utc::now().to_rfc3339();
            conn.query_row(
                "SELECT id, solution_id, name, member_ids, data FROM cached_teams WHERE id = ?1 AND expires_at > ?2",
                params![id, now],
                scan_team,
            )
            .optional()?
        };
        let Some(team) = team else {
            return Ok(None);
        };
        let members = self.list_members(&team.solution_id, false)?;
        let hydrated: Vec<CachedMember> = members
            .into_iter()
            .filter(|m| team.member_ids.contains(&m.id))
            .collect();
        Ok(Some((team, hydrated)))
    }

    pub fn teams_valid(&self, solution_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cached_teams WHERE expires_at > ?1 AND solution_id = ?2",
            params![now, solution_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    // -- Deleted records ------------------------------------------------------

    pub fn put_deleted_records(&self, rows: &[CachedDeletedRecord], ttl_seconds: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let cached_at = Utc::now();
        let expires_at = cached_at + Duration::seconds(ttl_seconds);
        let tx = conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO cached_deleted_records (id, table_id, data, cached_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.table_id, row.data.to_string(), cached_at.to_rfc3339(), expires_at.to_rfc3339()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_deleted_records(&self, table_id: &str) -> Result<Vec<CachedDeletedRecord>> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let mut stmt =
            conn.prepare("SELECT id, table_id, data FROM cached_deleted_records WHERE expires_at > ?1 AND table_id = ?2")?;
        let rows = stmt
            .query_map(params![now, table_id], scan_deleted_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn deleted_records_valid(&self, table_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cached_deleted_records WHERE expires_at > ?1 AND table_id = ?2",
            params![now, table_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Removes a restored record from the deleted-records cache
    /// (`restore_deleted_record` in the orchestration layer clears it here
    /// rather than leaving a stale tombstone behind).
    pub fn remove_deleted_record(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM cached_deleted_records WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn invalidate_deleted_records(&self, table_id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE cached_deleted_records SET expires_at = '1970-01-01T00:00:00Z' WHERE table_id = ?1",
            params![table_id],
        )?;
        Ok(())
    }

    // -- Views --------------------------------------------------------------

    pub fn put_views(&self, rows: &[CachedView], ttl_seconds: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let cached_at = Utc::now();
        let expires_at = cached_at + Duration::seconds(ttl_seconds);
        let tx = conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO cached_views (id, table_id, name, data, cached_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![row.id, row.table_id, row.name, row.data.to_string(), cached_at.to_rfc3339(), expires_at.to_rfc3339()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_views(&self, table_id: &str) -> Result<Vec<CachedView>> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let mut stmt =
            conn.prepare("SELECT id, table_id, name, data FROM cached_views WHERE expires_at > ?1 AND table_id = ?2")?;
        let rows = stmt
            .query_map(params![now, table_id], scan_view)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_view(&self, id: &str) -> Result<Option<CachedView>> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        Ok(conn
            .query_row(
                "SELECT id, table_id, name, data FROM cached_views WHERE id = ?1 AND expires_at > ?2",
                params![id, now],
                scan_view,
            )
            .optional()?)
    }

    pub fn invalidate_views(&self, table_id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE cached_views SET expires_at = '1970-01-01T00:00:00Z' WHERE table_id = ?1",
            params![table_id],
        )?;
        Ok(())
    }
}

fn scan_solution(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedSolution> {
    let data: String = row.get(2)?;
    Ok(CachedSolution {
        id: row.get(0)?,
        name: row.get(1)?,
        data: serde_json::from_str(&data).unwrap_or(Value::Null),
    })
}

fn scan_table_meta(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedTableMeta> {
    let data: String = row.get(3)?;
    Ok(CachedTableMeta {
        id: row.get(0)?,
        solution_id: row.get(1)?,
        name: row.get(2)?,
        data: serde_json::from_str(&data).unwrap_or(Value::Null),
    })
}

fn scan_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedMember> {
    let data: String = row.get(5)?;
    Ok(CachedMember {
        id: row.get(0)?,
        solution_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        deleted_date: row.get(4)?,
        data: serde_json::from_str(&data).unwrap_or(Value::Null),
    })
}

fn scan_team(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedTeam> {
    let member_ids_json: String = row.get(3)?;
    let data: String = row.get(4)?;
    Ok(CachedTeam {
        id: row.get(0)?,
        solution_id: row.get(1)?,
        name: row.get(2)?,
        member_ids: serde_json::from_str(&member_ids_json).unwrap_or_default(),
        data: serde_json::from_str(&data).unwrap_or(Value::Null),
    })
}

fn scan_deleted_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedDeletedRecord> {
    let data: String = row.get(2)?;
    Ok(CachedDeletedRecord {
        id: row.get(0)?,
        table_id: row.get(1)?,
        data: serde_json::from_str(&data).unwrap_or(Value::Null),
    })
}

fn scan_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedView> {
    let data: String = row.get(3)?;
    Ok(CachedView {
        id: row.get(0)?,
        table_id: row.get(1)?,
        name: row.get(2)?,
        data: serde_json::from_str(&data).unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_match_ignores_case_and_diacritics() {
        assert!(fuzzy_match("Café Projects", "cafe projects"));
        assert!(fuzzy_match("RESUME", "resume"));
    }

    #[test]
    fn fuzzy_match_allows_two_typos() {
        assert!(fuzzy_match("Marketing", "Markting"));
        assert!(!fuzzy_match("Marketing", "Xyzzyplugh"));
    }

    #[test]
    fn solutions_round_trip_and_fuzzy_query() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put_solutions(
                &[CachedSolution {
                    id: "sol_1".to_string(),
                    name: "Acme Projects".to_string(),
                    data: Value::Null,
                }],
                3600,
            )
            .unwrap();
        let found = store.list_solutions(Some("acme projcts")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "sol_1");
    }

    #[test]
    fn members_filters_soft_deleted_by_default() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put_members(
                &[
                    CachedMember {
                        id: "m1".to_string(),
                        solution_id: "sol_1".to_string(),
                        name: "Alice".to_string(),
                        email: "alice@example.com".to_string(),
                        deleted_date: None,
                        data: Value::Null,
                    },
                    CachedMember {
                        id: "m2".to_string(),
                        solution_id: "sol_1".to_string(),
                        name: "Bob".to_string(),
                        email: "bob@example.com".to_string(),
                        deleted_date: Some("2026-01-01T00:00:00Z".to_string()),
                        data: Value::Null,
                    },
                ],
                3600,
            )
            .unwrap();
        assert_eq!(store.list_members("sol_1", false).unwrap().len(), 1);
        assert_eq!(store.list_members("sol_1", true).unwrap().len(), 2);
    }

    #[test]
    fn team_hydrates_member_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put_members(
                &[CachedMember {
                    id: "m1".to_string(),
                    solution_id: "sol_1".to_string(),
                    name: "Alice".to_string(),
                    email: "alice@example.com".to_string(),
                    deleted_date: None,
                    data: Value::Null,
                }],
                3600,
            )
            .unwrap();
        store
            .put_teams(
                &[CachedTeam {
                    id: "team_1".to_string(),
                    solution_id: "sol_1".to_string(),
                    name: "Core".to_string(),
                    member_ids: vec!["m1".to_string()],
                    data: Value::Null,
                }],
                3600,
            )
            .unwrap();

        let (_, members) = store.get_team("team_1").unwrap().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "m1");

        let listing = store.list_teams("sol_1").unwrap();
        assert_eq!(listing[0].1, 1, "listing reports member count only");
    }

    #[test]
    fn members_valid_is_scoped_per_solution_and_expires() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.members_valid("sol_1").unwrap());
        store
            .put_members(
                &[CachedMember {
                    id: "m1".to_string(),
                    solution_id: "sol_1".to_string(),
                    name: "Alice".to_string(),
                    email: "alice@example.com".to_string(),
                    deleted_date: None,
                    data: Value::Null,
                }],
                3600,
            )
            .unwrap();
        assert!(store.members_valid("sol_1").unwrap());
        assert!(!store.members_valid("sol_2").unwrap());

        store.invalidate_members(Some("sol_1")).unwrap();
        assert!(!store.members_valid("sol_1").unwrap());
    }

    #[test]
    fn teams_valid_is_scoped_per_solution() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.teams_valid("sol_1").unwrap());
        store
            .put_teams(
                &[CachedTeam {
                    id: "team_1".to_string(),
                    solution_id: "sol_1".to_string(),
                    name: "Core".to_string(),
                    member_ids: vec![],
                    data: Value::Null,
                }],
                3600,
            )
            .unwrap();
        assert!(store.teams_valid("sol_1").unwrap());
        assert!(!store.teams_valid("sol_2").unwrap());
    }

    #[test]
    fn deleted_records_valid_is_scoped_per_table_and_expires() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.deleted_records_valid("tbl_1").unwrap());
        store
            .put_deleted_records(
                &[CachedDeletedRecord { id: "rec_1".to_string(), table_id: "tbl_1".to_string(), data: Value::Null }],
                3600,
            )
            .unwrap();
        assert!(store.deleted_records_valid("tbl_1").unwrap());
        assert!(!store.deleted_records_valid("tbl_2").unwrap());

        store.invalidate_deleted_records("tbl_1").unwrap();
        assert!(!store.deleted_records_valid("tbl_1").unwrap());
    }
}

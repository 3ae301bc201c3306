//! Fixed-schema resource kinds and TTL configuration (spec.md §3, §4.5).

use serde::{Deserialize, Serialize};

/// The non-record resources the Metadata Caches (E) wrap, plus `Record` for
/// dynamic per-table caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Record,
    Solution,
    Table,
    Member,
    Team,
    DeletedRecord,
    View,
}

impl ResourceKind {
    /// The default TTL, in seconds, per spec.md §3: 12h for records, 7d for
    /// solutions/tables/members/teams, 30d for very-low-mutation data.
    pub fn default_ttl_seconds(self) -> i64 {
        const HOUR: i64 = 3600;
        const DAY: i64 = 24 * HOUR;
        match self {
            Self::Record => 12 * HOUR,
            Self::Solution | Self::Table | Self::Member | Self::Team => 7 * DAY,
            Self::DeletedRecord | Self::View => 30 * DAY,
        }
    }
}

/// Per-table TTL configuration (spec.md §3's `TTL config` entity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtlConfig {
    pub seconds: i64,
    pub mutation_level: MutationLevel,
    pub notes: String,
}

impl TtlConfig {
    pub fn for_resource(kind: ResourceKind) -> Self {
        Self {
            seconds: kind.default_ttl_seconds(),
            mutation_level: MutationLevel::for_resource(kind),
            notes: String::new(),
        }
    }
}

/// How frequently a resource is expected to change, used only as an
/// informational tag on the TTL row (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl MutationLevel {
    fn for_resource(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Record => Self::High,
            ResourceKind::Solution | ResourceKind::Table | ResourceKind::Member | ResourceKind::Team => {
                Self::Medium
            }
            ResourceKind::DeletedRecord | ResourceKind::View => Self::VeryLow,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::VeryLow => "very_low",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "very_low" => Some(Self::VeryLow),
            _ => None,
        }
    }
}

//! The closed field-type enum and the column shapes each type maps to.
//!
//! `FieldType` dispatch is a `match`, deliberately not an open trait-object
//! hierarchy: spec.md §9 calls out that the source system's substring-based
//! type classification (`"linkedrecord".contains("link")`) caused real bugs,
//! so every classification here is an exact-match set over this enum instead
//! of string matching.

use serde::{Deserialize, Serialize};

/// The upstream field type, restricted to the types this cache understands
/// how to store and query. Unknown upstream types fall back to `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    FirstCreated,
    LastUpdated,
    DeletedDate,
    Date,
    DateRange,
    DueDate,
    Status,
    SingleSelect,
    Address,
    FullName,
    RichDocument,
    Checklist,
    Vote,
    TimeTracking,
    Number,
    Currency,
    Percent,
    Duration,
    YesNo,
    User,
    AssignedTo,
    MultiSelect,
    LinkedRecord,
    Tag,
    Files,
    Images,
    Signature,
    Colour,
    Ip,
    Social,
    Text,
    Email,
    Phone,
    Link,
}

impl FieldType {
    /// Parses an upstream type slug, defaulting unknown types to `Text`
    /// rather than failing — new upstream field types must not break an
    /// otherwise-working cache.
    pub fn from_upstream(slug: &str) -> Self {
        match slug {
            "first-created" | "first_created" => Self::FirstCreated,
            "last-updated" | "last_updated" => Self::LastUpdated,
            "deleted-date" | "deleted_date" => Self::DeletedDate,
            "date" => Self::Date,
            "date-range" | "date_range" => Self::DateRange,
            "due-date" | "due_date" => Self::DueDate,
            "status" => Self::Status,
            "single-select" | "single_select" => Self::SingleSelect,
            "address" => Self::Address,
            "full-name" | "full_name" => Self::FullName,
            "rich-document" | "rich_document" | "smartdoc" => Self::RichDocument,
            "checklist" => Self::Checklist,
            "vote" => Self::Vote,
            "time-tracking" | "time_tracking" => Self::TimeTracking,
            "number" => Self::Number,
            "currency" => Self::Currency,
            "percent" => Self::Percent,
            "duration" => Self::Duration,
            "yes-no" | "yes_no" | "boolean" => Self::YesNo,
            "user" => Self::User,
            "assigned-to" | "assigned_to" => Self::AssignedTo,
            "multi-select" | "multi_select" => Self::MultiSelect,
            "linked-record" | "linked_record" => Self::LinkedRecord,
            "tag" | "tags" => Self::Tag,
            "files" | "file" => Self::Files,
            "images" | "image" => Self::Images,
            "signature" => Self::Signature,
            "colour" | "color" => Self::Colour,
            "ip" | "ip-address" => Self::Ip,
            "social" | "social-network" => Self::Social,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "link" | "url" => Self::Link,
            _ => Self::Text,
        }
    }

    /// Whether the principal storage column holds raw JSON array/object
    /// text (member of the exact-match "JSON-array fields" set from
    /// spec.md §4.4).
    pub fn is_json_array(self) -> bool {
        matches!(
            self,
            Self::User
                | Self::AssignedTo
                | Self::MultiSelect
                | Self::LinkedRecord
                | Self::Tag
                | Self::Files
                | Self::Images
                | Self::Signature
                | Self::Social
        )
    }

    /// Whether the principal storage column is a plain text column (member
    /// of the exact-match "text fields" set from spec.md §4.4).
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Email
                | Self::Phone
                | Self::Link
                | Self::Colour
                | Self::Ip
                | Self::FullName
                | Self::Status
                | Self::SingleSelect
        )
    }

    /// Whether this is a date-bearing compound type (`date-range`/`due-date`)
    /// where sub-field addressing (`.from_date`/`.to_date`) applies.
    pub fn is_date_span(self) -> bool {
        matches!(self, Self::DateRange | Self::DueDate)
    }

    /// Column definitions this field type requires, given the sanitised
    /// column-name stem `label` (the Field Codec, spec.md §4.2).
    pub fn columns(self, label: &str) -> Vec<ColumnDef> {
        let l = label;
        match self {
            Self::FirstCreated | Self::LastUpdated => vec![
                ColumnDef::new(format!("{l}_on"), ColumnType::Text),
                ColumnDef::new(format!("{l}_by"), ColumnType::Text),
            ],
            Self::DeletedDate => vec![
                ColumnDef::new("deleted_on", ColumnType::Text),
                ColumnDef::new("deleted_by", ColumnType::Text),
            ],
            Self::Date => vec![
                ColumnDef::new(l, ColumnType::Text),
                ColumnDef::new(format!("{l}_include_time"), ColumnType::Integer),
            ],
            Self::DateRange => vec![
                ColumnDef::new(format!("{l}_from"), ColumnType::Text),
                ColumnDef::new(format!("{l}_to"), ColumnType::Text),
                ColumnDef::new(format!("{l}_from_include_time"), ColumnType::Integer),
                ColumnDef::new(format!("{l}_to_include_time"), ColumnType::Integer),
            ],
            Self::DueDate => {
                let mut cols = Self::DateRange.columns(l);
                cols.push(ColumnDef::new(format!("{l}_is_overdue"), ColumnType::Integer));
                cols.push(ColumnDef::new(format!("{l}_is_completed"), ColumnType::Integer));
                cols
            }
            Self::Status => vec![
                ColumnDef::new(l, ColumnType::Text),
                ColumnDef::new(format!("{l}_updated_on"), ColumnType::Text),
            ],
            Self::SingleSelect => vec![ColumnDef::new(l, ColumnType::Text)],
            Self::Address => vec![
                ColumnDef::new(format!("{l}_text"), ColumnType::Text),
                ColumnDef::new(format!("{l}_json"), ColumnType::Text),
            ],
            Self::FullName => vec![
                ColumnDef::new(l, ColumnType::Text),
                ColumnDef::new(format!("{l}_json"), ColumnType::Text),
            ],
            Self::RichDocument => vec![
                ColumnDef::new(format!("{l}_preview"), ColumnType::Text),
                ColumnDef::new(format!("{l}_json"), ColumnType::Text),
            ],
            Self::Checklist => vec![
                ColumnDef::new(format!("{l}_json"), ColumnType::Text),
                ColumnDef::new(format!("{l}_total"), ColumnType::Integer),
                ColumnDef::new(format!("{l}_completed"), ColumnType::Integer),
            ],
            Self::Vote => vec![
                ColumnDef::new(format!("{l}_count"), ColumnType::Integer),
                ColumnDef::new(format!("{l}_json"), ColumnType::Text),
            ],
            Self::TimeTracking => vec![
                ColumnDef::new(format!("{l}_json"), ColumnType::Text),
                ColumnDef::new(format!("{l}_total"), ColumnType::Real),
            ],
            Self::Number | Self::Currency | Self::Percent | Self::Duration => {
                vec![ColumnDef::new(l, ColumnType::Real)]
            }
            Self::YesNo => vec![ColumnDef::new(l, ColumnType::Integer)],
            Self::User
            | Self::AssignedTo
            | Self::MultiSelect
            | Self::LinkedRecord
            | Self::Tag
            | Self::Files
            | Self::Images
            | Self::Signature
            | Self::Social => vec![ColumnDef::new(l, ColumnType::Text)],
            Self::Colour | Self::Ip | Self::Text | Self::Email | Self::Phone | Self::Link => {
                vec![ColumnDef::new(l, ColumnType::Text)]
            }
        }
    }

    /// The principal column used for comparisons, sorting, and emptiness
    /// checks, given the column-name stem and an optional sub-field suffix
    /// (`"from_date"`/`"to_date"`, stripped of the leading dot by the
    /// caller). Per spec.md §4.4, due-date/date-range default to `_to`.
    pub fn principal_column(self, label: &str, sub_field: Option<&str>) -> String {
        let l = label;
        match self {
            Self::DateRange | Self::DueDate => match sub_field {
                Some("from_date") => format!("{l}_from"),
                _ => format!("{l}_to"),
            },
            Self::Date => l.to_string(),
            Self::FirstCreated | Self::LastUpdated => format!("{l}_on"),
            Self::DeletedDate => "deleted_on".to_string(),
            Self::Address => format!("{l}_text"),
            Self::RichDocument => format!("{l}_preview"),
            Self::Checklist => format!("{l}_total"),
            Self::Vote => format!("{l}_count"),
            Self::TimeTracking => format!("{l}_total"),
            _ => l.to_string(),
        }
    }

    /// Whether the Schema Registry should create an index on this field's
    /// principal (and, for multi-column types, secondary) columns per the
    /// indexing policy in spec.md §4.1.
    pub fn index_columns(self, label: &str) -> Vec<String> {
        let l = label;
        match self {
            Self::Status | Self::SingleSelect | Self::Date | Self::Currency | Self::YesNo => {
                vec![l.to_string()]
            }
            Self::LastUpdated => vec![format!("{l}_on")],
            Self::AssignedTo => vec![l.to_string()],
            Self::DateRange => vec![format!("{l}_from"), format!("{l}_to")],
            Self::DueDate => vec![format!("{l}_from"), format!("{l}_to")],
            _ => Vec::new(),
        }
    }
}

/// SQL storage type for a single physical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    /// The SQLite DDL type keyword.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
        }
    }
}

/// A single physical column a field type maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A field in a table's field catalogue (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Stable upstream identifier, unique within a table.
    pub slug: String,
    /// Human-readable display label; column names derive from this.
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub params: FieldParams,
}

/// Optional per-field parameters referenced by spec.md §3/§4.1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldParams {
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub linked_target_id: Option<String>,
    #[serde(default)]
    pub include_time: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_and_text_sets_are_disjoint_and_exact() {
        // Regression guard for the substring-match bug spec.md §9 warns about:
        // "linkedrecord" must not be classified as "text" or "link".
        assert!(FieldType::LinkedRecord.is_json_array());
        assert!(!FieldType::LinkedRecord.is_text());
        assert!(FieldType::Link.is_text());
        assert!(!FieldType::Link.is_json_array());
    }

    #[test]
    fn due_date_columns_extend_date_range() {
        let cols = FieldType::DueDate.columns("due");
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "due_from",
                "due_to",
                "due_from_include_time",
                "due_to_include_time",
                "due_is_overdue",
                "due_is_completed",
            ]
        );
    }

    #[test]
    fn due_date_principal_defaults_to_to_column() {
        assert_eq!(FieldType::DueDate.principal_column("due", None), "due_to");
        assert_eq!(
            FieldType::DueDate.principal_column("due", Some("from_date")),
            "due_from"
        );
        assert_eq!(
            FieldType::DueDate.principal_column("due", Some("to_date")),
            "due_to"
        );
    }

    #[test]
    fn index_policy_covers_date_range_both_columns() {
        assert_eq!(
            FieldType::DateRange.index_columns("due"),
            vec!["due_from".to_string(), "due_to".to_string()]
        );
    }
}

//! The closed operator grammar (spec.md §4.4) shared by the Query Builder
//! and the Filter Translator.

use serde::{Deserialize, Serialize};

/// One entry of the portable operator grammar. Aliases upstream uses for the
/// same operator (`is_any_of`/`in`) are folded into a single variant at
/// parse time so the rest of the system only matches one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    HasAnyOf,
    HasAllOf,
    HasNoneOf,
    IsExactly,
    IsBefore,
    IsAfter,
    IsOnOrBefore,
    IsOnOrAfter,
    IsOverdue,
    IsNotOverdue,
    FileNameContains,
    FileTypeIs,
}

impl Operator {
    /// Parses an operator token, including upstream's alternate spellings
    /// (`is_any_of` for `in`, `is_none_of` for `not_in`).
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "in" | "is_any_of" => Self::In,
            "not_in" | "is_none_of" => Self::NotIn,
            "between" => Self::Between,
            "not_between" => Self::NotBetween,
            "is_null" => Self::IsNull,
            "is_not_null" => Self::IsNotNull,
            "is_empty" => Self::IsEmpty,
            "is_not_empty" => Self::IsNotEmpty,
            "has_any_of" => Self::HasAnyOf,
            "has_all_of" => Self::HasAllOf,
            "has_none_of" => Self::HasNoneOf,
            "is_exactly" => Self::IsExactly,
            "is_before" => Self::IsBefore,
            "is_after" => Self::IsAfter,
            "is_on_or_before" => Self::IsOnOrBefore,
            "is_on_or_after" => Self::IsOnOrAfter,
            "is_overdue" => Self::IsOverdue,
            "is_not_overdue" => Self::IsNotOverdue,
            "file_name_contains" => Self::FileNameContains,
            "file_type_is" => Self::FileTypeIs,
            _ => return None,
        })
    }

    /// The canonical token, used when forwarding to upstream.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Between => "between",
            Self::NotBetween => "not_between",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::HasAnyOf => "has_any_of",
            Self::HasAllOf => "has_all_of",
            Self::HasNoneOf => "has_none_of",
            Self::IsExactly => "is_exactly",
            Self::IsBefore => "is_before",
            Self::IsAfter => "is_after",
            Self::IsOnOrBefore => "is_on_or_before",
            Self::IsOnOrAfter => "is_on_or_after",
            Self::IsOverdue => "is_overdue",
            Self::IsNotOverdue => "is_not_overdue",
            Self::FileNameContains => "file_name_contains",
            Self::FileTypeIs => "file_type_is",
        }
    }

    /// Whether forwarding this operator upstream requires the value to be
    /// `null` rather than an empty string (spec.md §4.4/§4.8).
    pub fn forwards_as_null(self) -> bool {
        matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_fold_to_canonical_variant() {
        assert_eq!(Operator::parse("is_any_of"), Some(Operator::In));
        assert_eq!(Operator::parse("is_none_of"), Some(Operator::NotIn));
    }

    #[test]
    fn unknown_token_is_none() {
        assert_eq!(Operator::parse("bogus"), None);
    }
}

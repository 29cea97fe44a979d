//! Filter trees.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// How a filter combines with the siblings before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    /// `AND NOT`
    Not,
}

/// Comparison operators of a leaf filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "neq")]
    Neq,
    #[serde(rename = "not")]
    Not,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "nlike")]
    NLike,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "notempty")]
    NotEmpty,
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "notnull")]
    NotNull,
    #[serde(rename = "blank")]
    Blank,
    #[serde(rename = "notblank")]
    NotBlank,
    #[serde(rename = "checked")]
    Checked,
    #[serde(rename = "notchecked")]
    NotChecked,
    #[serde(rename = "allof")]
    AllOf,
    #[serde(rename = "anyof")]
    AnyOf,
    #[serde(rename = "nallof")]
    NAllOf,
    #[serde(rename = "nanyof")]
    NAnyOf,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "ge")]
    Ge,
    #[serde(rename = "le")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "isnot")]
    IsNot,
    #[serde(rename = "btw")]
    Btw,
    #[serde(rename = "nbtw")]
    NBtw,
    #[serde(rename = "isWithin")]
    IsWithin,
}

impl ComparisonOp {
    pub const ALL: [ComparisonOp; 29] = [
        ComparisonOp::Eq,
        ComparisonOp::Neq,
        ComparisonOp::Not,
        ComparisonOp::Like,
        ComparisonOp::NLike,
        ComparisonOp::Empty,
        ComparisonOp::NotEmpty,
        ComparisonOp::Null,
        ComparisonOp::NotNull,
        ComparisonOp::Blank,
        ComparisonOp::NotBlank,
        ComparisonOp::Checked,
        ComparisonOp::NotChecked,
        ComparisonOp::AllOf,
        ComparisonOp::AnyOf,
        ComparisonOp::NAllOf,
        ComparisonOp::NAnyOf,
        ComparisonOp::Gt,
        ComparisonOp::Lt,
        ComparisonOp::Gte,
        ComparisonOp::Lte,
        ComparisonOp::Ge,
        ComparisonOp::Le,
        ComparisonOp::In,
        ComparisonOp::Is,
        ComparisonOp::IsNot,
        ComparisonOp::Btw,
        ComparisonOp::NBtw,
        ComparisonOp::IsWithin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Neq => "neq",
            ComparisonOp::Not => "not",
            ComparisonOp::Like => "like",
            ComparisonOp::NLike => "nlike",
            ComparisonOp::Empty => "empty",
            ComparisonOp::NotEmpty => "notempty",
            ComparisonOp::Null => "null",
            ComparisonOp::NotNull => "notnull",
            ComparisonOp::Blank => "blank",
            ComparisonOp::NotBlank => "notblank",
            ComparisonOp::Checked => "checked",
            ComparisonOp::NotChecked => "notchecked",
            ComparisonOp::AllOf => "allof",
            ComparisonOp::AnyOf => "anyof",
            ComparisonOp::NAllOf => "nallof",
            ComparisonOp::NAnyOf => "nanyof",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Gte => "gte",
            ComparisonOp::Lte => "lte",
            ComparisonOp::Ge => "ge",
            ComparisonOp::Le => "le",
            ComparisonOp::In => "in",
            ComparisonOp::Is => "is",
            ComparisonOp::IsNot => "isnot",
            ComparisonOp::Btw => "btw",
            ComparisonOp::NBtw => "nbtw",
            ComparisonOp::IsWithin => "isWithin",
        }
    }

    /// The positive operator this one negates.
    ///
    /// Negated operators are compiled by compiling their positive form and
    /// wrapping it, so every type-specific rule exists once.
    pub fn negated_form_of(self) -> Option<ComparisonOp> {
        match self {
            ComparisonOp::Neq | ComparisonOp::Not => Some(ComparisonOp::Eq),
            ComparisonOp::NLike => Some(ComparisonOp::Like),
            ComparisonOp::NotEmpty => Some(ComparisonOp::Empty),
            ComparisonOp::NotNull => Some(ComparisonOp::Null),
            ComparisonOp::NotBlank => Some(ComparisonOp::Blank),
            ComparisonOp::NotChecked => Some(ComparisonOp::Checked),
            ComparisonOp::NAllOf => Some(ComparisonOp::AllOf),
            ComparisonOp::NAnyOf => Some(ComparisonOp::AnyOf),
            ComparisonOp::IsNot => Some(ComparisonOp::Is),
            ComparisonOp::NBtw => Some(ComparisonOp::Btw),
            _ => None,
        }
    }

    /// Operators that take no value.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            ComparisonOp::Empty
                | ComparisonOp::NotEmpty
                | ComparisonOp::Null
                | ComparisonOp::NotNull
                | ComparisonOp::Blank
                | ComparisonOp::NotBlank
                | ComparisonOp::Checked
                | ComparisonOp::NotChecked
        )
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonOp {
    type Err = String;

    /// Accepts the canonical names plus the blank aliases used in where-strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isblank" | "is_blank" => return Ok(ComparisonOp::Blank),
            "isnotblank" | "is_not_blank" => return Ok(ComparisonOp::NotBlank),
            _ => {}
        }
        ComparisonOp::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown comparison operator: {s}"))
    }
}

/// Date sub-operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonSubOp {
    Today,
    Tomorrow,
    Yesterday,
    OneWeekAgo,
    OneWeekFromNow,
    OneMonthAgo,
    OneMonthFromNow,
    DaysAgo,
    DaysFromNow,
    ExactDate,
    // isWithin
    PastWeek,
    PastMonth,
    PastYear,
    NextWeek,
    NextMonth,
    NextYear,
    PastNumberOfDays,
    NextNumberOfDays,
}

impl ComparisonSubOp {
    pub const ALL: [ComparisonSubOp; 18] = [
        ComparisonSubOp::Today,
        ComparisonSubOp::Tomorrow,
        ComparisonSubOp::Yesterday,
        ComparisonSubOp::OneWeekAgo,
        ComparisonSubOp::OneWeekFromNow,
        ComparisonSubOp::OneMonthAgo,
        ComparisonSubOp::OneMonthFromNow,
        ComparisonSubOp::DaysAgo,
        ComparisonSubOp::DaysFromNow,
        ComparisonSubOp::ExactDate,
        ComparisonSubOp::PastWeek,
        ComparisonSubOp::PastMonth,
        ComparisonSubOp::PastYear,
        ComparisonSubOp::NextWeek,
        ComparisonSubOp::NextMonth,
        ComparisonSubOp::NextYear,
        ComparisonSubOp::PastNumberOfDays,
        ComparisonSubOp::NextNumberOfDays,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonSubOp::Today => "today",
            ComparisonSubOp::Tomorrow => "tomorrow",
            ComparisonSubOp::Yesterday => "yesterday",
            ComparisonSubOp::OneWeekAgo => "oneWeekAgo",
            ComparisonSubOp::OneWeekFromNow => "oneWeekFromNow",
            ComparisonSubOp::OneMonthAgo => "oneMonthAgo",
            ComparisonSubOp::OneMonthFromNow => "oneMonthFromNow",
            ComparisonSubOp::DaysAgo => "daysAgo",
            ComparisonSubOp::DaysFromNow => "daysFromNow",
            ComparisonSubOp::ExactDate => "exactDate",
            ComparisonSubOp::PastWeek => "pastWeek",
            ComparisonSubOp::PastMonth => "pastMonth",
            ComparisonSubOp::PastYear => "pastYear",
            ComparisonSubOp::NextWeek => "nextWeek",
            ComparisonSubOp::NextMonth => "nextMonth",
            ComparisonSubOp::NextYear => "nextYear",
            ComparisonSubOp::PastNumberOfDays => "pastNumberOfDays",
            ComparisonSubOp::NextNumberOfDays => "nextNumberOfDays",
        }
    }

    /// Sub-ops that need a day count in the filter value.
    pub fn takes_day_count(self) -> bool {
        matches!(
            self,
            ComparisonSubOp::DaysAgo
                | ComparisonSubOp::DaysFromNow
                | ComparisonSubOp::PastNumberOfDays
                | ComparisonSubOp::NextNumberOfDays
        )
    }
}

impl FromStr for ComparisonSubOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComparisonSubOp::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown comparison sub-operator: {s}"))
    }
}

/// A node of a filter tree: a leaf comparison or a group of children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub fk_column_id: Option<String>,
    #[serde(default)]
    pub comparison_op: Option<ComparisonOp>,
    #[serde(default)]
    pub comparison_sub_op: Option<ComparisonSubOp>,
    #[serde(default)]
    pub value: Value,
    /// Absent means "same as the enclosing group".
    #[serde(default)]
    pub logical_op: Option<LogicalOp>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub children: Vec<Filter>,
}

impl Filter {
    /// A leaf comparing `column_id` with `value`.
    pub fn leaf(column_id: &str, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Self {
            fk_column_id: Some(column_id.into()),
            comparison_op: Some(op),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn group(logical_op: LogicalOp, children: Vec<Filter>) -> Self {
        Self {
            logical_op: Some(logical_op),
            is_group: true,
            children,
            ..Default::default()
        }
    }

    pub fn with_sub_op(mut self, sub_op: ComparisonSubOp) -> Self {
        self.comparison_sub_op = Some(sub_op);
        self
    }

    pub fn with_logical_op(mut self, op: LogicalOp) -> Self {
        self.logical_op = Some(op);
        self
    }

    /// Filter value as text; numbers and booleans are stringified, null is empty.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// True when the value is null or the empty string.
    pub fn value_is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_group() {
        let f: Filter = serde_json::from_value(json!({
            "is_group": true,
            "logical_op": "and",
            "children": [
                {"fk_column_id": "c_amount", "comparison_op": "gt", "value": 100}
            ]
        }))
        .unwrap();
        assert!(f.is_group);
        assert_eq!(f.children[0].comparison_op, Some(ComparisonOp::Gt));
        assert_eq!(f.children[0].logical_op, None);
        assert_eq!(f.children[0].value_text(), "100");
    }

    #[test]
    fn test_op_names_roundtrip_display() {
        for op in ComparisonOp::ALL {
            assert_eq!(op.as_str().parse::<ComparisonOp>().unwrap(), op);
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, json!(op.as_str()));
        }
        for op in ComparisonSubOp::ALL {
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, json!(op.as_str()));
        }
    }

    #[test]
    fn test_blank_aliases() {
        assert_eq!("is_blank".parse::<ComparisonOp>(), Ok(ComparisonOp::Blank));
        assert_eq!("isnotblank".parse::<ComparisonOp>(), Ok(ComparisonOp::NotBlank));
        assert!("blanky".parse::<ComparisonOp>().is_err());
    }

    #[test]
    fn test_negation_pairs() {
        assert_eq!(ComparisonOp::NLike.negated_form_of(), Some(ComparisonOp::Like));
        assert_eq!(ComparisonOp::Not.negated_form_of(), Some(ComparisonOp::Eq));
        assert_eq!(ComparisonOp::Like.negated_form_of(), None);
    }
}

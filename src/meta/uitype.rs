//! Logical column types (`uidt`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The UI type of a column.
///
/// Unknown names deserialize to [`UiType::Unknown`] so a catalog written by a
/// newer producer still loads; the compilers treat it like plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UiType {
    #[serde(rename = "ID")]
    Id,
    LinkToAnotherRecord,
    ForeignKey,
    Lookup,
    SingleLineText,
    LongText,
    Attachment,
    Checkbox,
    MultiSelect,
    SingleSelect,
    Date,
    Year,
    Time,
    PhoneNumber,
    GeoData,
    Email,
    #[serde(rename = "URL")]
    Url,
    Number,
    Decimal,
    Currency,
    Percent,
    Duration,
    Rating,
    Formula,
    Rollup,
    DateTime,
    CreatedTime,
    LastModifiedTime,
    Geometry,
    #[serde(rename = "JSON")]
    Json,
    SpecificDBType,
    Barcode,
    QrCode,
    Button,
    Links,
    User,
    CreatedBy,
    LastModifiedBy,
    Order,
    #[serde(other)]
    Unknown,
}

impl UiType {
    pub const ALL: [UiType; 40] = [
        UiType::Id,
        UiType::LinkToAnotherRecord,
        UiType::ForeignKey,
        UiType::Lookup,
        UiType::SingleLineText,
        UiType::LongText,
        UiType::Attachment,
        UiType::Checkbox,
        UiType::MultiSelect,
        UiType::SingleSelect,
        UiType::Date,
        UiType::Year,
        UiType::Time,
        UiType::PhoneNumber,
        UiType::GeoData,
        UiType::Email,
        UiType::Url,
        UiType::Number,
        UiType::Decimal,
        UiType::Currency,
        UiType::Percent,
        UiType::Duration,
        UiType::Rating,
        UiType::Formula,
        UiType::Rollup,
        UiType::DateTime,
        UiType::CreatedTime,
        UiType::LastModifiedTime,
        UiType::Geometry,
        UiType::Json,
        UiType::SpecificDBType,
        UiType::Barcode,
        UiType::QrCode,
        UiType::Button,
        UiType::Links,
        UiType::User,
        UiType::CreatedBy,
        UiType::LastModifiedBy,
        UiType::Order,
        UiType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UiType::Id => "ID",
            UiType::LinkToAnotherRecord => "LinkToAnotherRecord",
            UiType::ForeignKey => "ForeignKey",
            UiType::Lookup => "Lookup",
            UiType::SingleLineText => "SingleLineText",
            UiType::LongText => "LongText",
            UiType::Attachment => "Attachment",
            UiType::Checkbox => "Checkbox",
            UiType::MultiSelect => "MultiSelect",
            UiType::SingleSelect => "SingleSelect",
            UiType::Date => "Date",
            UiType::Year => "Year",
            UiType::Time => "Time",
            UiType::PhoneNumber => "PhoneNumber",
            UiType::GeoData => "GeoData",
            UiType::Email => "Email",
            UiType::Url => "URL",
            UiType::Number => "Number",
            UiType::Decimal => "Decimal",
            UiType::Currency => "Currency",
            UiType::Percent => "Percent",
            UiType::Duration => "Duration",
            UiType::Rating => "Rating",
            UiType::Formula => "Formula",
            UiType::Rollup => "Rollup",
            UiType::DateTime => "DateTime",
            UiType::CreatedTime => "CreatedTime",
            UiType::LastModifiedTime => "LastModifiedTime",
            UiType::Geometry => "Geometry",
            UiType::Json => "JSON",
            UiType::SpecificDBType => "SpecificDBType",
            UiType::Barcode => "Barcode",
            UiType::QrCode => "QrCode",
            UiType::Button => "Button",
            UiType::Links => "Links",
            UiType::User => "User",
            UiType::CreatedBy => "CreatedBy",
            UiType::LastModifiedBy => "LastModifiedBy",
            UiType::Order => "Order",
            UiType::Unknown => "Unknown",
        }
    }

    /// Types whose value is computed rather than read from a physical column.
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            UiType::LinkToAnotherRecord
                | UiType::Links
                | UiType::Lookup
                | UiType::Rollup
                | UiType::Formula
                | UiType::QrCode
                | UiType::Barcode
                | UiType::Button
        )
    }

    /// Relation columns (a link to another model).
    pub fn is_link(self) -> bool {
        matches!(self, UiType::LinkToAnotherRecord | UiType::Links)
    }

    /// Types stored as numbers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            UiType::Duration
                | UiType::Currency
                | UiType::Percent
                | UiType::Number
                | UiType::Decimal
                | UiType::Rating
                | UiType::Rollup
                | UiType::Year
                | UiType::Links
                | UiType::Id
        )
    }

    /// Calendar types that accept date sub-operations in filters.
    pub fn is_date(self) -> bool {
        matches!(
            self,
            UiType::Date | UiType::DateTime | UiType::CreatedTime | UiType::LastModifiedTime
        )
    }

    /// Columns holding base-user ids.
    pub fn is_user(self) -> bool {
        matches!(self, UiType::User | UiType::CreatedBy | UiType::LastModifiedBy)
    }

    /// Types whose "no value" state is only `NULL` (never the empty string).
    pub fn blank_is_null_only(self) -> bool {
        self.is_numeric() || self.is_date() || self == UiType::Time
    }
}

impl fmt::Display for UiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UiType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown column type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        let t: UiType = serde_json::from_str("\"ID\"").unwrap();
        assert_eq!(t, UiType::Id);
        let t: UiType = serde_json::from_str("\"LinkToAnotherRecord\"").unwrap();
        assert_eq!(t, UiType::LinkToAnotherRecord);
        assert_eq!(serde_json::to_string(&UiType::Json).unwrap(), "\"JSON\"");
    }

    #[test]
    fn test_unknown_falls_back() {
        let t: UiType = serde_json::from_str("\"Collaborator\"").unwrap();
        assert_eq!(t, UiType::Unknown);
    }

    #[test]
    fn test_from_str_matches_display() {
        for t in UiType::ALL {
            assert_eq!(t.to_string().parse::<UiType>().unwrap(), t);
        }
        assert!("Nope".parse::<UiType>().is_err());
    }

    #[test]
    fn test_classification() {
        assert!(UiType::Rollup.is_numeric());
        assert!(UiType::Rollup.is_virtual());
        assert!(UiType::CreatedTime.is_date());
        assert!(!UiType::Time.is_date());
        assert!(UiType::Time.blank_is_null_only());
        assert!(!UiType::SingleLineText.blank_is_null_only());
        assert!(UiType::LastModifiedBy.is_user());
    }
}

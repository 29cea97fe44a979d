//! Sort entries.

use serde::{Deserialize, Serialize};

use crate::sql::SortDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl From<SortDirection> for SortDir {
    fn from(dir: SortDirection) -> Self {
        match dir {
            SortDirection::Asc => SortDir::Asc,
            SortDirection::Desc => SortDir::Desc,
        }
    }
}

/// One entry of a sort list; earlier entries take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub fk_column_id: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(column_id: &str) -> Self {
        Self {
            fk_column_id: column_id.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column_id: &str) -> Self {
        Self {
            fk_column_id: column_id.into(),
            direction: SortDirection::Desc,
        }
    }
}

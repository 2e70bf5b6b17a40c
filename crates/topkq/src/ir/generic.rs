use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ColumnSort<T> {
    pub direction: SortDirection,
    pub column: T,
}

#[derive(Debug, Clone, Copy, Serialize, Default, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_descending(descending: bool) -> Self {
        if descending {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortDirection::Desc)
    }
}

impl<T> ColumnSort<T> {
    pub fn asc(column: T) -> Self {
        ColumnSort {
            direction: SortDirection::Asc,
            column,
        }
    }

    pub fn desc(column: T) -> Self {
        ColumnSort {
            direction: SortDirection::Desc,
            column,
        }
    }
}

/// Window function used to rank rows within a partition.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
)]
pub enum RankFunction {
    /// Rank without gaps; rows that tie share a rank.
    #[default]
    #[strum(serialize = "dense_rank")]
    DenseRank,
    /// Sequential numbering; ties are broken arbitrarily.
    #[strum(serialize = "row_number")]
    RowNumber,
}

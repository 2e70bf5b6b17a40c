use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shape of the query rendered for a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    /// `SELECT DISTINCT ON (...)`, native engines with k = 1.
    DistinctPrefix,
    /// A `LATERAL` subquery per distinct key, native engines with k > 1.
    CorrelatedLimit,
    /// Ranking window function and a filter; works everywhere.
    WindowRank,
}

impl Strategy {
    pub fn is_native(&self) -> bool {
        !matches!(self, Strategy::WindowRank)
    }
}

pub fn select(native_supported: bool, k: u64) -> Strategy {
    match (native_supported, k) {
        (false, _) => Strategy::WindowRank,
        (true, 1) => Strategy::DistinctPrefix,
        (true, _) => Strategy::CorrelatedLimit,
    }
}

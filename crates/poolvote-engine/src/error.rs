//! Engine error types.

use thiserror::Error;

use crate::probe::ProbeError;

pub type StatsResult<T> = Result<T, StatsError>;

/// Errors raised while resolving stats or handling a query.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("unknown stat: {0}")]
    UnknownStat(String),

    /// A stat transitively depends on itself. Holds the resolution chain.
    #[error("cyclic stat dependency: {0}")]
    CyclicDependency(String),

    #[error("stat {key} value {value} is not numeric")]
    Coercion { key: String, value: String },

    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("failed to encode stats: {0}")]
    Encode(#[from] serde_json::Error),

    /// Catch-all for failures contained at the query boundary.
    #[error("query handling failed: {0}")]
    QueryHandling(String),
}

impl StatsError {
    pub fn is_cyclic(&self) -> bool {
        matches!(self, StatsError::CyclicDependency(_))
    }
}

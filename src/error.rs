//! Error types.
//!
//! Application-level failures are `anyhow::Error`. The two fault families that callers need to
//! inspect, per-month fetch problems and record integrity problems, are typed enums.

use crate::model::MonthKey;
use serde::Serialize;
use thiserror::Error;

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The reason a month contributed no records to a collection. None of these are fatal.
#[derive(Debug, Clone, Eq, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MonthFault {
    /// The request never produced a usable HTTP response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The source answered but reported that the query did not succeed.
    #[error("upstream rejected the request: {0}")]
    Rejected(String),

    /// The payload could not be understood as a trade list.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The stored month could not be read back.
    #[error("cache failure: {0}")]
    Cache(String),
}

/// A month that was skipped, and why.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct MonthWarning {
    pub key: MonthKey,
    pub fault: MonthFault,
}

impl std::fmt::Display for MonthWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.fault)
    }
}

/// A transaction whose timestamp or amount cannot be trusted. Aggregation stops on the first one.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("record {index} has an invalid {field} '{value}': {reason}")]
pub struct IntegrityError {
    /// Position of the record in the collected list.
    pub index: usize,
    /// The raw field name, e.g. `txdate`.
    pub field: &'static str,
    /// The raw value as received.
    pub value: String,
    pub reason: String,
}

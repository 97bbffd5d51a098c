//! The Transaction Source: where month batches of trades come from.
//!
//! `TransactionSource` is the seam. `CampusCardSource` talks to the card system over HTTP and
//! `TestSource` serves seeded, in-memory data so the whole program can run offline.

mod campus;
mod response;
mod test_source;

use crate::error::MonthFault;
use crate::model::DateRange;
use crate::{Config, Result};
use serde_json::Value;

pub use campus::CampusCardSource;
pub use response::parse_trade_list;
pub use test_source::{trade_list_payload, RequestLog, TestSource};

/// When this environment variable is set and non-empty the program uses `TestSource`.
const TEST_MODE_ENV: &str = "CARDSTAT_IN_TEST_MODE";

/// Selects which `TransactionSource` implementation to use.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Fetch from the card system.
    #[default]
    Live,
    /// Serve seeded in-memory data.
    Test,
}

impl Mode {
    /// `Mode::Test` when `CARDSTAT_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Live`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(s) if !s.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// Produces the trade list for a date range.
///
/// A successful return is the verbatim response payload. It has not been checked for the
/// `success` flag or the record layout yet, see `parse_trade_list`.
#[async_trait::async_trait]
pub trait TransactionSource {
    async fn fetch(&mut self, range: &DateRange) -> std::result::Result<Value, MonthFault>;
}

/// Creates the `TransactionSource` for `mode`.
pub fn source(config: &Config, mode: Mode) -> Result<Box<dyn TransactionSource + Send>> {
    Ok(match mode {
        Mode::Live => Box::new(CampusCardSource::new(config)?),
        Mode::Test => Box::new(TestSource::default()),
    })
}

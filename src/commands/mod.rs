//! Command handlers for the cardstat CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod fetch;
mod init;
mod report;

use crate::api::{self, Mode};
use crate::args::RangeArgs;
use crate::cache::FileCache;
use crate::collector::Collector;
use crate::model::MonthSpan;
use crate::{Config, Result};
use chrono::{Datelike, Local};
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

pub use fetch::{fetch, FetchSummary};
pub use init::init;
pub use report::{report, ReportOutput};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// The year and months a command works on. `--months` wins over the configured range.
fn resolve_range(config: &Config, range: &RangeArgs) -> Result<(i32, MonthSpan)> {
    let year = range.year().unwrap_or_else(|| Local::now().year());
    let span = match range.months() {
        Some(span) => span,
        None => config.month_span()?,
    };
    Ok((year, span))
}

/// A collector reading and writing the cache under `$CARDSTAT_HOME/cache`. The seeded source used
/// in `Mode::Test` is local, so no pause is imposed between its fetches.
fn collector(config: &Config, mode: Mode) -> Result<Collector> {
    let delay = match mode {
        Mode::Live => config.request_delay(),
        Mode::Test => Duration::ZERO,
    };
    let cache = FileCache::new(config.cache_dir());
    let source = api::source(config, mode)?;
    Ok(Collector::new(Box::new(cache), source).with_delay(delay))
}

//! Campus card statistics: fetch a year of trades month by month, cache closed months locally and
//! aggregate them into a consumption report.

pub mod aggregate;
pub mod api;
pub mod args;
pub mod cache;
pub mod collector;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod sink;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::{Config, Credentials};
pub use error::{Error, IntegrityError, MonthFault, MonthWarning, Result};

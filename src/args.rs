//! These structs provide the CLI interface for the cardstat CLI.

use crate::model::MonthSpan;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// cardstat: yearly statistics for your campus card.
///
/// The purpose of this program is to download your campus card trades, one month at a time, into
/// a local cache and turn them into a yearly report: monthly totals, spending by category, a
/// breakdown by canteen and a weekday by hour heatmap of your meals.
///
/// You will need the `openid` and session cookie of the card system's web app. Run `cardstat init`
/// once with both of them, then `cardstat report`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. It writes `config.json` with default settings
    /// and stores your credentials in `.secrets/credentials.json`, readable only by you.
    Init(InitArgs),
    /// Download the trades of each month in the range into the local cache.
    ///
    /// Months that are already cached are not downloaded again. A month that fails is reported
    /// and skipped.
    Fetch(RangeArgs),
    /// Build the yearly report from the cache, downloading missing months first.
    ///
    /// The tables are written as CSV files, plus `summary.json`, to `output/<year>` under the
    /// data directory.
    Report(RangeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where cardstat data and configuration is held. Defaults to ~/cardstat
    #[arg(long, env = "CARDSTAT_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `cardstat init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The openid the card system's web app identifies you with.
    #[arg(long, env = "CARDSTAT_OPENID")]
    openid: String,

    /// The session cookie of the card system's web app, e.g. `JSESSIONID=...`.
    #[arg(long, env = "CARDSTAT_COOKIE", hide_env_values = true)]
    cookie: String,
}

impl InitArgs {
    pub fn openid(&self) -> &str {
        &self.openid
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }
}

/// (Not shown): Args for the `cardstat fetch` and `cardstat report` commands.
#[derive(Debug, Parser, Clone, Default)]
pub struct RangeArgs {
    /// The calendar year to process. Defaults to the current year.
    #[arg(long)]
    year: Option<i32>,

    /// The months to process, e.g. `3-5` or `7`. Defaults to the range in `config.json`, which
    /// is the whole year unless `test_mode` is on.
    #[arg(long)]
    months: Option<MonthSpan>,
}

impl RangeArgs {
    pub fn new(year: Option<i32>, months: Option<MonthSpan>) -> Self {
        Self { year, months }
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn months(&self) -> Option<MonthSpan> {
        self.months
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("cardstat"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or CARDSTAT_HOME instead of relying on the default \
                cardstat home directory. If you continue using the program right now, you may \
                have problems!",
            );
            PathBuf::from("cardstat")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let args = Args::try_parse_from([
            "cardstat",
            "--home",
            "/tmp/cs",
            "report",
            "--year",
            "2024",
            "--months",
            "3-5",
        ])
        .unwrap();
        assert_eq!(args.common().home().path(), Path::new("/tmp/cs"));
        match args.command() {
            Command::Report(range) => {
                assert_eq!(range.year(), Some(2024));
                assert_eq!(range.months(), Some(MonthSpan::new(3, 5).unwrap()));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_fetch_defaults() {
        let args = Args::try_parse_from(["cardstat", "--log-level", "debug", "fetch"]).unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        match args.command() {
            Command::Fetch(range) => {
                assert_eq!(range.year(), None);
                assert_eq!(range.months(), None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_months() {
        assert!(Args::try_parse_from(["cardstat", "fetch", "--months", "5-3"]).is_err());
        assert!(Args::try_parse_from(["cardstat", "fetch", "--months", "13"]).is_err());
    }

    #[test]
    fn test_parse_init() {
        let args = Args::try_parse_from([
            "cardstat", "init", "--openid", "o-123", "--cookie", "SESSION=x",
        ])
        .unwrap();
        match args.command() {
            Command::Init(init) => {
                assert_eq!(init.openid(), "o-123");
                assert_eq!(init.cookie(), "SESSION=x");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

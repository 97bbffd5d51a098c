use anyhow::{bail, ensure, Context};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Identifies one calendar month. This is the unit of both caching and fetching.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Creates a key, rejecting months outside 1-12 and years chrono cannot represent.
    pub fn new(year: i32, month: u32) -> crate::Result<Self> {
        ensure!(
            (1..=12).contains(&month),
            "Month must be between 1 and 12, got {month}"
        );
        NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("Year {year} is out of range"))?;
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The first calendar day of the month.
    pub fn first_day(&self) -> NaiveDate {
        // Validated in `new`.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// The last calendar day of the month.
    pub fn last_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or_else(|| self.first_day())
    }

    /// The inclusive fetch window covering the whole month.
    pub fn date_range(&self) -> DateRange {
        DateRange {
            begin: self.first_day(),
            end: self.last_day(),
        }
    }

    /// A month is closed once its last day is strictly before `today`. Only closed months have a
    /// history that can no longer change.
    pub fn is_closed(&self, today: NaiveDate) -> bool {
        self.last_day() < today
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// An inclusive range of dates, rendered the way the trade list endpoint expects them.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct DateRange {
    begin: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn begin(&self) -> NaiveDate {
        self.begin
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `begin` as `YYYY-MM-DD`.
    pub fn begin_str(&self) -> String {
        self.begin.format(DATE_FORMAT).to_string()
    }

    /// `end` as `YYYY-MM-DD`.
    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }

    /// The month this range starts in.
    pub fn month_key(&self) -> MonthKey {
        MonthKey {
            year: self.begin.year(),
            month: self.begin.month(),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.begin_str(), self.end_str())
    }
}

/// An inclusive, ascending span of month numbers within a single year, e.g. `3-5`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MonthSpan {
    start: u32,
    end: u32,
}

impl MonthSpan {
    pub fn new(start: u32, end: u32) -> crate::Result<Self> {
        ensure!(
            (1..=12).contains(&start) && (1..=12).contains(&end),
            "Months must be between 1 and 12, got {start}-{end}"
        );
        ensure!(
            start <= end,
            "The month span {start}-{end} is empty, the start must not be after the end"
        );
        Ok(Self { start, end })
    }

    /// January through December.
    pub fn full_year() -> Self {
        Self { start: 1, end: 12 }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// The keys of every month in the span for `year`, in ascending order.
    pub fn keys(&self, year: i32) -> crate::Result<Vec<MonthKey>> {
        (self.start..=self.end)
            .map(|month| MonthKey::new(year, month))
            .collect()
    }
}

impl Default for MonthSpan {
    fn default() -> Self {
        Self::full_year()
    }
}

impl fmt::Display for MonthSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for MonthSpan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            bail!("A month span cannot be empty, expected e.g. '3-5' or '7'");
        }
        let parse = |part: &str| -> crate::Result<u32> {
            part.trim()
                .parse::<u32>()
                .with_context(|| format!("Unable to parse '{part}' as a month number"))
        };
        match s.split_once('-') {
            Some((start, end)) => MonthSpan::new(parse(start)?, parse(end)?),
            None => {
                let month = parse(s)?;
                MonthSpan::new(month, month)
            }
        }
    }
}

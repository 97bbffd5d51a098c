//! The Aggregator turns a flat list of transactions into the summary tables of a report.
//!
//! Aggregation is all or nothing: the first record with an unreadable timestamp or amount stops
//! it with an `IntegrityError`, so no report is ever built from data that cannot be trusted.

use crate::error::IntegrityError;
use crate::model::{Amount, Category, Classifier, Transaction, OTHER_PLACE};
use chrono::{Datelike, Timelike, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Weekdays in heatmap row order.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub const HOURS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthTotal {
    pub month: u32,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanteenTotal {
    pub place: String,
    pub amount: Amount,
}

/// Counts of dining transactions by weekday (rows, Monday first) and hour of day (columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heatmap([[u32; HOURS]; 7]);

impl Default for Heatmap {
    fn default() -> Self {
        Self([[0; HOURS]; 7])
    }
}

impl Heatmap {
    pub fn get(&self, weekday: Weekday, hour: u32) -> u32 {
        self.0[weekday.num_days_from_monday() as usize]
            .get(hour as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Rows in Monday to Sunday order.
    pub fn rows(&self) -> impl Iterator<Item = (Weekday, &[u32; HOURS])> {
        WEEKDAYS.into_iter().zip(self.0.iter())
    }

    pub fn total(&self) -> u32 {
        self.0.iter().flatten().sum()
    }

    /// The busiest cell, if any dining transaction was counted. The earliest cell wins ties.
    pub fn peak(&self) -> Option<(Weekday, u32, u32)> {
        let mut peak: Option<(Weekday, u32, u32)> = None;
        for (weekday, row) in self.rows() {
            for (hour, &count) in row.iter().enumerate() {
                if count > peak.map_or(0, |(_, _, c)| c) {
                    peak = Some((weekday, hour as u32, count));
                }
            }
        }
        peak
    }

    fn increment(&mut self, weekday: Weekday, hour: u32) {
        if let Some(cell) = self.0[weekday.num_days_from_monday() as usize].get_mut(hour as usize) {
            *cell += 1;
        }
    }
}

/// The derived statistics of a list of transactions. Amounts are absolute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub transactions: usize,
    pub total: Amount,
    /// Ascending by month number. Months without transactions are absent.
    pub monthly: Vec<MonthTotal>,
    /// Descending by amount, ties by category name.
    pub categories: Vec<CategoryTotal>,
    /// Descending by amount, ties by place name. Never contains `Other`.
    pub canteens: Vec<CanteenTotal>,
    pub heatmap: Heatmap,
}

impl AggregateReport {
    pub fn month(&self, month: u32) -> Option<Amount> {
        self.monthly
            .iter()
            .find(|m| m.month == month)
            .map(|m| m.amount)
    }

    pub fn category(&self, category: Category) -> Option<Amount> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.amount)
    }

    pub fn canteen(&self, place: &str) -> Option<Amount> {
        self.canteens
            .iter()
            .find(|c| c.place == place)
            .map(|c| c.amount)
    }
}

/// Classifies every transaction and computes the report.
///
/// # Errors
/// Returns an `IntegrityError` naming the first record whose `txdate` or `txamt` cannot be
/// parsed.
pub fn aggregate(
    transactions: &[Transaction],
    classifier: &Classifier,
) -> Result<AggregateReport, IntegrityError> {
    let mut total = Amount::ZERO;
    let mut monthly: BTreeMap<u32, Amount> = BTreeMap::new();
    let mut categories: BTreeMap<Category, Amount> = BTreeMap::new();
    let mut canteens: BTreeMap<&str, Amount> = BTreeMap::new();
    let mut heatmap = Heatmap::default();

    for (index, transaction) in transactions.iter().enumerate() {
        let timestamp = transaction.timestamp(index)?;
        let amount = transaction.amount(index)?.abs();
        let category = classifier.category(transaction.merchant());

        total += amount;
        *monthly.entry(timestamp.month()).or_default() += amount;
        *categories.entry(category).or_default() += amount;

        if category == Category::Dining {
            let place = classifier.dining_place(transaction.merchant());
            if place != OTHER_PLACE {
                *canteens.entry(place).or_default() += amount;
            }
            heatmap.increment(timestamp.weekday(), timestamp.hour());
        }
    }

    let mut categories: Vec<CategoryTotal> = categories
        .into_iter()
        .map(|(category, amount)| CategoryTotal { category, amount })
        .collect();
    categories.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.category.to_string().cmp(&b.category.to_string()))
    });

    let mut canteens: Vec<CanteenTotal> = canteens
        .into_iter()
        .map(|(place, amount)| CanteenTotal {
            place: place.to_string(),
            amount,
        })
        .collect();
    canteens.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.place.cmp(&b.place)));

    Ok(AggregateReport {
        transactions: transactions.len(),
        total,
        monthly: monthly
            .into_iter()
            .map(|(month, amount)| MonthTotal { month, amount })
            .collect(),
        categories,
        canteens,
        heatmap,
    })
}

impl Display for AggregateReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total consumption: {} over {} transactions",
            self.total, self.transactions
        )?;

        writeln!(f, "\nBy month:")?;
        for m in &self.monthly {
            writeln!(f, "  {:>2}  {:>14}", m.month, m.amount.to_string())?;
        }

        writeln!(f, "\nBy category:")?;
        for c in &self.categories {
            writeln!(f, "  {:<8}{:>14}", c.category.to_string(), c.amount.to_string())?;
        }

        writeln!(f, "\nBy canteen:")?;
        if self.canteens.is_empty() {
            writeln!(f, "  (no dining transactions)")?;
        }
        for c in &self.canteens {
            writeln!(f, "  {:>14}  {}", c.amount.to_string(), c.place)?;
        }

        match self.heatmap.peak() {
            Some((weekday, hour, count)) => write!(
                f,
                "\nBusiest dining hour: {weekday} {hour:02}:00 with {count} transactions"
            ),
            None => Ok(()),
        }
    }
}

//! The Report Sink: where an `AggregateReport` ends up.
//!
//! `CsvSink` writes one CSV file per table, plus the whole report as `summary.json`, into a
//! single output directory. Existing files are replaced.

use crate::aggregate::{AggregateReport, HOURS};
use crate::model::Amount;
use crate::{utils, Result};
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MONTHLY_CSV: &str = "monthly_consumption.csv";
pub const CATEGORY_CSV: &str = "category_consumption.csv";
pub const CANTEEN_CSV: &str = "canteen_consumption.csv";
pub const HEATMAP_CSV: &str = "heatmap.csv";
pub const SUMMARY_JSON: &str = "summary.json";

/// Publishes a report somewhere. Returns the paths that were written.
#[async_trait::async_trait]
pub trait ReportSink {
    async fn publish(&self, report: &AggregateReport) -> Result<Vec<PathBuf>>;
}

/// Exports the report tables as CSV files into `dir`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, name: &str, contents: Vec<u8>) -> Result<PathBuf> {
        let path = self.dir.join(name);
        utils::write_atomic(&path, contents).await?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

#[async_trait::async_trait]
impl ReportSink for CsvSink {
    async fn publish(&self, report: &AggregateReport) -> Result<Vec<PathBuf>> {
        utils::make_dir(&self.dir).await?;

        let monthly = to_csv(
            &["month", "txamt"],
            report.monthly.iter().map(|m| MonthRow {
                month: m.month,
                txamt: plain(m.amount),
            }),
        )?;
        let categories = to_csv(
            &["category", "txamt"],
            report.categories.iter().map(|c| CategoryRow {
                category: c.category.to_string(),
                txamt: plain(c.amount),
            }),
        )?;
        let canteens = to_csv(
            &["dining_place", "txamt"],
            report.canteens.iter().map(|c| CanteenRow {
                dining_place: &c.place,
                txamt: plain(c.amount),
            }),
        )?;
        let summary =
            serde_json::to_vec_pretty(report).context("Unable to serialize the report")?;

        Ok(vec![
            self.write(MONTHLY_CSV, monthly).await?,
            self.write(CATEGORY_CSV, categories).await?,
            self.write(CANTEEN_CSV, canteens).await?,
            self.write(HEATMAP_CSV, heatmap_csv(report)?).await?,
            self.write(SUMMARY_JSON, summary).await?,
        ])
    }
}

#[derive(Serialize)]
struct MonthRow {
    month: u32,
    txamt: String,
}

#[derive(Serialize)]
struct CategoryRow {
    category: String,
    txamt: String,
}

#[derive(Serialize)]
struct CanteenRow<'a> {
    dining_place: &'a str,
    txamt: String,
}

/// Two decimal places, no currency sign or separators.
fn plain(amount: Amount) -> String {
    format!("{:.2}", amount.value())
}

/// The header is written even when there are no rows.
fn to_csv<T: Serialize>(header: &[&str], rows: impl Iterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(header)
        .context("Unable to write a CSV header")?;
    for row in rows {
        writer.serialize(row).context("Unable to write a CSV row")?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to finish the CSV output: {e}"))
}

/// One row per weekday, Monday first, with a column per hour.
fn heatmap_csv(report: &AggregateReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec![String::from("weekday")];
    header.extend((0..HOURS).map(|h| h.to_string()));
    writer
        .write_record(&header)
        .context("Unable to write the heatmap header")?;
    for (weekday, row) in report.heatmap.rows() {
        let mut record = vec![weekday.to_string()];
        record.extend(row.iter().map(|count| count.to_string()));
        writer
            .write_record(&record)
            .context("Unable to write a heatmap row")?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to finish the heatmap output: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::model::{Classifier, Transaction};
    use tempfile::TempDir;

    fn report() -> AggregateReport {
        let transactions = vec![
            Transaction::new("2024-03-05 08:10:00", -12.5, "天天餐厅"),
            Transaction::new("2024-03-05 19:00:00", -30.0, "京客隆超市"),
        ];
        aggregate(&transactions, &Classifier::new(["天天餐厅"], ["京客隆超市"])).unwrap()
    }

    #[tokio::test]
    async fn test_publish_writes_every_table() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("output").join("2024");
        let sink = CsvSink::new(&out);
        let written = sink.publish(&report()).await.unwrap();
        assert_eq!(written.len(), 5);
        for path in &written {
            assert!(path.is_file(), "{} is missing", path.display());
        }

        let monthly = std::fs::read_to_string(out.join(MONTHLY_CSV)).unwrap();
        assert_eq!(monthly, "month,txamt\n3,42.50\n");

        let categories = std::fs::read_to_string(out.join(CATEGORY_CSV)).unwrap();
        assert_eq!(categories, "category,txamt\nMarket,30.00\nDining,12.50\n");

        let canteens = std::fs::read_to_string(out.join(CANTEEN_CSV)).unwrap();
        assert_eq!(canteens, "dining_place,txamt\n天天餐厅,12.50\n");
    }

    #[tokio::test]
    async fn test_empty_tables_keep_their_header() {
        let dir = TempDir::new().unwrap();
        let empty = aggregate(&[], &Classifier::default()).unwrap();
        CsvSink::new(dir.path()).publish(&empty).await.unwrap();
        let canteens = std::fs::read_to_string(dir.path().join(CANTEEN_CSV)).unwrap();
        assert_eq!(canteens, "dining_place,txamt\n");
    }

    #[tokio::test]
    async fn test_heatmap_layout() {
        let dir = TempDir::new().unwrap();
        let sink = CsvSink::new(dir.path());
        sink.publish(&report()).await.unwrap();

        let heatmap = std::fs::read_to_string(dir.path().join(HEATMAP_CSV)).unwrap();
        let lines: Vec<&str> = heatmap.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("weekday,0,1,2,"));
        assert!(lines[0].ends_with(",23"));
        assert!(lines[1].starts_with("Mon,"));
        assert!(lines[7].starts_with("Sun,"));
        let tuesday: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(tuesday[0], "Tue");
        assert_eq!(tuesday[1 + 8], "1");
        assert_eq!(tuesday.len(), 25);
    }

    #[tokio::test]
    async fn test_summary_json() {
        let dir = TempDir::new().unwrap();
        CsvSink::new(dir.path()).publish(&report()).await.unwrap();
        let summary = std::fs::read_to_string(dir.path().join(SUMMARY_JSON)).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(summary["transactions"], 2);
        assert_eq!(summary["canteens"][0]["place"], "天天餐厅");
        assert_eq!(summary["heatmap"][1][8], 1);
    }
}

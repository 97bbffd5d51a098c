use crate::aggregate::{aggregate, AggregateReport};
use crate::api::Mode;
use crate::args::RangeArgs;
use crate::commands::{collector, resolve_range, Out};
use crate::error::MonthWarning;
use crate::model::MonthSpan;
use crate::sink::{CsvSink, ReportSink};
use crate::{Config, Result};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Everything `cardstat report` produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    pub year: i32,
    pub months: MonthSpan,
    pub report: AggregateReport,
    pub skipped: Vec<MonthWarning>,
    pub files: Vec<PathBuf>,
}

/// Collects the requested months, aggregates them and exports the tables to
/// `output/<year>`. A record that cannot be parsed aborts the command before anything is
/// written.
pub async fn report(config: Config, mode: Mode, range: &RangeArgs) -> Result<Out<ReportOutput>> {
    let (year, months) = resolve_range(&config, range)?;
    let collection = collector(&config, mode)?.collect(year, months).await?;

    let report = aggregate(&collection.transactions, &config.classifier())
        .context("The collected data is inconsistent, no report was written")?;

    let sink = CsvSink::new(config.output_dir(year));
    let files = sink.publish(&report).await?;
    info!("Wrote {} files to {}", files.len(), sink.dir().display());

    let mut message = format!("{year} consumption report (months {months})\n\n{report}");
    if !collection.warnings.is_empty() {
        message.push_str(&format!(
            "\n\n{} months are missing from this report:",
            collection.warnings.len()
        ));
        for warning in &collection.warnings {
            message.push_str(&format!("\n  {warning}"));
        }
    }

    Ok(Out::new(
        message,
        ReportOutput {
            year,
            months,
            report,
            skipped: collection.warnings,
            files,
        },
    ))
}

use crate::api::Mode;
use crate::args::RangeArgs;
use crate::commands::{collector, resolve_range, Out};
use crate::error::MonthWarning;
use crate::model::{MonthKey, MonthSpan};
use crate::{Config, Result};
use serde::Serialize;

/// What `cardstat fetch` did to each month of the range.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub year: i32,
    pub months: MonthSpan,
    pub cached: Vec<MonthKey>,
    pub fetched: Vec<MonthKey>,
    pub skipped: Vec<MonthWarning>,
    pub records: usize,
}

/// Warms the month cache for the requested range. Months that fail are skipped, they will be
/// tried again next time.
pub async fn fetch(config: Config, mode: Mode, range: &RangeArgs) -> Result<Out<FetchSummary>> {
    let (year, months) = resolve_range(&config, range)?;
    let collection = collector(&config, mode)?.collect(year, months).await?;

    let summary = FetchSummary {
        year,
        months,
        cached: collection.cached().collect(),
        fetched: collection.fetched().collect(),
        skipped: collection.warnings,
        records: collection.transactions.len(),
    };

    let mut message = format!(
        "{year} months {months}: {} already cached, {} fetched, {} skipped ({} records)",
        summary.cached.len(),
        summary.fetched.len(),
        summary.skipped.len(),
        summary.records
    );
    for warning in &summary.skipped {
        message.push_str(&format!("\n  skipped {warning}"));
    }
    Ok(Out::new(message, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_fetch_then_fetch_again() {
        let env = TestEnv::new().await;
        let range = RangeArgs::new(Some(2024), Some(MonthSpan::new(1, 4).unwrap()));

        let first = fetch(env.config(), Mode::Test, &range).await.unwrap();
        let first = first.structure().unwrap();
        assert_eq!(first.fetched.len(), 4);
        assert!(first.cached.is_empty());
        assert_eq!(first.records, 24);
        assert!(env.config().cache_dir().join("2024").join("03.json").is_file());

        let second = fetch(env.config(), Mode::Test, &range).await.unwrap();
        assert!(second.message().contains("4 already cached, 0 fetched"));
        let second = second.structure().unwrap();
        assert_eq!(second.cached.len(), 4);
        assert_eq!(second.records, 24);
    }

    #[tokio::test]
    async fn test_fetch_uses_configured_range_without_months() {
        let env = TestEnv::new().await;
        let range = RangeArgs::new(Some(2024), None);
        let out = fetch(env.config(), Mode::Test, &range).await.unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.months, MonthSpan::full_year());
        assert_eq!(summary.fetched.len(), 12);
    }
}

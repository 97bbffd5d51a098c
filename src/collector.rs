//! The Monthly Collector walks a range of months, reading each from the Month Cache when it can and
//! from the Transaction Source when it must, and concatenates the records in month order.
//!
//! A month that cannot be obtained is skipped with a warning; the walk always reaches the end of
//! the range. Months are processed one at a time, so the read-then-maybe-write on the cache never
//! races with itself.

use crate::api::{parse_trade_list, TransactionSource};
use crate::cache::MonthCache;
use crate::error::{MonthFault, MonthWarning};
use crate::model::{MonthKey, MonthSpan, Transaction};
use crate::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The default pause between two live fetches.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Where a month's records came from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cache,
    Live,
}

serde_plain::derive_display_from_serialize!(Origin);

/// What happened to one month that contributed records.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct MonthStatus {
    pub key: MonthKey,
    pub origin: Origin,
    pub records: usize,
}

/// The result of a collection run: every record obtained, in order, plus what was skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Collection {
    pub transactions: Vec<Transaction>,
    pub months: Vec<MonthStatus>,
    pub warnings: Vec<MonthWarning>,
}

impl Collection {
    /// Months that were served by the cache.
    pub fn cached(&self) -> impl Iterator<Item = MonthKey> + '_ {
        self.with_origin(Origin::Cache)
    }

    /// Months that were fetched from the source.
    pub fn fetched(&self) -> impl Iterator<Item = MonthKey> + '_ {
        self.with_origin(Origin::Live)
    }

    fn with_origin(&self, origin: Origin) -> impl Iterator<Item = MonthKey> + '_ {
        self.months
            .iter()
            .filter(move |m| m.origin == origin)
            .map(|m| m.key)
    }
}

pub struct Collector {
    cache: Box<dyn MonthCache + Send + Sync>,
    source: Box<dyn TransactionSource + Send>,
    delay: Duration,
    today: NaiveDate,
}

impl Collector {
    pub fn new(
        cache: Box<dyn MonthCache + Send + Sync>,
        source: Box<dyn TransactionSource + Send>,
    ) -> Self {
        Self {
            cache,
            source,
            delay: DEFAULT_DELAY,
            today: Local::now().date_naive(),
        }
    }

    /// Sets the pause imposed between two live fetches.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the date used to decide whether a month is over and may be cached.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Collects every month of `span` in `year`, in ascending order.
    ///
    /// # Errors
    /// Only if `year` cannot be represented. Per-month problems are reported in
    /// `Collection::warnings` instead.
    pub async fn collect(&mut self, year: i32, span: MonthSpan) -> Result<Collection> {
        let mut collection = Collection::default();
        let mut live_fetches = 0usize;

        for key in span.keys(year)? {
            match self.collect_month(key, &mut live_fetches).await {
                Ok((origin, records)) => {
                    debug!("{key}: {} records from {origin}", records.len());
                    collection.months.push(MonthStatus {
                        key,
                        origin,
                        records: records.len(),
                    });
                    collection.transactions.extend(records);
                }
                Err(fault) => {
                    warn!("Skipping {key}, no data could be obtained: {fault}");
                    collection.warnings.push(MonthWarning { key, fault });
                }
            }
        }

        info!(
            "Collected {} records from {} months ({} skipped)",
            collection.transactions.len(),
            collection.months.len(),
            collection.warnings.len()
        );
        Ok(collection)
    }

    async fn collect_month(
        &mut self,
        key: MonthKey,
        live_fetches: &mut usize,
    ) -> std::result::Result<(Origin, Vec<Transaction>), MonthFault> {
        match self.cache.get(key).await {
            Ok(Some(payload)) => {
                debug!("Reading {key} from the cache");
                return Ok((Origin::Cache, parse_trade_list(&payload)?));
            }
            Ok(None) => {}
            Err(e) => return Err(MonthFault::Cache(format!("{e:#}"))),
        }

        if *live_fetches > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        *live_fetches += 1;

        info!("Fetching {key} from the card system");
        let payload = self.source.fetch(&key.date_range()).await?;
        let records = parse_trade_list(&payload)?;

        if key.is_closed(self.today) {
            if let Err(e) = self.cache.put(key, &payload).await {
                warn!("Unable to cache {key}, it will be fetched again next time: {e:#}");
            }
        } else {
            debug!("{key} is not over yet, it will not be cached");
        }
        Ok((Origin::Live, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{trade_list_payload, TestSource};
    use crate::cache::{FileCache, MemoryCache};
    use serde_json::json;

    fn key(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    fn records(month: u32, n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| {
                Transaction::new(
                    format!("2024-{month:02}-{:02} 12:00:00", i + 1),
                    -(i as f64 + 1.0),
                    "天天餐厅",
                )
            })
            .collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn collector(cache: MemoryCache, source: TestSource) -> Collector {
        Collector::new(Box::new(cache), Box::new(source))
            .with_delay(Duration::ZERO)
            .with_today(today())
    }

    #[tokio::test]
    async fn test_collects_months_in_order() {
        let source = TestSource::empty()
            .with_records(key(2024, 2), &records(2, 2))
            .with_records(key(2024, 1), &records(1, 3));
        let mut c = collector(MemoryCache::new(), source);
        let collection = c.collect(2024, MonthSpan::new(1, 2).unwrap()).await.unwrap();

        let dates: Vec<&str> = collection
            .transactions
            .iter()
            .filter_map(|t| t.date())
            .collect();
        assert_eq!(
            dates,
            vec![
                "2024-01-01 12:00:00",
                "2024-01-02 12:00:00",
                "2024-01-03 12:00:00",
                "2024-02-01 12:00:00",
                "2024-02-02 12:00:00",
            ]
        );
        assert!(collection.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_requests_whole_month_windows() {
        let source = TestSource::empty();
        let log = source.requests();
        let mut c = collector(MemoryCache::new(), source);
        c.collect(2024, MonthSpan::new(2, 2).unwrap()).await.unwrap();
        let ranges = log.ranges();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].begin_str(), "2024-02-01");
        assert_eq!(ranges[0].end_str(), "2024-02-29");
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let cache = MemoryCache::new();
        let source = TestSource::default();
        let log = source.requests();
        let span = MonthSpan::new(1, 3).unwrap();

        let first = collector(cache.clone(), source)
            .collect(2024, span)
            .await
            .unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(cache.len(), 3);
        assert_eq!(first.fetched().count(), 3);

        let second_source = TestSource::default();
        let second_log = second_source.requests();
        let mut c = collector(cache.clone(), second_source);
        let second = c.collect(2024, span).await.unwrap();
        let third = c.collect(2024, span).await.unwrap();

        assert!(second_log.is_empty());
        assert_eq!(first.transactions, second.transactions);
        assert_eq!(second.transactions, third.transactions);
        assert_eq!(second.cached().count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_only_between_live_fetches() {
        let cache = MemoryCache::new();
        cache
            .put(key(2024, 2), &trade_list_payload(&records(2, 1)))
            .await
            .unwrap();
        let source = TestSource::empty();
        let log = source.requests();
        let mut c = Collector::new(Box::new(cache), Box::new(source))
            .with_delay(Duration::from_millis(500))
            .with_today(today());

        let start = tokio::time::Instant::now();
        let collection = c.collect(2024, MonthSpan::new(1, 4).unwrap()).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        assert_eq!(log.len(), 3);
        assert_eq!(collection.cached().collect::<Vec<_>>(), vec![key(2024, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_live_fetch_does_not_pause() {
        let mut c = Collector::new(Box::new(MemoryCache::new()), Box::new(TestSource::empty()))
            .with_delay(Duration::from_millis(500))
            .with_today(today());
        let start = tokio::time::Instant::now();
        c.collect(2024, MonthSpan::new(5, 5).unwrap()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_failed_month_is_skipped_not_fatal() {
        let source = TestSource::empty()
            .with_fault(key(2024, 1), MonthFault::Transport(String::from("timed out")))
            .with_records(key(2024, 2), &records(2, 5));
        let cache = MemoryCache::new();
        let mut c = collector(cache.clone(), source);
        let collection = c.collect(2024, MonthSpan::new(1, 2).unwrap()).await.unwrap();

        assert_eq!(collection.transactions, records(2, 5));
        assert_eq!(collection.warnings.len(), 1);
        assert_eq!(collection.warnings[0].key, key(2024, 1));
        assert!(!cache.contains(key(2024, 1)));
        assert!(cache.contains(key(2024, 2)));
    }

    #[tokio::test]
    async fn test_rejected_and_malformed_months_are_not_cached() {
        let source = TestSource::empty()
            .with_response(key(2024, 1), json!({"success": false, "msg": "expired"}))
            .with_response(key(2024, 2), json!({"success": true}))
            .with_records(key(2024, 3), &records(3, 1));
        let cache = MemoryCache::new();
        let mut c = collector(cache.clone(), source);
        let collection = c.collect(2024, MonthSpan::new(1, 3).unwrap()).await.unwrap();

        assert_eq!(collection.transactions.len(), 1);
        let faults: Vec<&MonthFault> = collection.warnings.iter().map(|w| &w.fault).collect();
        assert!(matches!(faults[0], MonthFault::Rejected(_)));
        assert!(matches!(faults[1], MonthFault::Malformed(_)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_open_month_is_fetched_but_not_cached() {
        let source = TestSource::empty().with_records(key(2024, 12), &records(12, 2));
        let cache = MemoryCache::new();
        let mut c = Collector::new(Box::new(cache.clone()), Box::new(source))
            .with_delay(Duration::ZERO)
            .with_today(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        let collection = c.collect(2024, MonthSpan::new(12, 12).unwrap()).await.unwrap();
        assert_eq!(collection.transactions.len(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_a_warning() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        let path = cache.path(key(2024, 1));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "garbage").unwrap();

        let source = TestSource::default();
        let log = source.requests();
        let mut c = Collector::new(Box::new(cache), Box::new(source))
            .with_delay(Duration::ZERO)
            .with_today(today());
        let collection = c.collect(2024, MonthSpan::new(1, 2).unwrap()).await.unwrap();

        assert!(matches!(
            collection.warnings[0].fault,
            MonthFault::Cache(_)
        ));
        assert_eq!(collection.transactions.len(), 7);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_file_cache_holds_verbatim_payload() {
        let dir = tempfile::TempDir::new().unwrap();
        let payload = trade_list_payload(&records(4, 2));
        let source = TestSource::empty().with_response(key(2024, 4), payload.clone());
        let mut c = Collector::new(Box::new(FileCache::new(dir.path())), Box::new(source))
            .with_delay(Duration::ZERO)
            .with_today(today());
        c.collect(2024, MonthSpan::new(4, 4).unwrap()).await.unwrap();

        let stored = std::fs::read_to_string(dir.path().join("2024").join("04.json")).unwrap();
        let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored, payload);
    }
}

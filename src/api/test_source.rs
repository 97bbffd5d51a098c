//! Implements the `TransactionSource` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without contacting the card system.

use crate::api::TransactionSource;
use crate::error::MonthFault;
use crate::model::{DateRange, MonthKey, Transaction, TIMESTAMP_FORMAT};
use chrono::{Datelike, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// An implementation of the `TransactionSource` trait that serves canned responses per month.
///
/// Months without a canned response or fault answer with a successful, empty trade list, the way
/// the card system does for a month without trades.
#[derive(Debug, Clone)]
pub struct TestSource {
    responses: HashMap<MonthKey, Value>,
    faults: HashMap<MonthKey, MonthFault>,
    requests: RequestLog,
}

impl TestSource {
    /// Create a new `TestSource` that answers with `responses`, keyed by month.
    pub fn new(responses: HashMap<MonthKey, Value>) -> Self {
        Self {
            responses,
            faults: HashMap::new(),
            requests: RequestLog::default(),
        }
    }

    /// A source with no data at all.
    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Answer `key` with a successful payload carrying `records`.
    pub fn with_records(mut self, key: MonthKey, records: &[Transaction]) -> Self {
        self.responses.insert(key, trade_list_payload(records));
        self
    }

    /// Answer `key` with `payload` verbatim.
    pub fn with_response(mut self, key: MonthKey, payload: Value) -> Self {
        self.responses.insert(key, payload);
        self
    }

    /// Fail every request for `key` with `fault`.
    pub fn with_fault(mut self, key: MonthKey, fault: MonthFault) -> Self {
        self.faults.insert(key, fault);
        self
    }

    /// A handle on the log of requests made so far. It stays valid after the source has been
    /// moved into a collector.
    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }
}

#[async_trait::async_trait]
impl TransactionSource for TestSource {
    async fn fetch(&mut self, range: &DateRange) -> Result<Value, MonthFault> {
        self.requests.push(*range);
        let key = range.month_key();
        if let Some(fault) = self.faults.get(&key) {
            return Err(fault.clone());
        }
        Ok(self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| trade_list_payload(&[])))
    }
}

impl Default for TestSource {
    /// Loads seed data from this module.
    fn default() -> Self {
        Self::new(default_data())
    }
}

/// The date ranges a `TestSource` has been asked for, in order.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<DateRange>>>);

impl RequestLog {
    fn push(&self, range: DateRange) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(range);
    }

    pub fn ranges(&self) -> Vec<DateRange> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps `records` the way the card system does.
pub fn trade_list_payload(records: &[Transaction]) -> Value {
    json!({
        "success": true,
        "msg": "ok",
        "data": { "data": records }
    })
}

#[derive(Debug, Deserialize)]
struct SeedRow {
    txdate: String,
    txamt: f64,
    mername: String,
}

/// Provides the seed data from this module, grouped into one payload per month.
fn default_data() -> HashMap<MonthKey, Value> {
    let mut months: HashMap<MonthKey, Vec<Transaction>> = HashMap::new();
    let mut rdr = csv::Reader::from_reader(Cursor::new(SEED_DATA.as_bytes()));
    for result in rdr.deserialize::<SeedRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping an unreadable seed row: {e}");
                continue;
            }
        };
        let key = NaiveDateTime::parse_from_str(&row.txdate, TIMESTAMP_FORMAT)
            .ok()
            .and_then(|ts| MonthKey::new(ts.year(), ts.month()).ok());
        match key {
            Some(key) => months
                .entry(key)
                .or_default()
                .push(Transaction::new(row.txdate, row.txamt, row.mername)),
            None => warn!("Skipping a seed row with a bad date '{}'", row.txdate),
        }
    }
    months
        .into_iter()
        .map(|(key, records)| (key, trade_list_payload(&records)))
        .collect()
}

/// Seed trade data for the first quarter of 2024.
const SEED_DATA: &str = r##"txdate,txamt,mername
2024-01-03 07:42:10,-6.5,天天餐厅
2024-01-03 12:05:31,-14.0,美食园
2024-01-03 18:20:44,-12.5,奥运餐厅一层
2024-01-04 12:15:02,-16.0,清真餐厅基本伙
2024-01-04 20:31:19,-23.8,京客隆超市
2024-01-05 11:58:40,-13.5,风味餐厅
2024-01-08 07:50:05,-5.0,天天餐厅吧台
2024-01-08 17:45:12,-18.0,北区新餐厅
2024-01-09 15:10:33,-2.0,打印店
2024-01-10 12:02:48,-15.5,美食园
2024-02-26 12:11:27,-14.5,天天风味
2024-02-26 18:03:51,-11.0,奥运餐厅二层
2024-02-27 07:38:16,-4.5,天天餐厅
2024-02-27 21:14:09,-35.6,超市
2024-02-28 12:20:00,-17.0,清真餐厅风味组
2024-02-29 12:07:35,-13.0,美食园
2024-02-29 16:40:22,-20.0,洗衣房
2024-03-04 12:01:14,-15.0,天天餐厅
2024-03-04 18:12:55,-12.0,美食园
2024-03-05 08:10:00,-12.5,天天餐厅
2024-03-05 19:00:00,-30.0,京客隆超市
2024-03-06 12:30:41,-8.0,清真餐厅水吧
2024-03-07 11:49:03,-16.5,风味餐厅
2024-03-08 14:25:37,-3.5,打印店
"##;

use crate::error::IntegrityError;
use crate::model::Amount;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The layout of `txdate`, e.g. `2024-03-05 08:10:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One campus card trade exactly as the card system reported it.
///
/// The timestamp and amount are kept in their raw form, and may even be absent, so that a single
/// bad record is detected (and named) when the data is aggregated, instead of being dropped on the
/// way in together with the rest of its month. Fields that this program does not use are preserved
/// in `other_fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "txdate", default)]
    date: Value,
    #[serde(rename = "txamt", default)]
    amount: Value,
    #[serde(rename = "mername", default)]
    merchant: String,
    #[serde(flatten)]
    other_fields: BTreeMap<String, Value>,
}

impl Transaction {
    /// Creates a transaction with a numeric amount and no extra fields.
    pub fn new(date: impl Into<String>, amount: f64, merchant: impl Into<String>) -> Self {
        Self {
            date: Value::String(date.into()),
            amount: Value::from(amount),
            merchant: merchant.into(),
            other_fields: BTreeMap::new(),
        }
    }

    /// The `txdate` string, if the record carries one.
    pub fn date(&self) -> Option<&str> {
        self.date.as_str()
    }

    /// The raw `txdate` value, `null` when it is missing.
    pub fn raw_date(&self) -> &Value {
        &self.date
    }

    /// The raw `txamt` value, `null` when it is missing.
    pub fn raw_amount(&self) -> &Value {
        &self.amount
    }

    pub fn merchant(&self) -> &str {
        &self.merchant
    }

    pub fn other_fields(&self) -> &BTreeMap<String, Value> {
        &self.other_fields
    }

    /// Parses `txdate`. `index` is the record's position, used to name it in the error.
    pub fn timestamp(&self, index: usize) -> Result<NaiveDateTime, IntegrityError> {
        let fault = |value: String, reason: String| IntegrityError {
            index,
            field: "txdate",
            value,
            reason,
        };
        let raw = self
            .date
            .as_str()
            .ok_or_else(|| fault(self.date.to_string(), String::from("expected a string")))?;
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .map_err(|e| fault(raw.to_string(), e.to_string()))
    }

    /// Parses `txamt`. `index` is the record's position, used to name it in the error.
    pub fn amount(&self, index: usize) -> Result<Amount, IntegrityError> {
        Amount::from_json(&self.amount).map_err(|e| IntegrityError {
            index,
            field: "txamt",
            value: self.amount.to_string(),
            reason: e.to_string(),
        })
    }
}

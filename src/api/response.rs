//! Validation of trade list payloads.
//!
//! A payload looks like this:
//! ```json
//! {
//!   "success": true,
//!   "msg": "ok",
//!   "data": {
//!     "data": [
//!       { "txdate": "2024-03-05 08:10:00", "txamt": -12.5, "mername": "天天餐厅" }
//!     ]
//!   }
//! }
//! ```

use crate::error::MonthFault;
use crate::model::Transaction;
use serde_json::Value;

/// Checks the `success` flag and extracts the records in `data.data`, preserving their order.
///
/// Only the shape is checked here. A record that is an object is accepted even if its `txdate`
/// or `txamt` is missing or unusable; aggregation reports those as integrity errors.
///
/// Both live responses and cached entries go through this, so a cached payload is trusted no
/// more than a fresh one.
pub fn parse_trade_list(payload: &Value) -> Result<Vec<Transaction>, MonthFault> {
    let object = payload
        .as_object()
        .ok_or_else(|| MonthFault::Malformed(String::from("the payload is not a JSON object")))?;

    match object.get("success") {
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => return Err(MonthFault::Rejected(message(payload))),
        Some(other) => {
            return Err(MonthFault::Malformed(format!(
                "'success' should be a boolean, found {other}"
            )))
        }
        None => {
            return Err(MonthFault::Malformed(String::from(
                "the 'success' flag is missing",
            )))
        }
    }

    let records = payload
        .get("data")
        .and_then(|data| data.get("data"))
        .ok_or_else(|| MonthFault::Malformed(String::from("'data.data' is missing")))?
        .as_array()
        .ok_or_else(|| MonthFault::Malformed(String::from("'data.data' is not an array")))?;

    records
        .iter()
        .enumerate()
        .map(|(ix, record)| {
            serde_json::from_value(record.clone())
                .map_err(|e| MonthFault::Malformed(format!("record {ix} is unreadable: {e}")))
        })
        .collect()
}

/// The upstream explanation for a rejection, if it sent one.
fn message(payload: &Value) -> String {
    ["msg", "message"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| String::from("the response reported success = false"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let payload = json!({
            "success": true,
            "data": {"data": [
                {"txdate": "2024-03-05 08:10:00", "txamt": -12.5, "mername": "天天餐厅"},
                {"txdate": "2024-03-05 19:00:00", "txamt": -30.0, "mername": "京客隆超市"}
            ]}
        });
        let records = parse_trade_list(&payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].merchant(), "天天餐厅");
        assert_eq!(records[1].merchant(), "京客隆超市");
    }

    #[test]
    fn test_parse_empty_month() {
        let payload = json!({"success": true, "data": {"data": []}});
        assert!(parse_trade_list(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_carries_message() {
        let payload = json!({"success": false, "msg": "会话已过期"});
        assert_eq!(
            parse_trade_list(&payload).unwrap_err(),
            MonthFault::Rejected(String::from("会话已过期"))
        );
    }

    #[test]
    fn test_malformed_shapes() {
        for payload in [
            json!([]),
            json!({"data": {"data": []}}),
            json!({"success": "yes", "data": {"data": []}}),
            json!({"success": true}),
            json!({"success": true, "data": {"data": {}}}),
            json!({"success": true, "data": {"data": [42]}}),
            json!({"success": true, "data": {"data": ["2024-03-05 08:10:00"]}}),
        ] {
            assert!(
                matches!(parse_trade_list(&payload), Err(MonthFault::Malformed(_))),
                "{payload}"
            );
        }
    }

    #[test]
    fn test_unusable_fields_are_left_for_aggregation() {
        let payload = json!({
            "success": true,
            "data": {"data": [
                {"mername": "x"},
                {"txdate": null, "txamt": -1.0, "mername": "天天餐厅"}
            ]}
        });
        let records = parse_trade_list(&payload).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].timestamp(0).is_err());
        assert!(records[1].timestamp(1).is_err());
    }
}

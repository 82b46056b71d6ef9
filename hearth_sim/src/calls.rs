//! Recording of every capability call an app makes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One call made through `HassContext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Method name, e.g. `turn_on`
    pub method: String,

    /// Arguments, as JSON
    pub args: Value,

    /// Simulated instant of the call
    pub at: NaiveDateTime,
}

/// Append-only log of calls, in call order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallLog {
    records: Vec<CallRecord>,
}

impl CallLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call.
    pub fn record(&mut self, method: &str, args: Value, at: NaiveDateTime) {
        self.records.push(CallRecord {
            method: method.to_string(),
            args,
            at,
        });
    }

    /// Returns every call to `method`, oldest first.
    pub fn calls(&self, method: &str) -> Vec<CallRecord> {
        self.records
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    /// Returns how often `method` was called.
    pub fn count(&self, method: &str) -> usize {
        self.records.iter().filter(|r| r.method == method).count()
    }

    /// Returns all calls.
    pub fn all(&self) -> &[CallRecord] {
        &self.records
    }

    /// Forgets every recorded call.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_call_log_filters_by_method() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut log = CallLog::new();
        log.record("turn_on", json!({"entity_id": "light.1"}), at);
        log.record("log", json!({"message": "hi"}), at);
        log.record("turn_on", json!({"entity_id": "light.2"}), at);

        assert_eq!(log.count("turn_on"), 2);
        assert_eq!(log.count("notify"), 0);
        let ids: Vec<_> = log
            .calls("turn_on")
            .into_iter()
            .map(|c| c.args["entity_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("light.1"), json!("light.2")]);

        log.clear();
        assert!(log.all().is_empty());
    }
}

//! The subway next-train (NTAS) feed.

use serde::Deserialize;
use serde_json::Value;

use super::Scalar;

/// One platform direction at a subway station.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubwayStop {
    /// Comma separated minutes until each of the next trains, e.g. `"2, 6, 11"`.
    pub next_trains: String,
    #[serde(default)]
    pub direction_text: String,
    pub line_code: Option<Scalar>,
    pub stop_code: Option<Scalar>,
    #[serde(rename = "Error")]
    pub error: Option<Value>,
}

impl SubwayStop {
    pub fn has_error(&self) -> bool {
        !matches!(self.error, None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    /// Minutes of each upcoming train, skipping blank or non-numeric parts.
    pub fn minutes(&self) -> Vec<i64> {
        self.next_trains
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    }
}

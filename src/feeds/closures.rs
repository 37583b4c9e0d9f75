//! Planned subway closures, published as one JSON file per service date
//! plus a plain-text `lastupdated` stamp.

use serde::{Deserialize, Serialize};

use super::Scalar;

/// One closure notice. The file is maintained by hand, so every field is
/// optional and both snake and camel case names are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubwayClosure {
    #[serde(default, alias = "lineNum", alias = "line_num")]
    pub line: Option<Scalar>,
    #[serde(default, alias = "type", alias = "closureType")]
    pub kind: Option<String>,
    #[serde(default, alias = "startStation", alias = "start_station")]
    pub start: Option<String>,
    #[serde(default, alias = "endStation", alias = "end_station")]
    pub end: Option<String>,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<String>,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<String>,
    #[serde(default, alias = "text")]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl SubwayClosure {
    /// `"Line 1: St Clair to Union"`, falling back to whatever is known.
    pub fn headline(&self) -> String {
        let line = self
            .line
            .as_ref()
            .map(|l| format!("Line {l}"))
            .unwrap_or_else(|| "Subway".to_string());
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => format!("{line}: {start} to {end}"),
            (Some(at), None) | (None, Some(at)) => format!("{line}: {at}"),
            (None, None) => line,
        }
    }

    pub fn touches_line(&self, line: u32) -> bool {
        self.line.as_ref().and_then(Scalar::as_u32) == Some(line)
    }
}

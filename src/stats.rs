use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gtfs_rt::FeedMessage;

/// Health record for one GTFS-realtime fetch, as written by `check`.
#[derive(Debug, Default, Serialize)]
pub struct FeedSummary {
    pub timestamp: DateTime<Utc>,
    pub feed: Option<String>,
    /// Age of the feed header timestamp at fetch time, in seconds.
    pub header_age_secs: Option<i64>,
    pub total_entities: usize,
    pub deleted: usize,

    // entity types
    pub trip_updates: usize,
    pub vehicles: usize,
    pub alerts: usize,

    // trip update fields
    pub stop_time_updates: usize,
    pub with_vehicle_descriptor: usize,
    pub with_route_id: usize,

    // alert fields
    pub with_header_text: usize,
    pub with_informed_entity: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl FeedSummary {
    pub fn from_feed(feed: &FeedMessage) -> Self {
        let now = Utc::now();
        let mut s = FeedSummary {
            timestamp: now,
            header_age_secs: feed
                .header
                .timestamp
                .and_then(|t| i64::try_from(t).ok())
                .map(|t| now.timestamp() - t),
            total_entities: feed.entity.len(),
            ..Default::default()
        };

        for e in &feed.entity {
            if e.is_deleted() {
                s.deleted += 1;
            }

            if let Some(tu) = &e.trip_update {
                s.trip_updates += 1;
                s.stop_time_updates += tu.stop_time_update.len();

                if tu.vehicle.is_some() {
                    s.with_vehicle_descriptor += 1;
                }

                if tu.trip.route_id.is_some() {
                    s.with_route_id += 1;
                }
            }

            if e.vehicle.is_some() {
                s.vehicles += 1;
            }

            if let Some(alert) = &e.alert {
                s.alerts += 1;

                if alert.header_text.is_some() {
                    s.with_header_text += 1;
                }

                if !alert.informed_entity.is_empty() {
                    s.with_informed_entity += 1;
                }
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn header_text_pct(&self) -> f64 {
        Self::pct(self.with_header_text, self.alerts)
    }

    pub fn route_id_pct(&self) -> f64 {
        Self::pct(self.with_route_id, self.trip_updates)
    }

    /// A JSON API that answered; `records` is how many items it listed.
    pub fn reachable(records: usize) -> Self {
        FeedSummary {
            timestamp: Utc::now(),
            total_entities: records,
            ..Default::default()
        }
    }

    /// One line for terminal output.
    pub fn describe(&self) -> String {
        let name = self.feed.as_deref().unwrap_or("feed");
        if let Some(message) = &self.error_message {
            return format!("{name}: FAILED ({message})");
        }
        let mut line = format!("{name}: ok, {} entities", self.total_entities);
        if let Some(age) = self.header_age_secs {
            line.push_str(&format!(", {age}s old"));
        }
        if self.alerts > 0 {
            line.push_str(&format!(", {:.0}% of alerts with header text", self.header_text_pct()));
        }
        if self.trip_updates > 0 {
            line.push_str(&format!(", {:.0}% of trips with route id", self.route_id_pct()));
        }
        line
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        FeedSummary {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_feed_name(mut self, feed: &str) -> Self {
        self.feed = Some(feed.to_string());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.error_type.is_none()
    }
}

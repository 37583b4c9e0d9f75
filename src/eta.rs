//! Normalization of every prediction schema into [`UnifiedEta`] groups.

use serde::Serialize;
use tracing::{debug, warn};

use crate::feeds::{RawPredictionFeed, basic, legacy, subway};
use crate::gtfs_rt::FeedMessage;
use crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship;
use crate::parser::parse_feed;

/// One vehicle expected at a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EtaEntry {
    /// Expected arrival in epoch seconds.
    pub epoch_time: i64,
    pub branch: String,
    pub vehicle_id: String,
}

impl EtaEntry {
    /// Countdown from `now`, never below zero.
    pub fn seconds_until(&self, now: i64) -> i64 {
        (self.epoch_time - now).max(0)
    }
}

/// Arrivals for one direction of one line at one stop, sorted by time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedEta {
    pub line: String,
    pub direction: String,
    pub stop_tag: String,
    pub etas: Vec<EtaEntry>,
}

/// What the caller knows about a fetch that the payload may not carry.
#[derive(Debug, Clone, Default)]
pub struct EtaContext {
    /// Epoch seconds at which the payload was fetched.
    pub fetched_at: i64,
    pub line: Option<String>,
    pub stop_tag: Option<String>,
}

impl EtaContext {
    pub fn at(fetched_at: i64) -> Self {
        Self {
            fetched_at,
            ..Default::default()
        }
    }

    pub fn now() -> Self {
        Self::at(chrono::Utc::now().timestamp())
    }

    pub fn for_line(mut self, line: impl Into<String>) -> Self {
        self.line = Some(line.into());
        self
    }

    pub fn for_stop(mut self, stop_tag: impl Into<String>) -> Self {
        self.stop_tag = Some(stop_tag.into());
        self
    }

    fn line_or_default(&self) -> String {
        self.line.clone().unwrap_or_default()
    }

    fn stop_or_default(&self) -> String {
        self.stop_tag.clone().unwrap_or_default()
    }

    /// Arrival time from the first usable field, clamped to the fetch time.
    fn resolve(
        &self,
        epoch_ms: Option<i64>,
        seconds: Option<i64>,
        minutes: Option<i64>,
    ) -> Option<i64> {
        let at = epoch_ms
            .map(|ms| ms / 1000)
            .or_else(|| seconds.and_then(|s| self.fetched_at.checked_add(s)))
            .or_else(|| {
                minutes
                    .and_then(|m| m.checked_mul(60))
                    .and_then(|s| self.fetched_at.checked_add(s))
            })?;
        Some(self.clamp(at))
    }

    fn clamp(&self, epoch_time: i64) -> i64 {
        epoch_time.max(self.fetched_at)
    }
}

/// Groups of [`UnifiedEta`] keyed by `(line, direction, stop_tag)`, merging
/// repeated directions in first-seen order.
#[derive(Default)]
struct Groups(Vec<UnifiedEta>);

impl Groups {
    fn push(&mut self, line: String, direction: String, stop_tag: String, etas: Vec<EtaEntry>) {
        let existing = self
            .0
            .iter_mut()
            .find(|g| g.line == line && g.direction == direction && g.stop_tag == stop_tag);
        match existing {
            Some(group) => group.etas.extend(etas),
            None => self.0.push(UnifiedEta {
                line,
                direction,
                stop_tag,
                etas,
            }),
        }
    }

    fn finish(mut self) -> Vec<UnifiedEta> {
        for group in &mut self.0 {
            group.etas.sort_by_key(|e| e.epoch_time);
        }
        self.0
    }
}

/// Normalizes one parsed payload.
pub fn normalize(feed: &RawPredictionFeed, ctx: &EtaContext) -> Vec<UnifiedEta> {
    let mut groups = Groups::default();
    match feed {
        RawPredictionFeed::Legacy(predictions) => {
            for p in predictions {
                legacy_groups(p, ctx, &mut groups);
            }
        }
        RawPredictionFeed::Basic(buses) => basic_groups(buses, ctx, &mut groups),
        RawPredictionFeed::Subway(stops) => subway_groups(stops, ctx, &mut groups),
        RawPredictionFeed::GtfsRealtime(message) => gtfs_groups(message, ctx, &mut groups),
    }
    let groups = groups.finish();
    debug!(kind = feed.kind(), groups = groups.len(), "Normalized predictions");
    groups
}

fn legacy_groups(p: &legacy::Predictions, ctx: &EtaContext, groups: &mut Groups) {
    let line = p
        .route_tag
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| ctx.line_or_default());
    let stop_tag = p
        .stop_tag
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| ctx.stop_or_default());

    if let Some(title) = &p.dir_title_because_no_predictions {
        groups.push(line.clone(), title.clone(), stop_tag.clone(), Vec::new());
    }

    for direction in p.direction.as_slice() {
        let etas = direction
            .prediction
            .as_slice()
            .iter()
            .filter_map(|pred| {
                let epoch_time = ctx.resolve(
                    pred.epoch_time.as_ref().and_then(|v| v.as_i64()),
                    pred.seconds.as_ref().and_then(|v| v.as_i64()),
                    pred.minutes.as_ref().and_then(|v| v.as_i64()),
                )?;
                Some(EtaEntry {
                    epoch_time,
                    branch: pred
                        .branch
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| line.clone()),
                    vehicle_id: pred
                        .vehicle
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                })
            })
            .collect();
        groups.push(line.clone(), direction.title.clone(), stop_tag.clone(), etas);
    }
}

fn basic_groups(buses: &[basic::NextBusBasic], ctx: &EtaContext, groups: &mut Groups) {
    let line = ctx.line_or_default();
    let stop_tag = ctx.stop_or_default();

    for bus in buses {
        let Some(epoch_time) = ctx.resolve(None, None, bus.next_bus_minutes.as_i64()) else {
            continue;
        };
        let entry = EtaEntry {
            epoch_time,
            branch: line.clone(),
            vehicle_id: bus
                .vehicle_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        };
        groups.push(
            line.clone(),
            bus.direction_text.clone().unwrap_or_default(),
            stop_tag.clone(),
            vec![entry],
        );
    }
}

fn subway_groups(stops: &[subway::SubwayStop], ctx: &EtaContext, groups: &mut Groups) {
    for stop in stops.iter().filter(|s| !s.has_error()) {
        let line = stop
            .line_code
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| ctx.line_or_default());
        let stop_tag = stop
            .stop_code
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| ctx.stop_or_default());
        let etas = stop
            .minutes()
            .into_iter()
            .filter_map(|m| ctx.resolve(None, None, Some(m)))
            .map(|epoch_time| EtaEntry {
                epoch_time,
                branch: line.clone(),
                vehicle_id: String::new(),
            })
            .collect();
        groups.push(line, stop.direction_text.clone(), stop_tag, etas);
    }
}

fn gtfs_groups(message: &FeedMessage, ctx: &EtaContext, groups: &mut Groups) {
    for entity in &message.entity {
        if entity.is_deleted() {
            continue;
        }
        let Some(update) = &entity.trip_update else {
            continue;
        };

        let line = update.trip.route_id().to_string();
        if ctx.line.as_deref().is_some_and(|l| l != line) {
            continue;
        }
        let direction = update
            .trip
            .direction_id
            .map(|d| d.to_string())
            .unwrap_or_default();
        let vehicle_id = update
            .vehicle
            .as_ref()
            .map(|v| v.id().to_string())
            .unwrap_or_default();

        for stu in &update.stop_time_update {
            let stop_id = stu.stop_id();
            if ctx.stop_tag.as_deref().is_some_and(|s| s != stop_id) {
                continue;
            }
            if stu.schedule_relationship() == ScheduleRelationship::Skipped {
                continue;
            }
            let time = stu
                .arrival
                .as_ref()
                .and_then(|e| e.time)
                .or_else(|| stu.departure.as_ref().and_then(|e| e.time));
            let Some(epoch_time) = time.map(|t| ctx.clamp(t)) else {
                continue;
            };
            groups.push(
                line.clone(),
                direction.clone(),
                stop_id.to_string(),
                vec![EtaEntry {
                    epoch_time,
                    branch: line.clone(),
                    vehicle_id: vehicle_id.clone(),
                }],
            );
        }
    }
}

/// Parses and normalizes a JSON prediction payload. Unrecognized or
/// malformed payloads give an empty list.
pub fn parse_etas(bytes: &[u8], ctx: &EtaContext) -> Vec<UnifiedEta> {
    match RawPredictionFeed::from_slice(bytes) {
        Ok(feed) => normalize(&feed, ctx),
        Err(e) => {
            warn!(error = %e, "Discarding prediction payload");
            Vec::new()
        }
    }
}

/// Like [`parse_etas`] for a GTFS-realtime trip update feed.
pub fn parse_gtfs_etas(bytes: &[u8], ctx: &EtaContext) -> Vec<UnifiedEta> {
    match parse_feed(bytes) {
        Ok(message) => normalize(&RawPredictionFeed::GtfsRealtime(message), ctx),
        Err(e) => {
            warn!(error = %e, "Discarding GTFS-realtime payload");
            Vec::new()
        }
    }
}

/// All arrivals across groups in one list, soonest first.
pub fn flatten(groups: &[UnifiedEta]) -> Vec<EtaEntry> {
    let mut entries: Vec<EtaEntry> = groups.iter().flat_map(|g| g.etas.iter().cloned()).collect();
    entries.sort_by_key(|e| e.epoch_time);
    entries
}

/// Keeps entries whose branch belongs to one of `lines`, comparing the
/// leading route number so that branch `504A` matches line `504`.
pub fn filter_lines(entries: Vec<EtaEntry>, lines: &[&str]) -> Vec<EtaEntry> {
    let wanted: Vec<u32> = lines.iter().filter_map(|l| leading_number(l)).collect();
    entries
        .into_iter()
        .filter(|e| leading_number(&e.branch).is_some_and(|n| wanted.contains(&n)))
        .collect()
}

fn leading_number(s: &str) -> Option<u32> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

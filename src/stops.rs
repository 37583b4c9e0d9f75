//! Stop lookup built from a legacy route configuration, and the per-direction
//! stop lists derived from it.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::feeds::legacy::{ConfigDirection, RouteConfig, RouteConfigResponse};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopRecord {
    pub id: u32,
    pub tag: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Every stop of a route, keyed by numeric stop id.
#[derive(Debug, Default, Clone)]
pub struct StopDb {
    by_id: HashMap<u32, StopRecord>,
}

impl StopDb {
    /// Builds the lookup. Entries with a non-numeric tag or missing name or
    /// coordinates are skipped; a repeated id keeps the last entry.
    pub fn from_route(route: &RouteConfig) -> Self {
        let mut by_id = HashMap::new();
        for stop in route.stop.as_slice() {
            let Some(id) = stop.tag.as_u32() else {
                debug!(tag = %stop.tag, "Skipping stop with non-numeric tag");
                continue;
            };
            let (Some(name), Some(lat), Some(lon)) = (
                stop.title.as_ref(),
                stop.lat.as_ref().and_then(|v| v.as_f64()),
                stop.lon.as_ref().and_then(|v| v.as_f64()),
            ) else {
                debug!(id, "Skipping incomplete stop");
                continue;
            };
            by_id.insert(
                id,
                StopRecord {
                    id,
                    tag: stop.tag.to_string(),
                    name: name.clone(),
                    lat,
                    lon,
                },
            );
        }
        Self { by_id }
    }

    pub fn get(&self, id: u32) -> Option<&StopRecord> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Parses a route configuration body into a [`StopDb`]; anything that is not
/// a route configuration gives an empty lookup.
pub fn parse_stops(bytes: &[u8]) -> StopDb {
    match serde_json::from_slice::<RouteConfigResponse>(bytes) {
        Ok(resp) => StopDb::from_route(&resp.route),
        Err(e) => {
            warn!(error = %e, "Discarding route configuration payload");
            StopDb::default()
        }
    }
}

/// The stops a direction visits, in upstream order, dropping tags that are
/// not in `db`.
pub fn stop_list(db: &StopDb, direction: &ConfigDirection) -> Vec<StopRecord> {
    direction
        .stop
        .as_slice()
        .iter()
        .filter_map(|s| s.tag.as_u32())
        .filter_map(|id| db.get(id).cloned())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionBranch {
    pub tag: String,
    pub title: String,
    pub branch: String,
    pub stops: Vec<StopRecord>,
}

/// All branches sharing a direction name such as `"East"`.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDirection {
    pub name: String,
    pub branches: Vec<DirectionBranch>,
}

/// Groups the route's directions by name, in first-seen order.
pub fn route_directions(route: &RouteConfig, db: &StopDb) -> Vec<RouteDirection> {
    let mut directions: Vec<RouteDirection> = Vec::new();
    for dir in route.direction.as_slice() {
        let branch = DirectionBranch {
            tag: dir.tag.clone(),
            title: dir.title.clone(),
            branch: dir.branch.as_ref().map(ToString::to_string).unwrap_or_default(),
            stops: stop_list(db, dir),
        };
        match directions.iter_mut().find(|d| d.name == dir.name) {
            Some(existing) => existing.branches.push(branch),
            None => directions.push(RouteDirection {
                name: dir.name.clone(),
                branches: vec![branch],
            }),
        }
    }
    directions
}

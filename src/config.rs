//! Runtime configuration: endpoint base URLs, retry count, API key and the
//! bookmark file location.
//!
//! Defaults cover the public TTC endpoints. An optional JSON file overrides
//! any subset of fields:
//! ```json
//! {
//!   "retries": 2,
//!   "bookmarks_path": "/home/me/.config/ttc_eta/bookmarks.json",
//!   "endpoints": { "basic": "https://www.ttc.ca/ttcapi" }
//! }
//! ```
//! and `TTC_API_KEY` takes precedence over the file's `api_key`.

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Legacy XML-to-JSON feed, `publicJSONFeed`.
    pub legacy: String,
    pub agency: String,
    /// Basic REST API root.
    pub basic: String,
    /// Subway next-train API root.
    pub subway: String,
    pub gtfs_alerts: String,
    pub gtfs_trip_updates: String,
    /// Directory of per-date subway closure files.
    pub subway_closures: String,
    /// Bluesky AppView serving public author feeds.
    pub bluesky: String,
    /// Account whose posts are the TTC service alerts.
    pub bluesky_actor: String,
    /// Bustime v3 API root. Requests need the configured API key.
    pub bustime: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            legacy: "https://webservices.umoiq.com/service/publicJSONFeed".to_string(),
            agency: "ttc".to_string(),
            basic: "https://www.ttc.ca/ttcapi".to_string(),
            subway: "https://ntas.ttc.ca/api/ntas".to_string(),
            gtfs_alerts: "https://gtfsrt.ttc.ca/alerts/all?format=binary".to_string(),
            gtfs_trip_updates: "https://bustime.ttc.ca/gtfsrt/trips".to_string(),
            subway_closures: "https://thomassth.github.io/to-bus-stations/data/ttc/subway-closures"
                .to_string(),
            bluesky: "https://public.api.bsky.app".to_string(),
            bluesky_actor: "did:plc:jp63azhhbjm7hzse6bx6oq43".to_string(),
            bustime: "https://bustime.ttc.ca/bustime/api/v3".to_string(),
        }
    }
}

impl Endpoints {
    pub fn stop_predictions(&self, stop_id: u32) -> String {
        format!(
            "{}?command=predictions&a={}&stopId={}",
            self.legacy, self.agency, stop_id
        )
    }

    pub fn line_stop_predictions(&self, line: u32, stop_tag: &str) -> String {
        format!(
            "{}?command=predictions&a={}&r={}&s={}",
            self.legacy, self.agency, line, stop_tag
        )
    }

    pub fn route_config(&self, line: u32) -> String {
        format!("{}?command=routeConfig&a={}&r={}", self.legacy, self.agency, line)
    }

    pub fn route_list(&self) -> String {
        format!("{}?command=routeList&a={}", self.legacy, self.agency)
    }

    pub fn vehicle_location(&self, vehicle: u32) -> String {
        format!(
            "{}?command=vehicleLocation&a={}&v={}",
            self.legacy, self.agency, vehicle
        )
    }

    pub fn basic_next_buses(&self, line: u32, stop: u32) -> String {
        format!(
            "{}/routedetail/GetNextBuses?routeId={}&stopCode={}",
            self.basic, line, stop
        )
    }

    pub fn basic_route_list(&self) -> String {
        format!("{}/routedetail/listroutes", self.basic)
    }

    pub fn basic_route(&self, line: u32) -> String {
        format!("{}/routedetail/get?id={}", self.basic, line)
    }

    pub fn subway_next_trains(&self, stop: u32) -> String {
        format!("{}/get-next-train-time/{}", self.subway, stop)
    }

    pub fn subway_closures_on(&self, date: chrono::NaiveDate) -> String {
        format!("{}/{}.json", self.subway_closures, date.format("%Y-%m-%d"))
    }

    pub fn subway_closures_last_updated(&self) -> String {
        format!("{}/lastupdated", self.subway_closures)
    }

    pub fn bluesky_author_feed(&self, limit: u32) -> String {
        format!(
            "{}/xrpc/app.bsky.feed.getAuthorFeed?actor={}&limit={}",
            self.bluesky, self.bluesky_actor, limit
        )
    }

    /// Vehicles on one route; used as a reachability check.
    pub fn bustime_vehicles(&self, route: u32) -> String {
        format!(
            "{}/getvehicles?requestType=getvehicles&rt={}&format=json",
            self.bustime, route
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: Endpoints,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub api_key: Option<String>,
    /// Query parameter the API key is sent as.
    pub api_key_param: String,
    pub bookmarks_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            retries: 1,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            api_key: None,
            api_key_param: "key".to_string(),
            bookmarks_path: "bookmarks.json".to_string(),
        }
    }
}

impl Config {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        let config = serde_json::from_str(&content).with_context(|| format!("parsing config {path}"))?;
        Ok(config)
    }

    /// File from `TTC_ETA_CONFIG` if set, defaults otherwise, then
    /// environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("TTC_ETA_CONFIG") {
            Ok(path) => Self::load(&path)?,
            Err(_) => Self::default(),
        };
        if let Ok(key) = std::env::var("TTC_API_KEY") {
            config.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Ok(path) = std::env::var("TTC_ETA_BOOKMARKS") {
            config.bookmarks_path = path;
        }
        Ok(config)
    }
}

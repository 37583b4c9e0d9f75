//! Typed access to the TTC endpoints.
//!
//! Every operation returns normalized data or a [`FetchError`]. Where a
//! basic endpoint can stand in for a legacy one, any failure of the legacy
//! request (transport, status, an upstream `Error` body or an unrecognized
//! schema) falls through to the basic endpoint. A legacy response that
//! parses but has no arrivals is a real answer and is returned as is.

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::alerts::{self, SocialAlert};
use crate::config::{Config, Endpoints};
use crate::error::{FetchError, SchemaError};
use crate::eta::{self, EtaContext, UnifiedEta};
use crate::feeds::RawPredictionFeed;
use crate::feeds::basic::{BasicLine, RouteDetail};
use crate::feeds::bluesky::AuthorFeed;
use crate::feeds::closures::SubwayClosure;
use crate::feeds::legacy::{self, RouteConfig, RouteConfigResponse, RouteListResponse, VehicleLocationResponse};
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, fetch_with_retry};
use crate::gtfs_rt::FeedMessage;
use crate::parser::parse_feed;
use crate::routes::{self, BranchStops, RouteSummary};
use crate::stops::{self, RouteDirection, StopDb};
use crate::vehicles::{self, VehicleLocation};

/// A route as served by whichever endpoint answered.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RouteView {
    Legacy {
        title: String,
        directions: Vec<RouteDirection>,
    },
    Basic {
        branches: Vec<BranchStops>,
    },
}

pub struct TtcApi {
    client: Box<dyn HttpClient>,
    endpoints: Endpoints,
    retries: u32,
}

impl TtcApi {
    pub fn new(client: Box<dyn HttpClient>, endpoints: Endpoints, retries: u32) -> Self {
        Self {
            client,
            endpoints,
            retries,
        }
    }

    /// Builds the HTTP client from `config`, adding the API key parameter
    /// when one is configured.
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let basic = BasicClient::with_timeouts(
            std::time::Duration::from_secs(config.request_timeout_secs),
            std::time::Duration::from_secs(config.connect_timeout_secs),
        )?;
        let client: Box<dyn HttpClient> = match &config.api_key {
            Some(key) => Box::new(UrlParam::new(basic, config.api_key_param.as_str(), key.as_str())),
            None => Box::new(basic),
        };
        Ok(Self::new(client, config.endpoints.clone(), config.retries))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let bytes = fetch_with_retry(self.client.as_ref(), url, self.retries).await?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| FetchError::Body {
            url: url.to_string(),
            source: e.into(),
        })?;
        if let Some(message) = legacy::error_message(&value) {
            return Err(FetchError::Upstream {
                url: url.to_string(),
                message,
            });
        }
        Ok(value)
    }

    async fn get_typed<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let value = self.get_json(url).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Body {
            url: url.to_string(),
            source: e.into(),
        })
    }

    async fn get_feed(&self, url: &str) -> Result<FeedMessage, FetchError> {
        let bytes = fetch_with_retry(self.client.as_ref(), url, self.retries).await?;
        parse_feed(&bytes).map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }

    async fn get_predictions(&self, url: &str, ctx: EtaContext) -> Result<Vec<UnifiedEta>, FetchError> {
        let value = self.get_json(url).await?;
        let feed = RawPredictionFeed::detect(value).map_err(|source: SchemaError| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        Ok(eta::normalize(&feed, &ctx))
    }

    /// Every line serving a stop, from the legacy feed.
    #[tracing::instrument(skip(self))]
    pub async fn stop_predictions(&self, stop_id: u32) -> Result<Vec<UnifiedEta>, FetchError> {
        let url = self.endpoints.stop_predictions(stop_id);
        self.get_predictions(&url, EtaContext::now().for_stop(stop_id.to_string()))
            .await
    }

    /// One line at a stop addressed by its legacy stop tag.
    #[tracing::instrument(skip(self))]
    pub async fn line_stop_predictions(&self, line: u32, stop_tag: &str) -> Result<Vec<UnifiedEta>, FetchError> {
        let url = self.endpoints.line_stop_predictions(line, stop_tag);
        let ctx = EtaContext::now().for_line(line.to_string()).for_stop(stop_tag);
        self.get_predictions(&url, ctx).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn basic_bus_predictions(&self, line: u32, stop: u32) -> Result<Vec<UnifiedEta>, FetchError> {
        let url = self.endpoints.basic_next_buses(line, stop);
        let ctx = EtaContext::now().for_line(line.to_string()).for_stop(stop.to_string());
        self.get_predictions(&url, ctx).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn subway_predictions(&self, line: u32, stop: u32) -> Result<Vec<UnifiedEta>, FetchError> {
        let url = self.endpoints.subway_next_trains(stop);
        let ctx = EtaContext::now().for_line(line.to_string()).for_stop(stop.to_string());
        self.get_predictions(&url, ctx).await
    }

    /// A bus or streetcar line at a stop: the legacy stop feed narrowed to
    /// `line`, or the basic feed when the legacy request fails.
    #[tracing::instrument(skip(self))]
    pub async fn bus_predictions(&self, line: u32, stop: u32) -> Result<Vec<UnifiedEta>, FetchError> {
        let legacy = async {
            let line_tag = line.to_string();
            let mut groups = self.stop_predictions(stop).await?;
            groups.retain(|g| g.line == line_tag);
            Ok::<_, FetchError>(groups)
        };
        with_fallback("predictions", legacy, self.basic_bus_predictions(line, stop)).await
    }

    /// Several lines at one stop: a single legacy stop request narrowed to
    /// `lines`, or one basic request per line when the legacy request fails.
    #[tracing::instrument(skip(self))]
    pub async fn stop_lines_predictions(&self, stop: u32, lines: &[u32]) -> Result<Vec<UnifiedEta>, FetchError> {
        let legacy = async {
            let tags: Vec<String> = lines.iter().map(ToString::to_string).collect();
            let mut groups = self.stop_predictions(stop).await?;
            groups.retain(|g| tags.contains(&g.line));
            Ok::<_, FetchError>(groups)
        };
        let basic = async {
            let per_line =
                try_join_all(lines.iter().map(|&line| self.basic_bus_predictions(line, stop))).await?;
            Ok::<_, FetchError>(per_line.into_iter().flatten().collect())
        };
        with_fallback("stop predictions", legacy, basic).await
    }

    /// Arrivals at `stop` from the GTFS-realtime trip update feed.
    #[tracing::instrument(skip(self))]
    pub async fn gtfs_stop_predictions(&self, stop: &str, line: Option<u32>) -> Result<Vec<UnifiedEta>, FetchError> {
        let feed = self.gtfs_trip_updates().await?;
        let mut ctx = EtaContext::now().for_stop(stop);
        if let Some(line) = line {
            ctx = ctx.for_line(line.to_string());
        }
        Ok(eta::normalize(&RawPredictionFeed::GtfsRealtime(feed), &ctx))
    }

    #[tracing::instrument(skip(self))]
    pub async fn route_config(&self, line: u32) -> Result<RouteConfig, FetchError> {
        let resp: RouteConfigResponse = self.get_typed(&self.endpoints.route_config(line)).await?;
        Ok(resp.route)
    }

    #[tracing::instrument(skip(self))]
    pub async fn route_basic(&self, line: u32) -> Result<Vec<BranchStops>, FetchError> {
        let detail: RouteDetail = self.get_typed(&self.endpoints.basic_route(line)).await?;
        Ok(routes::branches_basic(detail))
    }

    /// A route's directions and stops, from the legacy route configuration
    /// or the basic route detail.
    pub async fn route(&self, line: u32) -> Result<RouteView, FetchError> {
        let legacy = async {
            let route = self.route_config(line).await?;
            let db = StopDb::from_route(&route);
            info!(line, stops = db.len(), "Route configuration loaded");
            Ok::<_, FetchError>(RouteView::Legacy {
                title: routes::parse_route_title(&route.title),
                directions: stops::route_directions(&route, &db),
            })
        };
        let basic = async {
            Ok::<_, FetchError>(RouteView::Basic {
                branches: self.route_basic(line).await?,
            })
        };
        with_fallback("route", legacy, basic).await
    }

    /// All lines, subway first.
    #[tracing::instrument(skip(self))]
    pub async fn route_list(&self) -> Result<Vec<RouteSummary>, FetchError> {
        let legacy = async {
            let resp: RouteListResponse = self.get_typed(&self.endpoints.route_list()).await?;
            Ok::<_, FetchError>(routes::summaries_legacy(resp))
        };
        let basic = async {
            let lines: Vec<BasicLine> = self.get_typed(&self.endpoints.basic_route_list()).await?;
            Ok::<_, FetchError>(routes::summaries_basic(lines))
        };
        let mut summaries = routes::subway_summaries();
        summaries.extend(with_fallback("route list", legacy, basic).await?);
        Ok(summaries)
    }

    #[tracing::instrument(skip(self))]
    pub async fn vehicle_location(&self, vehicle: u32) -> Result<Option<VehicleLocation>, FetchError> {
        let resp: VehicleLocationResponse = self.get_typed(&self.endpoints.vehicle_location(vehicle)).await?;
        Ok(vehicles::parse_vehicle_location(resp))
    }

    #[tracing::instrument(skip(self))]
    pub async fn gtfs_alerts(&self) -> Result<FeedMessage, FetchError> {
        self.get_feed(&self.endpoints.gtfs_alerts).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn gtfs_trip_updates(&self) -> Result<FeedMessage, FetchError> {
        self.get_feed(&self.endpoints.gtfs_trip_updates).await
    }

    /// Planned subway closures for one service date.
    #[tracing::instrument(skip(self))]
    pub async fn subway_closures(&self, date: NaiveDate) -> Result<Vec<SubwayClosure>, FetchError> {
        self.get_typed(&self.endpoints.subway_closures_on(date)).await
    }

    /// When the closure files were last regenerated, as published.
    #[tracing::instrument(skip(self))]
    pub async fn subway_closures_last_updated(&self) -> Result<String, FetchError> {
        let url = self.endpoints.subway_closures_last_updated();
        let bytes = fetch_with_retry(self.client.as_ref(), &url, self.retries).await?;
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }

    /// Recent posts of the TTC alerts account.
    #[tracing::instrument(skip(self))]
    pub async fn social_alerts(&self) -> Result<Vec<SocialAlert>, FetchError> {
        let feed: AuthorFeed = self.get_typed(&self.endpoints.bluesky_author_feed(100)).await?;
        Ok(alerts::social_alerts(feed))
    }

    /// Asks bustime for the vehicles on one route and returns how many it
    /// reported. Used to tell whether the bustime API is reachable and
    /// accepts the configured key.
    #[tracing::instrument(skip(self))]
    pub async fn bustime_vehicle_count(&self, route: u32) -> Result<usize, FetchError> {
        let url = self.endpoints.bustime_vehicles(route);
        let value = self.get_json(&url).await?;
        let Some(resp) = value.get("bustime-response") else {
            return Err(FetchError::Body {
                url,
                source: SchemaError::Unrecognized("bustime"),
            });
        };
        if let Some(message) = resp.pointer("/error/0/msg").and_then(Value::as_str) {
            return Err(FetchError::Upstream {
                url,
                message: message.to_string(),
            });
        }
        Ok(resp
            .get("vehicle")
            .and_then(Value::as_array)
            .map_or(0, Vec::len))
    }
}

async fn with_fallback<T>(
    what: &'static str,
    primary: impl Future<Output = Result<T, FetchError>>,
    fallback: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    match primary.await {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(what, error = %e, "Legacy endpoint failed, falling back to basic endpoint");
            fallback.await.inspect_err(|e| warn!(what, error = %e, "Basic endpoint failed too"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prost::Message;
    use std::sync::Mutex;

    /// Answers requests whose URL contains a registered fragment and
    /// records every URL it saw.
    struct StubClient {
        routes: Vec<(&'static str, u16, Vec<u8>)>,
        seen: Mutex<Vec<String>>,
    }

    impl StubClient {
        fn new() -> Self {
            Self {
                routes: Vec::new(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn route(mut self, fragment: &'static str, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.routes.push((fragment, status, body.into()));
            self
        }
    }

    #[async_trait]
    impl HttpClient for StubClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let url = req.url().to_string();
            self.seen.lock().unwrap().push(url.clone());
            let (status, body) = self
                .routes
                .iter()
                .find(|(fragment, _, _)| url.contains(fragment))
                .map(|(_, status, body)| (*status, body.clone()))
                .unwrap_or((404, Vec::new()));
            let resp = http::Response::builder().status(status).body(body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    /// Shares one stub between the api under test and the assertions.
    struct Shared(std::sync::Arc<StubClient>);

    #[async_trait]
    impl HttpClient for Shared {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.0.execute(req).await
        }
    }

    fn api(stub: StubClient) -> (TtcApi, std::sync::Arc<StubClient>) {
        let stub = std::sync::Arc::new(stub);
        let api = TtcApi::new(Box::new(Shared(stub.clone())), Endpoints::default(), 1);
        (api, stub)
    }

    fn seen(stub: &StubClient, fragment: &str) -> usize {
        stub.seen.lock().unwrap().iter().filter(|u| u.contains(fragment)).count()
    }

    const LEGACY_STOP: &str = r#"{"predictions": [
        {"routeTag": "504", "stopTag": "5292", "direction": {"title": "East", "prediction": [{"minutes": "6"}, {"minutes": "2"}]}},
        {"routeTag": "510", "stopTag": "5292", "dirTitleBecauseNoPredictions": "South - 510 Spadina"}
    ]}"#;

    #[tokio::test]
    async fn test_bus_predictions_prefers_legacy() {
        let (api, stub) = api(StubClient::new()
            .route("stopId=5292", 200, LEGACY_STOP)
            .route("GetNextBuses", 200, r#"[{"nextBusMinutes": "9"}]"#));

        let groups = api.bus_predictions(504, 5292).await.unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].line, "504");
        assert_eq!(groups[0].etas.len(), 2);
        assert_eq!(seen(&stub, "GetNextBuses"), 0);
    }

    #[tokio::test]
    async fn test_stop_lines_predictions_fall_back_per_line() {
        let (api, stub) = api(StubClient::new()
            .route("stopId=5292", 503, "")
            .route("routeId=504&", 200, r#"[{"nextBusMinutes": "4"}]"#)
            .route("routeId=510&", 200, r#"[{"nextBusMinutes": "1"}]"#));

        let groups = api.stop_lines_predictions(5292, &[504, 510]).await.unwrap();

        let lines: Vec<&str> = groups.iter().map(|g| g.line.as_str()).collect();
        assert_eq!(lines, vec!["504", "510"]);
        assert_eq!(seen(&stub, "GetNextBuses"), 2);
    }

    #[tokio::test]
    async fn test_stop_lines_predictions_keep_only_bookmarked_lines() {
        let (api, stub) = api(StubClient::new().route("stopId=5292", 200, LEGACY_STOP));

        let groups = api.stop_lines_predictions(5292, &[510]).await.unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].line, "510");
        assert!(groups[0].etas.is_empty());
        assert_eq!(seen(&stub, "GetNextBuses"), 0);
    }

    #[tokio::test]
    async fn test_bus_predictions_fall_back_on_upstream_error() {
        let (api, stub) = api(StubClient::new()
            .route("stopId=5292", 200, r##"{"Error": {"#text": "Stop id 5292 is not valid", "shouldRetry": "false"}}"##)
            .route("GetNextBuses", 200, r#"[{"nextBusMinutes": "9"}, {"nextBusMinutes": "3"}]"#));

        let groups = api.bus_predictions(504, 5292).await.unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].line, "504");
        assert_eq!(groups[0].stop_tag, "5292");
        assert_eq!(groups[0].etas.len(), 2);
        assert_eq!(seen(&stub, "stopId=5292"), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_fall_back() {
        let (api, stub) = api(StubClient::new()
            .route("stopId=5292", 503, "")
            .route("GetNextBuses", 200, r#"[{"nextBusMinutes": "1"}]"#));

        let groups = api.bus_predictions(504, 5292).await.unwrap();

        assert_eq!(groups[0].etas.len(), 1);
        assert_eq!(seen(&stub, "stopId=5292"), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (api, stub) = api(StubClient::new().route("get-next-train-time", 404, ""));

        let err = api.subway_predictions(1, 13797).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { .. }));
        assert_eq!(seen(&stub, "get-next-train-time"), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_prediction_schema_is_an_error() {
        let (api, _) = api(StubClient::new().route("get-next-train-time", 200, r#"{"status": "ok"}"#));

        let err = api.subway_predictions(1, 13797).await.unwrap_err();

        assert!(matches!(err, FetchError::Body { source: SchemaError::Unrecognized(_), .. }));
    }

    #[tokio::test]
    async fn test_subway_predictions() {
        let (api, _) = api(StubClient::new().route(
            "get-next-train-time/13797",
            200,
            r#"[{"directionText": "Northbound to Finch", "nextTrains": "3, 8, 12"}]"#,
        ));

        let groups = api.subway_predictions(1, 13797).await.unwrap();

        assert_eq!(groups[0].stop_tag, "13797");
        assert_eq!(groups[0].etas.len(), 3);
    }

    #[tokio::test]
    async fn test_route_falls_back_to_basic_detail() {
        let (api, _) = api(StubClient::new()
            .route("command=routeConfig", 200, r##"{"Error": {"#text": "Could not get route /r=1"}}"##)
            .route(
                "routedetail/get?id=1",
                200,
                r#"{"routeBranchesWithStops": [{"routeBranch": {"headsign": "Line 1 towards Finch", "gtfsId": 1}, "routeBranchStops": []}]}"#,
            ));

        match api.route(1).await.unwrap() {
            RouteView::Basic { branches } => assert_eq!(branches[0].headsign, "Line 1 towards Finch"),
            other => panic!("expected basic route, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_route_list_includes_subway_and_falls_back() {
        let (api, _) = api(StubClient::new()
            .route("command=routeList", 500, "")
            .route("listroutes", 200, r#"[{"shortName": "005", "longName": "5-Avenue Rd"}]"#));

        let routes = api.route_list().await.unwrap();

        assert_eq!(routes[0].line, "1");
        let last = routes.last().unwrap();
        assert_eq!((last.line.as_str(), last.title.as_str()), ("5", "Avenue Rd"));
    }

    #[tokio::test]
    async fn test_gtfs_alerts_decoded() {
        let feed = FeedMessage {
            header: crate::gtfs_rt::FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                ..Default::default()
            },
            entity: vec![],
        };
        let (api, _) = api(StubClient::new().route("alerts/all", 200, feed.encode_to_vec()));

        assert_eq!(api.gtfs_alerts().await.unwrap(), feed);
    }

    #[tokio::test]
    async fn test_api_key_is_appended_as_query_parameter() {
        let stub = std::sync::Arc::new(StubClient::new().route("get-next-train-time", 200, "[]"));
        let client = UrlParam {
            inner: Shared(stub.clone()),
            param_name: "key".to_string(),
            key: "secret".to_string(),
        };
        let api = TtcApi::new(Box::new(client), Endpoints::default(), 0);

        api.subway_predictions(1, 13797).await.unwrap();

        assert_eq!(seen(&stub, "key=secret"), 1);
    }

    #[tokio::test]
    async fn test_subway_closures_for_date() {
        let (api, stub) = api(StubClient::new()
            .route("subway-closures/2025-03-01.json", 200, r#"[{"line": 1, "start": "St Clair", "end": "Union"}]"#)
            .route("subway-closures/lastupdated", 200, "2025-02-28T09:00:00Z\n"));
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let closures = api.subway_closures(date).await.unwrap();
        assert_eq!(closures.len(), 1);
        assert_eq!(closures[0].headline(), "Line 1: St Clair to Union");

        let stamp = api.subway_closures_last_updated().await.unwrap();
        assert_eq!(stamp, "2025-02-28T09:00:00Z");
        assert_eq!(seen(&stub, "subway-closures"), 2);
    }

    #[tokio::test]
    async fn test_social_alerts() {
        let (api, _stub) = api(StubClient::new().route(
            "getAuthorFeed",
            200,
            r#"{"feed": [{"post": {"uri": "at://ttc/1", "record": {"text": "Line 2: Delays"}}}]}"#,
        ));

        let alerts = api.social_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].text, "Line 2: Delays");
    }

    #[tokio::test]
    async fn test_bustime_vehicle_count() {
        let (bustime, _stub) = api(StubClient::new().route(
            "rt=95",
            200,
            r#"{"bustime-response": {"vehicle": [{"vid": "8401"}, {"vid": "8402"}]}}"#,
        ));
        assert_eq!(bustime.bustime_vehicle_count(95).await.unwrap(), 2);

        let (bustime, _stub) = api(StubClient::new().route(
            "rt=95",
            200,
            r#"{"bustime-response": {"error": [{"msg": "Invalid API access key supplied"}]}}"#,
        ));
        let err = bustime.bustime_vehicle_count(95).await.unwrap_err();
        assert!(matches!(err, FetchError::Upstream { ref message, .. } if message == "Invalid API access key supplied"));
    }
}

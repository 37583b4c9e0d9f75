//! The "basic" `ttcapi` REST feed used as a fallback for the legacy API.

use serde::Deserialize;

use super::Scalar;

/// One upcoming bus from `routedetail/GetNextBuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBusBasic {
    pub next_bus_minutes: Scalar,
    pub direction_text: Option<String>,
    pub vehicle_id: Option<Scalar>,
}

/// A line from `routedetail/listroutes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicLine {
    pub short_name: Scalar,
    #[serde(default)]
    pub long_name: String,
}

/// The body of `routedetail/get?id=`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetail {
    #[serde(default)]
    pub route_branches_with_stops: Vec<RouteBranchWithStops>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteBranchWithStops {
    pub route_branch: RouteBranch,
    #[serde(default)]
    pub route_branch_stops: Vec<BasicStop>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteBranch {
    pub headsign: Option<String>,
    pub gtfs_id: Option<Scalar>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStop {
    pub id: Option<Scalar>,
    pub code: Option<Scalar>,
    #[serde(default)]
    pub name: String,
}

//! Route lists from the legacy and basic feeds, and basic route details.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::feeds::basic::{BasicLine, RouteDetail};
use crate::feeds::legacy::RouteListResponse;

static ROUTE_NUMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+-").expect("static regex"));

/// Subway lines, which neither route list includes.
pub const SUBWAY_LINES: &[(u32, &str)] = &[
    (1, "Line 1 Yonge-University"),
    (2, "Line 2 Bloor-Danforth"),
    (4, "Line 4 Sheppard"),
];

/// Line numbers up to 6 are rapid transit and served by the subway feed.
pub fn is_subway_line(line: u32) -> bool {
    line <= 6
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub line: String,
    pub title: String,
}

/// Drops the first `"<number>-"` from a route title: `"505-Dundas"` becomes
/// `"Dundas"`.
pub fn parse_route_title(input: &str) -> String {
    ROUTE_NUMBER_PREFIX.replace(input, "").into_owned()
}

pub fn subway_summaries() -> Vec<RouteSummary> {
    SUBWAY_LINES
        .iter()
        .map(|(line, name)| RouteSummary {
            line: line.to_string(),
            title: name.to_string(),
        })
        .collect()
}

pub fn summaries_legacy(resp: RouteListResponse) -> Vec<RouteSummary> {
    resp.route
        .into_vec()
        .into_iter()
        .map(|r| RouteSummary {
            line: r.tag.to_string(),
            title: parse_route_title(&r.title),
        })
        .collect()
}

/// The basic list pads short names (`"005"`), so the line is re-rendered
/// from its numeric value when it has one.
pub fn summaries_basic(lines: Vec<BasicLine>) -> Vec<RouteSummary> {
    lines
        .into_iter()
        .map(|l| RouteSummary {
            line: l
                .short_name
                .as_u32()
                .map(|n| n.to_string())
                .unwrap_or_else(|| l.short_name.to_string()),
            title: parse_route_title(&l.long_name),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct BasicStopSummary {
    pub id: String,
    pub code: String,
    pub name: String,
}

/// One branch of a route from the basic route detail feed.
#[derive(Debug, Clone, Serialize)]
pub struct BranchStops {
    pub headsign: String,
    pub gtfs_id: String,
    pub stops: Vec<BasicStopSummary>,
}

/// Branches with a headsign, in upstream order.
pub fn branches_basic(detail: RouteDetail) -> Vec<BranchStops> {
    detail
        .route_branches_with_stops
        .into_iter()
        .filter_map(|b| {
            let headsign = b.route_branch.headsign.filter(|h| !h.trim().is_empty())?;
            Some(BranchStops {
                headsign,
                gtfs_id: b
                    .route_branch
                    .gtfs_id
                    .map(|g| g.to_string())
                    .unwrap_or_default(),
                stops: b
                    .route_branch_stops
                    .into_iter()
                    .map(|s| BasicStopSummary {
                        id: s.id.map(|v| v.to_string()).unwrap_or_default(),
                        code: s.code.map(|v| v.to_string()).unwrap_or_default(),
                        name: s.name,
                    })
                    .collect(),
            })
        })
        .collect()
}

use serde::Serialize;

use crate::feeds::legacy::VehicleLocationResponse;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleLocation {
    pub id: String,
    pub route: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Degrees clockwise from north.
    pub heading: Option<f64>,
    pub secs_since_report: Option<i64>,
}

/// Reads a legacy `vehicleLocation` body. `None` when the vehicle is unknown
/// or reported without coordinates.
pub fn parse_vehicle_location(resp: VehicleLocationResponse) -> Option<VehicleLocation> {
    let vehicle = resp.vehicle?;
    Some(VehicleLocation {
        id: vehicle.id.to_string(),
        route: vehicle.route_tag.map(|r| r.to_string()),
        lat: vehicle.lat?.as_f64()?,
        lon: vehicle.lon?.as_f64()?,
        heading: vehicle.heading.and_then(|h| h.as_f64()).filter(|h| *h >= 0.0),
        secs_since_report: vehicle.secs_since_report.and_then(|s| s.as_i64()),
    })
}

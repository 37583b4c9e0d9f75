//! The legacy `publicJSONFeed` API: predictions, route configuration,
//! route list and vehicle location.

use serde::Deserialize;
use serde_json::Value;

use super::{OneOrMany, Scalar};

/// Extracts the message of a top-level `Error` object, if the body has one.
///
/// The feed reports failures with a 200 status and a body such as
/// `{"Error": {"#text": "Could not get route /r=9999", "shouldRetry": "false"}}`.
pub fn error_message(value: &Value) -> Option<String> {
    let error = value.get("Error")?;
    let message = match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("#text")
            .or_else(|| map.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
        Value::Null | Value::Bool(false) => return None,
        other => other.to_string(),
    };
    Some(message.trim().to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionsResponse {
    #[serde(default)]
    pub predictions: OneOrMany<Predictions>,
}

/// Predictions for one route at one stop.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predictions {
    pub route_tag: Option<Scalar>,
    pub route_title: Option<String>,
    pub stop_tag: Option<Scalar>,
    pub stop_title: Option<String>,
    /// Set instead of `direction` when the route has no upcoming vehicles.
    pub dir_title_because_no_predictions: Option<String>,
    #[serde(default)]
    pub direction: OneOrMany<Direction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Direction {
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub prediction: OneOrMany<Prediction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Absolute arrival time in epoch milliseconds.
    pub epoch_time: Option<Scalar>,
    pub seconds: Option<Scalar>,
    pub minutes: Option<Scalar>,
    pub branch: Option<Scalar>,
    pub vehicle: Option<Scalar>,
    pub dir_tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfigResponse {
    pub route: RouteConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub tag: Option<Scalar>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub stop: OneOrMany<ConfigStop>,
    #[serde(default)]
    pub direction: OneOrMany<ConfigDirection>,
}

/// A stop as listed in a route configuration. Fields stay optional so that
/// one incomplete entry does not reject the whole route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStop {
    pub tag: Scalar,
    pub title: Option<String>,
    pub lat: Option<Scalar>,
    pub lon: Option<Scalar>,
    pub stop_id: Option<Scalar>,
}

/// One branch of a route travelling in a named direction.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDirection {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub name: String,
    pub branch: Option<Scalar>,
    #[serde(default)]
    pub stop: OneOrMany<StopRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopRef {
    pub tag: Scalar,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteListResponse {
    #[serde(default)]
    pub route: OneOrMany<RouteListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteListEntry {
    pub tag: Scalar,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleLocationResponse {
    pub vehicle: Option<Vehicle>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Scalar,
    pub route_tag: Option<Scalar>,
    pub lat: Option<Scalar>,
    pub lon: Option<Scalar>,
    pub heading: Option<Scalar>,
    pub secs_since_report: Option<Scalar>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_variants() {
        let text = json!({"Error": {"#text": "\n Could not get route /r=9999 \n", "shouldRetry": "false"}});
        let content = json!({"Error": {"content": "Agency parameter \"a=xyz\" is not valid."}});
        let plain = json!({"Error": "boom"});
        let clean = json!({"predictions": []});

        assert_eq!(error_message(&text).unwrap(), "Could not get route /r=9999");
        assert!(error_message(&content).unwrap().starts_with("Agency parameter"));
        assert_eq!(error_message(&plain).unwrap(), "boom");
        assert!(error_message(&clean).is_none());
    }

    #[test]
    fn test_single_direction_object_is_accepted() {
        let value = json!({
            "predictions": {
                "routeTag": "504",
                "stopTag": "5292",
                "direction": {
                    "title": "East - 504a King towards Distillery",
                    "prediction": {"epochTime": "1700000242000", "minutes": "4", "vehicle": "4589", "branch": "504A"}
                }
            }
        });

        let resp: PredictionsResponse = serde_json::from_value(value).unwrap();
        let predictions = resp.predictions.into_vec();
        assert_eq!(predictions.len(), 1);

        let direction = &predictions[0].direction.as_slice()[0];
        assert_eq!(direction.prediction.as_slice()[0].vehicle, Some(Scalar::Text("4589".into())));
    }

    #[test]
    fn test_route_config_with_single_stop() {
        let value = json!({
            "route": {
                "tag": "5",
                "title": "5-Avenue Rd",
                "stop": {"tag": "1001", "title": "Avenue Rd At Bloor St", "lat": "43.66", "lon": "-79.39"},
                "direction": {"tag": "5_0_5", "title": "North", "name": "North", "branch": "5", "stop": {"tag": "1001"}}
            }
        });

        let resp: RouteConfigResponse = serde_json::from_value(value).unwrap();
        assert_eq!(resp.route.stop.as_slice().len(), 1);
        assert_eq!(resp.route.direction.as_slice()[0].stop.as_slice()[0].tag.as_u32(), Some(1001));
    }
}

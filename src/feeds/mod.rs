//! Typed models of the upstream payloads and detection of which prediction
//! schema a payload uses.
//!
//! The legacy feed is XML converted to JSON, so any repeated element may
//! arrive as a single object and any number may arrive as a string.
//! [`OneOrMany`] and [`Scalar`] absorb both.

pub mod basic;
pub mod bluesky;
pub mod closures;
pub mod legacy;
pub mod subway;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::gtfs_rt::FeedMessage;

/// A JSON value that upstream may send either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Float(v) if v.is_finite() => Some(*v as i64),
            Scalar::Float(_) => None,
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Numeric id form; rejects negatives, fractions and non-numeric text.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Scalar::Int(v) => u32::try_from(*v).ok(),
            Scalar::Float(_) => None,
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// An element that is an array when repeated and a bare object otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => std::slice::from_ref(item),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// One prediction payload, tagged by the upstream schema it came from.
#[derive(Debug, Clone)]
pub enum RawPredictionFeed {
    /// Legacy `predictions.direction[].prediction[]`, one group per route.
    Legacy(Vec<legacy::Predictions>),
    /// Basic REST fallback: a flat array of `{nextBusMinutes}`.
    Basic(Vec<basic::NextBusBasic>),
    /// Subway next-train feed: `[{nextTrains: "2, 5, 9"}]`.
    Subway(Vec<subway::SubwayStop>),
    /// Decoded GTFS-realtime trip updates.
    GtfsRealtime(FeedMessage),
}

impl RawPredictionFeed {
    /// Identifies the schema of a JSON prediction payload and parses it.
    ///
    /// An empty array is read as a basic feed with no arrivals.
    pub fn detect(value: Value) -> Result<Self, SchemaError> {
        match &value {
            Value::Object(map) if map.contains_key("predictions") => {
                let resp: legacy::PredictionsResponse = serde_json::from_value(value)?;
                Ok(RawPredictionFeed::Legacy(resp.predictions.into_vec()))
            }
            Value::Array(items) if items.iter().all(|i| i.get("nextBusMinutes").is_some()) => {
                Ok(RawPredictionFeed::Basic(serde_json::from_value(value)?))
            }
            Value::Array(items) if items.iter().all(|i| i.get("nextTrains").is_some()) => {
                Ok(RawPredictionFeed::Subway(serde_json::from_value(value)?))
            }
            _ => Err(SchemaError::Unrecognized("prediction")),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        Self::detect(serde_json::from_slice(bytes)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawPredictionFeed::Legacy(_) => "legacy",
            RawPredictionFeed::Basic(_) => "basic",
            RawPredictionFeed::Subway(_) => "subway",
            RawPredictionFeed::GtfsRealtime(_) => "gtfs-realtime",
        }
    }
}

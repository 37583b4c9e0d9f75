//! Error types shared by the fetch, feed and bookmark layers.

use thiserror::Error;

/// A request to an upstream API that did not yield a usable body.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid request url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{url} reported an error: {message}")]
    Upstream { url: String, message: String },
    #[error("{url} returned an unexpected body: {source}")]
    Body {
        url: String,
        source: SchemaError,
    },
}

impl FetchError {
    /// Errors worth retrying once: the server may answer differently next time.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// A payload that did not match any schema we know how to read.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a valid GTFS-realtime feed: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("unrecognized {0} payload")]
    Unrecognized(&'static str),
}

#[derive(Error, Debug)]
pub enum BookmarkError {
    #[error("failed to write bookmarks to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize bookmarks: {0}")]
    Serialize(#[from] serde_json::Error),
}

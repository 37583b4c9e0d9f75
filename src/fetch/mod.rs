mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::FetchError;

/// GETs `url` and returns the body of a successful response.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Bytes, FetchError> {
    let parsed = url.parse::<reqwest::Url>().map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let transport = |source| FetchError::Transport {
        url: url.to_string(),
        source,
    };
    let resp = client.execute(req).await.map_err(transport)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = resp.bytes().await.map_err(transport)?;
    debug!(url, bytes = body.len(), "Fetched");
    Ok(body)
}

/// [`fetch_bytes`] with up to `retries` further attempts on transient errors.
pub async fn fetch_with_retry<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    retries: u32,
) -> Result<Bytes, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_bytes(client, url).await {
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                warn!(url, attempt, error = %e, "Retrying request");
            }
            result => return result,
        }
    }
}

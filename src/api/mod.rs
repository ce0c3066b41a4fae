//! Read-only clients for the public JSON APIs the plugins query.

pub mod nager;
pub mod nba;
pub mod nekos;
pub mod pokeapi;
pub mod tmdb;
pub mod usgs;

use crate::{log_error, log_internal};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Errors that can occur while querying an API
#[derive(Debug)]
pub enum ApiError {
    /// The resource does not exist (404 or an empty answer)
    NotFound,
    /// The service answered with some other non-success status
    Unavailable(StatusCode),
    /// Network or HTTP-level error from reqwest, including timeouts
    Network(reqwest::Error),
    /// The body was not the JSON we expected
    Decode(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound => write!(f, "nothing found"),
            ApiError::Unavailable(status) => write!(f, "service unavailable ({})", status),
            ApiError::Network(e) if e.is_timeout() => write!(f, "the request timed out"),
            ApiError::Network(_) => write!(f, "could not reach the service"),
            ApiError::Decode(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Worth trying again later
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Unavailable(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::NotFound | ApiError::Decode(_) => false,
        }
    }
}

/// GET `url` with `query` and decode the JSON body.
///
/// The query is kept out of the log line since it may carry credentials.
pub async fn get_json<T: DeserializeOwned>(
    web: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, ApiError> {
    log_internal!("GET {}", url);
    let response = web
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(ApiError::Network)?;

    match response.status() {
        StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Err(ApiError::NotFound),
        status if !status.is_success() => return Err(ApiError::Unavailable(status)),
        _ => {}
    }

    let body = response.bytes().await.map_err(ApiError::Network)?;
    decode(&body)
}

/// Like [`get_json`], retrying transient failures with exponential backoff starting at
/// `base_delay`.
pub async fn get_json_with_backoff<T: DeserializeOwned>(
    web: &reqwest::Client,
    url: &str,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, ApiError> {
    let mut attempt = 0;
    loop {
        match get_json(web, url, &[]).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                let delay = backoff_delay(base_delay, attempt);
                log_error!(
                    "GET {} failed ({}), retrying in {}ms",
                    url,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// `base * 2^attempt`, capped at a minute
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(Duration::from_secs(60))
}

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 30), Duration::from_secs(60));
    }

    #[test]
    fn only_server_side_failures_are_transient() {
        assert!(ApiError::Unavailable(StatusCode::BAD_GATEWAY).is_transient());
        assert!(ApiError::Unavailable(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!ApiError::Unavailable(StatusCode::UNAUTHORIZED).is_transient());
        assert!(!ApiError::NotFound.is_transient());
        assert!(!ApiError::Decode("x".into()).is_transient());
    }

    #[test]
    fn decode_errors_are_reported() {
        let result: Result<Vec<u32>, _> = decode(b"{not json");
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }
}

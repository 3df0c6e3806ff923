//! Minimal InfluxDB v2 HTTP client used to verify connection settings.

use std::error::Error as _;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::panels::DatabaseConfig;

/// Reasons a connection check can fail. The messages are shown to the user as is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Url does not exist '{0}'")]
    UnknownHost(String),

    #[error("Connection to '{0}' failed.")]
    PingFailed(String),

    #[error(
        "The specified token doesn't have sufficient credentials to read from '{0}' bucket or specified bucket doesn't exists."
    )]
    InsufficientCredentials(String),

    #[error("The specified token is invalid.")]
    InvalidToken,

    #[error("Query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    #[error("{0}")]
    Transport(String),
}

/// InfluxDB client bound to one set of connection settings.
pub struct InfluxClient {
    http: Client,
    url: String,
    token: String,
    org: String,
    debug: bool,
}

impl InfluxClient {
    pub fn new(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        let mut builder = Client::builder()
            .gzip(true)
            .danger_accept_invalid_certs(!config.force_ssl);
        if let Some(timeout) = config.timeout_duration() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ConnectionError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            org: config.org.clone(),
            debug: config.debug,
        })
    }

    /// `GET /ping`. Returns the response status.
    pub async fn ping(&self) -> Result<StatusCode, ConnectionError> {
        let url = format!("{base}/ping", base = self.url);
        if self.debug {
            tracing::info!("GET {}", url);
        }

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&self.url, e))?;

        if self.debug {
            tracing::info!("GET {} -> {}", url, response.status());
        }
        Ok(response.status())
    }

    /// Run a Flux query and return the raw CSV body.
    pub async fn query(&self, flux: &str, bucket: &str) -> Result<String, ConnectionError> {
        let url = format!("{base}/api/v2/query", base = self.url);
        if self.debug {
            tracing::info!("POST {} org={} query={}", url, self.org, flux);
        }

        let response = self
            .http
            .post(&url)
            .query(&[("org", self.org.as_str())])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "application/vnd.flux")
            .header("Accept", "application/csv")
            .body(flux.to_string())
            .send()
            .await
            .map_err(|e| transport_error(&self.url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        if self.debug {
            tracing::info!("POST {} -> {}", url, status);
        }

        query_result(bucket, status, &body)?;
        Ok(body)
    }
}

/// Flux query reading at most one point from the last minute of `bucket`.
pub fn probe_query(bucket: &str) -> String {
    format!("from(bucket:\"{bucket}\") |> range(start: -1m) |> limit(n:1)")
}

/// Map a ping status to the check outcome. InfluxDB answers 204 when up.
pub fn ping_result(url: &str, status: StatusCode) -> Result<(), ConnectionError> {
    if status == StatusCode::NO_CONTENT {
        Ok(())
    } else {
        Err(ConnectionError::PingFailed(url.to_string()))
    }
}

/// Map a query response to the check outcome.
pub fn query_result(bucket: &str, status: StatusCode, body: &str) -> Result<(), ConnectionError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(ConnectionError::InsufficientCredentials(bucket.to_string())),
        StatusCode::UNAUTHORIZED => Err(ConnectionError::InvalidToken),
        s => Err(ConnectionError::Query {
            status: s.as_u16(),
            message: error_message(body),
        }),
    }
}

/// Ping the server, then check the token can read from the bucket.
pub async fn check_connection(config: &DatabaseConfig) -> Result<(), ConnectionError> {
    let client = InfluxClient::new(config)?;

    let status = client.ping().await?;
    ping_result(&config.url, status)?;

    client.query(&probe_query(&config.bucket), &config.bucket).await?;
    Ok(())
}

/// Pull the `message` out of an InfluxDB error body, or fall back to the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn transport_error(url: &str, error: reqwest::Error) -> ConnectionError {
    if is_name_resolution(&error) {
        ConnectionError::UnknownHost(url.to_string())
    } else {
        ConnectionError::Transport(error.to_string())
    }
}

fn is_name_resolution(error: &reqwest::Error) -> bool {
    if !error.is_connect() {
        return false;
    }
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}

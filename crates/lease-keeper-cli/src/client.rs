//! HTTP client for the broker endpoints.

use crate::CliError;
use lease_keeper_core::QueueStats;
use reqwest::{header::AUTHORIZATION, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

// Long enough to outlast the server's claim window.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// `/create_key` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedKey {
    pub tenant: String,
    pub api_key: String,
}

/// `/publish` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Published {
    pub message_id: String,
}

/// `/claim` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claimed {
    pub message_id: String,
    pub payload: String,
}

/// `/ack` and `/revoke_key` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub status: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin client over the broker's HTTP API
#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BrokerClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, CliError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn create_key(&self, tenant: &str) -> Result<CreatedKey, CliError> {
        let request = self
            .request(Method::POST, "/create_key")
            .query(&[("tenant", tenant)]);
        parse(request.send().await?).await
    }

    pub async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<Published, CliError> {
        let request = self
            .authed(Method::POST, "/publish")?
            .query(&[("queue", queue)])
            .body(payload);
        parse(request.send().await?).await
    }

    pub async fn claim(&self, queue: &str) -> Result<Claimed, CliError> {
        let request = self
            .authed(Method::POST, "/claim")?
            .query(&[("queue", queue)]);
        parse(request.send().await?).await
    }

    pub async fn ack(&self, queue: &str, message_id: &str) -> Result<Status, CliError> {
        let request = self
            .authed(Method::POST, "/ack")?
            .query(&[("queue", queue), ("message_id", message_id)]);
        parse(request.send().await?).await
    }

    pub async fn stats(&self, queue: &str) -> Result<QueueStats, CliError> {
        let request = self
            .authed(Method::GET, "/stats")?
            .query(&[("queue", queue)]);
        parse(request.send().await?).await
    }

    pub async fn revoke_key(&self, key_id: &str) -> Result<Status, CliError> {
        let request = self
            .authed(Method::POST, "/revoke_key")?
            .query(&[("key_id", key_id)]);
        parse(request.send().await?).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Sending request");
        self.http.request(method, url)
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, CliError> {
        let api_key = self.api_key.as_deref().ok_or(CliError::MissingApiKey)?;
        Ok(self
            .request(method, path)
            .header(AUTHORIZATION, format!("ApiKey {}", api_key)))
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, CliError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };

    Err(CliError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

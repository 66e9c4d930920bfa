//! Timeout-bounded HTTP GET used by vendor plugins

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::USER_AGENT;
use crate::version::error::VendorError;

/// Status, headers and body of a completed GET
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// Shared HTTP client with a caller-configured timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Sends a GET with `headers` and reads the whole body.
    ///
    /// Non-2xx statuses are returned, not turned into errors; callers that
    /// revalidate need to see `304 Not Modified`. Exceeding the timeout
    /// drops the in-flight request.
    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<FetchResponse, FetchError> {
        let request = async {
            let response = self.client.get(url).headers(headers).send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            debug!("GET {} returned status {}", url, status);

            let body = response.bytes().await?.to_vec();
            Ok::<_, FetchError>(FetchResponse {
                status,
                headers,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Err(FetchError::Network(e))) if e.is_timeout() => Err(self.timed_out(url)),
            Ok(result) => result,
            Err(_) => Err(self.timed_out(url)),
        }
    }

    fn timed_out(&self, url: &str) -> FetchError {
        warn!("GET {} timed out after {:?}", url, self.timeout);
        FetchError::Timeout {
            url: url.to_string(),
            timeout: self.timeout,
        }
    }

    /// Fetch an HTML page, treating any non-2xx status as an error
    pub async fn get_document(&self, url: &str) -> Result<String, VendorError> {
        let response = self.get(url, HeaderMap::new()).await?;

        if !response.status.is_success() {
            return Err(VendorError::Status {
                status: response.status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }
}

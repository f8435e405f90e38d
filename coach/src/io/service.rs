//! Client for the remote feedback improvement service.
//!
//! The [`ImproveService`] trait decouples the controller from HTTP. Tests use
//! scripted services that return predetermined outcomes without a server.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::error::TransportError;
use crate::core::wire::{ImproveBody, ServiceReply};
use crate::io::config::ServiceConfig;

/// Bytes of a non-2xx response body kept for the log.
const MAX_ERROR_BODY_BYTES: usize = 2 * 1024;

/// Abstraction over the improvement endpoint.
pub trait ImproveService: Send + Sync {
    /// Send one improvement request. Never retried.
    fn improve(
        &self,
        body: &ImproveBody,
    ) -> impl Future<Output = Result<ServiceReply, TransportError>> + Send;
}

/// [`ImproveService`] over HTTP (`POST` with a JSON body).
#[derive(Debug, Clone)]
pub struct HttpImproveService {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpImproveService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint_url(),
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ImproveService for HttpImproveService {
    #[instrument(
        skip_all,
        fields(endpoint = %self.endpoint, custom = body.custom_prompt.is_some())
    )]
    async fn improve(&self, body: &ImproveBody) -> Result<ServiceReply, TransportError> {
        debug!("sending improvement request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|err| self.classify(&err))?;

        let status = response.status();
        if !status.is_success() {
            let detail = read_capped_error_body(response).await;
            warn!(status = status.as_u16(), body = %detail, "improvement service error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|err| self.classify(&err))?;
        let reply: ServiceReply = serde_json::from_str(&text).map_err(|err| {
            warn!(error = %err, "improvement service returned malformed body");
            TransportError::Parse(err.to_string())
        })?;
        debug!(success = reply.success, "improvement service replied");
        Ok(reply)
    }
}

impl HttpImproveService {
    fn classify(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            warn!(
                timeout_secs = self.timeout.as_secs(),
                "improvement request timed out"
            );
            TransportError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            warn!(error = %err, "improvement request failed");
            TransportError::Network(err.to_string())
        }
    }
}

async fn read_capped_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

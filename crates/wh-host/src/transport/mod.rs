//! RPC transport
//!
//! One invocation is one HTTP POST to the worker's endpoint. The response
//! status decides the outcome:
//!
//! - `200 OK`: the body is decoded as the requested [`InvocationOutput`]
//! - `404 Not Found`: the cached module does not exist (`Ok(None)`)
//! - `500 Internal Server Error`: the body is an [`InvocationErrorPayload`]
//! - anything else is an unexpected response

mod content;
mod output;

pub use content::{ContentBuilder, InvocationContent};
pub use output::{InvocationOutput, Json, ResponseStream};

use std::sync::Arc;

use reqwest::StatusCode;

use wh_core::{HostError, Result};
use wh_protocol::{Endpoint, InvocationErrorPayload, InvocationRequest};

/// Posts invocation requests to a ready worker
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    content: Arc<dyn ContentBuilder>,
}

impl HttpTransport {
    /// Create a transport with a direct client and [`InvocationContent`] bodies
    ///
    /// The worker always listens locally, so proxy settings from the
    /// environment are ignored.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self::with_client(client)
    }

    /// Create a transport around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            content: Arc::new(InvocationContent),
        }
    }

    /// Replace the request body builder
    pub fn with_content_builder(mut self, content: Arc<dyn ContentBuilder>) -> Self {
        self.content = content;
        self
    }

    /// Send one invocation to `endpoint`
    ///
    /// Returns `Ok(None)` when the worker reports the module as not found.
    pub async fn try_invoke<T: InvocationOutput>(
        &self,
        request: InvocationRequest,
        endpoint: &Endpoint,
    ) -> Result<Option<T::Output>> {
        let body = self.content.build(request)?;
        let response = self.client.post(endpoint.url()).body(body).send().await?;

        match response.status() {
            StatusCode::OK => T::decode(response).await.map(Some),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::INTERNAL_SERVER_ERROR => {
                let body = response.bytes().await?;
                let payload: InvocationErrorPayload = serde_json::from_slice(&body)
                    .map_err(|e| HostError::Decode(format!("invalid error payload: {}", e)))?;
                Err(HostError::invocation(payload.error_message, payload.error_stack))
            }
            status => {
                tracing::warn!(%endpoint, %status, "Unexpected response from worker");
                Err(HostError::UnexpectedStatus(status.as_u16()))
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

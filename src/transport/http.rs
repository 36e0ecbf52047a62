//! HTTP batch transport
//!
//! POSTs the payload array as a JSON body and decodes the reply array.
//! Connection errors, non-2xx statuses and bodies that are not JSON count as
//! transport failures. A JSON body that is not an array comes back as zero
//! replies, and a record that does not decode as a failed reply.

use super::{BatchTransport, CallReply, TransportError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;

/// Content type sent with every batch unless configured otherwise
pub const DEFAULT_CONTENT_TYPE: &str = "text/json";

/// HTTP transport options
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Content type header for the request body
    pub content_type: String,

    /// Whole-request timeout; `None` waits as long as the connection does
    pub request_timeout: Option<Duration>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            request_timeout: None,
        }
    }
}

/// reqwest-backed [`BatchTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    content_type: String,
}

impl HttpTransport {
    /// Create a transport with default options
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&HttpTransportConfig::default())
    }

    /// Create a transport from explicit options
    pub fn with_config(config: &HttpTransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            content_type: config.content_type.clone(),
        })
    }

    /// Wrap an existing client (shares its connection pool)
    pub fn from_client(client: reqwest::Client, content_type: impl Into<String>) -> Self {
        Self {
            client,
            content_type: content_type.into(),
        }
    }

    /// Content type sent with each batch
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn send_batch(
        &self,
        address: &str,
        payloads: &[Value],
    ) -> Result<Vec<CallReply>, TransportError> {
        let request = serde_json::to_vec(payloads)?;

        let response = self
            .client
            .post(address)
            .header(CONTENT_TYPE, self.content_type.as_str())
            .header(ACCEPT, "application/json")
            .body(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        let replies: Vec<CallReply> = match body {
            Value::Array(records) => records.into_iter().map(CallReply::from_value).collect(),
            other => {
                // The server answered, so this is a reply-count mismatch and
                // not a dead connection.
                tracing::warn!(
                    endpoint = address,
                    body = %other,
                    "Reply body is not an array"
                );
                Vec::new()
            }
        };

        tracing::trace!(
            endpoint = address,
            sent = payloads.len(),
            received = replies.len(),
            "Batch round-trip complete"
        );

        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_content_type() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.content_type(), "text/json");
    }

    #[test]
    fn test_custom_config() {
        let config = HttpTransportConfig {
            content_type: "application/json".to_string(),
            request_timeout: Some(Duration::from_secs(5)),
        };
        let transport = HttpTransport::with_config(&config).unwrap();
        assert_eq!(transport.content_type(), "application/json");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        let transport = HttpTransport::with_config(&HttpTransportConfig {
            request_timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        })
        .unwrap();

        // Port 9 (discard) on loopback is closed in test environments
        let result = transport
            .send_batch("http://127.0.0.1:9/queue", &[Value::Null])
            .await;

        assert!(matches!(result, Err(TransportError::Http(_))));
    }
}

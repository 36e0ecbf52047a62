//! Batch transport abstraction
//!
//! A batch is one round-trip: an ordered array of opaque payloads goes out,
//! an ordered array of [`CallReply`] records comes back. The endpoint matches
//! replies to callers by position, so a transport must never reorder.

mod http;

pub use http::{HttpTransport, HttpTransportConfig, DEFAULT_CONTENT_TYPE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Transport errors
///
/// Any of these means no usable response arrived, so the whole batch fails.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Outcome record for one call, positionally matched to the request array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallReply {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub result: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallReply {
    /// A successful reply carrying `result`
    pub fn ok(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: result.into(),
            error: None,
        }
    }

    /// Decode one reply record. Anything that is not a well-formed record
    /// counts as a failed call with no error message.
    pub fn from_value(record: Value) -> Self {
        serde_json::from_value(record).unwrap_or(Self {
            success: false,
            result: Value::Null,
            error: None,
        })
    }

    /// A failed reply carrying the server's error message
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Trait for batch transports
///
/// Implementations perform exactly one network round-trip per call and
/// return the decoded reply array unchanged. Length validation is the
/// endpoint's job.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Send `payloads` to `address` as one batch
    async fn send_batch(
        &self,
        address: &str,
        payloads: &[Value],
    ) -> Result<Vec<CallReply>, TransportError>;
}

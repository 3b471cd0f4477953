//! The response envelope returned to callers.

use crate::decode::Payload;
use crate::{Error, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A successful response: status, headers, and the decoded, schema-mapped
/// body, plus timing and attempt metadata for observability.
///
/// # Examples
///
/// ```no_run
/// use parlance::{CallContext, Client};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Pet {
///     name: String,
/// }
///
/// # async fn example(client: Client) -> Result<(), parlance::Error> {
/// let envelope = client
///     .invoke("getPet", CallContext::new().param("petId", 42))
///     .await?;
///
/// println!("Status: {}", envelope.status);
/// println!("Took {:?} over {} attempt(s)", envelope.latency, envelope.attempts);
///
/// let pet: Pet = envelope.json()?;
/// println!("Fetched {}", pet.name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The decoded body after schema mapping and any configured transforms.
    pub body: Payload,

    /// Total latency of the call, all attempts included.
    pub latency: Duration,

    /// Number of attempts made; `1` means no retries were needed.
    pub attempts: usize,
}

impl ResponseEnvelope {
    /// Deserializes the body into a typed value.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the body is not JSON-shaped or does not
    /// fit `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let decode_err = |e: serde_json::Error| Error::Decode {
            message: e.to_string(),
            status: Some(self.status),
        };
        match &self.body {
            Payload::Json(value) => serde_json::from_value(value.clone()).map_err(decode_err),
            Payload::Text(text) => serde_json::from_str(text).map_err(decode_err),
            Payload::Binary(bytes) => serde_json::from_slice(bytes).map_err(decode_err),
        }
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}

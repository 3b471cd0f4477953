//! Response body decoding and the payload model.
//!
//! [`decode_body`] is a pure function of (raw bytes, response headers): it
//! sniffs the declared content type and produces a [`Payload`]. A JSON match
//! takes precedence over a generic text match; anything else passes the raw
//! bytes through untouched. JSON parsing goes through `serde_json` with
//! arbitrary precision enabled, so integer literals beyond the f64-safe
//! range survive decode/re-encode with their exact digits.
//!
//! The built-in decoder is the first stage of a transform chain: any
//! [`BodyTransform`]s configured on the client run after it, in order, each
//! receiving the previous stage's output.

use crate::{Error, HookError, Result};
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde_json::Value;

/// A request or response body.
///
/// Outgoing, this is what the caller attaches to a call; incoming, it is
/// what the decoder produced from the raw response bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A structured JSON value.
    Json(Value),
    /// Plain text.
    Text(String),
    /// Raw bytes, passed through undecoded.
    Binary(Vec<u8>),
}

impl Payload {
    /// Serializes the payload into request body bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Json(value) => {
                serde_json::to_vec(value).map_err(|e| Error::Serialize(e.to_string()))
            }
            Payload::Text(text) => Ok(text.clone().into_bytes()),
            Payload::Binary(bytes) => Ok(bytes.clone()),
        }
    }

    /// Returns the JSON value if this payload is structured.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

/// A caller-supplied decode stage, run after the built-in decoder.
///
/// Each transform receives the previous stage's output and returns either a
/// further-transformed payload or the input unchanged.
pub trait BodyTransform: Send + Sync {
    /// Transforms the decoded payload.
    fn transform(&self, payload: Payload) -> std::result::Result<Payload, HookError>;
}

/// Decodes raw response bytes according to the response's declared content
/// type.
pub fn decode_body(bytes: &[u8], headers: &HeaderMap) -> Result<Payload> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let (mime, charset) = split_content_type(&content_type);

    if is_json_mime(mime) {
        let text = decode_text(bytes, charset);
        let value: Value = serde_json::from_str(&text).map_err(|e| Error::Decode {
            message: format!("invalid JSON body: {e}"),
            status: None,
        })?;
        Ok(Payload::Json(value))
    } else if mime.starts_with("text/") {
        Ok(Payload::Text(decode_text(bytes, charset)))
    } else {
        Ok(Payload::Binary(bytes.to_vec()))
    }
}

/// Runs the configured transform chain over a decoded payload.
pub(crate) fn run_transforms(
    transforms: &[Box<dyn BodyTransform>],
    payload: Payload,
    status: http::StatusCode,
) -> Result<Payload> {
    transforms.iter().try_fold(payload, |payload, transform| {
        transform.transform(payload).map_err(|e| Error::Decode {
            message: format!("body transform failed: {e}"),
            status: Some(status),
        })
    })
}

fn split_content_type(header: &str) -> (&str, Option<&str>) {
    let mut parts = header.split(';');
    let mime = parts.next().unwrap_or("").trim();
    let charset = parts.filter_map(|p| p.trim().strip_prefix("charset=")).next();
    (mime, charset.map(|c| c.trim_matches('"')))
}

fn is_json_mime(mime: &str) -> bool {
    match mime.split_once('/') {
        Some((_, subtype)) => subtype == "json" || subtype.ends_with("+json"),
        None => false,
    }
}

/// Only ISO-8859-1 qualifies: it is the one single-byte scheme whose bytes
/// coincide with Unicode code points. The other ISO-8859 parts (Cyrillic,
/// Greek, ...) do not and must not be byte-mapped.
fn is_latin1(charset: &str) -> bool {
    ["iso-8859-1", "iso8859-1", "latin1", "latin-1"]
        .iter()
        .any(|name| charset.eq_ignore_ascii_case(name))
}

/// Decodes text honoring the declared charset: ISO-8859-1 decodes
/// byte-as-code-point, everything else (or no declaration) as UTF-8. No
/// general decoder table is carried, so other declared charsets fall back
/// to UTF-8.
fn decode_text(bytes: &[u8], charset: Option<&str>) -> String {
    match charset {
        Some(cs) if is_latin1(cs) => bytes.iter().map(|&b| b as char).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

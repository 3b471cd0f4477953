//! Credential injection.
//!
//! A [`SecurityContext`] gets to replace the outgoing headers and query set
//! after the binder has produced them and before the explicit per-call
//! headers are merged on top. Precedence, lowest to highest: bound
//! headers/queries, security-context output, explicit per-call headers.

use crate::HookError;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue};

/// Mutates outgoing headers and queries to attach credentials.
///
/// Both capabilities default to identity, so an implementation only
/// overrides the destination it actually writes to.
pub trait SecurityContext: Send + Sync {
    /// Replaces the outgoing header map.
    fn apply_headers(&self, headers: HeaderMap) -> Result<HeaderMap, HookError> {
        Ok(headers)
    }

    /// Replaces the outgoing query pair set. May add, alter, or remove
    /// entries.
    fn apply_query(
        &self,
        query: Vec<(String, String)>,
    ) -> Result<Vec<(String, String)>, HookError> {
        Ok(query)
    }
}

/// Bearer-token security: sets `Authorization: Bearer <token>`.
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    /// Creates a bearer-token context.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl SecurityContext for BearerToken {
    fn apply_headers(&self, mut headers: HeaderMap) -> Result<HeaderMap, HookError> {
        let value = HeaderValue::try_from(format!("Bearer {}", self.token))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

/// Where an [`ApiKey`] credential is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    /// Sent as a request header.
    Header,
    /// Appended as a query pair.
    Query,
}

/// API-key security: attaches a named key to a header or query pair.
pub struct ApiKey {
    name: String,
    value: String,
    location: ApiKeyLocation,
}

impl ApiKey {
    /// Creates an API-key context.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        location: ApiKeyLocation,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            location,
        }
    }
}

impl SecurityContext for ApiKey {
    fn apply_headers(&self, mut headers: HeaderMap) -> Result<HeaderMap, HookError> {
        if self.location == ApiKeyLocation::Header {
            let name = HeaderName::try_from(self.name.as_str())?;
            let value = HeaderValue::try_from(self.value.as_str())?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn apply_query(
        &self,
        mut query: Vec<(String, String)>,
    ) -> Result<Vec<(String, String)>, HookError> {
        if self.location == ApiKeyLocation::Query {
            query.retain(|(k, _)| k != &self.name);
            query.push((self.name.clone(), self.value.clone()));
        }
        Ok(query)
    }
}

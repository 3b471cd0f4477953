//! Outgoing content-type negotiation.
//!
//! Negotiation runs once per attempt. A configured [`ContentTypeResolver`]
//! that yields a non-empty value wins outright; otherwise the payload is
//! classified in a fixed priority order. The order is a contract: only the
//! first matching rule applies.

use crate::context::RewriteContext;
use crate::decode::Payload;
use crate::{Error, HookError, Result};
use async_trait::async_trait;

/// Resolves the outgoing content type for an attempt.
///
/// Returning `Ok(None)` (or an empty string) falls back to the default
/// classification.
#[async_trait]
pub trait ContentTypeResolver: Send + Sync {
    /// Picks a content type for the given call and payload.
    async fn resolve(
        &self,
        context: &RewriteContext,
        payload: Option<&Payload>,
    ) -> std::result::Result<Option<String>, HookError>;
}

/// Default payload classification, applied in fixed priority order.
pub(crate) fn classify(payload: Option<&Payload>) -> &'static str {
    match payload {
        Some(Payload::Binary(_)) => "application/octet-stream",
        Some(Payload::Json(_)) => "application/json;charset=utf-8",
        Some(Payload::Text(_)) => "text/plain",
        None => "text/plain",
    }
}

pub(crate) async fn negotiate(
    resolver: Option<&dyn ContentTypeResolver>,
    context: &RewriteContext,
    payload: Option<&Payload>,
) -> Result<String> {
    if let Some(resolver) = resolver {
        match resolver.resolve(context, payload).await {
            Ok(Some(content_type)) if !content_type.is_empty() => return Ok(content_type),
            Ok(_) => {}
            Err(source) => return Err(Error::rewrite("content-type", source)),
        }
    }
    Ok(classify(payload).to_string())
}

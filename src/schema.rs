//! Schema-to-value mapping.
//!
//! After decoding, the payload is mapped through the operation's response
//! metadata for the exact status code returned. A named schema resolves a
//! decoder from the [`DefinitionRegistry`]; an inline schema (or no
//! registered decoder) keeps the structural payload as-is; no matching
//! descriptor passes the payload through untouched. Failing statuses run
//! the identical resolution to build the error payload of a
//! [`NormalizedFailure`].

use crate::decode::Payload;
use crate::descriptor::{ResponseDescriptor, SchemaRef};
use crate::error::{NormalizedFailure, GENERIC_FAILURE_CODE};
use crate::{Error, HookError, Result};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A deserialization function for one named definition.
///
/// Takes the decoded JSON payload and returns the value rebuilt through the
/// definition's type.
pub type DefinitionDecoder =
    Arc<dyn Fn(Value) -> std::result::Result<Value, HookError> + Send + Sync>;

/// Explicit registry mapping schema definition names to deserialization
/// functions.
///
/// Supplied by whatever generated the client's types; the mapper looks
/// decoders up by the `SchemaRef::Named` name on the response descriptor.
#[derive(Clone, Default)]
pub struct DefinitionRegistry {
    decoders: std::collections::HashMap<String, DefinitionDecoder>,
}

impl DefinitionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a raw decoder function under a definition name.
    pub fn register_fn(
        &mut self,
        name: impl Into<String>,
        decoder: impl Fn(Value) -> std::result::Result<Value, HookError> + Send + Sync + 'static,
    ) {
        self.decoders.insert(name.into(), Arc::new(decoder));
    }

    /// Registers a typed definition: payloads for this name are round-
    /// tripped through `T`, so a payload that does not fit the type fails
    /// loudly at mapping time.
    pub fn register<T>(&mut self, name: impl Into<String>)
    where
        T: DeserializeOwned + Serialize,
    {
        self.register_fn(name, |value| {
            let typed: T = serde_json::from_value(value)?;
            Ok(serde_json::to_value(typed)?)
        });
    }

    /// Looks up the decoder for a definition name.
    pub fn decoder(&self, name: &str) -> Option<&DefinitionDecoder> {
        self.decoders.get(name)
    }
}

/// Maps a successful response payload through the declared schema for its
/// exact status code.
pub(crate) fn map_success(
    responses: &BTreeMap<u16, ResponseDescriptor>,
    registry: &DefinitionRegistry,
    status: StatusCode,
    payload: Payload,
) -> Result<Payload> {
    let Some(descriptor) = responses.get(&status.as_u16()) else {
        return Ok(payload);
    };
    match &descriptor.schema {
        Some(SchemaRef::Named(name)) => match (registry.decoder(name), payload) {
            (Some(decode), Payload::Json(value)) => decode(value)
                .map(Payload::Json)
                .map_err(|e| Error::Decode {
                    message: format!("definition `{name}` rejected payload: {e}"),
                    status: Some(status),
                }),
            (_, payload) => Ok(payload),
        },
        Some(SchemaRef::Inline) | None => Ok(payload),
    }
}

/// Normalizes a failing response: resolves the error payload through the
/// failing status's schema exactly as a success would be, then assembles
/// the failure with the descriptor's documented description (when present)
/// as its message.
#[allow(clippy::too_many_arguments)]
pub(crate) fn normalize_failure(
    responses: &BTreeMap<u16, ResponseDescriptor>,
    registry: &DefinitionRegistry,
    method: Method,
    url: url::Url,
    status: StatusCode,
    headers: HeaderMap,
    raw_body: Vec<u8>,
    payload: Payload,
) -> NormalizedFailure {
    let descriptor = responses.get(&status.as_u16());
    let data = match descriptor.and_then(|d| d.schema.as_ref()) {
        Some(SchemaRef::Named(name)) => match (registry.decoder(name), payload) {
            (Some(decode), Payload::Json(value)) => match decode(value.clone()) {
                Ok(mapped) => Payload::Json(mapped),
                // An error body that does not fit its declared definition
                // still surfaces raw rather than vanishing.
                Err(_) => Payload::Json(value),
            },
            (_, payload) => payload,
        },
        _ => payload,
    };

    NormalizedFailure {
        message: descriptor
            .and_then(|d| d.description.clone())
            .unwrap_or_else(|| format!("request failed with status code {}", status.as_u16())),
        code: GENERIC_FAILURE_CODE.to_string(),
        status: Some(status),
        data: Some(data),
        headers,
        method,
        url,
        raw_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Pet {
        id: u64,
        name: String,
    }

    fn responses_with(status: u16, descriptor: ResponseDescriptor) -> BTreeMap<u16, ResponseDescriptor> {
        let mut map = BTreeMap::new();
        map.insert(status, descriptor);
        map
    }

    #[test]
    fn named_schema_maps_through_registered_definition() {
        let mut registry = DefinitionRegistry::new();
        registry.register::<Pet>("Pet");
        let responses = responses_with(
            200,
            ResponseDescriptor::new().with_schema(SchemaRef::Named("Pet".to_string())),
        );

        let mapped = map_success(
            &responses,
            &registry,
            StatusCode::OK,
            Payload::Json(json!({"id": 1, "name": "Rex"})),
        )
        .unwrap();
        assert_eq!(mapped, Payload::Json(json!({"id": 1, "name": "Rex"})));
    }

    #[test]
    fn named_schema_rejecting_payload_is_a_decode_error() {
        let mut registry = DefinitionRegistry::new();
        registry.register::<Pet>("Pet");
        let responses = responses_with(
            200,
            ResponseDescriptor::new().with_schema(SchemaRef::Named("Pet".to_string())),
        );

        let err = map_success(
            &responses,
            &registry,
            StatusCode::OK,
            Payload::Json(json!({"wrong": "shape"})),
        )
        .unwrap_err();
        match err {
            Error::Decode { status, .. } => assert_eq!(status, Some(StatusCode::OK)),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn unregistered_name_passes_payload_through() {
        let responses = responses_with(
            200,
            ResponseDescriptor::new().with_schema(SchemaRef::Named("Ghost".to_string())),
        );

        let payload = Payload::Json(json!({"anything": true}));
        let mapped = map_success(
            &responses,
            &DefinitionRegistry::new(),
            StatusCode::OK,
            payload.clone(),
        )
        .unwrap();
        assert_eq!(mapped, payload);
    }

    #[test]
    fn missing_descriptor_passes_payload_through() {
        let payload = Payload::Text("plain".to_string());
        let mapped = map_success(
            &BTreeMap::new(),
            &DefinitionRegistry::new(),
            StatusCode::OK,
            payload.clone(),
        )
        .unwrap();
        assert_eq!(mapped, payload);
    }

    #[test]
    fn failure_message_prefers_documented_description() {
        let responses = responses_with(
            404,
            ResponseDescriptor::new().with_description("Pet not found"),
        );

        let failure = normalize_failure(
            &responses,
            &DefinitionRegistry::new(),
            Method::GET,
            url::Url::parse("http://h/pets/1").unwrap(),
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            b"{}".to_vec(),
            Payload::Json(json!({})),
        );
        assert_eq!(failure.message, "Pet not found");
        assert_eq!(failure.code, GENERIC_FAILURE_CODE);
        assert_eq!(failure.status, Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn undeclared_failure_status_keeps_raw_payload_and_generic_message() {
        let failure = normalize_failure(
            &BTreeMap::new(),
            &DefinitionRegistry::new(),
            Method::GET,
            url::Url::parse("http://h/pets/1").unwrap(),
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            br#"{"detail": "gone"}"#.to_vec(),
            Payload::Json(json!({"detail": "gone"})),
        );
        assert_eq!(failure.message, "request failed with status code 404");
        assert_eq!(failure.data, Some(Payload::Json(json!({"detail": "gone"}))));
    }

    #[test]
    fn failure_with_named_schema_maps_error_payload() {
        #[derive(Debug, Serialize, Deserialize)]
        struct ApiError {
            detail: String,
        }
        let mut registry = DefinitionRegistry::new();
        registry.register::<ApiError>("ApiError");
        let responses = responses_with(
            404,
            ResponseDescriptor::new()
                .with_description("Not found")
                .with_schema(SchemaRef::Named("ApiError".to_string())),
        );

        let failure = normalize_failure(
            &responses,
            &registry,
            Method::GET,
            url::Url::parse("http://h/pets/1").unwrap(),
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            br#"{"detail": "gone"}"#.to_vec(),
            Payload::Json(json!({"detail": "gone"})),
        );
        assert_eq!(failure.data, Some(Payload::Json(json!({"detail": "gone"}))));
        assert_eq!(failure.message, "Not found");
    }
}

//! Integration tests using wiremock to simulate HTTP servers.

use async_trait::async_trait;
use http::Method;
use parlance::{
    ApiKey, ApiKeyLocation, ArgumentRewriter, BodyTransform, CallArguments, CallContext, Client,
    ContentTypeResolver, Error, FixedDelay, HookError, HostParts, HostRewriter,
    OperationDescriptor, ParamLocation, Payload, ResponseDescriptor, RetryDecision, RetryPolicy,
    RewriteContext, SchemaRef, SecurityContext, UrlRewriter, GENERIC_FAILURE_CODE,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Pet {
    id: u64,
    name: String,
}

fn get_pet_op() -> OperationDescriptor {
    OperationDescriptor::new("getPet", Method::GET, "/pets/{petId}")
        .with_param("petId", ParamLocation::Path)
        .with_response(
            200,
            ResponseDescriptor::new().with_schema(SchemaRef::Named("Pet".to_string())),
        )
}

fn client_for(uri: &str, op: OperationDescriptor) -> Client {
    Client::builder()
        .base_url(uri)
        .unwrap()
        .operation(op)
        .definition::<Pet>("Pet")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_successful_invoke_returns_envelope() {
    let mock_server = MockServer::start().await;

    let pet = Pet {
        id: 1,
        name: "Rex".to_string(),
    };

    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&pet))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), get_pet_op());
    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await
        .unwrap();

    assert_eq!(envelope.status.as_u16(), 200);
    assert_eq!(envelope.attempts, 1);
    assert!(!envelope.was_retried());
    assert_eq!(envelope.json::<Pet>().unwrap(), pet);
}

#[tokio::test]
async fn test_parameter_routing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/things/5"))
        .and(query_param("x", "v"))
        .and(header("auth", "t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let op = OperationDescriptor::new("getThing", Method::GET, "/things/{id}")
        .with_param("id", ParamLocation::Path)
        .with_param("x", ParamLocation::Query)
        .with_param("auth", ParamLocation::Header);

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(op)
        .build()
        .unwrap();

    let call = CallContext::new()
        .param("id", 5)
        .param("x", "v")
        .param("auth", "t")
        .param("extra", "ignored");
    client.invoke("getThing", call).await.unwrap();

    // The undeclared parameter must not leak into any destination.
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(!request.url.path().contains("ignored"));
    assert!(!request.url.query().unwrap_or("").contains("extra"));
    assert!(request.headers.get("extra").is_none());
}

#[tokio::test]
async fn test_post_sends_negotiated_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pets"))
        .and(header("content-type", "application/json;charset=utf-8"))
        .and(body_json(json!({"name": "Rex"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9, "name": "Rex"})))
        .mount(&mock_server)
        .await;

    let op = OperationDescriptor::new("createPet", Method::POST, "/pets");
    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(op)
        .build()
        .unwrap();

    let envelope = client
        .invoke("createPet", CallContext::new().body(json!({"name": "Rex"})))
        .await
        .unwrap();

    assert_eq!(envelope.status.as_u16(), 201);
}

#[tokio::test]
async fn test_bodyless_method_strips_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "x"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), get_pet_op());
    client
        .invoke(
            "getPet",
            CallContext::new()
                .param("petId", 1)
                .body(json!({"should": "vanish"})),
        )
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn test_error_mapping_with_registered_definition() {
    #[derive(Debug, Serialize, Deserialize)]
    struct ApiError {
        detail: String,
        // Defaulted by the typed round trip, proving the payload went
        // through the registered definition rather than passing raw.
        #[serde(default)]
        transient: bool,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pets/0"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "gone"})))
        .mount(&mock_server)
        .await;

    let op = OperationDescriptor::new("getPet", Method::GET, "/pets/{petId}")
        .with_param("petId", ParamLocation::Path)
        .with_response(
            404,
            ResponseDescriptor::new()
                .with_description("Pet not found")
                .with_schema(SchemaRef::Named("ApiError".to_string())),
        );

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(op)
        .definition::<ApiError>("ApiError")
        .build()
        .unwrap();

    let result = client
        .invoke("getPet", CallContext::new().param("petId", 0))
        .await;

    match result {
        Err(Error::Api(failure)) => {
            assert_eq!(failure.message, "Pet not found");
            assert_eq!(failure.code, GENERIC_FAILURE_CODE);
            assert_eq!(failure.status.unwrap().as_u16(), 404);
            assert_eq!(
                failure.data,
                Some(Payload::Json(json!({"detail": "gone", "transient": false})))
            );
        }
        other => panic!("Expected Api failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_descriptor_keeps_raw_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pets/0"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "gone"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), get_pet_op());
    let result = client
        .invoke("getPet", CallContext::new().param("petId", 0))
        .await;

    match result {
        Err(Error::Api(failure)) => {
            assert_eq!(failure.message, "request failed with status code 404");
            assert_eq!(failure.data, Some(Payload::Json(json!({"detail": "gone"}))));
        }
        other => panic!("Expected Api failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_network_failure_propagates_unwrapped() {
    // Bind a port, then release it so the connection is refused.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = client_for(&format!("http://127.0.0.1:{port}"), get_pet_op());
    let result = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await;

    assert!(matches!(result, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_retry_until_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(500).set_body_string("Server error")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Rex"}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .definition::<Pet>("Pet")
        .retry_policy(Box::new(FixedDelay {
            delay: Duration::from_millis(10),
            max_retries: 3,
        }))
        .build()
        .unwrap();

    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await
        .unwrap();

    assert_eq!(envelope.attempts, 3);
    assert!(envelope.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_policy_sees_monotonic_counts_and_stop_surfaces_original() {
    struct CountingPolicy {
        seen: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl RetryPolicy for CountingPolicy {
        async fn decide(
            &self,
            _context: &RewriteContext,
            prior_attempts: usize,
            _failure: &Error,
        ) -> Result<RetryDecision, HookError> {
            self.seen.lock().unwrap().push(prior_attempts);
            if prior_attempts < 2 {
                Ok(RetryDecision::Immediate)
            } else {
                Ok(RetryDecision::Stop)
            }
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .mount(&mock_server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .retry_policy(Box::new(CountingPolicy { seen: seen.clone() }))
        .build()
        .unwrap();

    let result = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    match result {
        Err(Error::Api(failure)) => assert_eq!(failure.status.unwrap().as_u16(), 500),
        other => panic!("Expected the original Api failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failing_retry_policy_supersedes_original_failure() {
    struct BrokenPolicy;

    #[async_trait]
    impl RetryPolicy for BrokenPolicy {
        async fn decide(
            &self,
            _context: &RewriteContext,
            _prior_attempts: usize,
            _failure: &Error,
        ) -> Result<RetryDecision, HookError> {
            Err("policy exploded".into())
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .retry_policy(Box::new(BrokenPolicy))
        .build()
        .unwrap();

    let result = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await;

    assert!(matches!(result, Err(Error::RetryPolicy { .. })));
}

#[tokio::test]
async fn test_explicit_headers_beat_security_context() {
    struct FixedAuth;

    impl SecurityContext for FixedAuth {
        fn apply_headers(
            &self,
            mut headers: http::HeaderMap,
        ) -> Result<http::HeaderMap, HookError> {
            headers.insert("authorization", http::HeaderValue::from_static("X"));
            Ok(headers)
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .and(header("authorization", "Y"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "x"})))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .security_context(Arc::new(FixedAuth))
        .build()
        .unwrap();

    let call = CallContext::new()
        .param("petId", 1)
        .header("Authorization", "Y")
        .unwrap();
    let envelope = client.invoke("getPet", call).await.unwrap();
    assert_eq!(envelope.status.as_u16(), 200);
}

#[tokio::test]
async fn test_api_key_security_rewrites_query() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .and(query_param("token", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "x"})))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .security_context(Arc::new(ApiKey::new("token", "k", ApiKeyLocation::Query)))
        .build()
        .unwrap();

    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await
        .unwrap();
    assert_eq!(envelope.status.as_u16(), 200);
}

#[tokio::test]
async fn test_host_rewriter_redirects_dispatch() {
    struct ToLocalMock {
        authority: String,
    }

    impl HostRewriter for ToLocalMock {
        fn rewrite(&self, _context: &RewriteContext) -> Result<Option<HostParts>, HookError> {
            Ok(Some(HostParts {
                scheme: Some("http".to_string()),
                host: Some(self.authority.clone()),
            }))
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "x"})))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url("http://unreachable.invalid")
        .unwrap()
        .operation(get_pet_op())
        .definition::<Pet>("Pet")
        .host_rewriter(Box::new(ToLocalMock {
            authority: mock_server.address().to_string(),
        }))
        .build()
        .unwrap();

    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await
        .unwrap();
    assert_eq!(envelope.status.as_u16(), 200);
}

#[tokio::test]
async fn test_url_rewriter_supersedes_assembled_url() {
    struct RedirectPath {
        target: String,
    }

    impl UrlRewriter for RedirectPath {
        fn rewrite(
            &self,
            _context: &RewriteContext,
            _url: &str,
        ) -> Result<Option<String>, HookError> {
            Ok(Some(self.target.clone()))
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/alternate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "x"})))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .definition::<Pet>("Pet")
        .url_rewriter(Box::new(RedirectPath {
            target: format!("{}/alternate", mock_server.uri()),
        }))
        .build()
        .unwrap();

    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await
        .unwrap();
    assert_eq!(envelope.status.as_u16(), 200);
}

#[tokio::test]
async fn test_argument_rewriter_rebinds_parameters() {
    struct PinId;

    #[async_trait]
    impl ArgumentRewriter for PinId {
        async fn rewrite(
            &self,
            context: &RewriteContext,
        ) -> Result<Option<CallArguments>, HookError> {
            let mut args = context.args.clone();
            args.params.insert("petId".to_string(), Value::from(7));
            Ok(Some(args))
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "x"})))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .definition::<Pet>("Pet")
        .argument_rewriter(Box::new(PinId))
        .build()
        .unwrap();

    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 5))
        .await
        .unwrap();
    assert_eq!(envelope.status.as_u16(), 200);
}

#[tokio::test]
async fn test_body_transform_runs_after_decode() {
    struct Unwrap;

    impl BodyTransform for Unwrap {
        fn transform(&self, payload: Payload) -> Result<Payload, HookError> {
            match payload {
                Payload::Json(Value::Object(mut map)) => match map.remove("data") {
                    Some(inner) => Ok(Payload::Json(inner)),
                    None => Ok(Payload::Json(Value::Object(map))),
                },
                other => Ok(other),
            }
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 1, "name": "Rex"}})),
        )
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(get_pet_op())
        .definition::<Pet>("Pet")
        .body_transform(Box::new(Unwrap))
        .build()
        .unwrap();

    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await
        .unwrap();
    assert_eq!(
        envelope.json::<Pet>().unwrap(),
        Pet {
            id: 1,
            name: "Rex".to_string()
        }
    );
}

#[tokio::test]
async fn test_content_type_resolver_wins_over_classification() {
    struct Custom;

    #[async_trait]
    impl ContentTypeResolver for Custom {
        async fn resolve(
            &self,
            _context: &RewriteContext,
            _payload: Option<&Payload>,
        ) -> Result<Option<String>, HookError> {
            Ok(Some("application/vnd.pets+json".to_string()))
        }
    }

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pets"))
        .and(header("content-type", "application/vnd.pets+json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9, "name": "x"})))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(OperationDescriptor::new("createPet", Method::POST, "/pets"))
        .content_type_resolver(Box::new(Custom))
        .build()
        .unwrap();

    let envelope = client
        .invoke("createPet", CallContext::new().body(json!({"name": "x"})))
        .await
        .unwrap();
    assert_eq!(envelope.status.as_u16(), 201);
}

#[tokio::test]
async fn test_per_call_base_url_override() {
    let default_server = MockServer::start().await;
    let override_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "x"})))
        .mount(&override_server)
        .await;

    let client = client_for(&default_server.uri(), get_pet_op());
    let call = CallContext::new()
        .param("petId", 1)
        .base_url(override_server.uri())
        .unwrap();

    let envelope = client.invoke("getPet", call).await.unwrap();
    assert_eq!(envelope.status.as_u16(), 200);
    assert!(default_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_big_integer_survives_end_to_end() {
    let mock_server = MockServer::start().await;
    let body = br#"{"n":9007199254740993}"#;

    Mock::given(method("GET"))
        .and(path("/pets/1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), "application/json"))
        .mount(&mock_server)
        .await;

    let op = OperationDescriptor::new("getPet", Method::GET, "/pets/{petId}")
        .with_param("petId", ParamLocation::Path);
    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .operation(op)
        .build()
        .unwrap();

    let envelope = client
        .invoke("getPet", CallContext::new().param("petId", 1))
        .await
        .unwrap();

    match &envelope.body {
        Payload::Json(value) => {
            assert_eq!(
                serde_json::to_string(value).unwrap(),
                String::from_utf8(body.to_vec()).unwrap()
            );
        }
        other => panic!("Expected JSON payload, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_operation() {
    let client = Client::builder()
        .base_url("http://localhost")
        .unwrap()
        .build()
        .unwrap();

    let result = client.invoke("missing", CallContext::new()).await;
    assert!(matches!(result, Err(Error::UnknownOperation(id)) if id == "missing"));
}

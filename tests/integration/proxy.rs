//! Proxy endpoint integration tests
//!
//! Verifies URL conversion, credential handling and error rendering for:
//! - POST /v1/chat/completions
//! - POST /v1/completions
//! - POST /v1/embeddings
//! - POST /v1/engines/:model/embeddings
//! - GET /v1/models/:model
//! - OPTIONS on any path

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum_test::TestServer;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{build_app_with_config, constants::*, deployment, test_config, test_server};
use crate::mocks::{azure::chat_completion, MockAzureResource};

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

#[tokio::test]
async fn test_chat_completion_uses_deployment_key() {
    let azure = MockAzureResource::start().await;
    azure
        .mock_json("gpt-35-turbo", "chat/completions", 200, chat_completion("hi"))
        .await;

    let server = test_server(vec![deployment("gpt-3.5-turbo", &azure.uri(), DEPLOYMENT_KEY)]);
    let request_body = json!({
        "model": "gpt-3.5-turbo",
        "messages": [{ "role": "user", "content": "hello" }]
    });

    let response = server
        .post("/v1/chat/completions")
        .add_header(header::AUTHORIZATION, bearer(CLIENT_TOKEN))
        .json(&request_body)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), chat_completion("hi"));

    let received = azure.received().await;
    assert_eq!(received.len(), 1);
    let outbound = &received[0];
    assert_eq!(outbound.method.as_str(), "POST");
    assert_eq!(
        outbound.url.path(),
        "/openai/deployments/gpt-35-turbo/chat/completions"
    );
    assert_eq!(outbound.headers.get("api-key").unwrap(), DEPLOYMENT_KEY);
    assert!(outbound.headers.get("authorization").is_none());
    assert_eq!(outbound.headers.get("transfer-encoding").unwrap(), "chunked");
    assert!(outbound.headers.get("content-length").is_none());

    let forwarded: Value = serde_json::from_slice(&outbound.body).unwrap();
    assert_eq!(forwarded, request_body);
}

#[tokio::test]
async fn test_bearer_token_used_when_deployment_has_no_key() {
    let azure = MockAzureResource::start().await;
    azure
        .mock_json("gpt-4o", "chat/completions", 200, chat_completion("ok"))
        .await;

    let server = test_server(vec![deployment("gpt-4o", &azure.uri(), "")]);

    let response = server
        .post("/v1/chat/completions")
        .add_header(header::AUTHORIZATION, bearer(CLIENT_TOKEN))
        .json(&json!({ "model": "gpt-4o", "messages": [] }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);

    let received = azure.received().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].headers.get("api-key").unwrap(), CLIENT_TOKEN);
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_missing_credential_never_reaches_backend() {
    let azure = MockAzureResource::start().await;
    azure
        .mock_json("gpt-4o", "chat/completions", 200, chat_completion("ok"))
        .await;

    let server = test_server(vec![deployment("gpt-4o", &azure.uri(), "")]);

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({ "model": "gpt-4o", "messages": [] }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "MISSING_CREDENTIAL");
    assert!(azure.received().await.is_empty());
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let azure = MockAzureResource::start().await;
    let server = test_server(vec![deployment("gpt-4o", &azure.uri(), DEPLOYMENT_KEY)]);

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({ "model": "gpt-4", "messages": [] }))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "DEPLOYMENT_NOT_FOUND");
    assert_eq!(body["error"]["message"], "Deployment config for gpt-4 not found");
    assert!(azure.received().await.is_empty());
}

#[tokio::test]
async fn test_rejected_models_do_not_become_metric_labels() {
    aoai_relay::routes::metrics::init_metrics();
    let server = test_server(Vec::new());

    for i in 0..20 {
        let response = server
            .post("/v1/chat/completions")
            .json(&json!({ "model": format!("unregistered-model-{i}"), "messages": [] }))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    let rendered = server.get("/metrics").await.text();
    assert!(rendered.contains("DEPLOYMENT_NOT_FOUND"));
    assert!(!rendered.contains("unregistered-model-"));
}

#[tokio::test]
async fn test_unusable_bodies_rejected() {
    let azure = MockAzureResource::start().await;
    let server = test_server(vec![deployment("gpt-4o", &azure.uri(), DEPLOYMENT_KEY)]);

    let response = server.post("/v1/chat/completions").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "EMPTY_BODY");

    let response = server.post("/v1/chat/completions").text("{not json").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"]["code"],
        "MODEL_RESOLUTION_FAILED"
    );

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({ "messages": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert!(azure.received().await.is_empty());
}

#[tokio::test]
async fn test_completions_and_embeddings_paths() {
    let azure = MockAzureResource::start().await;
    azure
        .mock_json("davinci", "completions", 200, json!({ "choices": [] }))
        .await;
    azure
        .mock_json("ada", "embeddings", 200, json!({ "data": [] }))
        .await;

    let server = test_server(vec![
        deployment("davinci", &azure.uri(), DEPLOYMENT_KEY),
        deployment("ada", &azure.uri(), DEPLOYMENT_KEY),
    ]);

    let response = server
        .post("/v1/completions")
        .json(&json!({ "model": "davinci", "prompt": "hi" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = server
        .post("/v1/embeddings")
        .json(&json!({ "model": "ada", "input": "hi" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let paths: Vec<String> = azure
        .received()
        .await
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/openai/deployments/davinci/completions",
            "/openai/deployments/ada/embeddings",
        ]
    );
}

#[tokio::test]
async fn test_engine_embeddings_takes_model_from_path() {
    let azure = MockAzureResource::start().await;
    azure
        .mock_json("ada", "embeddings", 200, json!({ "data": [] }))
        .await;

    let server = test_server(vec![deployment("ada", &azure.uri(), DEPLOYMENT_KEY)]);

    let response = server
        .post("/v1/engines/ada/embeddings")
        .json(&json!({ "input": "no model field here" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(azure.received().await.len(), 1);
}

#[tokio::test]
async fn test_model_detail_is_forwarded() {
    let azure = MockAzureResource::start().await;
    azure
        .mock_json("gpt-4o", "", 200, json!({ "id": "gpt-4o", "status": "succeeded" }))
        .await;

    let server = test_server(vec![deployment("gpt-4o", &azure.uri(), DEPLOYMENT_KEY)]);

    let response = server.get("/v1/models/gpt-4o").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "succeeded");

    let received = azure.received().await;
    assert_eq!(received[0].method.as_str(), "GET");
    assert_eq!(received[0].url.path(), "/openai/deployments/gpt-4o");
}

#[tokio::test]
async fn test_backend_error_status_relayed_verbatim() {
    let azure = MockAzureResource::start().await;
    let error_body = json!({ "error": { "code": "429", "message": "Rate limit reached" } });
    azure
        .mock_json("gpt-4o", "chat/completions", 429, error_body.clone())
        .await;

    let server = test_server(vec![deployment("gpt-4o", &azure.uri(), DEPLOYMENT_KEY)]);

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({ "model": "gpt-4o", "messages": [] }))
        .await;

    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>(), error_body);
}

#[tokio::test]
async fn test_unreachable_deployment_is_bad_gateway() {
    let server = test_server(vec![deployment("gpt-4o", "http://127.0.0.1:9/", DEPLOYMENT_KEY)]);

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({ "model": "gpt-4o", "messages": [] }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["error"]["code"], "FORWARDING_ERROR");
}

#[tokio::test]
async fn test_preflight_answered_locally() {
    let azure = MockAzureResource::start().await;
    let server = test_server(vec![deployment("gpt-4o", &azure.uri(), DEPLOYMENT_KEY)]);

    for path in ["/v1/chat/completions", "/v1/models", "/anything/else"] {
        let response = server.method(Method::OPTIONS, path).await;

        assert_eq!(response.status_code(), StatusCode::OK, "OPTIONS {path}");
        let headers = response.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET, OPTIONS, POST"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "Authorization, Content-Type"
        );
    }

    assert!(azure.received().await.is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let server = test_server(Vec::new());

    let response = server.get("/v2/nothing").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_custom_api_base() {
    let azure = MockAzureResource::start().await;
    azure
        .mock_json("gpt-4o", "chat/completions", 200, chat_completion("ok"))
        .await;

    let config = aoai_relay::Config {
        api_base: "/openai/v1".to_string(),
        ..test_config()
    };
    let app = build_app_with_config(
        config,
        vec![deployment("gpt-4o", &azure.uri(), DEPLOYMENT_KEY)],
    );
    let server = TestServer::new(app).unwrap();

    let response = server
        .post("/openai/v1/chat/completions")
        .json(&json!({ "model": "gpt-4o", "messages": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({ "model": "gpt-4o", "messages": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

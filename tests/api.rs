mod common;

use axum::body::Body;
use axum::http::{ header, Request, StatusCode };
use axum::Router;
use common::{ shell_with, ScriptedClient, PNG };
use roomcast::server::api::{ router, AppState };
use roomcast::shell::READ_FAILED_NOTICE;
use serde_json::{ json, Value };
use std::io;
use std::sync::Arc;
use tower::ServiceExt;

const LIMIT: usize = 1024;

fn app(client: Arc<ScriptedClient>, api_key: Option<&str>) -> Router {
    let state = AppState::new(shell_with(client), api_key.map(str::to_string), LIMIT);
    router(state)
}

fn upload(content_type: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/timeline")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes.to_vec()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, value: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upload_then_fetch_feed_and_image() {
    let app = app(ScriptedClient::new(vec![Ok("Airy loft"), Ok("Dim study")]), None);

    let resp = app.clone().oneshot(upload("image/png", PNG)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let entry = body_json(resp).await;
    assert_eq!(entry["id"], 1);
    assert_eq!(entry["description"], "Airy loft");
    assert_eq!(entry["image"]["url"], "/api/images/1");
    assert_eq!(entry["image"]["media_type"], "image/png");

    let resp = app.clone().oneshot(upload("image/jpeg", PNG)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let feed = body_json(app.clone().oneshot(get("/api/timeline")).await.unwrap()).await;
    let descriptions: Vec<_> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["description"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(descriptions, vec!["Dim study", "Airy loft"]);

    let resp = app.clone().oneshot(get("/api/images/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], PNG);

    let resp = app.oneshot(get("/api/images/99")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_errors_map_to_status_codes() {
    let client = ScriptedClient::new(vec![Err("quota exceeded")]);
    let app = app(client.clone(), None);

    let resp = app.clone().oneshot(upload("image/gif", PNG)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = app.clone().oneshot(upload("image/png", PNG)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(resp).await, json!({ "error": "description generation failed" }));

    let mut declared = upload("image/png", PNG);
    declared.headers_mut().insert(header::CONTENT_LENGTH, (LIMIT * 2).into());
    let resp = app.clone().oneshot(declared).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let feed = body_json(app.oneshot(get("/api/timeline")).await.unwrap()).await;
    assert_eq!(feed, json!([]));
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn oversize_upload_without_length_is_rejected_as_too_large() {
    let client = ScriptedClient::new(vec![]);
    let app = app(client.clone(), None);

    let too_big = vec![0u8; LIMIT + 1];
    let resp = app.clone().oneshot(upload("image/png", &too_big)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let status = body_json(app.oneshot(get("/api/status")).await.unwrap()).await;
    assert_eq!(status["notice"], Value::Null);
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn broken_upload_body_is_a_read_failure() {
    let client = ScriptedClient::new(vec![]);
    let app = app(client.clone(), None);

    let chunks = vec![Err::<Vec<u8>, io::Error>(io::Error::other("connection reset"))];
    let req = Request::builder()
        .method("POST")
        .uri("/api/timeline")
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let status = body_json(app.oneshot(get("/api/status")).await.unwrap()).await;
    assert_eq!(status["notice"], READ_FAILED_NOTICE);
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn chat_body_is_bounded_by_upload_limit() {
    let client = ScriptedClient::new(vec![]);
    let app = app(client.clone(), None);

    let huge = "x".repeat(5 * 1024 * 1024);
    let resp = app.clone().oneshot(post_json("/api/chat", json!({ "message": huge }))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(client.request_count(), 0);

    let chat = body_json(app.oneshot(get("/api/chat")).await.unwrap()).await;
    assert_eq!(chat, json!([]));
}

#[tokio::test]
async fn notice_can_be_dismissed() {
    let app = app(ScriptedClient::new(vec![Err("boom")]), None);

    app.clone().oneshot(upload("image/png", PNG)).await.unwrap();
    let status = body_json(app.clone().oneshot(get("/api/status")).await.unwrap()).await;
    assert_eq!(status["uploading"], false);
    assert_eq!(status["replying"], false);
    assert!(status["notice"].as_str().unwrap().starts_with("Failed to get AI description"));

    let dismiss = Request::builder()
        .method("DELETE")
        .uri("/api/notice")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(dismiss).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let status = body_json(app.oneshot(get("/api/status")).await.unwrap()).await;
    assert_eq!(status["notice"], Value::Null);
}

#[tokio::test]
async fn chat_round_trip() {
    let app = app(ScriptedClient::new(vec![Ok("Looks tidy."), Err("timeout")]), None);

    let resp = app.clone().oneshot(post_json("/api/chat", json!({ "message": "how is it?" }))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let exchange = body_json(resp).await;
    assert_eq!(exchange["user"]["author"], "user");
    assert_eq!(exchange["reply"]["author"], "assistant");
    assert_eq!(exchange["reply"]["text"], "Looks tidy.");
    assert_eq!(exchange["fallback"], false);

    let resp = app.clone().oneshot(post_json("/api/chat", json!({ "message": "  " }))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // A failed reply still answers 200 with the fallback message.
    let resp = app.clone().oneshot(post_json("/api/chat", json!({ "message": "and now?" }))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["fallback"], true);

    let chat = body_json(app.oneshot(get("/api/chat")).await.unwrap()).await;
    assert_eq!(chat.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let app = app(ScriptedClient::new(vec![]), Some("s3cret"));

    let resp = app.clone().oneshot(get("/api/timeline")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let with_header = Request::builder()
        .uri("/api/timeline")
        .header("X-API-Key", "s3cret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(with_header).await.unwrap().status(), StatusCode::OK);

    let resp = app.clone().oneshot(get("/api/timeline?api_key=s3cret")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get("/api/timeline?api_key=wrong")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

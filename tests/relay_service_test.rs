//! 转发服务集成测试
//!
//! 通过路由发送请求，真实的HTTP转发器投递到 mockito 下游

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mockito::Matcher;
use pulse_relay::config::{ConfigSource, RelayConfig};
use pulse_relay::relay::{HttpForwarder, PulseForwarder, DEFAULT_REQUEST_TIMEOUT};
use pulse_relay::web::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn relay_config(forward_urls: &str, token: Option<&str>) -> Arc<RelayConfig> {
    let mut source = ConfigSource::new();
    source.insert("FORWARD_URLS".to_string(), forward_urls.to_string());
    source.insert("PER_TARGET_DELAY".to_string(), "0".to_string());
    if let Some(token) = token {
        source.insert("FORWARD_TOKEN".to_string(), token.to_string());
    }
    Arc::new(RelayConfig::from_source(&source))
}

fn state_for(config: Arc<RelayConfig>) -> AppState {
    let forwarder: Arc<dyn PulseForwarder> =
        Arc::new(HttpForwarder::new(DEFAULT_REQUEST_TIMEOUT).unwrap());
    AppState::new(config, Some(forwarder))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_empty_post_relays_ping_with_token_to_every_target() {
    let mut first = mockito::Server::new_async().await;
    let mut second = mockito::Server::new_async().await;

    let first_mock = first
        .mock("POST", "/pulse_receiver")
        .match_header("x-pulse-token", "secret")
        .match_body(Matcher::Json(json!({"message": "ping"})))
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;
    let second_mock = second
        .mock("POST", "/pulse_receiver")
        .match_header("x-pulse-token", "secret")
        .match_body(Matcher::Json(json!({"message": "ping"})))
        .with_status(202)
        .with_body("accepted")
        .create_async()
        .await;

    let targets = format!("{}/,{}/PULSE_RECEIVER", first.url(), second.url());
    let app = create_router(state_for(relay_config(&targets, Some("secret"))));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/receive_pulse")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "forwarded_to_multiple");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["url"], format!("{}/pulse_receiver", first.url()));
    assert_eq!(results[0]["code"], 200);
    assert_eq!(results[0]["text_snippet"], "ok");
    assert_eq!(results[1]["url"], format!("{}/pulse_receiver", second.url()));
    assert_eq!(results[1]["code"], 202);
    assert_eq!(results[1]["text_snippet"], "accepted");

    first_mock.assert_async().await;
    second_mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_target_does_not_stop_later_targets() {
    let mut downstream = mockito::Server::new_async().await;
    let mock = downstream
        .mock("POST", "/pulse_receiver")
        .match_body(Matcher::Json(json!({"event": "deploy", "n": 3})))
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let targets = format!("http://127.0.0.1:1,{}", downstream.url());
    let app = create_router(state_for(relay_config(&targets, None)));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/receive_pulse")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"event":"deploy","n":3}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    assert_eq!(results[0]["url"], "http://127.0.0.1:1/pulse_receiver");
    assert!(results[0]["error"].is_string());
    assert!(results[0].get("code").is_none());

    // 下游的错误状态码同样算作有响应
    assert_eq!(results[1]["code"], 500);
    assert_eq!(results[1]["text_snippet"], "boom");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_form_fields_are_relayed_as_json_object() {
    let mut downstream = mockito::Server::new_async().await;
    let mock = downstream
        .mock("POST", "/pulse_receiver")
        .match_body(Matcher::Json(json!({"who": "cron", "step": "2"})))
        .with_status(200)
        .create_async()
        .await;

    let app = create_router(state_for(relay_config(&downstream.url(), None)));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/receive_pulse")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("who=cron&step=2"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_wave_probes_target_url() {
    let mut downstream = mockito::Server::new_async().await;
    let mock = downstream
        .mock("GET", "/pulse_receiver")
        .with_status(204)
        .create_async()
        .await;

    let probe_url = format!("{}/pulse_receiver", downstream.url());
    let mut source = ConfigSource::new();
    source.insert("TARGET_URL".to_string(), probe_url.clone());
    let app = create_router(state_for(Arc::new(RelayConfig::from_source(&source))));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/send_wave")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["target"], probe_url);
    assert_eq!(body["code"], 204);
    mock.assert_async().await;
}

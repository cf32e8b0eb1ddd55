//! Web 路由处理函数
//!
//! 实现状态查询、单次探测和接收转发的处理逻辑

use super::AppState;
use crate::relay::RelayResult;
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info_span, warn, Instrument};

/// HTTP客户端不可用时的错误描述
const CLIENT_UNAVAILABLE: &str = "HTTP client unavailable";

/// 状态端点响应
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub auto_ping: bool,
    pub min_interval: f64,
    pub max_interval: f64,
    pub forward_to: Vec<String>,
    pub per_target_delay: f64,
}

/// 探测成功响应
#[derive(Debug, Serialize)]
struct WaveResponse<'a> {
    status: &'static str,
    target: &'a str,
    code: u16,
}

/// 转发结果响应
#[derive(Debug, Serialize)]
struct PulseResponse {
    status: &'static str,
    results: Vec<RelayResult>,
}

/// 错误响应
fn error_response(error: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error", "error": error.into()})),
    )
        .into_response()
}

/// 状态端点处理函数
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let config = &state.config;
    Json(StatusResponse {
        status: "alive",
        uptime_seconds: state.start_time.elapsed().as_secs(),
        auto_ping: config.auto_ping,
        min_interval: config.min_interval,
        max_interval: config.max_interval,
        forward_to: config.forward_urls.clone(),
        per_target_delay: config.per_target_delay,
    })
}

/// 单次探测处理函数
pub async fn send_wave(State(state): State<AppState>) -> Response {
    let Some(forwarder) = state.forwarder.as_ref() else {
        return error_response(CLIENT_UNAVAILABLE);
    };

    let target = &state.config.target_url;
    match forwarder.probe(target).await {
        Ok(code) => (
            StatusCode::OK,
            Json(WaveResponse {
                status: "ok",
                target,
                code,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("send_wave: 探测 {} 失败: {}", target, e);
            error_response(e.describe())
        }
    }
}

/// 接收并转发处理函数
pub async fn receive_pulse(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(forwarder) = state.forwarder.as_ref() else {
        return error_response(CLIENT_UNAVAILABLE);
    };

    let payload = resolve_payload(&headers, body).await;
    let config = &state.config;

    let results = forwarder
        .relay(
            &payload,
            &config.forward_urls,
            config.forward_token.as_deref(),
            config.inter_target_delay(),
        )
        .instrument(info_span!("receive_pulse"))
        .await;

    (
        StatusCode::OK,
        Json(PulseResponse {
            status: "forwarded_to_multiple",
            results,
        }),
    )
        .into_response()
}

/// 解析入站负载
///
/// 依次尝试：JSON 请求体（非 null）、表单字段（urlencoded 或 multipart 的文本字段，
/// 非空），都不可用时返回 `{"message": "ping"}`。
pub async fn resolve_payload(headers: &HeaderMap, body: Bytes) -> Value {
    if let Ok(value) = serde_json::from_slice::<Value>(&body) {
        if !value.is_null() {
            return value;
        }
    }

    let fields = match form_kind(headers) {
        Some(FormKind::UrlEncoded) => {
            serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body).unwrap_or_default()
        }
        Some(FormKind::Multipart) => multipart_fields(headers, body).await,
        None => Vec::new(),
    };

    // 重复字段取第一个值
    let mut map = Map::new();
    for (key, value) in fields {
        map.entry(key).or_insert(Value::String(value));
    }
    if !map.is_empty() {
        return Value::Object(map);
    }

    json!({"message": "ping"})
}

/// 表单编码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
    UrlEncoded,
    Multipart,
}

fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next().unwrap_or_default().trim();

    if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Some(FormKind::UrlEncoded)
    } else if mime.eq_ignore_ascii_case("multipart/form-data") {
        Some(FormKind::Multipart)
    } else {
        None
    }
}

/// 读取 multipart 请求中的文本字段，文件字段被跳过
async fn multipart_fields(headers: &HeaderMap, body: Bytes) -> Vec<(String, String)> {
    let mut request = Request::new(Body::from(body));
    *request.headers_mut() = headers.clone();

    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(e) => {
            warn!("multipart 请求体无效: {}", e);
            return Vec::new();
        }
    };

    let mut fields = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("读取 multipart 字段失败: {}", e);
                break;
            }
        };

        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.text().await {
            Ok(text) => fields.push((name, text)),
            Err(e) => {
                warn!("读取 multipart 字段 {} 失败: {}", name, e);
                break;
            }
        }
    }
    fields
}

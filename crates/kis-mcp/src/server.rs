//! Streamable HTTP 전송 위의 MCP 엔드포인트.
//!
//! 서버 측 스트림은 열지 않으므로 모든 요청은 단일 JSON 응답으로 끝납니다.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use kis_exchange::KisClient;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::McpError;
use crate::protocol::{
    negotiate_protocol_version, CallToolParams, CallToolResult, JsonRpcMessage, JsonRpcResponse,
    MessageKind, SERVER_NAME,
};
use crate::tools::{self, Tool};

/// 세션 헤더 이름
pub const SESSION_HEADER: &str = "mcp-session-id";

const INSTRUCTIONS: &str = "Korea Investment & Securities brokerage tools. \
Domestic quotes, balance, cash orders and execution history, plus overseas quotes and orders.";

/// 핸들러 공유 상태.
#[derive(Clone)]
pub struct McpState {
    client: Arc<KisClient>,
}

impl McpState {
    pub fn new(client: Arc<KisClient>) -> Self {
        Self { client }
    }
}

/// MCP 라우터 생성.
///
/// `path`와 후행 `/`가 붙은 경로 모두 같은 핸들러로 연결됩니다.
pub fn create_router(state: McpState, path: &str) -> Router {
    let endpoint: MethodRouter<McpState> = post(handle_post).get(handle_get).delete(handle_delete);
    let base = path.trim_end_matches('/');

    let mut router = Router::new().route("/health", get(health));
    if base.is_empty() {
        router = router.route("/", endpoint);
    } else {
        router = router
            .route(base, endpoint.clone())
            .route(&format!("{}/", base), endpoint);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

// ==================== Handlers ====================

async fn health() -> &'static str {
    "OK"
}

async fn handle_get() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
    )
        .into_response()
}

async fn handle_delete(headers: HeaderMap) -> StatusCode {
    let session = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info!(session, "MCP 세션 종료");
    StatusCode::NO_CONTENT
}

async fn handle_post(State(state): State<McpState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return rejected(Value::Null, McpError::ParseError(e.to_string())),
    };
    if value.is_array() {
        return rejected(
            Value::Null,
            McpError::InvalidRequest("batch requests are not supported".to_string()),
        );
    }

    let message: JsonRpcMessage = match serde_json::from_value(value) {
        Ok(m) => m,
        Err(e) => return rejected(Value::Null, McpError::InvalidRequest(e.to_string())),
    };

    let kind = match message.classify() {
        Ok(kind) => kind,
        Err(e) => return rejected(message.id.unwrap_or(Value::Null), e),
    };

    match kind {
        MessageKind::Notification { method } => {
            debug!(%method, "MCP 통지 수신");
            StatusCode::ACCEPTED.into_response()
        }
        MessageKind::Response => StatusCode::ACCEPTED.into_response(),
        MessageKind::Request { id, method } => {
            let params = message.params.unwrap_or(Value::Null);
            match dispatch(&state, &method, params).await {
                Ok(result) => {
                    let mut response = Json(JsonRpcResponse::success(id, result)).into_response();
                    if method == "initialize" {
                        attach_session(&mut response);
                    }
                    response
                }
                Err(e) => {
                    warn!(%method, code = e.code(), error = %e, "MCP 요청 실패");
                    Json(JsonRpcResponse::failure(id, &e)).into_response()
                }
            }
        }
    }
}

/// JSON-RPC 메시지로 해석할 수 없는 요청.
fn rejected(id: Value, err: McpError) -> Response {
    warn!(code = err.code(), error = %err, "잘못된 MCP 메시지");
    (
        StatusCode::BAD_REQUEST,
        Json(JsonRpcResponse::failure(id, &err)),
    )
        .into_response()
}

fn attach_session(response: &mut Response) {
    let session_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SESSION_HEADER), value);
    }
}

// ==================== Methods ====================

async fn dispatch(state: &McpState, method: &str, params: Value) -> Result<Value, McpError> {
    match method {
        "initialize" => Ok(initialize(&params)),
        "ping" => Ok(json!({})),
        "tools/list" => {
            let tools = serde_json::to_value(tools::catalogue())
                .map_err(|e| McpError::Internal(e.to_string()))?;
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => call_tool(state, params).await,
        other => Err(McpError::MethodNotFound(other.to_string())),
    }
}

fn initialize(params: &Value) -> Value {
    let requested = params.get("protocolVersion").and_then(Value::as_str);
    let version = negotiate_protocol_version(requested);
    info!(?requested, version, "MCP 초기화");

    json!({
        "protocolVersion": version,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": INSTRUCTIONS
    })
}

async fn call_tool(state: &McpState, params: Value) -> Result<Value, McpError> {
    let params: CallToolParams = serde_json::from_value(params)?;
    let tool = Tool::from_name(&params.name)
        .ok_or_else(|| McpError::InvalidParams(format!("Unknown tool: {}", params.name)))?;
    let arguments = match params.arguments {
        None | Some(Value::Null) => json!({}),
        Some(arguments) => arguments,
    };

    let started = Instant::now();
    let result = match tool.call(&state.client, arguments).await {
        Ok(value) => {
            info!(
                tool = tool.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "도구 호출 완료"
            );
            CallToolResult::success(value)
        }
        Err(e) => {
            if e.is_input_error() {
                warn!(tool = tool.name(), error = %e, "도구 입력 거부");
            } else {
                error!(tool = tool.name(), error = %e, "도구 호출 실패");
            }
            CallToolResult::error(e.to_string())
        }
    };

    serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
}

//! JSON-RPC 2.0 / MCP 메시지 타입.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

pub const JSONRPC_VERSION: &str = "2.0";

/// 지원하는 MCP 프로토콜 버전 (최신 우선).
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const SERVER_NAME: &str = "KIS MCP Server";

/// 클라이언트가 보낸 단일 JSON-RPC 메시지.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// 메시지 분류.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// 응답이 필요한 요청
    Request { id: Value, method: String },
    /// id 없는 통지
    Notification { method: String },
    /// 서버가 보낸 요청에 대한 클라이언트 응답
    Response,
}

impl JsonRpcMessage {
    pub fn classify(&self) -> Result<MessageKind, McpError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(McpError::InvalidRequest(format!(
                "jsonrpc must be \"2.0\" (got {:?})",
                self.jsonrpc
            )));
        }

        match (&self.id, &self.method) {
            (Some(id), Some(method)) => Ok(MessageKind::Request {
                id: id.clone(),
                method: method.clone(),
            }),
            (None, Some(method)) => Ok(MessageKind::Notification {
                method: method.clone(),
            }),
            (Some(_), None) if self.result.is_some() || self.error.is_some() => {
                Ok(MessageKind::Response)
            }
            _ => Err(McpError::InvalidRequest(
                "message has neither method nor result".to_string(),
            )),
        }
    }
}

/// JSON-RPC 에러 객체.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 응답.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: &McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error.to_rpc_error()),
        }
    }
}

/// 클라이언트 요청 버전이 지원 목록에 있으면 그대로, 아니면 최신 버전으로 응답.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

// ==================== Tools ====================

/// `tools/list` 항목.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// `tools/call` 파라미터.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// `tools/call` 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    pub is_error: bool,
}

impl CallToolResult {
    /// 성공 결과. 객체 응답은 `structuredContent`에도 담습니다.
    pub fn success(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        let structured_content = value.is_object().then_some(value);
        Self {
            content: vec![Content::Text { text }],
            structured_content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: true,
        }
    }
}

//! KIS 거래 API를 MCP 도구로 노출하는 서버.
//!
//! - [`protocol`]: JSON-RPC 2.0 / MCP 메시지
//! - [`tools`]: 도구 카탈로그와 디스패치
//! - [`server`]: axum 라우터

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::ServerConfig;
pub use error::McpError;
pub use server::{create_router, McpState, SESSION_HEADER};
pub use tools::{Tool, ToolError};

//! 주문 요청 해시키 발급.
//!
//! 해시키는 주문 본문에 대한 서버 측 서명이므로 주문마다 새로 발급합니다.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::config::{Host, KisConfig};
use crate::error::{KisError, Result};

/// 해시키 발급 경로
pub const HASHKEY_PATH: &str = "/uapi/hashkey";

/// 주문 본문 서명자.
#[async_trait]
pub trait HashKeySigner: Send + Sync {
    /// `payload`에 대한 해시키 발급.
    async fn sign(&self, token: &str, payload: &Value) -> Result<String>;
}

/// `/uapi/hashkey` 엔드포인트를 사용하는 서명자.
pub struct HttpHashKeySigner {
    http: reqwest::Client,
    config: Arc<KisConfig>,
}

impl HttpHashKeySigner {
    pub fn new(http: reqwest::Client, config: Arc<KisConfig>) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl HashKeySigner for HttpHashKeySigner {
    async fn sign(&self, token: &str, payload: &Value) -> Result<String> {
        let url = format!(
            "{}{}",
            self.config.base_url(Host::ModeDependent),
            HASHKEY_PATH
        );

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .header("appkey", self.config.app_key())
            .header("appsecret", self.config.app_secret())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status != reqwest::StatusCode::OK {
            warn!(status = status.as_u16(), "해시키 발급 실패");
            return Err(KisError::HashKey(text));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| KisError::HashKey(format!("{}: {}", e, text)))?;

        body["HASH"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| KisError::HashKey(format!("No HASH in response: {}", text)))
    }
}

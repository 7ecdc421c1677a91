//! KIS 커넥터 에러 타입.

use thiserror::Error;

/// KIS API 호출 에러.
///
/// 도구 호출자에게는 `Display` 메시지 하나로 전달되므로
/// 업스트림 응답 본문은 메시지에 그대로 포함합니다.
#[derive(Debug, Error)]
pub enum KisError {
    /// 설정 누락 또는 잘못된 설정값
    #[error("설정 에러: {0}")]
    Config(String),

    /// 입력 검증 실패 (네트워크 호출 전에 거부됨)
    #[error("입력 검증 실패: {0}")]
    Validation(String),

    /// 토큰 발급 실패
    #[error("Failed to get token: {0}")]
    Authentication(String),

    /// 해시키 발급 실패
    #[error("Failed to get hash key: {0}")]
    HashKey(String),

    /// 업무 API가 200 이외의 상태를 반환
    #[error("{context} 실패 (HTTP {status}): {body}")]
    Api {
        context: &'static str,
        status: u16,
        body: String,
    },

    /// 전송 계층 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 응답 파싱 실패
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 토큰 파일 입출력 실패
    #[error("토큰 저장소 에러: {0}")]
    Storage(String),
}

impl KisError {
    /// 네트워크 호출 전에 거부된 입력 에러인지 확인.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<reqwest::Error> for KisError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, KisError>;

//! 환경변수 기반 KIS 설정.
//!
//! 계좌 모드(실전/모의)는 여기서 한 번 결정되어 명시적인 값으로
//! TR-ID/도메인 해석에 전달됩니다.

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use secrecy::{ExposeSecret, SecretString};

use crate::error::{KisError, Result};

/// 실전투자 도메인
pub const REAL_BASE_URL: &str = "https://openapi.koreainvestment.com:9443";
/// 모의투자 도메인
pub const VIRTUAL_BASE_URL: &str = "https://openapivts.koreainvestment.com:29443";

/// 계좌 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccountMode {
    /// 실전계좌
    #[default]
    Real,
    /// 모의계좌
    Virtual,
}

impl AccountMode {
    /// 환경변수 표기 (`REAL` / `VIRTUAL`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "REAL",
            Self::Virtual => "VIRTUAL",
        }
    }
}

impl FromStr for AccountMode {
    type Err = KisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "REAL" => Ok(Self::Real),
            "VIRTUAL" => Ok(Self::Virtual),
            other => Err(KisError::Config(format!(
                "KIS_ACCOUNT_TYPE 값이 올바르지 않습니다: {} (REAL 또는 VIRTUAL)",
                other
            ))),
        }
    }
}

impl fmt::Display for AccountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 요청이 향할 도메인 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    /// 계좌 모드와 무관하게 실전 도메인
    Production,
    /// 계좌 모드에 따라 실전/모의 도메인
    ModeDependent,
}

impl FromStr for Host {
    type Err = KisError;

    /// `KIS_TOKEN_HOST` 표기: `production` / `account`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "real" => Ok(Self::Production),
            "account" | "mode" => Ok(Self::ModeDependent),
            other => Err(KisError::Config(format!(
                "KIS_TOKEN_HOST 값이 올바르지 않습니다: {} (production 또는 account)",
                other
            ))),
        }
    }
}

/// KIS 접속 설정.
pub struct KisConfig {
    /// 앱 키
    pub app_key: SecretString,
    /// 앱 시크릿
    pub app_secret: SecretString,
    /// 종합계좌번호 (CANO, 8자리)
    pub account_no: String,
    /// 계좌상품코드 (ACNT_PRDT_CD)
    pub account_product_code: String,
    /// 계좌 모드
    pub mode: AccountMode,
    /// 실전 도메인
    pub real_base_url: String,
    /// 모의 도메인
    pub virtual_base_url: String,
    /// 토큰 저장 파일 경로
    pub token_path: PathBuf,
    /// 토큰 발급 도메인 (기본: 실전)
    pub token_host: Host,
    /// HTTP 요청 타임아웃
    pub request_timeout: Duration,
}

impl fmt::Debug for KisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KisConfig")
            .field("app_key", &"***")
            .field("app_secret", &"***")
            .field("account_no", &mask_account_no(&self.account_no))
            .field("account_product_code", &self.account_product_code)
            .field("mode", &self.mode)
            .field("real_base_url", &self.real_base_url)
            .field("virtual_base_url", &self.virtual_base_url)
            .field("token_path", &self.token_path)
            .field("token_host", &self.token_host)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl KisConfig {
    /// 기본 도메인으로 설정 생성.
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        account_no: impl Into<String>,
        mode: AccountMode,
    ) -> Self {
        Self {
            app_key: SecretString::from(app_key.into()),
            app_secret: SecretString::from(app_secret.into()),
            account_no: account_no.into(),
            account_product_code: "01".to_string(),
            mode,
            real_base_url: REAL_BASE_URL.to_string(),
            virtual_base_url: VIRTUAL_BASE_URL.to_string(),
            token_path: PathBuf::from("token.json"),
            token_host: Host::Production,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// 도메인 교체 (테스트 서버, 프록시).
    pub fn with_base_urls(mut self, real: impl Into<String>, virtual_: impl Into<String>) -> Self {
        self.real_base_url = trim_base_url(real.into());
        self.virtual_base_url = trim_base_url(virtual_.into());
        self
    }

    /// 토큰 파일 경로 설정.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// 토큰 발급 도메인 설정.
    ///
    /// 발급된 토큰은 시세 조회(실전 도메인)에도 사용되므로 기본값은 실전입니다.
    pub fn with_token_host(mut self, host: Host) -> Self {
        self.token_host = host;
        self
    }

    /// 토큰 발급 URL의 도메인.
    pub fn token_base_url(&self) -> &str {
        self.base_url(self.token_host)
    }

    /// 환경변수에서 설정 로드.
    ///
    /// `.env` 파일이 있으면 먼저 읽습니다.
    ///
    /// # Errors
    /// `KIS_APP_KEY`, `KIS_APP_SECRET`, `KIS_CANO` 중 하나라도 없으면
    /// `KisError::Config`를 반환합니다.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키-값 조회 함수로 설정 로드.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    KisError::Config(format!("{} 환경변수가 설정되지 않았습니다", key))
                })
        };

        let mode = match lookup("KIS_ACCOUNT_TYPE") {
            Some(v) if !v.trim().is_empty() => v.parse()?,
            _ => AccountMode::Real,
        };

        let mut config = Self::new(
            required("KIS_APP_KEY")?,
            required("KIS_APP_SECRET")?,
            required("KIS_CANO")?,
            mode,
        );

        if let Some(code) = lookup("KIS_ACNT_PRDT_CD").filter(|v| !v.is_empty()) {
            config.account_product_code = code;
        }
        if let Some(url) = lookup("KIS_REAL_URL").filter(|v| !v.is_empty()) {
            config.real_base_url = trim_base_url(url);
        }
        if let Some(url) = lookup("KIS_VIRTUAL_URL").filter(|v| !v.is_empty()) {
            config.virtual_base_url = trim_base_url(url);
        }
        if let Some(path) = lookup("KIS_TOKEN_FILE").filter(|v| !v.is_empty()) {
            config.token_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("KIS_TOKEN_HOST").filter(|v| !v.trim().is_empty()) {
            config.token_host = host.parse()?;
        }
        if let Some(secs) = lookup("KIS_REQUEST_TIMEOUT_SECS").filter(|v| !v.trim().is_empty()) {
            config.request_timeout = parse_timeout(&secs)?;
        }

        Ok(config)
    }

    /// 도메인 분류를 실제 URL로 변환.
    pub fn base_url(&self, host: Host) -> &str {
        match (host, self.mode) {
            (Host::Production, _) | (Host::ModeDependent, AccountMode::Real) => {
                &self.real_base_url
            }
            (Host::ModeDependent, AccountMode::Virtual) => &self.virtual_base_url,
        }
    }

    /// 앱 키 원문.
    pub fn app_key(&self) -> &str {
        self.app_key.expose_secret()
    }

    /// 앱 시크릿 원문.
    pub fn app_secret(&self) -> &str {
        self.app_secret.expose_secret()
    }
}

/// 요청 타임아웃 (양의 정수 초).
fn parse_timeout(value: &str) -> Result<Duration> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(KisError::Config(format!(
            "KIS_REQUEST_TIMEOUT_SECS 값이 올바르지 않습니다: {} (양의 정수 초)",
            value
        ))),
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// 계좌번호 마스킹 (앞 4자리만 노출).
fn mask_account_no(account_no: &str) -> String {
    let visible: String = account_no.chars().take(4).collect();
    format!("{}****", visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_account_mode_parse_is_case_insensitive() {
        assert_eq!("real".parse::<AccountMode>().unwrap(), AccountMode::Real);
        assert_eq!("Virtual".parse::<AccountMode>().unwrap(), AccountMode::Virtual);
        assert!("paper".parse::<AccountMode>().is_err());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = KisConfig::from_lookup(lookup_from(&[
            ("KIS_APP_KEY", "key"),
            ("KIS_APP_SECRET", "secret"),
            ("KIS_CANO", "12345678"),
        ]))
        .unwrap();

        assert_eq!(config.mode, AccountMode::Real);
        assert_eq!(config.account_product_code, "01");
        assert_eq!(config.real_base_url, REAL_BASE_URL);
        assert_eq!(config.token_path, PathBuf::from("token.json"));
        assert_eq!(config.token_host, Host::Production);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.app_key(), "key");
    }

    #[test]
    fn test_from_lookup_missing_credential() {
        let err = KisConfig::from_lookup(lookup_from(&[("KIS_APP_KEY", "key")])).unwrap_err();
        assert!(err.to_string().contains("KIS_APP_SECRET"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = KisConfig::from_lookup(lookup_from(&[
            ("KIS_APP_KEY", "key"),
            ("KIS_APP_SECRET", "secret"),
            ("KIS_CANO", "12345678"),
            ("KIS_ACCOUNT_TYPE", "virtual"),
            ("KIS_VIRTUAL_URL", "http://127.0.0.1:9000/"),
            ("KIS_ACNT_PRDT_CD", "22"),
        ]))
        .unwrap();

        assert_eq!(config.mode, AccountMode::Virtual);
        assert_eq!(config.virtual_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.account_product_code, "22");
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        for bad in ["ten", "0", "-5", "1.5"] {
            let err = KisConfig::from_lookup(lookup_from(&[
                ("KIS_APP_KEY", "key"),
                ("KIS_APP_SECRET", "secret"),
                ("KIS_CANO", "12345678"),
                ("KIS_REQUEST_TIMEOUT_SECS", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, KisError::Config(_)), "{}", bad);
            assert!(err.to_string().contains("KIS_REQUEST_TIMEOUT_SECS"));
        }

        let config = KisConfig::from_lookup(lookup_from(&[
            ("KIS_APP_KEY", "key"),
            ("KIS_APP_SECRET", "secret"),
            ("KIS_CANO", "12345678"),
            ("KIS_REQUEST_TIMEOUT_SECS", " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_token_host_defaults_to_production() {
        let virt = KisConfig::new("k", "s", "1", AccountMode::Virtual);
        assert_eq!(virt.token_base_url(), REAL_BASE_URL);

        let virt = virt.with_token_host(Host::ModeDependent);
        assert_eq!(virt.token_base_url(), VIRTUAL_BASE_URL);

        let config = KisConfig::from_lookup(lookup_from(&[
            ("KIS_APP_KEY", "key"),
            ("KIS_APP_SECRET", "secret"),
            ("KIS_CANO", "12345678"),
            ("KIS_ACCOUNT_TYPE", "VIRTUAL"),
            ("KIS_TOKEN_HOST", "Account"),
        ]))
        .unwrap();
        assert_eq!(config.token_host, Host::ModeDependent);

        let err = KisConfig::from_lookup(lookup_from(&[
            ("KIS_APP_KEY", "key"),
            ("KIS_APP_SECRET", "secret"),
            ("KIS_CANO", "12345678"),
            ("KIS_TOKEN_HOST", "vts"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("KIS_TOKEN_HOST"));
    }

    #[test]
    fn test_base_url_by_host_and_mode() {
        let real = KisConfig::new("k", "s", "1", AccountMode::Real);
        let virt = KisConfig::new("k", "s", "1", AccountMode::Virtual);

        assert_eq!(real.base_url(Host::Production), REAL_BASE_URL);
        assert_eq!(real.base_url(Host::ModeDependent), REAL_BASE_URL);
        assert_eq!(virt.base_url(Host::Production), REAL_BASE_URL);
        assert_eq!(virt.base_url(Host::ModeDependent), VIRTUAL_BASE_URL);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = KisConfig::new("my-app-key", "my-secret", "12345678", AccountMode::Real);
        let dbg = format!("{:?}", config);
        assert!(!dbg.contains("my-app-key"));
        assert!(!dbg.contains("my-secret"));
        assert!(dbg.contains("1234****"));
    }
}

//! MCP 서버 바인딩 설정.

use std::net::SocketAddr;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PATH: &str = "/mcp";

/// 서버 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// 바인딩할 호스트 주소
    pub host: String,
    /// 바인딩할 포트
    pub port: u16,
    /// MCP 엔드포인트 경로
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드 (`MCP_HOST`, `MCP_PORT`, `MCP_PATH`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let host = lookup("MCP_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);
        let port = lookup("MCP_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(defaults.port);

        let config = Self {
            host,
            port,
            path: defaults.path,
        };
        match lookup("MCP_PATH") {
            Some(path) => config.with_path(&path),
            None => config,
        }
    }

    /// CLI 인자로 덮어쓰기.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// 엔드포인트 경로 설정. 선행 `/`를 보장하고 후행 `/`는 제거합니다.
    pub fn with_path(mut self, path: &str) -> Self {
        let trimmed = path.trim().trim_matches('/');
        self.path = if trimmed.is_empty() {
            DEFAULT_PATH.to_string()
        } else {
            format!("/{}", trimmed)
        };
        self
    }

    /// 소켓 주소 반환.
    ///
    /// # Errors
    /// `host:port` 형식이 유효하지 않으면 `AddrParseError`를 반환합니다.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_env_and_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MCP_HOST", "127.0.0.1"),
            ("MCP_PORT", "not-a-port"),
            ("MCP_PATH", "kis/mcp/"),
        ]));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.path, "/kis/mcp");

        let config = config.with_overrides(None, Some(9000));
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_host() {
        let config = ServerConfig::default().with_overrides(Some("not a host".to_string()), None);
        assert!(config.socket_addr().is_err());
    }
}

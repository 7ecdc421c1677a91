//! 접근 토큰 캐시.
//!
//! KIS 접근 토큰은 약 24시간 유효하며 발급 빈도 제한이 있으므로
//! 단일 슬롯 저장소(파일)에 보관하고 만료 전까지 재사용합니다.
//!
//! # 구조
//!
//! ```text
//! TokenCache
//! ├── store:  Arc<dyn TokenStore>   // FileTokenStore | MemoryTokenStore
//! ├── issuer: Arc<dyn TokenIssuer>  // OAuthTokenIssuer (POST /oauth2/tokenP)
//! └── clock:  Arc<dyn Clock>        // SystemClock
//! ```
//!
//! # 동시성
//!
//! 조회-검사-갱신-저장 구간에 잠금이 없습니다. 만료 시점에 동시 호출이
//! 몰리면 각각 토큰을 발급받아 저장소를 덮어쓸 수 있으나, 업스트림은
//! 어느 쪽이든 유효한 토큰을 발급하므로 결과는 올바릅니다.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::KisConfig;
use crate::error::{KisError, Result};

/// 토큰 발급 경로
pub const TOKEN_PATH: &str = "/oauth2/tokenP";

/// 캐시 유효 시간 (시간). 업스트림 유효기간(약 24시간)보다 짧게 잡습니다.
pub const TOKEN_LIFETIME_HOURS: i64 = 23;

// ==================== AccessToken ====================

/// 저장된 접근 토큰.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// `now < expires_at`일 때만 사용 가능.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// ==================== Clock ====================

/// 현재 시각 제공자.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ==================== TokenStore ====================

/// 단일 슬롯 토큰 저장소.
pub trait TokenStore: Send + Sync {
    /// 저장된 토큰 조회. 없으면 `Ok(None)`.
    fn load(&self) -> Result<Option<AccessToken>>;

    /// 기존 토큰을 통째로 교체.
    fn save(&self, token: &AccessToken) -> Result<()>;

    /// 저장된 토큰 삭제.
    fn clear(&self) -> Result<()>;
}

/// JSON 파일 저장소.
///
/// 파일 형식: `{"token": "...", "expires_at": "2026-01-01T09:00:00Z"}`
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<AccessToken>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(KisError::Storage(format!(
                    "{} 읽기 실패: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&text).map(Some).map_err(|e| {
            KisError::Storage(format!("{} 파싱 실패: {}", self.path.display(), e))
        })
    }

    fn save(&self, token: &AccessToken) -> Result<()> {
        let body =
            serde_json::to_vec(token).map_err(|e| KisError::Storage(e.to_string()))?;

        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| KisError::Storage(e.to_string()))?;

        // 저장마다 고유한 임시 파일에 쓴 뒤 rename으로 교체
        let write_err =
            |e: std::io::Error| KisError::Storage(format!("{} 쓰기 실패: {}", self.path.display(), e));
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&body).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| {
            KisError::Storage(format!("{} 교체 실패: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KisError::Storage(e.to_string())),
        }
    }
}

/// 메모리 저장소 (프로세스 수명 동안만 유지).
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<AccessToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: AccessToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<AccessToken>> {
        self.slot
            .lock()
            .map(|slot| slot.clone())
            .map_err(|_| KisError::Storage("token slot poisoned".to_string()))
    }

    fn save(&self, token: &AccessToken) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| KisError::Storage("token slot poisoned".to_string()))?;
        *slot = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| KisError::Storage("token slot poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}

// ==================== TokenIssuer ====================

/// 토큰 발급자.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// 새 접근 토큰 발급.
    async fn issue(&self) -> Result<String>;
}

/// `client_credentials` 방식 OAuth 토큰 발급.
pub struct OAuthTokenIssuer {
    http: reqwest::Client,
    config: Arc<KisConfig>,
}

impl OAuthTokenIssuer {
    pub fn new(http: reqwest::Client, config: Arc<KisConfig>) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl TokenIssuer for OAuthTokenIssuer {
    async fn issue(&self) -> Result<String> {
        let url = format!("{}{}", self.config.token_base_url(), TOKEN_PATH);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&json!({
                "grant_type": "client_credentials",
                "appkey": self.config.app_key(),
                "appsecret": self.config.app_secret(),
            }))
            .send()
            .await
            .map_err(|e| KisError::Authentication(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| KisError::Authentication(e.to_string()))?;

        if status != reqwest::StatusCode::OK {
            warn!(status = status.as_u16(), "토큰 발급 실패");
            return Err(KisError::Authentication(text));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| KisError::Authentication(format!("{}: {}", e, text)))?;

        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| KisError::Authentication(format!("No access_token in response: {}", text)))
    }
}

// ==================== TokenCache ====================

/// 파일 기반 접근 토큰 캐시.
pub struct TokenCache {
    store: Arc<dyn TokenStore>,
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
    lifetime: TimeDelta,
}

impl TokenCache {
    /// 시스템 시계를 사용하는 캐시 생성.
    pub fn new(store: Arc<dyn TokenStore>, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            store,
            issuer,
            clock: Arc::new(SystemClock),
            lifetime: TimeDelta::hours(TOKEN_LIFETIME_HOURS),
        }
    }

    /// 시계 교체.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 유효한 접근 토큰 반환.
    ///
    /// 저장된 토큰이 유효하면 네트워크 호출 없이 반환하고, 없거나 만료되었으면
    /// 새로 발급받아 저장합니다. 저장소 에러는 로그만 남기고 캐시 미스로 취급합니다.
    ///
    /// # Errors
    /// 토큰 발급 실패 시 `KisError::Authentication`.
    pub async fn get(&self) -> Result<String> {
        let now = self.clock.now();

        match self.store.load() {
            Ok(Some(cached)) if cached.is_valid_at(now) => {
                debug!(expires_at = %cached.expires_at, "토큰 캐시 히트");
                return Ok(cached.token);
            }
            Ok(Some(cached)) => {
                debug!(expires_at = %cached.expires_at, "토큰 만료, 재발급");
            }
            Ok(None) => debug!("저장된 토큰 없음, 발급"),
            Err(e) => warn!(error = %e, "토큰 로드 실패, 재발급"),
        }

        let token = self.issuer.issue().await?;
        let issued_at = self.clock.now();
        let record = AccessToken {
            token,
            expires_at: issued_at + self.lifetime,
        };

        if let Err(e) = self.store.save(&record) {
            warn!(error = %e, "토큰 저장 실패 (다음 호출에서 재발급)");
        }

        info!(expires_at = %record.expires_at, "접근 토큰 발급 완료");
        Ok(record.token)
    }

    /// 저장된 토큰 삭제. 다음 `get()`은 재발급합니다.
    pub fn invalidate(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "토큰 삭제 실패");
        }
    }

    /// 현재 저장된 토큰 (유효성 무관).
    pub fn peek(&self) -> Option<AccessToken> {
        self.store.load().ok().flatten()
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(now)))
        }

        fn advance(&self, delta: TimeDelta) {
            let mut now = self.0.lock().unwrap();
            *now += delta;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct CountingIssuer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenIssuer for CountingIssuer {
        async fn issue(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{}", n))
        }
    }

    struct FailingIssuer;

    #[async_trait]
    impl TokenIssuer for FailingIssuer {
        async fn issue(&self) -> Result<String> {
            Err(KisError::Authentication(r#"{"error_code":"EGW00133"}"#.into()))
        }
    }

    /// 저장이 항상 실패하는 저장소
    struct ReadOnlyStore;

    impl TokenStore for ReadOnlyStore {
        fn load(&self) -> Result<Option<AccessToken>> {
            Ok(None)
        }
        fn save(&self, _token: &AccessToken) -> Result<()> {
            Err(KisError::Storage("read-only".into()))
        }
        fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_valid_cached_token_skips_issuer() {
        let store = Arc::new(MemoryTokenStore::with_token(AccessToken {
            token: "cached".into(),
            expires_at: t0() + TimeDelta::hours(1),
        }));
        let issuer = Arc::new(CountingIssuer::default());
        let cache = TokenCache::new(store, issuer.clone()).with_clock(FixedClock::at(t0()));

        assert_eq!(cache.get().await.unwrap(), "cached");
        assert_eq!(cache.get().await.unwrap(), "cached");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token_refreshes_once_and_persists_expiry() {
        let store = Arc::new(MemoryTokenStore::new());
        let issuer = Arc::new(CountingIssuer::default());
        let cache = TokenCache::new(store.clone(), issuer.clone()).with_clock(FixedClock::at(t0()));

        assert_eq!(cache.get().await.unwrap(), "token-1");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.token, "token-1");
        assert_eq!(saved.expires_at, t0() + TimeDelta::hours(23));

        // 유효기간 내 반복 호출은 재발급하지 않음
        for _ in 0..5 {
            assert_eq!(cache.get().await.unwrap(), "token-1");
        }
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_exclusive() {
        let clock = FixedClock::at(t0());
        let store = Arc::new(MemoryTokenStore::new());
        let issuer = Arc::new(CountingIssuer::default());
        let cache = TokenCache::new(store, issuer.clone()).with_clock(clock.clone());

        cache.get().await.unwrap();
        clock.advance(TimeDelta::hours(23) - TimeDelta::seconds(1));
        assert_eq!(cache.get().await.unwrap(), "token-1");

        // now == expires_at 이면 만료
        clock.advance(TimeDelta::seconds(1));
        assert_eq!(cache.get().await.unwrap(), "token-2");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let store = Arc::new(MemoryTokenStore::new());
        let issuer = Arc::new(CountingIssuer::default());
        let cache = TokenCache::new(store, issuer.clone()).with_clock(FixedClock::at(t0()));

        cache.get().await.unwrap();
        cache.invalidate();
        assert!(cache.peek().is_none());
        assert_eq!(cache.get().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_save_failure_degrades_to_refresh_every_call() {
        let issuer = Arc::new(CountingIssuer::default());
        let cache = TokenCache::new(Arc::new(ReadOnlyStore), issuer.clone())
            .with_clock(FixedClock::at(t0()));

        assert_eq!(cache.get().await.unwrap(), "token-1");
        assert_eq!(cache.get().await.unwrap(), "token-2");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_issuer_failure_propagates() {
        let cache = TokenCache::new(Arc::new(MemoryTokenStore::new()), Arc::new(FailingIssuer));
        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, KisError::Authentication(_)));
        assert!(err.to_string().contains("EGW00133"));
    }

    #[tokio::test]
    async fn test_corrupt_token_file_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        let store = Arc::new(FileTokenStore::new(&path));
        assert!(store.load().is_err());

        let issuer = Arc::new(CountingIssuer::default());
        let cache = TokenCache::new(store.clone(), issuer.clone()).with_clock(FixedClock::at(t0()));
        assert_eq!(cache.get().await.unwrap(), "token-1");

        // 재발급된 토큰으로 파일이 교체되고 임시 파일은 남지 않음
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.token, "token-1");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_saves_leave_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));

        for round in 0..50 {
            std::thread::scope(|scope| {
                for writer in 0..8 {
                    let store = &store;
                    scope.spawn(move || {
                        let token = AccessToken {
                            token: format!("token-{}-{}", round, writer),
                            expires_at: t0() + TimeDelta::hours(23),
                        };
                        store.save(&token).unwrap();
                    });
                }
            });

            let saved = store.load().unwrap().unwrap();
            assert!(saved.token.starts_with(&format!("token-{}-", round)));
        }

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_file_store_missing_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token.json"));
        assert_eq!(store.load().unwrap(), None);

        let token = AccessToken {
            token: "abc".into(),
            expires_at: t0(),
        };
        store.save(&token).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["token"], "abc");
        assert!(raw["expires_at"].as_str().unwrap().starts_with("2026-03-02T00:00:00"));

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}

//! 한국투자증권(KIS) Open API 커넥터.
//!
//! - [`config`]: 환경변수 기반 설정, 계좌 모드
//! - [`tr_id`]: 작업별 TR-ID / 도메인 라우팅
//! - [`market`]: 해외 거래소 코드
//! - [`token`]: 파일 기반 접근 토큰 캐시
//! - [`hashkey`]: 주문 본문 해시키 서명
//! - [`client`]: 도구별 REST 호출

pub mod client;
pub mod config;
pub mod error;
pub mod hashkey;
pub mod market;
pub mod request;
pub mod token;
pub mod tr_id;

pub use client::KisClient;
pub use config::{AccountMode, Host, KisConfig};
pub use error::{KisError, Result};
pub use hashkey::{HashKeySigner, HttpHashKeySigner};
pub use market::MarketCode;
pub use request::{OrderRequest, OverseasOrderRequest};
pub use token::{
    AccessToken, Clock, FileTokenStore, MemoryTokenStore, OAuthTokenIssuer, SystemClock,
    TokenCache, TokenIssuer, TokenStore,
};
pub use tr_id::{resolve, resolve_host, Operation, OrderSide, Region};

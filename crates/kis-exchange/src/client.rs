//! KIS REST 클라이언트.
//!
//! 도구 하나당 메서드 하나이며, 각 호출은 독립적인 단일 HTTP 왕복입니다.
//!
//! ```text
//! 입력 검증 → (tr_id, 도메인) 결정 → 토큰 (캐시/발급)
//!          → [현금주문만] 해시키 → 업무 API 호출 → JSON 본문 반환
//! ```
//!
//! 응답 본문은 필드명 변환 없이 그대로 반환합니다.
//! 200 이외의 응답은 원문 본문을 담은 에러가 되며 재시도하지 않습니다.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::KisConfig;
use crate::error::{KisError, Result};
use crate::hashkey::{HashKeySigner, HttpHashKeySigner};
use crate::market::MarketCode;
use crate::request::{
    validate_date, validate_date_range, validate_symbol, OrderRequest, OverseasOrderRequest,
};
use crate::token::{FileTokenStore, OAuthTokenIssuer, TokenCache};
use crate::tr_id::Operation;

// ==================== API 경로 ====================

/// 주식현재가 시세
pub const STOCK_PRICE_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-price";
/// 주식잔고조회
pub const BALANCE_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-balance";
/// 주식주문(현금)
pub const ORDER_PATH: &str = "/uapi/domestic-stock/v1/trading/order-cash";
/// 주식일별주문체결조회
pub const ORDER_LIST_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-daily-ccld";
/// 주문체결내역조회
pub const ORDER_DETAIL_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-ccnl";
/// 주식현재가 일자별
pub const STOCK_INFO_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-daily-price";
/// 국내주식기간별시세(일/주/월/년)
pub const STOCK_HISTORY_PATH: &str =
    "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice";
/// 주식현재가 호가/예상체결
pub const STOCK_ASK_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-asking-price-exp-ccn";
/// 해외주식 현재체결가
pub const OVERSEAS_STOCK_PRICE_PATH: &str = "/uapi/overseas-price/v1/quotations/price";
/// 해외주식 주문
pub const OVERSEAS_ORDER_PATH: &str = "/uapi/overseas-stock/v1/trading/order";

/// 주식 시장 분류 (J: 주식/ETF/ETN)
const MARKET_DIV_STOCK: &str = "J";

/// KIS REST 클라이언트.
///
/// 토큰 캐시와 해시키 서명자는 생성 시 주입되며 여러 호출이 공유합니다.
pub struct KisClient {
    http: reqwest::Client,
    config: Arc<KisConfig>,
    tokens: Arc<TokenCache>,
    signer: Arc<dyn HashKeySigner>,
}

impl KisClient {
    /// 설정으로 클라이언트 생성.
    ///
    /// 토큰은 `config.token_path` 파일에 저장됩니다.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성 실패 시 `KisError::Network`.
    pub fn new(config: KisConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let config = Arc::new(config);

        let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
        let issuer = Arc::new(OAuthTokenIssuer::new(http.clone(), Arc::clone(&config)));
        let tokens = Arc::new(TokenCache::new(store, issuer));
        let signer = Arc::new(HttpHashKeySigner::new(http.clone(), Arc::clone(&config)));

        Ok(Self::with_parts(http, config, tokens, signer))
    }

    /// 구성 요소를 직접 주입하여 생성.
    pub fn with_parts(
        http: reqwest::Client,
        config: Arc<KisConfig>,
        tokens: Arc<TokenCache>,
        signer: Arc<dyn HashKeySigner>,
    ) -> Self {
        Self {
            http,
            config,
            tokens,
            signer,
        }
    }

    // ========================================
    // 시세 조회
    // ========================================

    /// 주식 현재가 조회 (`output` 객체만 반환).
    pub async fn inquire_price(&self, symbol: &str) -> Result<Value> {
        let symbol = validate_symbol(symbol)?;
        let params = [
            ("fid_cond_mrkt_div_code", MARKET_DIV_STOCK.to_string()),
            ("fid_input_iscd", symbol),
        ];
        let mut body = self
            .send(Operation::Price, STOCK_PRICE_PATH, Payload::Query(&params), "주식 현재가 조회")
            .await?;

        let output = body.get_mut("output").map(Value::take).unwrap_or(Value::Null);
        if output.is_null() {
            return Err(KisError::Parse(format!("응답에 output 필드가 없습니다: {}", body)));
        }
        Ok(output)
    }

    /// 일별 주가 조회.
    pub async fn inquire_daily_price(
        &self,
        symbol: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<Value> {
        let params = daily_chart_params(symbol, start_date, end_date)?;
        self.send(Operation::StockInfo, STOCK_INFO_PATH, Payload::Query(&params), "일별 주가 조회")
            .await
    }

    /// 기간별 시세 조회 (차트용 일봉).
    pub async fn inquire_daily_itemchartprice(
        &self,
        symbol: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<Value> {
        let params = daily_chart_params(symbol, start_date, end_date)?;
        self.send(
            Operation::StockHistory,
            STOCK_HISTORY_PATH,
            Payload::Query(&params),
            "주식 일별 시세 조회",
        )
        .await
    }

    /// 호가 조회.
    pub async fn inquire_asking_price(&self, symbol: &str) -> Result<Value> {
        let symbol = validate_symbol(symbol)?;
        let params = [
            ("FID_COND_MRKT_DIV_CODE", MARKET_DIV_STOCK.to_string()),
            ("FID_INPUT_ISCD", symbol),
        ];
        self.send(Operation::StockAsk, STOCK_ASK_PATH, Payload::Query(&params), "주식 호가 조회")
            .await
    }

    /// 해외주식 현재체결가 조회.
    pub async fn inquire_overseas_price(&self, symbol: &str, market: &str) -> Result<Value> {
        let market = MarketCode::parse(market)?;
        let symbol = validate_symbol(symbol)?.to_uppercase();
        let params = [
            ("AUTH", String::new()),
            ("EXCD", market.quote_exchange_code().to_string()),
            ("SYMB", symbol),
        ];
        self.send(
            Operation::OverseasPrice,
            OVERSEAS_STOCK_PRICE_PATH,
            Payload::Query(&params),
            "해외주식 현재가 조회",
        )
        .await
    }

    // ========================================
    // 계좌
    // ========================================

    /// 주식 잔고 조회.
    pub async fn inquire_balance(&self) -> Result<Value> {
        let mut params = self.account_params();
        params.extend([
            ("AFHR_FLPR_YN", "N".to_string()),
            ("INQR_DVSN", "01".to_string()),
            ("UNPR_DVSN", "01".to_string()),
            ("FUND_STTL_ICLD_YN", "N".to_string()),
            ("FNCG_AMT_AUTO_RDPT_YN", "N".to_string()),
            ("PRCS_DVSN", "00".to_string()),
            ("CTX_AREA_FK100", String::new()),
            ("CTX_AREA_NK100", String::new()),
            ("OFL_YN", String::new()),
        ]);
        self.send(Operation::Balance, BALANCE_PATH, Payload::Query(&params), "잔고 조회")
            .await
    }

    /// 일별 주문체결 조회.
    pub async fn inquire_daily_ccld(&self, start_date: &str, end_date: &str) -> Result<Value> {
        let (start, end) = validate_date_range(start_date, end_date)?;
        let mut params = self.account_params();
        params.extend([
            ("INQR_STRT_DT", start),
            ("INQR_END_DT", end),
            ("SLL_BUY_DVSN_CD", "00".to_string()),
            ("INQR_DVSN", "00".to_string()),
            ("PDNO", String::new()),
            ("CCLD_DVSN", "00".to_string()),
            ("ORD_GNO_BRNO", String::new()),
            ("ODNO", String::new()),
            ("INQR_DVSN_3", "00".to_string()),
            ("INQR_DVSN_1", String::new()),
            ("CTX_AREA_FK100", String::new()),
            ("CTX_AREA_NK100", String::new()),
        ]);
        self.send(Operation::OrderList, ORDER_LIST_PATH, Payload::Query(&params), "주문 목록 조회")
            .await
    }

    /// 주문체결 상세 조회.
    ///
    /// `order_no`가 비어 있으면 해당 일자의 전체 주문을 조회합니다.
    pub async fn inquire_order_detail(&self, order_no: &str, order_date: &str) -> Result<Value> {
        let date = validate_date("order_date", order_date)?;
        let mut params = self.account_params();
        params.extend([
            ("INQR_DVSN", "00".to_string()),
            ("PDNO", String::new()),
            ("ORD_STRT_DT", date.clone()),
            ("ORD_END_DT", date),
            ("SLL_BUY_DVSN_CD", "00".to_string()),
            ("CCLD_DVSN", "00".to_string()),
            ("ORD_GNO_BRNO", String::new()),
            ("ODNO", order_no.trim().to_string()),
            ("INQR_DVSN_3", "00".to_string()),
            ("INQR_DVSN_1", String::new()),
            ("CTX_AREA_FK100", String::new()),
            ("CTX_AREA_NK100", String::new()),
        ]);
        self.send(
            Operation::OrderDetail,
            ORDER_DETAIL_PATH,
            Payload::Query(&params),
            "주문 상세 조회",
        )
        .await
    }

    // ========================================
    // 주문
    // ========================================

    /// 국내 현금주문 (해시키 서명 포함).
    pub async fn order_cash(&self, order: &OrderRequest) -> Result<Value> {
        let body = json!({
            "CANO": self.config.account_no,
            "ACNT_PRDT_CD": self.config.account_product_code,
            "PDNO": order.symbol,
            "ORD_DVSN": order.order_division(),
            "ORD_QTY": order.quantity.to_string(),
            "ORD_UNPR": order.price.to_string(),
        });

        info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            market_order = order.is_market_order(),
            "주식 주문 전송"
        );

        self.send(
            Operation::cash_order(order.side),
            ORDER_PATH,
            Payload::SignedJson(&body),
            "주식 주문",
        )
        .await
    }

    /// 해외주식 주문.
    pub async fn order_overseas(&self, order: &OverseasOrderRequest) -> Result<Value> {
        let body = json!({
            "CANO": self.config.account_no,
            "ACNT_PRDT_CD": self.config.account_product_code,
            "OVRS_EXCG_CD": order.market.as_str(),
            "PDNO": order.symbol,
            "ORD_QTY": order.quantity.to_string(),
            "OVRS_ORD_UNPR": order.price.to_string(),
            "ORD_SVR_DVSN_CD": "0",
            "ORD_DVSN": order.order_division(),
        });

        info!(
            symbol = %order.symbol,
            market = %order.market,
            exchange = order.market.description(),
            side = %order.side,
            quantity = order.quantity,
            price = %order.price,
            "해외주식 주문 전송"
        );

        self.send(
            Operation::OverseasOrder(order.region(), order.side),
            OVERSEAS_ORDER_PATH,
            Payload::Json(&body),
            "해외주식 주문",
        )
        .await
    }

    // ========================================
    // 내부
    // ========================================

    fn account_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("CANO", self.config.account_no.clone()),
            ("ACNT_PRDT_CD", self.config.account_product_code.clone()),
        ]
    }

    fn authorized(
        &self,
        method: Method,
        url: &str,
        token: &str,
        tr_id: &str,
    ) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .header("appkey", self.config.app_key())
            .header("appsecret", self.config.app_secret())
            .header("tr_id", tr_id)
    }

    /// 단일 업무 API 호출.
    async fn send(
        &self,
        operation: Operation,
        path: &str,
        payload: Payload<'_>,
        context: &'static str,
    ) -> Result<Value> {
        let tr_id = operation.tr_id(self.config.mode);
        let url = format!("{}{}", self.config.base_url(operation.host()), path);
        let token = self.tokens.get().await?;

        debug!(operation = %operation, tr_id, url = %url, "KIS 요청");

        let request = match payload {
            Payload::Query(params) => self
                .authorized(Method::GET, &url, &token, tr_id)
                .query(params),
            Payload::Json(body) => self
                .authorized(Method::POST, &url, &token, tr_id)
                .json(body),
            Payload::SignedJson(body) => {
                let hashkey = self.signer.sign(&token, body).await?;
                self.authorized(Method::POST, &url, &token, tr_id)
                    .header("hashkey", hashkey)
                    .json(body)
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status != StatusCode::OK {
            warn!(operation = %operation, tr_id, status = status.as_u16(), "{} 실패", context);
            return Err(KisError::Api {
                context,
                status: status.as_u16(),
                body: text,
            });
        }

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                if payload.is_mutating() {
                    // 업스트림에서 주문이 접수되었을 수 있으므로 원문을 남깁니다
                    error!(operation = %operation, tr_id, body = %text, "주문 응답 파싱 실패");
                }
                return Err(KisError::Parse(format!("{}: {} (body: {})", context, e, text)));
            }
        };

        if let Some(rt_cd) = body.get("rt_cd").and_then(Value::as_str) {
            if rt_cd != "0" {
                let msg_cd = body.get("msg_cd").and_then(Value::as_str).unwrap_or_default();
                let msg1 = body.get("msg1").and_then(Value::as_str).unwrap_or_default();
                warn!(operation = %operation, tr_id, rt_cd, msg_cd, msg1, "KIS 업무 오류 응답");
            }
        }

        Ok(body)
    }
}

impl std::fmt::Debug for KisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KisClient")
            .field("config", &self.config)
            .finish()
    }
}

/// 요청 본문 형태.
#[derive(Clone, Copy)]
enum Payload<'a> {
    /// GET + 쿼리 파라미터
    Query(&'a [(&'a str, String)]),
    /// POST + JSON 본문
    Json(&'a Value),
    /// POST + JSON 본문 + 해시키 헤더
    SignedJson(&'a Value),
}

impl Payload<'_> {
    fn is_mutating(&self) -> bool {
        !matches!(self, Self::Query(_))
    }
}

fn daily_chart_params(
    symbol: &str,
    start_date: &str,
    end_date: &str,
) -> Result<Vec<(&'static str, String)>> {
    let symbol = validate_symbol(symbol)?;
    let (start, end) = validate_date_range(start_date, end_date)?;
    Ok(vec![
        ("FID_COND_MRKT_DIV_CODE", MARKET_DIV_STOCK.to_string()),
        ("FID_INPUT_ISCD", symbol),
        ("FID_INPUT_DATE_1", start),
        ("FID_INPUT_DATE_2", end),
        ("FID_PERIOD_DIV_CODE", "D".to_string()),
        ("FID_ORG_ADJ_PRC", "0".to_string()),
    ])
}

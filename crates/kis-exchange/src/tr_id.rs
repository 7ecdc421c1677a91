//! TR-ID / 도메인 라우팅 테이블.
//!
//! KIS API는 동일한 엔드포인트라도 `tr_id` 헤더로 거래 유형을 구분하며,
//! 실전/모의 계좌마다 코드가 다릅니다.
//!
//! ```text
//! Operation ──┬── tr_id(op, mode)  → "TTTC0802U" / "VTTC0802U"
//!             └── host(op)         → Production | ModeDependent
//! ```
//!
//! 시세 조회(현재가, 일별주가, 차트, 호가)는 실전/모의 구분 없이
//! 같은 TR-ID와 실전 도메인을 사용합니다.

use std::fmt;

use crate::config::{AccountMode, Host, KisConfig};
use crate::error::{KisError, Result};

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// 대소문자 구분 없이 `buy` / `sell` 파싱.
    ///
    /// 그 외 값은 네트워크 호출 전에 `KisError::Validation`으로 거부합니다.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(KisError::Validation(format!(
                "order_type must be either \"buy\" or \"sell\" (got {:?})",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 해외주식 주문 지역 (TR-ID 접두어 단위).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// 미국 (나스닥, 뉴욕, 아멕스)
    Us,
    /// 일본
    Jp,
    /// 중국 상해
    Sh,
    /// 홍콩
    Hk,
    /// 중국 심천
    Sz,
    /// 베트남 (하노이, 호치민)
    Vn,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Us,
        Region::Jp,
        Region::Sh,
        Region::Hk,
        Region::Sz,
        Region::Vn,
    ];

    /// TR-ID 키 접두어.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Jp => "jp",
            Self::Sh => "sh",
            Self::Hk => "hk",
            Self::Sz => "sz",
            Self::Vn => "vn",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.prefix() == prefix)
    }
}

/// KIS API 작업 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// 잔고조회
    Balance,
    /// 현재가조회
    Price,
    /// 주식매수
    Buy,
    /// 주식매도
    Sell,
    /// 일별주문체결조회
    OrderList,
    /// 주문체결내역조회
    OrderDetail,
    /// 일별주가조회
    StockInfo,
    /// 주식일별주가조회 (차트)
    StockHistory,
    /// 주식호가조회
    StockAsk,
    /// 해외주식 주문
    OverseasOrder(Region, OrderSide),
    /// 해외주식 현재체결가
    OverseasPrice,
}

impl Operation {
    /// 국내 현금주문 작업.
    pub fn cash_order(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Self::Buy,
            OrderSide::Sell => Self::Sell,
        }
    }

    /// 문자열 키 (`"balance"`, `"us_buy"` 등).
    pub fn key(&self) -> String {
        match self {
            Self::Balance => "balance".into(),
            Self::Price => "price".into(),
            Self::Buy => "buy".into(),
            Self::Sell => "sell".into(),
            Self::OrderList => "order_list".into(),
            Self::OrderDetail => "order_detail".into(),
            Self::StockInfo => "stock_info".into(),
            Self::StockHistory => "stock_history".into(),
            Self::StockAsk => "stock_ask".into(),
            Self::OverseasOrder(region, side) => format!("{}_{}", region.prefix(), side),
            Self::OverseasPrice => "overseas_price".into(),
        }
    }

    /// 문자열 키로 작업 조회.
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key {
            "balance" => Self::Balance,
            "price" => Self::Price,
            "buy" => Self::Buy,
            "sell" => Self::Sell,
            "order_list" => Self::OrderList,
            "order_detail" => Self::OrderDetail,
            "stock_info" => Self::StockInfo,
            "stock_history" => Self::StockHistory,
            "stock_ask" => Self::StockAsk,
            "overseas_price" => Self::OverseasPrice,
            other => {
                let (prefix, side) = other.split_once('_')?;
                let side = match side {
                    "buy" => OrderSide::Buy,
                    "sell" => OrderSide::Sell,
                    _ => return None,
                };
                Self::OverseasOrder(Region::from_prefix(prefix)?, side)
            }
        };
        Some(op)
    }

    /// 요청 도메인 분류.
    pub fn host(&self) -> Host {
        match self {
            Self::Price | Self::StockInfo | Self::StockHistory | Self::StockAsk => {
                Host::Production
            }
            Self::Balance
            | Self::Buy
            | Self::Sell
            | Self::OrderList
            | Self::OrderDetail
            | Self::OverseasOrder(..)
            | Self::OverseasPrice => Host::ModeDependent,
        }
    }

    /// 계좌 모드별 TR-ID.
    pub fn tr_id(&self, mode: AccountMode) -> &'static str {
        use AccountMode::{Real, Virtual};
        use OrderSide::{Buy, Sell};

        match (self, mode) {
            (Self::Balance, Real) => "TTTC8434R",
            (Self::Balance, Virtual) => "VTTC8434R",
            (Self::Buy, Real) => "TTTC0802U",
            (Self::Buy, Virtual) => "VTTC0802U",
            (Self::Sell, Real) => "TTTC0801U",
            (Self::Sell, Virtual) => "VTTC0801U",
            (Self::OrderList, Real) => "TTTC8001R",
            (Self::OrderList, Virtual) => "VTTC8001R",
            (Self::OrderDetail, Real) => "TTTC8036R",
            (Self::OrderDetail, Virtual) => "VTTC8036R",

            // 시세 조회는 실전/모의 공통
            (Self::Price, _) => "FHKST01010100",
            (Self::StockInfo, _) => "FHKST01010400",
            (Self::StockHistory, _) => "FHKST03010200",
            (Self::StockAsk, _) => "FHKST01010200",
            (Self::OverseasPrice, _) => "HHDFS00000300",

            (Self::OverseasOrder(region, side), Real) => match (region, side) {
                (Region::Us, Buy) => "TTTT1002U",
                (Region::Us, Sell) => "TTTT1006U",
                (Region::Jp, Buy) => "TTTS0308U",
                (Region::Jp, Sell) => "TTTS0307U",
                (Region::Sh, Buy) => "TTTS0202U",
                (Region::Sh, Sell) => "TTTS1005U",
                (Region::Hk, Buy) => "TTTS1002U",
                (Region::Hk, Sell) => "TTTS1001U",
                (Region::Sz, Buy) => "TTTS0305U",
                (Region::Sz, Sell) => "TTTS0304U",
                (Region::Vn, Buy) => "TTTS0311U",
                (Region::Vn, Sell) => "TTTS0310U",
            },
            (Self::OverseasOrder(region, side), Virtual) => match (region, side) {
                (Region::Us, Buy) => "VTTT1002U",
                (Region::Us, Sell) => "VTTT1001U",
                (Region::Jp, Buy) => "VTTS0308U",
                (Region::Jp, Sell) => "VTTS0307U",
                (Region::Sh, Buy) => "VTTS0202U",
                (Region::Sh, Sell) => "VTTS1005U",
                (Region::Hk, Buy) => "VTTS1002U",
                (Region::Hk, Sell) => "VTTS1001U",
                (Region::Sz, Buy) => "VTTS0305U",
                (Region::Sz, Sell) => "VTTS0304U",
                (Region::Vn, Buy) => "VTTS0311U",
                (Region::Vn, Sell) => "VTTS0310U",
            },
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// 문자열 키로 TR-ID 조회.
///
/// 알 수 없는 키는 설정 오류이므로 재시도 대상이 아닙니다.
pub fn resolve(operation: &str, mode: AccountMode) -> Result<&'static str> {
    Operation::from_key(operation)
        .map(|op| op.tr_id(mode))
        .ok_or_else(|| KisError::Config(format!("Invalid operation type: {}", operation)))
}

/// 작업과 설정으로 요청 도메인 URL 결정.
pub fn resolve_host(operation: Operation, config: &KisConfig) -> &str {
    config.base_url(operation.host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{REAL_BASE_URL, VIRTUAL_BASE_URL};

    const QUOTES: [Operation; 4] = [
        Operation::Price,
        Operation::StockInfo,
        Operation::StockHistory,
        Operation::StockAsk,
    ];

    const ACCOUNT_OPS: [Operation; 5] = [
        Operation::Balance,
        Operation::Buy,
        Operation::Sell,
        Operation::OrderList,
        Operation::OrderDetail,
    ];

    #[test]
    fn test_quote_operations_always_hit_production() {
        for mode in [AccountMode::Real, AccountMode::Virtual] {
            let config = KisConfig::new("k", "s", "1", mode);
            for op in QUOTES {
                assert_eq!(resolve_host(op, &config), REAL_BASE_URL, "{} / {}", op, mode);
            }
        }
    }

    #[test]
    fn test_account_operations_follow_mode() {
        let real = KisConfig::new("k", "s", "1", AccountMode::Real);
        let virt = KisConfig::new("k", "s", "1", AccountMode::Virtual);
        for op in ACCOUNT_OPS {
            assert_eq!(resolve_host(op, &real), REAL_BASE_URL, "{}", op);
            assert_eq!(resolve_host(op, &virt), VIRTUAL_BASE_URL, "{}", op);
        }
    }

    #[test]
    fn test_quote_tr_ids_shared_between_modes() {
        for op in QUOTES {
            assert_eq!(op.tr_id(AccountMode::Real), op.tr_id(AccountMode::Virtual));
        }
    }

    #[test]
    fn test_account_tr_ids_differ_between_modes() {
        for op in ACCOUNT_OPS {
            let real = op.tr_id(AccountMode::Real);
            let virt = op.tr_id(AccountMode::Virtual);
            assert!(real.starts_with('T'), "{}", real);
            assert!(virt.starts_with('V'), "{}", virt);
            assert_eq!(&real[1..], &virt[1..]);
        }
    }

    #[test]
    fn test_overseas_tr_ids_distinct_per_mode() {
        for region in Region::ALL {
            for side in [OrderSide::Buy, OrderSide::Sell] {
                let op = Operation::OverseasOrder(region, side);
                assert_ne!(op.tr_id(AccountMode::Real), op.tr_id(AccountMode::Virtual));
            }
        }
        // 미국 매도는 실전/모의 코드 번호가 다름
        let us_sell = Operation::OverseasOrder(Region::Us, OrderSide::Sell);
        assert_eq!(us_sell.tr_id(AccountMode::Real), "TTTT1006U");
        assert_eq!(us_sell.tr_id(AccountMode::Virtual), "VTTT1001U");
    }

    #[test]
    fn test_key_roundtrip_for_every_operation() {
        let mut ops = vec![Operation::OverseasPrice];
        ops.extend(QUOTES);
        ops.extend(ACCOUNT_OPS);
        for region in Region::ALL {
            ops.push(Operation::OverseasOrder(region, OrderSide::Buy));
            ops.push(Operation::OverseasOrder(region, OrderSide::Sell));
        }
        for op in ops {
            assert_eq!(Operation::from_key(&op.key()), Some(op));
        }
    }

    #[test]
    fn test_resolve_by_key() {
        assert_eq!(resolve("buy", AccountMode::Real).unwrap(), "TTTC0802U");
        assert_eq!(resolve("jp_sell", AccountMode::Virtual).unwrap(), "VTTS0307U");

        let err = resolve("uk_buy", AccountMode::Real).unwrap_err();
        assert!(err.to_string().contains("uk_buy"));
        assert!(resolve("us_hold", AccountMode::Real).is_err());
    }

    #[test]
    fn test_order_side_normalization() {
        for input in ["BUY", "Buy", "buy", " buy "] {
            let side = OrderSide::parse(input).unwrap();
            assert_eq!(
                Operation::cash_order(side).tr_id(AccountMode::Real),
                "TTTC0802U"
            );
        }
        assert_eq!(OrderSide::parse("SeLL").unwrap(), OrderSide::Sell);

        for bad in ["hold", "", "b", "buy!"] {
            assert!(OrderSide::parse(bad).unwrap_err().is_validation(), "{}", bad);
        }
    }
}

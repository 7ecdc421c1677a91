//! 도구 입력 검증 및 주문 요청 타입.
//!
//! 모든 검증은 네트워크 호출 전에 수행됩니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{KisError, Result};
use crate::market::MarketCode;
use crate::tr_id::{OrderSide, Region};

/// 국내 현금주문 요청.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub quantity: u64,
    /// 주문단가 (0이면 시장가)
    pub price: Decimal,
    pub side: OrderSide,
}

impl OrderRequest {
    /// 원시 입력으로 주문 요청 생성.
    pub fn new(symbol: &str, quantity: u64, price: Decimal, side: &str) -> Result<Self> {
        let side = OrderSide::parse(side)?;
        Ok(Self {
            symbol: validate_symbol(symbol)?,
            quantity: validate_quantity(quantity)?,
            price: validate_price(price)?,
            side,
        })
    }

    pub fn is_market_order(&self) -> bool {
        self.price.is_zero()
    }

    /// 주문구분 (ORD_DVSN): `01` 시장가, `00` 지정가.
    pub fn order_division(&self) -> &'static str {
        order_division(self.is_market_order())
    }
}

/// 해외주식 주문 요청.
#[derive(Debug, Clone, PartialEq)]
pub struct OverseasOrderRequest {
    pub symbol: String,
    pub quantity: u64,
    /// 주문단가 (0이면 시장가)
    pub price: Decimal,
    pub side: OrderSide,
    pub market: MarketCode,
}

impl OverseasOrderRequest {
    /// 원시 입력으로 해외 주문 요청 생성.
    pub fn new(
        symbol: &str,
        quantity: u64,
        price: Decimal,
        side: &str,
        market: &str,
    ) -> Result<Self> {
        let side = OrderSide::parse(side)?;
        let market = MarketCode::parse(market)?;
        Ok(Self {
            symbol: validate_symbol(symbol)?.to_uppercase(),
            quantity: validate_quantity(quantity)?,
            price: validate_price(price)?,
            side,
            market,
        })
    }

    pub fn region(&self) -> Region {
        self.market.region()
    }

    pub fn is_market_order(&self) -> bool {
        self.price.is_zero()
    }

    pub fn order_division(&self) -> &'static str {
        order_division(self.is_market_order())
    }
}

fn order_division(market_order: bool) -> &'static str {
    if market_order {
        "01"
    } else {
        "00"
    }
}

/// 종목코드 검증 (공백 제거, 빈 값 거부).
pub fn validate_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(KisError::Validation("symbol must not be empty".to_string()));
    }
    Ok(symbol.to_string())
}

fn validate_quantity(quantity: u64) -> Result<u64> {
    if quantity == 0 {
        return Err(KisError::Validation("quantity must be positive".to_string()));
    }
    Ok(quantity)
}

fn validate_price(price: Decimal) -> Result<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(KisError::Validation(format!(
            "price must not be negative (got {})",
            price
        )));
    }
    Ok(price.normalize())
}

/// `YYYYMMDD` 날짜 검증.
pub fn validate_date(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    let well_formed = value.len() == 8 && value.chars().all(|c| c.is_ascii_digit());
    if !well_formed || NaiveDate::parse_from_str(value, "%Y%m%d").is_err() {
        return Err(KisError::Validation(format!(
            "{} must be a YYYYMMDD date (got {:?})",
            field, value
        )));
    }
    Ok(value.to_string())
}

/// 시작일/종료일 검증.
pub fn validate_date_range(start_date: &str, end_date: &str) -> Result<(String, String)> {
    let start = validate_date("start_date", start_date)?;
    let end = validate_date("end_date", end_date)?;
    // YYYYMMDD는 사전순 = 날짜순
    if start > end {
        return Err(KisError::Validation(format!(
            "start_date {} is after end_date {}",
            start, end
        )));
    }
    Ok((start, end))
}

//! MCP 도구 카탈로그와 디스패치.
//!
//! 도구 이름은 기존 클라이언트 호환을 위해 `inquery-*` 표기를 유지합니다.

use kis_exchange::{KisClient, KisError, OrderRequest, OverseasOrderRequest};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::protocol::ToolDefinition;

/// 도구 실행 에러. `isError` 결과로 변환됩니다.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error(transparent)]
    Kis(#[from] KisError),
}

impl ToolError {
    /// 네트워크 호출 전에 거부된 입력인지 여부.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::InvalidArguments(_) => true,
            Self::Kis(e) => e.is_validation(),
        }
    }
}

// ==================== 파라미터 ====================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SymbolParams {
    #[schemars(description = "Stock symbol (e.g. '005930')")]
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NoParams {}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OrderStockParams {
    #[schemars(description = "Stock symbol (e.g. '005930')")]
    pub symbol: String,

    #[schemars(description = "Order quantity (shares, must be positive)")]
    pub quantity: u64,

    #[schemars(description = "Order price in KRW (0 for market price)")]
    pub price: u64,

    #[schemars(description = "Order type: 'buy' or 'sell' (case-insensitive)")]
    #[serde(alias = "side")]
    pub order_type: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DateRangeParams {
    #[schemars(description = "Start date (YYYYMMDD)")]
    pub start_date: String,

    #[schemars(description = "End date (YYYYMMDD)")]
    pub end_date: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OrderDetailParams {
    #[schemars(description = "Order number (empty for all orders of the day)")]
    #[serde(default)]
    pub order_no: String,

    #[schemars(description = "Order date (YYYYMMDD)")]
    pub order_date: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SymbolRangeParams {
    #[schemars(description = "Stock symbol (e.g. '005930')")]
    pub symbol: String,

    #[schemars(description = "Start date (YYYYMMDD)")]
    pub start_date: String,

    #[schemars(description = "End date (YYYYMMDD)")]
    pub end_date: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OverseasOrderParams {
    #[schemars(description = "Stock symbol (e.g. 'AAPL')")]
    pub symbol: String,

    #[schemars(description = "Order quantity (shares, must be positive)")]
    pub quantity: u64,

    #[schemars(description = "Order price in local currency (0 for market price)")]
    pub price: f64,

    #[schemars(description = "Order type: 'buy' or 'sell' (case-insensitive)")]
    #[serde(alias = "side")]
    pub order_type: String,

    #[schemars(
        description = "Market code: NASD, NYSE, AMEX, SEHK, SHAA, SZAA, TKSE, HASE, VNSE"
    )]
    pub market: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OverseasPriceParams {
    #[schemars(description = "Stock symbol (e.g. 'AAPL')")]
    pub symbol: String,

    #[schemars(
        description = "Market code: NASD, NYSE, AMEX, SEHK, SHAA, SZAA, TKSE, HASE, VNSE"
    )]
    pub market: String,
}

// ==================== 카탈로그 ====================

/// 제공 도구.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    StockPrice,
    Balance,
    OrderStock,
    OrderList,
    OrderDetail,
    StockInfo,
    StockHistory,
    StockAsk,
    OverseasOrder,
    OverseasPrice,
}

impl Tool {
    pub const ALL: [Tool; 10] = [
        Tool::StockPrice,
        Tool::Balance,
        Tool::OrderStock,
        Tool::OrderList,
        Tool::OrderDetail,
        Tool::StockInfo,
        Tool::StockHistory,
        Tool::StockAsk,
        Tool::OverseasOrder,
        Tool::OverseasPrice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::StockPrice => "inquery-stock-price",
            Tool::Balance => "inquery-balance",
            Tool::OrderStock => "order-stock",
            Tool::OrderList => "inquery-order-list",
            Tool::OrderDetail => "inquery-order-detail",
            Tool::StockInfo => "inquery-stock-info",
            Tool::StockHistory => "inquery-stock-history",
            Tool::StockAsk => "inquery-stock-ask",
            Tool::OverseasOrder => "order-overseas-stock",
            Tool::OverseasPrice => "inquery-overseas-stock-price",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::StockPrice => {
                "Get current stock price information from Korea Investment & Securities"
            }
            Tool::Balance => {
                "Get current stock balance information from Korea Investment & Securities"
            }
            Tool::OrderStock => {
                "Order stock (buy/sell) from Korea Investment & Securities. Price 0 places a market order"
            }
            Tool::OrderList => "Get daily order list from Korea Investment & Securities",
            Tool::OrderDetail => "Get order detail from Korea Investment & Securities",
            Tool::StockInfo => {
                "Get daily stock price information from Korea Investment & Securities"
            }
            Tool::StockHistory => {
                "Get daily stock price history from Korea Investment & Securities"
            }
            Tool::StockAsk => "Get stock ask price from Korea Investment & Securities",
            Tool::OverseasOrder => {
                "Order overseas stock (buy/sell) from Korea Investment & Securities"
            }
            Tool::OverseasPrice => "Get overseas stock price from Korea Investment & Securities",
        }
    }

    pub fn input_schema(&self) -> Value {
        match self {
            Tool::StockPrice | Tool::StockAsk => schema::<SymbolParams>(),
            Tool::Balance => schema::<NoParams>(),
            Tool::OrderStock => schema::<OrderStockParams>(),
            Tool::OrderList => schema::<DateRangeParams>(),
            Tool::OrderDetail => schema::<OrderDetailParams>(),
            Tool::StockInfo | Tool::StockHistory => schema::<SymbolRangeParams>(),
            Tool::OverseasOrder => schema::<OverseasOrderParams>(),
            Tool::OverseasPrice => schema::<OverseasPriceParams>(),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }

    /// 인자 파싱 후 해당 KIS 호출 실행.
    pub async fn call(&self, client: &KisClient, arguments: Value) -> Result<Value, ToolError> {
        let value = match self {
            Tool::StockPrice => {
                let p: SymbolParams = parse(arguments)?;
                client.inquire_price(&p.symbol).await?
            }
            Tool::Balance => client.inquire_balance().await?,
            Tool::OrderStock => {
                let p: OrderStockParams = parse(arguments)?;
                let order =
                    OrderRequest::new(&p.symbol, p.quantity, Decimal::from(p.price), &p.order_type)?;
                client.order_cash(&order).await?
            }
            Tool::OrderList => {
                let p: DateRangeParams = parse(arguments)?;
                client.inquire_daily_ccld(&p.start_date, &p.end_date).await?
            }
            Tool::OrderDetail => {
                let p: OrderDetailParams = parse(arguments)?;
                client.inquire_order_detail(&p.order_no, &p.order_date).await?
            }
            Tool::StockInfo => {
                let p: SymbolRangeParams = parse(arguments)?;
                client
                    .inquire_daily_price(&p.symbol, &p.start_date, &p.end_date)
                    .await?
            }
            Tool::StockHistory => {
                let p: SymbolRangeParams = parse(arguments)?;
                client
                    .inquire_daily_itemchartprice(&p.symbol, &p.start_date, &p.end_date)
                    .await?
            }
            Tool::StockAsk => {
                let p: SymbolParams = parse(arguments)?;
                client.inquire_asking_price(&p.symbol).await?
            }
            Tool::OverseasOrder => {
                let p: OverseasOrderParams = parse(arguments)?;
                let order = OverseasOrderRequest::new(
                    &p.symbol,
                    p.quantity,
                    decimal_price(p.price)?,
                    &p.order_type,
                    &p.market,
                )?;
                client.order_overseas(&order).await?
            }
            Tool::OverseasPrice => {
                let p: OverseasPriceParams = parse(arguments)?;
                client.inquire_overseas_price(&p.symbol, &p.market).await?
            }
        };
        Ok(value)
    }
}

/// 전체 도구 목록 (`tools/list`).
pub fn catalogue() -> Vec<ToolDefinition> {
    Tool::ALL.iter().map(Tool::definition).collect()
}

fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    Ok(serde_json::from_value(arguments)?)
}

fn schema<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// f64의 최단 십진 표기를 그대로 사용 (150.1 -> 150.1).
fn decimal_price(price: f64) -> Result<Decimal, KisError> {
    price
        .to_string()
        .parse::<Decimal>()
        .map_err(|_| KisError::Validation(format!("price is not a valid decimal: {}", price)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(tool: Tool) -> Vec<String> {
        tool.input_schema()["required"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_tool_names_roundtrip() {
        assert_eq!(catalogue().len(), 10);
        for tool in Tool::ALL {
            assert_eq!(Tool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(Tool::from_name("inquiry-stock-price"), None);
    }

    #[test]
    fn test_input_schemas() {
        for tool in Tool::ALL {
            assert_eq!(tool.input_schema()["type"], "object", "{}", tool.name());
        }

        let mut order = required(Tool::OrderStock);
        order.sort();
        assert_eq!(order, vec!["order_type", "price", "quantity", "symbol"]);

        // order_no는 생략 가능
        assert_eq!(required(Tool::OrderDetail), vec!["order_date"]);
        assert!(required(Tool::Balance).is_empty());

        let overseas = Tool::OverseasOrder.input_schema();
        assert!(overseas["properties"]["market"]["description"]
            .as_str()
            .unwrap()
            .contains("TKSE"));
    }

    #[test]
    fn test_side_alias() {
        let p: OrderStockParams = serde_json::from_value(json!({
            "symbol": "005930", "quantity": 1, "price": 0, "side": "BUY"
        }))
        .unwrap();
        assert_eq!(p.order_type, "BUY");
    }

    #[test]
    fn test_bad_arguments_are_input_errors() {
        let err = parse::<OrderStockParams>(json!({"symbol": "005930"})).unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().starts_with("Invalid arguments"));

        let err = parse::<OrderStockParams>(json!({
            "symbol": "005930", "quantity": -1, "price": 0, "order_type": "buy"
        }))
        .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_decimal_price() {
        assert_eq!(decimal_price(150.1).unwrap().to_string(), "150.1");
        assert!(decimal_price(0.0).unwrap().is_zero());
        assert!(decimal_price(f64::NAN).is_err());
    }
}

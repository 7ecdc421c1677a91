//! 해외 거래소 코드.

use std::fmt;

use crate::error::{KisError, Result};
use crate::tr_id::Region;

/// 해외주식 주문 거래소 코드 (OVRS_EXCG_CD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketCode {
    Nasd,
    Nyse,
    Amex,
    Sehk,
    Shaa,
    Szaa,
    Tkse,
    Hase,
    Vnse,
}

impl MarketCode {
    pub const ALL: [MarketCode; 9] = [
        MarketCode::Nasd,
        MarketCode::Nyse,
        MarketCode::Amex,
        MarketCode::Sehk,
        MarketCode::Shaa,
        MarketCode::Szaa,
        MarketCode::Tkse,
        MarketCode::Hase,
        MarketCode::Vnse,
    ];

    /// 대소문자 구분 없이 거래소 코드 파싱.
    ///
    /// 지원하지 않는 코드는 지원 목록을 포함한 검증 에러를 반환합니다.
    pub fn parse(s: &str) -> Result<Self> {
        let code = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == code)
            .ok_or_else(|| {
                KisError::Validation(format!(
                    "Unsupported market: {}. Supported markets: {}",
                    code,
                    Self::supported_list()
                ))
            })
    }

    /// 쉼표로 구분된 지원 거래소 목록.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nasd => "NASD",
            Self::Nyse => "NYSE",
            Self::Amex => "AMEX",
            Self::Sehk => "SEHK",
            Self::Shaa => "SHAA",
            Self::Szaa => "SZAA",
            Self::Tkse => "TKSE",
            Self::Hase => "HASE",
            Self::Vnse => "VNSE",
        }
    }

    /// TR-ID 지역.
    pub fn region(&self) -> Region {
        match self {
            Self::Nasd | Self::Nyse | Self::Amex => Region::Us,
            Self::Sehk => Region::Hk,
            Self::Shaa => Region::Sh,
            Self::Szaa => Region::Sz,
            Self::Tkse => Region::Jp,
            Self::Hase | Self::Vnse => Region::Vn,
        }
    }

    /// 시세 조회용 거래소 코드 (EXCD).
    ///
    /// 주문 API는 4자리, 시세 API는 3자리 코드를 사용합니다.
    pub fn quote_exchange_code(&self) -> &'static str {
        match self {
            Self::Nasd => "NAS",
            Self::Nyse => "NYS",
            Self::Amex => "AMS",
            Self::Sehk => "HKS",
            Self::Shaa => "SHS",
            Self::Szaa => "SZS",
            Self::Tkse => "TSE",
            Self::Hase => "HNX",
            Self::Vnse => "HSX",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Nasd => "나스닥",
            Self::Nyse => "뉴욕",
            Self::Amex => "아멕스",
            Self::Sehk => "홍콩",
            Self::Shaa => "중국상해",
            Self::Szaa => "중국심천",
            Self::Tkse => "일본",
            Self::Hase => "베트남 하노이",
            Self::Vnse => "베트남 호치민",
        }
    }
}

impl fmt::Display for MarketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::MarketError;

/// A currency identified by its symbol. Identifiers are case-normalized on
/// construction so "btc" and "BTC" compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asset(String);

impl Asset {
    pub fn new(id: impl AsRef<str>) -> Self {
        Asset(id.as_ref().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Asset {
    fn from(s: &str) -> Self {
        Asset::new(s)
    }
}

/// Represents a unique identifier for an exchange.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExchangeId(pub String);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        ExchangeId(s.to_string())
    }
}

/// Taker direction against a market: BUY lifts asks (quote in, base out),
/// SELL hits bids (base in, quote out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Normalized descriptor for one tradable spot market on one exchange.
/// Immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSpec {
    pub exchange: ExchangeId,
    /// Exchange-native symbol, e.g. "BTC-USDC".
    pub symbol: String,
    pub base: Asset,
    pub quote: Asset,
    /// Fraction deducted from the received asset on a taker fill.
    pub taker_fee: Decimal,
    /// Minimum order notional, denominated in the quote asset.
    pub min_notional: Decimal,
    pub price_tick: Decimal,
    pub qty_tick: Decimal,
}

impl MarketSpec {
    /// Checks the descriptor's internal consistency. Registration rejects
    /// anything that fails here.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.base == self.quote {
            return Err(MarketError::InvalidMarket {
                symbol: self.symbol.clone(),
                reason: format!("base and quote are both {}", self.base),
            });
        }
        if self.taker_fee < Decimal::ZERO || self.taker_fee >= Decimal::ONE {
            return Err(MarketError::InvalidMarket {
                symbol: self.symbol.clone(),
                reason: format!("taker fee {} outside [0, 1)", self.taker_fee),
            });
        }
        if self.price_tick <= Decimal::ZERO || self.qty_tick <= Decimal::ZERO {
            return Err(MarketError::InvalidMarket {
                symbol: self.symbol.clone(),
                reason: "ticks must be positive".to_string(),
            });
        }
        if self.min_notional < Decimal::ZERO {
            return Err(MarketError::InvalidMarket {
                symbol: self.symbol.clone(),
                reason: format!("negative min notional {}", self.min_notional),
            });
        }
        Ok(())
    }

    /// The asset consumed when taking this market on `side`.
    pub fn input_asset(&self, side: Side) -> &Asset {
        match side {
            Side::Buy => &self.quote,
            Side::Sell => &self.base,
        }
    }

    /// The asset received when taking this market on `side`.
    pub fn output_asset(&self, side: Side) -> &Asset {
        match side {
            Side::Buy => &self.base,
            Side::Sell => &self.quote,
        }
    }
}

impl fmt::Display for MarketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

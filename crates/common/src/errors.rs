use thiserror::Error;

/// Errors raised while building the market universe. All of these are fatal
/// at startup.
#[derive(Error, Debug, PartialEq)]
pub enum MarketError {
    /// A market was registered twice for the same (exchange, symbol).
    #[error("duplicate market {exchange}:{symbol}")]
    DuplicateMarket { exchange: String, symbol: String },

    /// A market descriptor failed validation.
    #[error("invalid market {symbol}: {reason}")]
    InvalidMarket { symbol: String, reason: String },
}

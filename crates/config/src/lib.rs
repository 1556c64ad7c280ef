//! Scanner configuration, loaded from YAML and validated once at startup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration value violated its documented bounds. Always fatal.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid paths config: {0}")]
    Paths(String),

    #[error("invalid risk_model config: {0}")]
    RiskModel(String),

    #[error("invalid execution config: {0}")]
    Execution(String),
}

/// Cycle search bounds and filters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "defaults::min_length")]
    pub min_length: usize,
    #[serde(default = "defaults::max_length")]
    pub max_length: usize,
    #[serde(default)]
    pub allow_revisit_nodes: bool,
    #[serde(default)]
    pub allow_same_market_twice: bool,
    #[serde(default = "defaults::yes")]
    pub allow_cross_exchange: bool,
    /// Stable assets cycles start from and return to, e.g. USDC, USDT.
    #[serde(default = "defaults::start_assets")]
    pub start_assets: Vec<String>,
}

/// Profit thresholds and risk penalties applied by the evaluator.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RiskModelConfig {
    #[serde(with = "rust_decimal::serde::float", default = "defaults::min_profit_margin")]
    pub min_profit_margin: Decimal,
    #[serde(with = "rust_decimal::serde::float", default = "defaults::vol_risk_multiplier")]
    pub vol_risk_multiplier: Decimal,
    #[serde(with = "rust_decimal::serde::float", default = "defaults::slippage_coefficient")]
    pub slippage_coefficient: Decimal,
    /// Snapshots older than this are rejected outright.
    #[serde(default = "defaults::staleness_bound_ms")]
    pub staleness_bound_ms: u64,
    #[serde(with = "rust_decimal::serde::float", default = "defaults::min_leg_fill_ratio")]
    pub min_leg_fill_ratio: Decimal,
    /// When true, a depth-limited leg above the fill ratio carries its
    /// partial output into the next leg instead of rejecting the cycle.
    #[serde(default)]
    pub continue_on_partial_fill: bool,
}

/// Scan cadence and resource bounds.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExecutionConfig {
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "defaults::max_concurrent_paths")]
    pub max_concurrent_paths: usize,
    #[serde(default = "defaults::orderbook_depth_levels")]
    pub orderbook_depth_levels: usize,
    /// Notional evaluated per cycle, denominated in the cycle's start asset.
    #[serde(with = "rust_decimal::serde::float", default = "defaults::scan_notional")]
    pub scan_notional: Decimal,
    /// Window during which a still-profitable cycle is not re-emitted.
    #[serde(default = "defaults::dedupe_ttl_ms")]
    pub dedupe_ttl_ms: u64,
}

/// Volatility estimation parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VolatilityConfig {
    /// Sigma assumed for assets with no (or expired) estimate.
    #[serde(with = "rust_decimal::serde::float", default = "defaults::default_sigma")]
    pub default_sigma: Decimal,
    #[serde(default = "defaults::window_samples")]
    pub window_samples: usize,
    #[serde(default = "defaults::entry_ttl_ms")]
    pub entry_ttl_ms: u64,
}

/// The top-level configuration struct that maps directly to the YAML file.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub paths: PathsConfig,
    pub risk_model: RiskModelConfig,
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub volatility: VolatilityConfig,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            default_sigma: defaults::default_sigma(),
            window_samples: defaults::window_samples(),
            entry_ttl_ms: defaults::entry_ttl_ms(),
        }
    }
}

impl Config {
    /// Checks every bound the scanner relies on. Callers treat any error as
    /// fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.min_length < 2 {
            return Err(ConfigError::Paths(format!(
                "min_length {} must be at least 2",
                self.paths.min_length
            )));
        }
        if self.paths.max_length < self.paths.min_length {
            return Err(ConfigError::Paths(format!(
                "max_length {} below min_length {}",
                self.paths.max_length, self.paths.min_length
            )));
        }
        if self.paths.start_assets.is_empty() {
            return Err(ConfigError::Paths("start_assets is empty".to_string()));
        }
        let unit = Decimal::ONE;
        if self.risk_model.min_profit_margin < Decimal::ZERO {
            return Err(ConfigError::RiskModel(
                "min_profit_margin must be non-negative".to_string(),
            ));
        }
        if self.risk_model.vol_risk_multiplier < Decimal::ZERO
            || self.risk_model.slippage_coefficient < Decimal::ZERO
        {
            return Err(ConfigError::RiskModel(
                "risk multipliers must be non-negative".to_string(),
            ));
        }
        if self.risk_model.min_leg_fill_ratio < Decimal::ZERO
            || self.risk_model.min_leg_fill_ratio > unit
        {
            return Err(ConfigError::RiskModel(format!(
                "min_leg_fill_ratio {} outside [0, 1]",
                self.risk_model.min_leg_fill_ratio
            )));
        }
        if self.risk_model.staleness_bound_ms == 0 {
            return Err(ConfigError::RiskModel(
                "staleness_bound_ms must be positive".to_string(),
            ));
        }
        if self.execution.tick_interval_ms == 0 {
            return Err(ConfigError::Execution(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.execution.max_concurrent_paths == 0 {
            return Err(ConfigError::Execution(
                "max_concurrent_paths must be positive".to_string(),
            ));
        }
        if self.execution.orderbook_depth_levels == 0 {
            return Err(ConfigError::Execution(
                "orderbook_depth_levels must be positive".to_string(),
            ));
        }
        if self.execution.scan_notional <= Decimal::ZERO {
            return Err(ConfigError::Execution(
                "scan_notional must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

mod defaults {
    use rust_decimal::Decimal;

    pub fn min_length() -> usize {
        3
    }
    pub fn max_length() -> usize {
        4
    }
    pub fn yes() -> bool {
        true
    }
    pub fn start_assets() -> Vec<String> {
        vec!["USDC".to_string(), "USDT".to_string(), "USD".to_string()]
    }
    pub fn min_profit_margin() -> Decimal {
        Decimal::new(1, 3) // 0.001
    }
    pub fn vol_risk_multiplier() -> Decimal {
        Decimal::new(5, 1) // 0.5
    }
    pub fn slippage_coefficient() -> Decimal {
        Decimal::new(1, 4) // 0.0001
    }
    pub fn staleness_bound_ms() -> u64 {
        1_000
    }
    pub fn min_leg_fill_ratio() -> Decimal {
        Decimal::new(98, 2) // 0.98
    }
    pub fn tick_interval_ms() -> u64 {
        100
    }
    pub fn max_concurrent_paths() -> usize {
        8
    }
    pub fn orderbook_depth_levels() -> usize {
        25
    }
    pub fn scan_notional() -> Decimal {
        Decimal::new(1_000, 0)
    }
    pub fn dedupe_ttl_ms() -> u64 {
        5_000
    }
    pub fn default_sigma() -> Decimal {
        Decimal::new(5, 3) // 0.005
    }
    pub fn window_samples() -> usize {
        120
    }
    pub fn entry_ttl_ms() -> u64 {
        60_000
    }
}

/// Loads and validates the configuration from a YAML file.
pub async fn load_config_from_path(path: &str) -> Result<Config, anyhow::Error> {
    let config_str = tokio::fs::read_to_string(path).await?;
    let config: Config = serde_yaml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn minimal_yaml() -> &'static str {
        r#"
paths:
  min_length: 3
  max_length: 4
  start_assets: [USDC, USDT]
risk_model:
  min_profit_margin: 0.001
  staleness_bound_ms: 1000
execution:
  tick_interval_ms: 100
"#
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.paths.min_length, 3);
        assert_eq!(config.paths.max_length, 4);
        assert_eq!(config.risk_model.min_profit_margin, dec!(0.001));
        assert_eq!(config.execution.tick_interval_ms, 100);
        // Defaulted sections and fields.
        assert!(config.paths.allow_cross_exchange);
        assert!(!config.paths.allow_revisit_nodes);
        assert_eq!(config.execution.orderbook_depth_levels, 25);
        assert_eq!(config.execution.dedupe_ttl_ms, 5_000);
        assert_eq!(config.volatility.default_sigma, dec!(0.005));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_length_below_two_is_fatal() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.paths.min_length = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Paths(_))));
    }

    #[test]
    fn test_inverted_length_bounds_are_fatal() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.paths.max_length = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Paths(_))));
    }

    #[test]
    fn test_empty_start_assets_is_fatal() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.paths.start_assets.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Paths(_))));
    }

    #[test]
    fn test_fill_ratio_out_of_range_is_fatal() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.risk_model.min_leg_fill_ratio = dec!(1.5);
        assert!(matches!(config.validate(), Err(ConfigError::RiskModel(_))));
    }

    #[test]
    fn test_zero_tick_interval_is_fatal() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.execution.tick_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Execution(_))));
    }
}

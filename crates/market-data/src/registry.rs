//! Immutable-after-init registry of tradable markets.

use common::{ExchangeId, MarketError, MarketSpec};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps (exchange, symbol) to its normalized market descriptor. All
/// registrations happen during bootstrap, before the graph is built; from
/// then on the registry is shared read-only.
#[derive(Debug, Default)]
pub struct MarketRegistry {
    markets: HashMap<(ExchangeId, String), Arc<MarketSpec>>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self {
            markets: HashMap::new(),
        }
    }

    /// Registers a market, rejecting duplicates and invalid descriptors.
    pub fn register(&mut self, spec: MarketSpec) -> Result<(), MarketError> {
        spec.validate()?;
        let key = (spec.exchange.clone(), spec.symbol.clone());
        if self.markets.contains_key(&key) {
            return Err(MarketError::DuplicateMarket {
                exchange: spec.exchange.0.clone(),
                symbol: spec.symbol,
            });
        }
        self.markets.insert(key, Arc::new(spec));
        Ok(())
    }

    pub fn lookup(&self, exchange: &ExchangeId, symbol: &str) -> Option<Arc<MarketSpec>> {
        self.markets
            .get(&(exchange.clone(), symbol.to_string()))
            .cloned()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<MarketSpec>> {
        self.markets.values()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

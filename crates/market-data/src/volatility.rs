//! Read-mostly cache of per-asset volatility estimates.
//!
//! Sigma is the per-sample standard deviation of log returns over a bounded
//! price window. Producers feed prices (or pre-computed sigmas) out-of-band;
//! the scanner only reads. Assets without a fresh estimate fall back to the
//! configured default.

use common::Asset;
use config_lib::VolatilityConfig;
use rust_decimal::{Decimal, MathematicalOps};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct PriceSample {
    ts_ms: u64,
    price: Decimal,
}

#[derive(Debug)]
struct VolEntry {
    samples: VecDeque<PriceSample>,
    sigma: Decimal,
    last_updated: Instant,
}

pub struct VolatilityCache {
    config: VolatilityConfig,
    inner: RwLock<HashMap<Asset, VolEntry>>,
}

impl VolatilityCache {
    pub fn new(config: VolatilityConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Feeds one trade/ticker price for an asset and recomputes its sigma.
    pub fn record_price(&self, asset: &Asset, price: Decimal, ts_ms: u64) {
        if price <= Decimal::ZERO {
            return;
        }
        let mut inner = self.inner.write().expect("volatility lock poisoned");
        let entry = inner.entry(asset.clone()).or_insert_with(|| VolEntry {
            samples: VecDeque::new(),
            sigma: self.config.default_sigma,
            last_updated: Instant::now(),
        });
        entry.samples.push_back(PriceSample { ts_ms, price });
        while entry.samples.len() > self.config.window_samples {
            entry.samples.pop_front();
        }
        if let Some(sigma) = sigma_from_samples(entry.samples.make_contiguous()) {
            entry.sigma = sigma;
        }
        entry.last_updated = Instant::now();
    }

    /// Installs an externally computed sigma for an asset.
    pub fn insert_sigma(&self, asset: &Asset, sigma: Decimal) {
        let mut inner = self.inner.write().expect("volatility lock poisoned");
        inner.insert(
            asset.clone(),
            VolEntry {
                samples: VecDeque::new(),
                sigma,
                last_updated: Instant::now(),
            },
        );
    }

    /// Current sigma for an asset; the configured default when absent or
    /// expired.
    pub fn sigma(&self, asset: &Asset) -> Decimal {
        let inner = self.inner.read().expect("volatility lock poisoned");
        match inner.get(asset) {
            Some(entry) if !self.expired(entry) => entry.sigma,
            _ => self.config.default_sigma,
        }
    }

    /// One consistent grab of sigmas for a scan tick.
    pub fn snapshot_sigmas<'a>(
        &self,
        assets: impl IntoIterator<Item = &'a Asset>,
    ) -> HashMap<Asset, Decimal> {
        let inner = self.inner.read().expect("volatility lock poisoned");
        assets
            .into_iter()
            .map(|asset| {
                let sigma = match inner.get(asset) {
                    Some(entry) if !self.expired(entry) => entry.sigma,
                    _ => self.config.default_sigma,
                };
                (asset.clone(), sigma)
            })
            .collect()
    }

    fn expired(&self, entry: &VolEntry) -> bool {
        entry.last_updated.elapsed().as_millis() as u64 > self.config.entry_ttl_ms
    }
}

/// Per-sample stddev of log returns; `None` with fewer than two usable
/// samples.
fn sigma_from_samples(samples: &[PriceSample]) -> Option<Decimal> {
    let mut returns = Vec::with_capacity(samples.len().saturating_sub(1));
    for pair in samples.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if prev.price <= Decimal::ZERO || curr.price <= Decimal::ZERO {
            continue;
        }
        let ratio = curr.price / prev.price;
        if let Some(log_return) = ratio.checked_ln() {
            returns.push(log_return);
        }
    }
    if returns.is_empty() {
        return None;
    }
    let n = Decimal::from(returns.len());
    let mean = returns.iter().copied().sum::<Decimal>() / n;
    let variance = returns
        .iter()
        .map(|r| (*r - mean) * (*r - mean))
        .sum::<Decimal>()
        / n;
    variance.max(Decimal::ZERO).sqrt()
}

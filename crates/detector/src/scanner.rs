//! Periodic re-evaluation of the enumerated cycles.
//!
//! Each tick reads one sigma snapshot, evaluates every cycle against
//! per-cycle book snapshots with bounded concurrency, and hands qualifying
//! records to the sink in profit-descending order. A tick that overruns the
//! interval causes the next due tick to be skipped rather than queued; the
//! skip count is the scanner's load signal. Emits never block: when the sink
//! is full the lowest-profit pending records are dropped.

use crate::dedupe::OpportunityDeduplicator;
use crate::enumerator::Cycle;
use crate::evaluator::{BookMap, EvalOutcome, Evaluation, LimitedBy, PathEvaluator, RejectReason};
use crate::graph::MarketGraph;
use anyhow::Result;
use chrono::{DateTime, Utc};
use common::{Asset, ExchangeId, Side};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use market_data::{OrderbookCache, VolatilityCache};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// One leg of an emitted opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct OpportunityLeg {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub side: Side,
}

/// A qualifying evaluation, as handed to the downstream sink.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub cycle_id: String,
    pub legs: Vec<OpportunityLeg>,
    pub input_asset: Asset,
    pub input_qty: Decimal,
    pub output_qty: Decimal,
    pub gross_return: Decimal,
    pub fee_adjusted_return: Decimal,
    pub risk_adjusted_return: Decimal,
    pub limited_by: LimitedBy,
    pub timestamp: DateTime<Utc>,
}

/// Per-tick counters. Rejections are expected control flow and only show up
/// here.
#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub evaluated: usize,
    pub qualified: usize,
    pub emitted: usize,
    pub suppressed: usize,
    pub dropped: usize,
    pub rejected_threshold: usize,
    pub rejected_notional: usize,
    pub rejected_staleness: usize,
    pub rejected_fill: usize,
    pub missing_books: usize,
    pub crossed_books: usize,
    pub duration_ms: u128,
}

/// Scanner cadence and sizing, resolved from the execution config section.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub tick_interval: Duration,
    pub max_concurrent: usize,
    /// Notional evaluated per cycle, in the cycle's start asset.
    pub notional: Decimal,
    pub dedupe_ttl: Duration,
}

impl From<&config_lib::ExecutionConfig> for ScanConfig {
    fn from(execution: &config_lib::ExecutionConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(execution.tick_interval_ms),
            max_concurrent: execution.max_concurrent_paths,
            notional: execution.scan_notional,
            dedupe_ttl: Duration::from_millis(execution.dedupe_ttl_ms),
        }
    }
}

/// Drives the evaluation loop until shutdown.
pub struct Scanner {
    graph: Arc<MarketGraph>,
    cycles: Arc<Vec<Cycle>>,
    assets_in_cycles: Vec<Asset>,
    cache: Arc<OrderbookCache>,
    volatility: Arc<VolatilityCache>,
    evaluator: Arc<PathEvaluator>,
    config: ScanConfig,
    sink: mpsc::Sender<Opportunity>,
    shutdown_rx: mpsc::Receiver<()>,
    dedupe: OpportunityDeduplicator,
    skipped_ticks: u64,
}

impl Scanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: Arc<MarketGraph>,
        cycles: Vec<Cycle>,
        cache: Arc<OrderbookCache>,
        volatility: Arc<VolatilityCache>,
        evaluator: PathEvaluator,
        config: ScanConfig,
        sink: mpsc::Sender<Opportunity>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        let assets_in_cycles: BTreeSet<Asset> = cycles
            .iter()
            .flat_map(|c| c.assets.iter().cloned())
            .collect();
        let dedupe = OpportunityDeduplicator::new(config.dedupe_ttl);
        Self {
            graph,
            cycles: Arc::new(cycles),
            assets_in_cycles: assets_in_cycles.into_iter().collect(),
            cache,
            volatility,
            evaluator: Arc::new(evaluator),
            config,
            sink,
            shutdown_rx,
            dedupe,
            skipped_ticks: 0,
        }
    }

    /// Spawns the scanner onto the runtime.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Runs ticks until a shutdown signal arrives. The tick in progress
    /// always finishes; no new tick starts afterwards.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Scanner started: {} cycles, tick {:?}, {} max in-flight",
            self.cycles.len(),
            self.config.tick_interval,
            self.config.max_concurrent
        );
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Scanner shutting down after {} skipped ticks", self.skipped_ticks);
                    break;
                }
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let stats = self.scan_once().await;
            let elapsed = started.elapsed();
            if elapsed > self.config.tick_interval {
                let missed = (elapsed.as_millis() / self.config.tick_interval.as_millis()) as u64;
                self.skipped_ticks += missed;
                warn!(
                    "tick overran: {}ms of work against a {}ms interval, {} ticks skipped so far",
                    elapsed.as_millis(),
                    self.config.tick_interval.as_millis(),
                    self.skipped_ticks
                );
            }
            if stats.evaluated > 0 {
                info!(
                    "scan: evaluated={} qualified={} emitted={} dropped={} stale={} in {}ms",
                    stats.evaluated,
                    stats.qualified,
                    stats.emitted,
                    stats.dropped,
                    stats.rejected_staleness,
                    stats.duration_ms
                );
            }
        }
        Ok(())
    }

    async fn scan_once(&mut self) -> ScanStats {
        let started = Instant::now();
        let mut stats = ScanStats::default();
        if !self.cache.has_data() {
            debug!("waiting for initial order books");
            return stats;
        }

        let sigmas = Arc::new(self.volatility.snapshot_sigmas(self.assets_in_cycles.iter()));
        let graph = Arc::clone(&self.graph);
        let cache = Arc::clone(&self.cache);
        let evaluator = Arc::clone(&self.evaluator);
        let notional = self.config.notional;
        let cycles: Vec<Arc<Cycle>> = self.cycles.iter().cloned().map(Arc::new).collect();

        let evaluations: Vec<Evaluation> = stream::iter(cycles.into_iter())
            .map(|cycle| {
                let graph = Arc::clone(&graph);
                let cache = Arc::clone(&cache);
                let evaluator = Arc::clone(&evaluator);
                let sigmas = Arc::clone(&sigmas);
                async move {
                    let books = gather_books(&graph, &cycle, &cache);
                    // CPU-bound and suspension-free: the cycle sees exactly
                    // the snapshots gathered above.
                    evaluator.evaluate(&graph, &cycle, notional, &books, &sigmas)
                }
            })
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        let mut qualified: Vec<Evaluation> = Vec::new();
        for eval in evaluations {
            stats.evaluated += 1;
            match eval.outcome {
                EvalOutcome::Qualified => {
                    stats.qualified += 1;
                    qualified.push(eval);
                }
                EvalOutcome::Rejected(reason) => match reason {
                    RejectReason::Threshold => stats.rejected_threshold += 1,
                    RejectReason::Notional => stats.rejected_notional += 1,
                    RejectReason::Staleness => stats.rejected_staleness += 1,
                    RejectReason::Fill => stats.rejected_fill += 1,
                    RejectReason::MissingBook => stats.missing_books += 1,
                    RejectReason::CrossedBook => {
                        stats.crossed_books += 1;
                        if let Some((exchange, symbol)) = &eval.offending_market {
                            self.cache.mark_stale(exchange, symbol);
                        }
                    }
                },
            }
        }

        qualified.sort_by(|a, b| b.risk_adjusted_return.cmp(&a.risk_adjusted_return));

        for (i, eval) in qualified.iter().enumerate() {
            if self.dedupe.is_duplicate(&eval.cycle_id) {
                stats.suppressed += 1;
                continue;
            }
            match self.sink.try_send(to_opportunity(eval)) {
                Ok(()) => stats.emitted += 1,
                Err(TrySendError::Full(_)) => {
                    // Records are profit-descending, so everything still
                    // pending is the lowest-profit tail.
                    warn!("opportunity sink full, dropping lowest-profit records");
                    stats.dropped = qualified.len() - i;
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("opportunity sink closed");
                    break;
                }
            }
        }

        stats.duration_ms = started.elapsed().as_millis();
        stats
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }
}

/// Per-evaluation snapshot copies for every market the cycle touches.
/// Bounded top-N reads; no lock is held across legs.
fn gather_books(graph: &MarketGraph, cycle: &Cycle, cache: &OrderbookCache) -> BookMap {
    let mut books = BookMap::new();
    for &edge_idx in &cycle.edges {
        let key = graph.edge(edge_idx).market_key();
        if books.contains_key(&key) {
            continue;
        }
        if let Some(snapshot) = cache.read(&key.0, &key.1) {
            books.insert(key, snapshot);
        }
    }
    books
}

fn to_opportunity(eval: &Evaluation) -> Opportunity {
    Opportunity {
        id: Uuid::new_v4(),
        cycle_id: eval.cycle_id.clone(),
        legs: eval
            .legs
            .iter()
            .map(|leg| OpportunityLeg {
                exchange: leg.exchange.clone(),
                symbol: leg.symbol.clone(),
                side: leg.side,
            })
            .collect(),
        input_asset: eval.input_asset.clone(),
        input_qty: eval.input_qty,
        output_qty: eval.output_qty,
        gross_return: eval.gross_return,
        fee_adjusted_return: eval.fee_adjusted_return,
        risk_adjusted_return: eval.risk_adjusted_return,
        limited_by: eval.limited_by,
        timestamp: Utc::now(),
    }
}

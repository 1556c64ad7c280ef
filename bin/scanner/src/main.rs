//! Main runtime for the cycle scanner: loads configuration and the market
//! universe, builds the graph and cycle set, then runs ingress tasks and the
//! scanner until ctrl-c.

use anyhow::{Context, Result};
use clap::Parser;
use common::{ExchangeId, MarketSpec};
use detector::{enumerate_cycles, CycleFilters, MarketGraph, PathEvaluator, RiskParams, ScanConfig, Scanner};
use market_data::{IngressConfig, IngressTask, MarketRegistry, OrderbookCache, VolatilityCache};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

mod seed_feed;
use seed_feed::SeedFeed;

#[derive(Parser, Debug)]
#[command(about = "Cross-exchange and triangular spot arbitrage scanner")]
struct Args {
    /// Scanner configuration file.
    #[arg(long, default_value = "config/config.yaml")]
    config: String,
    /// Market universe file (descriptors plus optional seed books).
    #[arg(long, default_value = "config/markets.yaml")]
    markets: String,
}

/// The market metadata snapshot consumed at bootstrap. Seed books make dry
/// runs self-contained; a live deployment swaps `SeedFeed` for real exchange
/// adapters behind the same `BookFeed` seam.
#[derive(Debug, Deserialize)]
struct UniverseFile {
    markets: Vec<MarketSpec>,
    #[serde(default)]
    books: Vec<SeedBook>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedBook {
    pub exchange: String,
    pub symbol: String,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = config_lib::load_config_from_path(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config))?;
    let universe: UniverseFile = serde_yaml::from_str(
        &tokio::fs::read_to_string(&args.markets)
            .await
            .with_context(|| format!("reading {}", args.markets))?,
    )?;

    let mut registry = MarketRegistry::new();
    for spec in universe.markets {
        registry.register(spec)?;
    }
    tracing::info!(markets = registry.len(), "registry built");

    let graph = Arc::new(MarketGraph::from_registry(&registry));
    let cycles = enumerate_cycles(&graph, &CycleFilters::from(&config.paths));
    tracing::info!(
        assets = graph.node_count(),
        edges = graph.edge_count(),
        cycles = cycles.len(),
        "cycle set enumerated"
    );

    let cache = Arc::new(OrderbookCache::new(config.execution.orderbook_depth_levels));
    let volatility = Arc::new(VolatilityCache::new(config.volatility.clone()));

    // One ingress task per exchange present in the seed data.
    let mut by_exchange: HashMap<String, Vec<SeedBook>> = HashMap::new();
    for book in universe.books {
        by_exchange.entry(book.exchange.clone()).or_default().push(book);
    }
    let mut shutdown_txs = Vec::new();
    let mut tasks = Vec::new();
    for (exchange, books) in by_exchange {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        shutdown_txs.push(shutdown_tx);
        let feed = SeedFeed::new(ExchangeId(exchange), books);
        let task = IngressTask::new(
            feed,
            Arc::clone(&cache),
            IngressConfig::default(),
            shutdown_rx,
        );
        tasks.push(tokio::spawn(task.run()));
    }

    let (opportunity_tx, mut opportunity_rx) = mpsc::channel(256);
    let (scanner_shutdown_tx, scanner_shutdown_rx) = mpsc::channel(1);
    shutdown_txs.push(scanner_shutdown_tx);
    let scanner = Scanner::new(
        graph,
        cycles,
        Arc::clone(&cache),
        volatility,
        PathEvaluator::new(RiskParams::from(&config.risk_model)),
        ScanConfig::from(&config.execution),
        opportunity_tx,
        scanner_shutdown_rx,
    );
    tasks.push(scanner.spawn());

    // Downstream consumer: print each qualifying record as JSON.
    let printer = tokio::spawn(async move {
        while let Some(op) = opportunity_rx.recv().await {
            match serde_json::to_string(&op) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(error = %e, "failed to serialize opportunity"),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    for tx in &shutdown_txs {
        let _ = tx.send(()).await;
    }
    for task in tasks {
        if let Err(e) = task.await? {
            tracing::error!(error = %e, "task finished with an error");
        }
    }
    drop(shutdown_txs);
    printer.abort();
    tracing::info!("scanner stopped");
    Ok(())
}

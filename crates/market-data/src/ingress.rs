//! Stream ingress: one task per exchange feed, sole writer for that
//! exchange's books.
//!
//! The task reads events under a heartbeat timeout, applies them to the
//! cache, forwards resync requests back to the feed, and reconnects with
//! capped exponential backoff after any disconnect. Transient stream trouble
//! never surfaces as an error: affected symbols go stale and the scanner
//! skips them until a fresh snapshot lands.

use crate::orderbook::{ApplyOutcome, BookEvent, OrderbookCache};
use anyhow::Result;
use async_trait::async_trait;
use common::ExchangeId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A provider of order-book events for one exchange. Implementations wrap
/// whatever transport the exchange speaks; the ingress task only sees this
/// seam.
#[async_trait]
pub trait BookFeed: Send {
    fn exchange(&self) -> &ExchangeId;

    /// Establishes (or re-establishes) the stream. Called before the first
    /// read and after every disconnect; implementations re-send full
    /// snapshots after a reconnect.
    async fn connect(&mut self) -> Result<()>;

    /// Next inbound message. `Err` means the stream is gone and the task
    /// should reconnect.
    async fn next_event(&mut self) -> Result<BookEvent>;

    /// Asks the provider to re-send a full snapshot for one symbol.
    async fn request_resync(&mut self, symbol: &str) -> Result<()>;
}

/// Timing knobs for the ingress loop.
#[derive(Debug, Clone)]
pub struct IngressConfig {
    /// A stream with no message for this long is considered dead.
    pub heartbeat_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_cap: Duration,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(10),
            backoff_initial: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

/// Long-lived task that owns one feed and writes its books.
pub struct IngressTask<F: BookFeed> {
    feed: F,
    cache: Arc<OrderbookCache>,
    config: IngressConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

enum StreamEnd {
    Shutdown,
    Reconnect,
}

impl<F: BookFeed> IngressTask<F> {
    pub fn new(
        feed: F,
        cache: Arc<OrderbookCache>,
        config: IngressConfig,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            feed,
            cache,
            config,
            shutdown_rx,
        }
    }

    /// Runs until shutdown. Reconnects forever; backoff doubles per failed
    /// attempt up to the cap and resets after a healthy connection.
    pub async fn run(mut self) -> Result<()> {
        let exchange = self.feed.exchange().clone();
        info!(%exchange, "ingress task started");
        let mut backoff = self.config.backoff_initial;

        loop {
            match self.feed.connect().await {
                Ok(()) => {
                    info!(%exchange, "feed connected");
                    backoff = self.config.backoff_initial;
                    match self.pump().await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Reconnect => {
                            self.cache.mark_stale_for_exchange(&exchange);
                        }
                    }
                }
                Err(e) => {
                    warn!(%exchange, error = %e, "feed connect failed");
                    self.cache.mark_stale_for_exchange(&exchange);
                }
            }

            tokio::select! {
                _ = self.shutdown_rx.recv() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.backoff_cap);
        }

        info!(%exchange, "ingress task stopped");
        Ok(())
    }

    /// Reads events until the stream dies or shutdown is requested.
    async fn pump(&mut self) -> StreamEnd {
        let exchange = self.feed.exchange().clone();
        loop {
            let event = tokio::select! {
                _ = self.shutdown_rx.recv() => return StreamEnd::Shutdown,
                read = timeout(self.config.heartbeat_timeout, self.feed.next_event()) => {
                    match read {
                        Err(_) => {
                            warn!(%exchange, "heartbeat timeout, reconnecting");
                            return StreamEnd::Reconnect;
                        }
                        Ok(Err(e)) => {
                            warn!(%exchange, error = %e, "stream error, reconnecting");
                            return StreamEnd::Reconnect;
                        }
                        Ok(Ok(event)) => event,
                    }
                }
            };

            let symbol = event.symbol().to_string();
            match self.cache.apply(event) {
                ApplyOutcome::Applied => {}
                ApplyOutcome::Ignored => {
                    debug!(%exchange, %symbol, "update dropped");
                }
                ApplyOutcome::ResyncNeeded => {
                    if let Err(e) = self.feed.request_resync(&symbol).await {
                        warn!(%exchange, %symbol, error = %e, "resync request failed, reconnecting");
                        return StreamEnd::Reconnect;
                    }
                }
                // The cache already raised the structured event; nothing to
                // resync, the symbol is out of rotation.
                ApplyOutcome::Quarantined => {}
            }
        }
    }
}

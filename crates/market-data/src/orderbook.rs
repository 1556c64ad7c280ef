//! Concurrent order-book store fed by the exchange streams.
//!
//! One ingress task is the sole writer for a given (exchange, symbol);
//! evaluators read concurrently. Each entry publishes an immutable
//! `Arc<BookSnapshot>` that is swapped wholesale on every applied update, so
//! a reader always observes either the pre-update or the post-update book,
//! never a torn mix of sides.

use common::ExchangeId;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Which side of the book a delta touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// One resting price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, qty: Decimal) -> Self {
        Self { price, qty }
    }

    pub fn notional(&self) -> Decimal {
        self.price * self.qty
    }
}

/// Point-in-time view of one market's depth, truncated to the configured
/// number of levels. Bids descend, asks ascend.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub sequence: u64,
    /// Exchange-reported event time, milliseconds.
    pub exchange_ts_ms: u64,
    /// Local receive time, used for staleness checks.
    pub updated_at: Instant,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn age(&self) -> Duration {
        self.updated_at.elapsed()
    }

    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }
}

/// An inbound market-data message for one (exchange, symbol).
#[derive(Debug, Clone)]
pub enum BookEvent {
    /// Full replacement of both sides.
    Snapshot {
        exchange: ExchangeId,
        symbol: String,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
        sequence: u64,
        ts_ms: u64,
    },
    /// Per-level upsert; qty == 0 removes the level.
    Delta {
        exchange: ExchangeId,
        symbol: String,
        side: BookSide,
        price: Decimal,
        qty: Decimal,
        sequence: u64,
        ts_ms: u64,
    },
}

impl BookEvent {
    pub fn exchange(&self) -> &ExchangeId {
        match self {
            BookEvent::Snapshot { exchange, .. } => exchange,
            BookEvent::Delta { exchange, .. } => exchange,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            BookEvent::Snapshot { symbol, .. } => symbol,
            BookEvent::Delta { symbol, .. } => symbol,
        }
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The entry went stale (sequence gap, crossed book, or a delta with no
    /// base snapshot); the ingress task must request a fresh snapshot.
    ResyncNeeded,
    /// An invariant violation that indicates an upstream bug. The symbol is
    /// out of rotation until restart.
    Quarantined,
    /// Dropped without effect (e.g. a delta while already stale).
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Live,
    Stale,
    Quarantined,
}

struct BookEntry {
    bids: Vec<BookLevel>,
    asks: Vec<BookLevel>,
    sequence: u64,
    state: EntryState,
    published: Arc<BookSnapshot>,
}

type BookKey = (ExchangeId, String);

/// Sharded store of live order books. `apply` runs on the owning ingress
/// task; `read`/`age` are short shard-locked lookups that only clone an
/// `Arc`, so scans never stall ingress.
pub struct OrderbookCache {
    books: DashMap<BookKey, BookEntry>,
    depth_levels: usize,
}

impl OrderbookCache {
    pub fn new(depth_levels: usize) -> Self {
        Self {
            books: DashMap::new(),
            depth_levels,
        }
    }

    /// Applies an inbound message, enforcing the book invariants.
    pub fn apply(&self, event: BookEvent) -> ApplyOutcome {
        match event {
            BookEvent::Snapshot {
                exchange,
                symbol,
                bids,
                asks,
                sequence,
                ts_ms,
            } => self.apply_snapshot(exchange, symbol, bids, asks, sequence, ts_ms),
            BookEvent::Delta {
                exchange,
                symbol,
                side,
                price,
                qty,
                sequence,
                ts_ms,
            } => self.apply_delta(exchange, symbol, side, price, qty, sequence, ts_ms),
        }
    }

    fn apply_snapshot(
        &self,
        exchange: ExchangeId,
        symbol: String,
        mut bids: Vec<BookLevel>,
        mut asks: Vec<BookLevel>,
        sequence: u64,
        ts_ms: u64,
    ) -> ApplyOutcome {
        let key = (exchange.clone(), symbol.clone());
        if let Some(entry) = self.books.get(&key) {
            if entry.state == EntryState::Quarantined {
                return ApplyOutcome::Ignored;
            }
        }

        if bids.iter().chain(asks.iter()).any(|l| l.qty < Decimal::ZERO || l.price <= Decimal::ZERO)
        {
            self.quarantine(&key, "snapshot carries non-positive price or negative qty");
            return ApplyOutcome::Quarantined;
        }

        bids.retain(|l| l.qty > Decimal::ZERO);
        asks.retain(|l| l.qty > Decimal::ZERO);
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        let crossed = matches!(
            (bids.first(), asks.first()),
            (Some(bid), Some(ask)) if bid.price >= ask.price
        );

        let state = if crossed { EntryState::Stale } else { EntryState::Live };
        let published = Arc::new(self.publishable(&exchange, &symbol, &bids, &asks, sequence, ts_ms));
        self.books.insert(
            key,
            BookEntry {
                bids,
                asks,
                sequence,
                state,
                published,
            },
        );

        if crossed {
            info!(%exchange, %symbol, sequence, "crossed snapshot, marking stale");
            ApplyOutcome::ResyncNeeded
        } else {
            ApplyOutcome::Applied
        }
    }

    fn apply_delta(
        &self,
        exchange: ExchangeId,
        symbol: String,
        side: BookSide,
        price: Decimal,
        qty: Decimal,
        sequence: u64,
        ts_ms: u64,
    ) -> ApplyOutcome {
        let key = (exchange.clone(), symbol.clone());
        let Some(mut entry) = self.books.get_mut(&key) else {
            // A delta before any snapshot has nothing to patch.
            debug!(%exchange, %symbol, sequence, "delta with no base snapshot");
            return ApplyOutcome::ResyncNeeded;
        };

        match entry.state {
            EntryState::Quarantined => return ApplyOutcome::Ignored,
            EntryState::Stale => return ApplyOutcome::Ignored,
            EntryState::Live => {}
        }

        if sequence != entry.sequence + 1 {
            entry.state = EntryState::Stale;
            info!(
                %exchange, %symbol,
                expected = entry.sequence + 1,
                got = sequence,
                "sequence gap, marking stale and requesting resync"
            );
            return ApplyOutcome::ResyncNeeded;
        }

        if qty < Decimal::ZERO || price <= Decimal::ZERO {
            drop(entry);
            self.quarantine(&key, "delta carries non-positive price or negative qty");
            return ApplyOutcome::Quarantined;
        }

        {
            let levels = match side {
                BookSide::Bid => &mut entry.bids,
                BookSide::Ask => &mut entry.asks,
            };
            let pos = match side {
                // Bids descend, asks ascend; search for the slot keeping order.
                BookSide::Bid => levels.binary_search_by(|l| price.cmp(&l.price)),
                BookSide::Ask => levels.binary_search_by(|l| l.price.cmp(&price)),
            };
            match pos {
                Ok(i) => {
                    if qty.is_zero() {
                        levels.remove(i);
                    } else {
                        levels[i].qty = qty;
                    }
                }
                Err(i) => {
                    if !qty.is_zero() {
                        levels.insert(i, BookLevel::new(price, qty));
                    }
                }
            }
        }
        entry.sequence = sequence;

        let crossed = matches!(
            (entry.bids.first(), entry.asks.first()),
            (Some(bid), Some(ask)) if bid.price >= ask.price
        );
        if crossed {
            entry.state = EntryState::Stale;
            info!(%exchange, %symbol, sequence, "book crossed after delta, marking stale");
            return ApplyOutcome::ResyncNeeded;
        }

        entry.published = Arc::new(self.publishable(
            &exchange,
            &symbol,
            &entry.bids,
            &entry.asks,
            sequence,
            ts_ms,
        ));
        ApplyOutcome::Applied
    }

    fn publishable(
        &self,
        exchange: &ExchangeId,
        symbol: &str,
        bids: &[BookLevel],
        asks: &[BookLevel],
        sequence: u64,
        ts_ms: u64,
    ) -> BookSnapshot {
        BookSnapshot {
            exchange: exchange.clone(),
            symbol: symbol.to_string(),
            bids: bids.iter().take(self.depth_levels).copied().collect(),
            asks: asks.iter().take(self.depth_levels).copied().collect(),
            sequence,
            exchange_ts_ms: ts_ms,
            updated_at: Instant::now(),
        }
    }

    fn quarantine(&self, key: &BookKey, reason: &str) {
        let placeholder = || BookEntry {
            bids: Vec::new(),
            asks: Vec::new(),
            sequence: 0,
            state: EntryState::Quarantined,
            published: Arc::new(self.publishable(&key.0, &key.1, &[], &[], 0, 0)),
        };
        self.books
            .entry(key.clone())
            .and_modify(|e| e.state = EntryState::Quarantined)
            .or_insert_with(placeholder);
        error!(
            exchange = %key.0,
            symbol = %key.1,
            reason,
            "book invariant violation, quarantining symbol"
        );
    }

    /// Returns the current consistent snapshot, or `None` while the entry is
    /// stale, quarantined, or missing.
    pub fn read(&self, exchange: &ExchangeId, symbol: &str) -> Option<Arc<BookSnapshot>> {
        let entry = self.books.get(&(exchange.clone(), symbol.to_string()))?;
        if entry.state != EntryState::Live {
            return None;
        }
        Some(Arc::clone(&entry.published))
    }

    /// Time since the last accepted update for the symbol.
    pub fn age(&self, exchange: &ExchangeId, symbol: &str) -> Option<Duration> {
        let entry = self.books.get(&(exchange.clone(), symbol.to_string()))?;
        Some(entry.published.updated_at.elapsed())
    }

    /// Marks a single symbol stale until its next snapshot.
    pub fn mark_stale(&self, exchange: &ExchangeId, symbol: &str) {
        if let Some(mut entry) = self.books.get_mut(&(exchange.clone(), symbol.to_string())) {
            if entry.state == EntryState::Live {
                entry.state = EntryState::Stale;
            }
        }
    }

    /// Marks every non-quarantined entry of an exchange stale. Used by the
    /// ingress task on disconnect or heartbeat timeout.
    pub fn mark_stale_for_exchange(&self, exchange: &ExchangeId) {
        for mut entry in self.books.iter_mut() {
            if entry.key().0 == *exchange && entry.state == EntryState::Live {
                entry.state = EntryState::Stale;
            }
        }
    }

    /// True once at least one live book exists.
    pub fn has_data(&self) -> bool {
        self.books.iter().any(|e| e.state == EntryState::Live)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

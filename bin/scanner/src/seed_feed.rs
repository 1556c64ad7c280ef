//! A `BookFeed` that replays the universe file's seed books.
//!
//! Useful for dry runs and wiring checks: it sends one snapshot per seeded
//! symbol, answers resync requests by re-sending that symbol's snapshot, and
//! otherwise idles. Live deployments replace this with a real exchange
//! adapter behind the same trait.

use crate::SeedBook;
use anyhow::Result;
use async_trait::async_trait;
use common::ExchangeId;
use market_data::{BookEvent, BookFeed, BookLevel};
use std::collections::{HashMap, VecDeque};

pub struct SeedFeed {
    exchange: ExchangeId,
    seeds: HashMap<String, SeedBook>,
    pending: VecDeque<BookEvent>,
    next_seq: u64,
}

impl SeedFeed {
    pub fn new(exchange: ExchangeId, books: Vec<SeedBook>) -> Self {
        let seeds: HashMap<String, SeedBook> = books
            .into_iter()
            .map(|b| (b.symbol.clone(), b))
            .collect();
        Self {
            exchange,
            seeds,
            pending: VecDeque::new(),
            next_seq: 0,
        }
    }

    fn snapshot_for(&mut self, symbol: &str) -> Option<BookEvent> {
        let seed = self.seeds.get(symbol)?;
        self.next_seq += 1;
        Some(BookEvent::Snapshot {
            exchange: self.exchange.clone(),
            symbol: seed.symbol.clone(),
            bids: seed
                .bids
                .iter()
                .map(|&(p, q)| BookLevel::new(p, q))
                .collect(),
            asks: seed
                .asks
                .iter()
                .map(|&(p, q)| BookLevel::new(p, q))
                .collect(),
            sequence: self.next_seq,
            ts_ms: 0,
        })
    }
}

#[async_trait]
impl BookFeed for SeedFeed {
    fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    async fn connect(&mut self) -> Result<()> {
        let symbols: Vec<String> = self.seeds.keys().cloned().collect();
        self.pending.clear();
        for symbol in symbols {
            if let Some(event) = self.snapshot_for(&symbol) {
                self.pending.push_back(event);
            }
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Result<BookEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }
        // Nothing further to replay; park until shutdown.
        std::future::pending::<()>().await;
        unreachable!()
    }

    async fn request_resync(&mut self, symbol: &str) -> Result<()> {
        if let Some(event) = self.snapshot_for(symbol) {
            self.pending.push_back(event);
        }
        Ok(())
    }
}

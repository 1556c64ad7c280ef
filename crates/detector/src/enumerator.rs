//! Pre-computation of candidate arbitrage cycles.
//!
//! Depth-first search rooted at every configured start asset, with an
//! explicit stack for predictable memory. Emitted cycles are canonicalized by
//! rotation so equivalent cycles found from different roots collapse to one.

use crate::graph::MarketGraph;
use common::Asset;
use config_lib::PathsConfig;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::{BTreeSet, HashSet};

/// Search filters, resolved from the paths section of the configuration.
#[derive(Debug, Clone)]
pub struct CycleFilters {
    pub min_len: usize,
    pub max_len: usize,
    pub start_assets: BTreeSet<Asset>,
    pub allow_revisit_assets: bool,
    pub allow_same_market_twice: bool,
    pub allow_cross_exchange: bool,
}

impl From<&PathsConfig> for CycleFilters {
    fn from(config: &PathsConfig) -> Self {
        Self {
            min_len: config.min_length,
            max_len: config.max_length,
            start_assets: config.start_assets.iter().map(|s| Asset::new(s)).collect(),
            allow_revisit_assets: config.allow_revisit_nodes,
            allow_same_market_twice: config.allow_same_market_twice,
            allow_cross_exchange: config.allow_cross_exchange,
        }
    }
}

/// A closed directed walk through the market graph, canonicalized to start at
/// the smallest start asset it contains.
#[derive(Debug, Clone)]
pub struct Cycle {
    /// Canonical textual id, "edge|edge|...": unique per cycle.
    pub id: String,
    pub edges: Vec<EdgeIndex>,
    /// Assets visited in order; `assets[0] == assets[assets.len() - 1]`.
    pub assets: Vec<Asset>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn start_asset(&self) -> &Asset {
        &self.assets[0]
    }
}

/// Enumerates all canonical cycles that satisfy the filters. The result is
/// held for the scanner's lifetime; it only changes when the graph or config
/// changes.
pub fn enumerate_cycles(graph: &MarketGraph, filters: &CycleFilters) -> Vec<Cycle> {
    let mut seen: HashSet<Vec<EdgeIndex>> = HashSet::new();
    let mut cycles = Vec::new();

    for start in &filters.start_assets {
        let Some(root) = graph.node(start) else {
            continue;
        };
        search_from(graph, filters, root, &mut seen, &mut cycles);
    }
    cycles
}

struct Frame {
    candidates: Vec<(EdgeIndex, NodeIndex)>,
    next: usize,
}

fn search_from(
    graph: &MarketGraph,
    filters: &CycleFilters,
    root: NodeIndex,
    seen: &mut HashSet<Vec<EdgeIndex>>,
    out: &mut Vec<Cycle>,
) {
    let mut path_edges: Vec<EdgeIndex> = Vec::new();
    let mut path_nodes: Vec<NodeIndex> = vec![root];
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut stack = vec![Frame {
        candidates: graph.out_edges(root).collect(),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        if frame.next >= frame.candidates.len() {
            stack.pop();
            if let Some(node) = path_nodes.pop() {
                if stack.is_empty() {
                    break;
                }
                visited.remove(&node);
                path_edges.pop();
            }
            continue;
        }
        let (edge_idx, target) = frame.candidates[frame.next];
        frame.next += 1;

        let edge = graph.edge(edge_idx);
        let depth = path_edges.len() + 1;

        if !filters.allow_same_market_twice
            && path_edges
                .iter()
                .any(|&e| graph.edge(e).market_key() == edge.market_key())
        {
            continue;
        }
        if !filters.allow_cross_exchange {
            if let Some(&first) = path_edges.first() {
                if graph.edge(first).exchange() != edge.exchange() {
                    continue;
                }
            }
        }

        if target == root {
            if depth >= filters.min_len {
                path_edges.push(edge_idx);
                emit(graph, filters, &path_edges, seen, out);
                path_edges.pop();
            }
            continue;
        }
        // A non-closing edge at max depth cannot lead anywhere.
        if depth >= filters.max_len {
            continue;
        }
        if !filters.allow_revisit_assets && visited.contains(&target) {
            continue;
        }

        path_edges.push(edge_idx);
        path_nodes.push(target);
        visited.insert(target);
        stack.push(Frame {
            candidates: graph.out_edges(target).collect(),
            next: 0,
        });
    }
}

fn emit(
    graph: &MarketGraph,
    filters: &CycleFilters,
    edges: &[EdgeIndex],
    seen: &mut HashSet<Vec<EdgeIndex>>,
    out: &mut Vec<Cycle>,
) {
    let canonical = canonicalize(graph, filters, edges);
    if !seen.insert(canonical.clone()) {
        return;
    }

    let mut assets = Vec::with_capacity(canonical.len() + 1);
    assets.push(graph.edge(canonical[0]).from_asset().clone());
    for &e in &canonical {
        assets.push(graph.edge(e).to_asset().clone());
    }
    let id = canonical
        .iter()
        .map(|&e| graph.edge(e).edge_id())
        .collect::<Vec<_>>()
        .join("|");

    out.push(Cycle {
        id,
        edges: canonical,
        assets,
    });
}

/// Rotates the cycle so it starts at the lexicographically smallest start
/// asset present; among equal-asset rotations the smallest edge sequence
/// wins.
fn canonicalize(graph: &MarketGraph, filters: &CycleFilters, edges: &[EdgeIndex]) -> Vec<EdgeIndex> {
    let sources: Vec<&Asset> = edges.iter().map(|&e| graph.edge(e).from_asset()).collect();
    let pivot = sources
        .iter()
        .filter(|a| filters.start_assets.contains(**a))
        .min()
        .copied();
    let Some(pivot) = pivot else {
        return edges.to_vec();
    };

    let mut best: Option<Vec<EdgeIndex>> = None;
    for (i, source) in sources.iter().enumerate() {
        if *source != pivot {
            continue;
        }
        let mut rotation = Vec::with_capacity(edges.len());
        rotation.extend_from_slice(&edges[i..]);
        rotation.extend_from_slice(&edges[..i]);
        if best.as_ref().map_or(true, |b| rotation < *b) {
            best = Some(rotation);
        }
    }
    best.unwrap_or_else(|| edges.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ExchangeId, MarketSpec};
    use market_data::MarketRegistry;
    use rust_decimal_macros::dec;

    fn spec(exchange: &str, symbol: &str, base: &str, quote: &str) -> MarketSpec {
        MarketSpec {
            exchange: ExchangeId::from(exchange),
            symbol: symbol.to_string(),
            base: Asset::from(base),
            quote: Asset::from(quote),
            taker_fee: dec!(0.001),
            min_notional: dec!(5),
            price_tick: dec!(0.01),
            qty_tick: dec!(0.00000001),
        }
    }

    fn triangle_graph() -> MarketGraph {
        let mut registry = MarketRegistry::new();
        registry
            .register(spec("coinbase", "BTC-USDC", "BTC", "USDC"))
            .unwrap();
        registry
            .register(spec("coinbase", "ETH-USDC", "ETH", "USDC"))
            .unwrap();
        registry
            .register(spec("coinbase", "BTC-ETH", "BTC", "ETH"))
            .unwrap();
        MarketGraph::from_registry(&registry)
    }

    fn filters() -> CycleFilters {
        CycleFilters {
            min_len: 3,
            max_len: 4,
            start_assets: [Asset::from("USDC")].into_iter().collect(),
            allow_revisit_assets: false,
            allow_same_market_twice: false,
            allow_cross_exchange: true,
        }
    }

    #[test]
    fn test_triangle_cycles_found() {
        let graph = triangle_graph();
        let cycles = enumerate_cycles(&graph, &filters());

        // USDC -> BTC -> ETH -> USDC and USDC -> ETH -> BTC -> USDC.
        assert_eq!(cycles.len(), 2);
        for cycle in &cycles {
            assert_eq!(cycle.len(), 3);
            assert_eq!(cycle.start_asset(), &Asset::from("USDC"));
            assert_eq!(cycle.assets.first(), cycle.assets.last());
        }
    }

    #[test]
    fn test_cycles_are_closed_walks() {
        let graph = triangle_graph();
        for cycle in enumerate_cycles(&graph, &filters()) {
            for pair in cycle.edges.windows(2) {
                assert_eq!(
                    graph.edge(pair[0]).to_asset(),
                    graph.edge(pair[1]).from_asset()
                );
            }
            let first = graph.edge(*cycle.edges.first().unwrap());
            let last = graph.edge(*cycle.edges.last().unwrap());
            assert_eq!(last.to_asset(), first.from_asset());
        }
    }

    #[test]
    fn test_min_length_excludes_two_leg_bounce() {
        let graph = triangle_graph();
        let mut f = filters();
        f.min_len = 2;
        let cycles = enumerate_cycles(&graph, &f);
        // With min_len 2 the buy-then-sell bounce on one market would be a
        // closed walk, but it reuses the market and stays excluded.
        assert!(cycles.iter().all(|c| c.len() >= 3));

        f.allow_same_market_twice = true;
        let with_bounce = enumerate_cycles(&graph, &f);
        assert!(with_bounce.iter().any(|c| c.len() == 2));
    }

    #[test]
    fn test_max_length_bounds_search() {
        let graph = triangle_graph();
        let mut f = filters();
        f.max_len = 2;
        assert!(enumerate_cycles(&graph, &f).is_empty());
    }

    #[test]
    fn test_canonical_uniqueness_across_roots() {
        // Same triangle, but rooted at two start assets: each cycle is
        // reachable from both roots yet must appear exactly once, rotated to
        // the smaller start asset (ETH sorts before USDC).
        let graph = triangle_graph();
        let f = CycleFilters {
            min_len: 3,
            max_len: 4,
            start_assets: [Asset::from("USDC"), Asset::from("ETH")]
                .into_iter()
                .collect(),
            allow_revisit_assets: false,
            allow_same_market_twice: false,
            allow_cross_exchange: true,
        };
        let cycles = enumerate_cycles(&graph, &f);

        let ids: HashSet<_> = cycles.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), cycles.len(), "duplicate canonical cycles");
        assert_eq!(cycles.len(), 2);
        for cycle in &cycles {
            assert_eq!(cycle.start_asset(), &Asset::from("ETH"));
        }
    }

    #[test]
    fn test_cross_exchange_pinning() {
        let mut registry = MarketRegistry::new();
        registry
            .register(spec("coinbase", "BTC-USDC", "BTC", "USDC"))
            .unwrap();
        registry
            .register(spec("coinbase", "ETH-USDC", "ETH", "USDC"))
            .unwrap();
        registry
            .register(spec("coinbase", "BTC-ETH", "BTC", "ETH"))
            .unwrap();
        registry
            .register(spec("kraken", "BTC-ETH", "BTC", "ETH"))
            .unwrap();
        let graph = MarketGraph::from_registry(&registry);

        let mut f = filters();
        let cross = enumerate_cycles(&graph, &f);
        // The middle leg can route through either exchange.
        assert_eq!(cross.len(), 4);

        f.allow_cross_exchange = false;
        let pinned = enumerate_cycles(&graph, &f);
        assert_eq!(pinned.len(), 2);
        for cycle in &pinned {
            let exchanges: HashSet<_> = cycle
                .edges
                .iter()
                .map(|&e| graph.edge(e).exchange().clone())
                .collect();
            assert_eq!(exchanges.len(), 1);
        }
    }

    #[test]
    fn test_no_asset_revisit_by_default() {
        let graph = triangle_graph();
        for cycle in enumerate_cycles(&graph, &filters()) {
            let interior = &cycle.assets[1..cycle.assets.len() - 1];
            let unique: HashSet<_> = interior.iter().collect();
            assert_eq!(unique.len(), interior.len());
        }
    }
}

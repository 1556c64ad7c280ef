//! Directed multigraph of assets connected by market edges.
//!
//! Every registered market contributes two edges: BUY (quote to base, lifts
//! asks) and SELL (base to quote, hits bids). Markets for the same pair on
//! different exchanges coexist as parallel edges; cross-exchange cycles need
//! them, so nothing is collapsed by (from, to).

use common::{Asset, ExchangeId, MarketSpec, Side};
use market_data::MarketRegistry;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Arc;

/// One traversable direction of a market.
#[derive(Debug, Clone)]
pub struct MarketEdge {
    pub side: Side,
    pub spec: Arc<MarketSpec>,
}

impl MarketEdge {
    pub fn from_asset(&self) -> &Asset {
        self.spec.input_asset(self.side)
    }

    pub fn to_asset(&self) -> &Asset {
        self.spec.output_asset(self.side)
    }

    pub fn exchange(&self) -> &ExchangeId {
        &self.spec.exchange
    }

    /// Identity of the underlying market, shared by the BUY and SELL edge.
    pub fn market_key(&self) -> (ExchangeId, String) {
        (self.spec.exchange.clone(), self.spec.symbol.clone())
    }

    /// Stable display form used in cycle ids: "exchange:symbol:SIDE".
    pub fn edge_id(&self) -> String {
        format!("{}:{}:{}", self.spec.exchange, self.spec.symbol, self.side)
    }
}

/// Asset graph derived from the registry. Built once at startup, read-only
/// afterwards.
#[derive(Debug, Default)]
pub struct MarketGraph {
    graph: DiGraph<Asset, MarketEdge>,
    node_of: HashMap<Asset, NodeIndex>,
}

impl MarketGraph {
    pub fn from_registry(registry: &MarketRegistry) -> Self {
        let mut this = Self {
            graph: DiGraph::new(),
            node_of: HashMap::new(),
        };
        for spec in registry.all() {
            this.add_market(Arc::clone(spec));
        }
        this
    }

    fn add_market(&mut self, spec: Arc<MarketSpec>) {
        let base = self.intern(spec.base.clone());
        let quote = self.intern(spec.quote.clone());
        self.graph.add_edge(
            quote,
            base,
            MarketEdge {
                side: Side::Buy,
                spec: Arc::clone(&spec),
            },
        );
        self.graph.add_edge(
            base,
            quote,
            MarketEdge {
                side: Side::Sell,
                spec,
            },
        );
    }

    fn intern(&mut self, asset: Asset) -> NodeIndex {
        if let Some(&idx) = self.node_of.get(&asset) {
            return idx;
        }
        let idx = self.graph.add_node(asset.clone());
        self.node_of.insert(asset, idx);
        idx
    }

    pub fn node(&self, asset: &Asset) -> Option<NodeIndex> {
        self.node_of.get(asset).copied()
    }

    pub fn asset(&self, node: NodeIndex) -> &Asset {
        &self.graph[node]
    }

    pub fn edge(&self, edge: EdgeIndex) -> &MarketEdge {
        &self.graph[edge]
    }

    /// Outgoing edges of a node as (edge index, target node).
    pub fn out_edges(&self, node: NodeIndex) -> impl Iterator<Item = (EdgeIndex, NodeIndex)> + '_ {
        self.graph.edges(node).map(|e| (e.id(), e.target()))
    }

    /// Edges leaving an asset, in the spec's neighbor-listing sense.
    pub fn neighbors<'a>(&'a self, asset: &Asset) -> Box<dyn Iterator<Item = &'a MarketEdge> + 'a> {
        match self.node(asset) {
            Some(node) => Box::new(self.graph.edges(node).map(|e| e.weight())),
            None => Box::new(std::iter::empty()),
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Asset> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, &MarketEdge)> {
        self.graph.edge_references().map(|e| (e.id(), e.weight()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

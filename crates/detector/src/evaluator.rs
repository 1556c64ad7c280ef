//! Simulates executing a cycle against live depth and prices the result.
//!
//! Each leg walks its side of the book level by level in decimal arithmetic:
//! BUY spends quote into asks (ascending), SELL spends base into bids
//! (descending). Leg output is charged the market's taker fee and becomes the
//! next leg's input. The cycle then takes a slippage penalty proportional to
//! how deep past top-of-book it ate, and a volatility penalty from the most
//! volatile asset it touches. Rejections here are normal control flow, not
//! errors.

use crate::enumerator::Cycle;
use crate::graph::MarketGraph;
use common::{Asset, ExchangeId, Side};
use config_lib::RiskModelConfig;
use market_data::{BookLevel, BookSnapshot};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Evaluator thresholds and penalty coefficients, resolved once from config.
#[derive(Debug, Clone)]
pub struct RiskParams {
    pub min_profit_margin: Decimal,
    pub vol_risk_multiplier: Decimal,
    pub slippage_coefficient: Decimal,
    pub staleness_bound: Duration,
    pub min_leg_fill_ratio: Decimal,
    pub continue_on_partial_fill: bool,
}

impl From<&RiskModelConfig> for RiskParams {
    fn from(config: &RiskModelConfig) -> Self {
        Self {
            min_profit_margin: config.min_profit_margin,
            vol_risk_multiplier: config.vol_risk_multiplier,
            slippage_coefficient: config.slippage_coefficient,
            staleness_bound: Duration::from_millis(config.staleness_bound_ms),
            min_leg_fill_ratio: config.min_leg_fill_ratio,
            continue_on_partial_fill: config.continue_on_partial_fill,
        }
    }
}

/// What stopped the cycle from doing better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedBy {
    Depth,
    MinNotional,
    None,
}

/// Why a cycle was rejected this scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    Threshold,
    Notional,
    Staleness,
    Fill,
    MissingBook,
    CrossedBook,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalOutcome {
    Qualified,
    Rejected(RejectReason),
}

/// Per-leg fill detail, kept for logging and the emitted record.
#[derive(Debug, Clone, Serialize)]
pub struct LegFill {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub side: Side,
    pub input: Decimal,
    /// Post-fee output, the next leg's input.
    pub output: Decimal,
    /// Quote traded on this leg, used for min-notional gating.
    pub quote_notional: Decimal,
    pub fill_ratio: Decimal,
}

/// Result of evaluating one cycle against one set of snapshots.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub cycle_id: String,
    pub input_asset: Asset,
    pub input_qty: Decimal,
    pub output_qty: Decimal,
    pub gross_return: Decimal,
    pub fee_adjusted_return: Decimal,
    pub risk_adjusted_return: Decimal,
    pub worst_leg_fill_ratio: Decimal,
    pub limited_by: LimitedBy,
    pub outcome: EvalOutcome,
    /// The market that caused a staleness/crossed/missing rejection.
    pub offending_market: Option<(ExchangeId, String)>,
    pub legs: Vec<LegFill>,
}

impl Evaluation {
    pub fn is_qualified(&self) -> bool {
        self.outcome == EvalOutcome::Qualified
    }
}

/// Snapshots gathered for one evaluation, keyed by (exchange, symbol).
pub type BookMap = HashMap<(ExchangeId, String), Arc<BookSnapshot>>;

struct DepthWalk {
    /// Asset received, before fees.
    output: Decimal,
    /// Input actually consumed by the walked levels.
    consumed: Decimal,
    /// Quote traded while walking.
    quote_notional: Decimal,
    /// Notional resting at the best level, the slippage reference.
    top_notional: Decimal,
}

/// BUY: spend quote into asks, ascending.
fn walk_asks(levels: &[BookLevel], quote_in: Decimal) -> DepthWalk {
    let mut remaining = quote_in;
    let mut acquired = Decimal::ZERO;
    for level in levels {
        if remaining.is_zero() {
            break;
        }
        let cost = level.notional();
        if remaining >= cost {
            acquired += level.qty;
            remaining -= cost;
        } else {
            acquired += remaining / level.price;
            remaining = Decimal::ZERO;
        }
    }
    let consumed = quote_in - remaining;
    DepthWalk {
        output: acquired,
        consumed,
        quote_notional: consumed,
        top_notional: levels.first().map(BookLevel::notional).unwrap_or_default(),
    }
}

/// SELL: spend base into bids, descending.
fn walk_bids(levels: &[BookLevel], base_in: Decimal) -> DepthWalk {
    let mut remaining = base_in;
    let mut proceeds = Decimal::ZERO;
    for level in levels {
        if remaining.is_zero() {
            break;
        }
        if remaining >= level.qty {
            proceeds += level.notional();
            remaining -= level.qty;
        } else {
            proceeds += level.price * remaining;
            remaining = Decimal::ZERO;
        }
    }
    DepthWalk {
        output: proceeds,
        consumed: base_in - remaining,
        quote_notional: proceeds,
        top_notional: levels.first().map(BookLevel::notional).unwrap_or_default(),
    }
}

fn floor_to_tick(value: Decimal, tick: Decimal) -> Decimal {
    if tick.is_zero() {
        return value;
    }
    (value / tick).floor() * tick
}

pub struct PathEvaluator {
    params: RiskParams,
}

impl PathEvaluator {
    pub fn new(params: RiskParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    /// Prices a cycle for `notional` of its start asset against the given
    /// snapshots. Never suspends; a cycle is evaluated against exactly the
    /// snapshots it was handed.
    pub fn evaluate(
        &self,
        graph: &MarketGraph,
        cycle: &Cycle,
        notional: Decimal,
        books: &BookMap,
        sigmas: &HashMap<Asset, Decimal>,
    ) -> Evaluation {
        let mut eval = Evaluation {
            cycle_id: cycle.id.clone(),
            input_asset: cycle.start_asset().clone(),
            input_qty: notional,
            output_qty: Decimal::ZERO,
            gross_return: Decimal::ZERO,
            fee_adjusted_return: Decimal::ZERO,
            risk_adjusted_return: Decimal::ZERO,
            worst_leg_fill_ratio: Decimal::ONE,
            limited_by: LimitedBy::None,
            outcome: EvalOutcome::Qualified,
            offending_market: None,
            legs: Vec::with_capacity(cycle.len()),
        };

        if let Some(&first) = cycle.edges.first() {
            // The starting notional must clear the first leg's minimum
            // before any book is walked.
            if notional < graph.edge(first).spec.min_notional {
                eval.limited_by = LimitedBy::MinNotional;
                eval.outcome = EvalOutcome::Rejected(RejectReason::Notional);
                return eval;
            }
        }

        let mut current = notional;
        let mut gross_return = Decimal::ONE;
        let mut fee_adjusted_return = Decimal::ONE;
        let mut slippage_score = Decimal::ZERO;
        let mut max_sigma = Decimal::ZERO;

        for &edge_idx in &cycle.edges {
            let edge = graph.edge(edge_idx);
            let spec = &edge.spec;
            let key = edge.market_key();

            let Some(snapshot) = books.get(&key) else {
                eval.offending_market = Some(key);
                eval.outcome = EvalOutcome::Rejected(RejectReason::MissingBook);
                return eval;
            };
            if snapshot.age() > self.params.staleness_bound {
                eval.offending_market = Some(key);
                eval.outcome = EvalOutcome::Rejected(RejectReason::Staleness);
                return eval;
            }
            if snapshot.is_crossed() {
                eval.offending_market = Some(key);
                eval.outcome = EvalOutcome::Rejected(RejectReason::CrossedBook);
                return eval;
            }

            // Only whole multiples of qty_tick are executable base.
            let tradable_in = match edge.side {
                Side::Buy => current,
                Side::Sell => floor_to_tick(current, spec.qty_tick),
            };
            if tradable_in <= Decimal::ZERO {
                eval.limited_by = LimitedBy::MinNotional;
                eval.outcome = EvalOutcome::Rejected(RejectReason::Notional);
                return eval;
            }

            let walk = match edge.side {
                Side::Buy => walk_asks(&snapshot.asks, tradable_in),
                Side::Sell => walk_bids(&snapshot.bids, tradable_in),
            };

            let fill_ratio = walk.consumed / tradable_in;
            eval.worst_leg_fill_ratio = eval.worst_leg_fill_ratio.min(fill_ratio);
            if fill_ratio < Decimal::ONE {
                eval.limited_by = LimitedBy::Depth;
                if fill_ratio < self.params.min_leg_fill_ratio
                    || !self.params.continue_on_partial_fill
                {
                    eval.outcome = EvalOutcome::Rejected(RejectReason::Fill);
                    return eval;
                }
            }

            if walk.quote_notional < spec.min_notional {
                eval.limited_by = LimitedBy::MinNotional;
                eval.outcome = EvalOutcome::Rejected(RejectReason::Notional);
                return eval;
            }

            let raw_out = match edge.side {
                Side::Buy => floor_to_tick(walk.output, spec.qty_tick),
                Side::Sell => walk.output,
            };
            if raw_out <= Decimal::ZERO {
                eval.outcome = EvalOutcome::Rejected(RejectReason::Fill);
                return eval;
            }
            let net_out = raw_out * (Decimal::ONE - spec.taker_fee);

            gross_return *= raw_out / tradable_in;
            fee_adjusted_return *= net_out / tradable_in;
            if walk.top_notional > Decimal::ZERO {
                slippage_score += walk.quote_notional / walk.top_notional;
            }
            max_sigma = max_sigma.max(sigmas.get(&spec.base).copied().unwrap_or_default());

            eval.legs.push(LegFill {
                exchange: spec.exchange.clone(),
                symbol: spec.symbol.clone(),
                side: edge.side,
                input: tradable_in,
                output: net_out,
                quote_notional: walk.quote_notional,
                fill_ratio,
            });
            current = net_out;
        }

        eval.output_qty = current;
        eval.gross_return = gross_return;
        eval.fee_adjusted_return = fee_adjusted_return;
        eval.risk_adjusted_return = fee_adjusted_return
            - self.params.slippage_coefficient * slippage_score
            - self.params.vol_risk_multiplier * max_sigma;

        if eval.risk_adjusted_return - Decimal::ONE < self.params.min_profit_margin {
            eval.outcome = EvalOutcome::Rejected(RejectReason::Threshold);
        }
        eval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::{enumerate_cycles, CycleFilters};
    use common::MarketSpec;
    use market_data::MarketRegistry;
    use rust_decimal_macros::dec;
    use std::time::Instant;

    fn spec(symbol: &str, base: &str, quote: &str, fee: Decimal) -> MarketSpec {
        // Minimums are denominated in the quote asset.
        let min_notional = if quote == "USDC" { dec!(5) } else { dec!(0.0001) };
        MarketSpec {
            exchange: ExchangeId::from("coinbase"),
            symbol: symbol.to_string(),
            base: Asset::from(base),
            quote: Asset::from(quote),
            taker_fee: fee,
            min_notional,
            price_tick: dec!(0.00000001),
            qty_tick: dec!(0.00000001),
        }
    }

    fn triangle_graph(fee: Decimal) -> MarketGraph {
        let mut registry = MarketRegistry::new();
        registry.register(spec("BTC-USDC", "BTC", "USDC", fee)).unwrap();
        registry.register(spec("ETH-USDC", "ETH", "USDC", fee)).unwrap();
        registry.register(spec("BTC-ETH", "BTC", "ETH", fee)).unwrap();
        MarketGraph::from_registry(&registry)
    }

    fn usdc_cycles(graph: &MarketGraph) -> Vec<Cycle> {
        enumerate_cycles(
            graph,
            &CycleFilters {
                min_len: 3,
                max_len: 3,
                start_assets: [Asset::from("USDC")].into_iter().collect(),
                allow_revisit_assets: false,
                allow_same_market_twice: false,
                allow_cross_exchange: true,
            },
        )
    }

    /// The cycle that buys BTC with USDC first.
    fn btc_first_cycle(graph: &MarketGraph) -> Cycle {
        usdc_cycles(graph)
            .into_iter()
            .find(|c| c.assets[1] == Asset::from("BTC"))
            .expect("triangle must contain USDC->BTC->ETH->USDC")
    }

    fn book(
        symbol: &str,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) -> ((ExchangeId, String), Arc<BookSnapshot>) {
        let key = (ExchangeId::from("coinbase"), symbol.to_string());
        let snap = BookSnapshot {
            exchange: key.0.clone(),
            symbol: symbol.to_string(),
            bids: bids.iter().map(|&(p, q)| BookLevel::new(p, q)).collect(),
            asks: asks.iter().map(|&(p, q)| BookLevel::new(p, q)).collect(),
            sequence: 1,
            exchange_ts_ms: 0,
            updated_at: Instant::now(),
        };
        (key, Arc::new(snap))
    }

    fn params() -> RiskParams {
        RiskParams {
            min_profit_margin: dec!(0.001),
            vol_risk_multiplier: Decimal::ZERO,
            slippage_coefficient: Decimal::ZERO,
            staleness_bound: Duration::from_secs(1),
            min_leg_fill_ratio: dec!(0.9),
            continue_on_partial_fill: true,
        }
    }

    fn flat_books() -> BookMap {
        // The S1 layout: tight books, no edge anywhere.
        [
            book(
                "BTC-USDC",
                &[(dec!(49990), dec!(1))],
                &[(dec!(50000), dec!(1))],
            ),
            book(
                "ETH-USDC",
                &[(dec!(2999), dec!(10))],
                &[(dec!(3000), dec!(10))],
            ),
            book(
                "BTC-ETH",
                &[(dec!(16.66), dec!(1))],
                &[(dec!(16.67), dec!(1))],
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_flat_book_rejected_below_margin() {
        let graph = triangle_graph(dec!(0.001));
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &flat_books(), &HashMap::new());
        assert_eq!(eval.outcome, EvalOutcome::Rejected(RejectReason::Threshold));
        assert!(eval.risk_adjusted_return - Decimal::ONE < dec!(0.001));
    }

    #[test]
    fn test_clear_triangular_profit() {
        // Fees 0, ETH-USDC bid lifted to 3000. With BTC-ETH bid at 16.5 the
        // loop loses 1%; raising that bid to 17.0 turns it into a 2% win.
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        let mut books = flat_books();
        let (key, snap) = book(
            "ETH-USDC",
            &[(dec!(3000), dec!(10))],
            &[(dec!(3001), dec!(10))],
        );
        books.insert(key, snap);
        let (key, snap) = book(
            "BTC-ETH",
            &[(dec!(16.5), dec!(1))],
            &[(dec!(16.5), dec!(1))],
        );
        books.insert(key, snap);

        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &books, &HashMap::new());
        assert_eq!(eval.gross_return, dec!(0.99));
        assert_eq!(eval.output_qty, dec!(990));
        assert_eq!(eval.outcome, EvalOutcome::Rejected(RejectReason::Threshold));

        let (key, snap) = book(
            "BTC-ETH",
            &[(dec!(17.0), dec!(1))],
            &[(dec!(17.0), dec!(1))],
        );
        books.insert(key, snap);
        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &books, &HashMap::new());
        assert_eq!(eval.gross_return, dec!(1.02));
        assert!(eval.is_qualified());
    }

    #[test]
    fn test_depth_limited_leg_uses_vwap() {
        // S3: the first ask level covers only half of the 1000 USDC leg; the
        // rest fills at 50100. The leg is fully filled (ratio 1) and the
        // VWAP-equivalent output flows downstream.
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        let mut books = flat_books();
        let (key, snap) = book(
            "BTC-USDC",
            &[(dec!(49990), dec!(1))],
            &[(dec!(50000), dec!(0.01)), (dec!(50100), dec!(1))],
        );
        books.insert(key, snap);

        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &books, &HashMap::new());
        assert_eq!(eval.worst_leg_fill_ratio, Decimal::ONE);
        let btc_leg = &eval.legs[0];
        // 0.01 BTC for 500, then 500 / 50100 for the remainder, floored to
        // the 1e-8 qty tick.
        let raw = dec!(0.01) + dec!(500) / dec!(50100);
        let expected = (raw / dec!(0.00000001)).floor() * dec!(0.00000001);
        assert_eq!(btc_leg.output, expected);
        assert!(btc_leg.output < dec!(0.02), "must not fill at top-of-book price");
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        // S4: book 5 s old against a 1 s bound.
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        let mut books = flat_books();
        let key = (ExchangeId::from("coinbase"), "BTC-USDC".to_string());
        let mut stale = (*books[&key]).clone();
        stale.updated_at = Instant::now() - Duration::from_secs(5);
        books.insert(key.clone(), Arc::new(stale));

        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &books, &HashMap::new());
        assert_eq!(eval.outcome, EvalOutcome::Rejected(RejectReason::Staleness));
        assert_eq!(eval.offending_market.as_ref(), Some(&key));
    }

    #[test]
    fn test_missing_book_rejects_cycle() {
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        let mut books = flat_books();
        books.remove(&(ExchangeId::from("coinbase"), "BTC-ETH".to_string()));

        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &books, &HashMap::new());
        assert_eq!(eval.outcome, EvalOutcome::Rejected(RejectReason::MissingBook));
    }

    #[test]
    fn test_crossed_book_rejects_cycle() {
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        let mut books = flat_books();
        let (key, snap) = book(
            "BTC-USDC",
            &[(dec!(50100), dec!(1))],
            &[(dec!(50000), dec!(1))],
        );
        books.insert(key.clone(), snap);

        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &books, &HashMap::new());
        assert_eq!(eval.outcome, EvalOutcome::Rejected(RejectReason::CrossedBook));
        assert_eq!(eval.offending_market, Some(key));
    }

    #[test]
    fn test_fee_identity_at_top_of_book() {
        // Property 6: zero fee, zero penalties, input small enough to stay
        // at top-of-book on every leg.
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        let mut books = flat_books();
        let (key, snap) = book(
            "BTC-ETH",
            &[(dec!(16.5), dec!(1))],
            &[(dec!(16.5), dec!(1))],
        );
        books.insert(key, snap);

        let eval = evaluator.evaluate(&graph, &cycle, dec!(100), &books, &HashMap::new());
        assert_eq!(eval.gross_return, eval.fee_adjusted_return);
        assert_eq!(eval.fee_adjusted_return, eval.risk_adjusted_return);
    }

    #[test]
    fn test_fee_monotonicity() {
        // Property 4: more fee never helps.
        let fees = [Decimal::ZERO, dec!(0.001), dec!(0.01)];
        let mut returns = Vec::new();
        for fee in fees {
            let graph = triangle_graph(fee);
            let cycle = btc_first_cycle(&graph);
            let evaluator = PathEvaluator::new(params());
            let eval =
                evaluator.evaluate(&graph, &cycle, dec!(1000), &flat_books(), &HashMap::new());
            returns.push(eval.risk_adjusted_return);
        }
        assert!(returns[0] >= returns[1] && returns[1] >= returns[2]);
    }

    #[test]
    fn test_sigma_monotonicity() {
        // Property 4: more volatility never helps.
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let mut p = params();
        p.vol_risk_multiplier = dec!(0.5);
        let evaluator = PathEvaluator::new(p);

        let mut returns = Vec::new();
        for sigma in [dec!(0.0001), dec!(0.001), dec!(0.01)] {
            let sigmas = [(Asset::from("BTC"), sigma)].into_iter().collect();
            let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &flat_books(), &sigmas);
            returns.push(eval.risk_adjusted_return);
        }
        assert!(returns[0] >= returns[1] && returns[1] >= returns[2]);
    }

    #[test]
    fn test_depth_bounding_no_phantom_liquidity() {
        // Property 5: output never exceeds the liquidity actually resting on
        // the walked levels.
        let bids = [
            BookLevel::new(dec!(100), dec!(2)),
            BookLevel::new(dec!(99), dec!(1)),
        ];
        let walk = walk_bids(&bids, dec!(10));
        assert_eq!(walk.consumed, dec!(3));
        assert_eq!(walk.output, dec!(299)); // 2*100 + 1*99
        assert!(walk.output <= dec!(299));

        let asks = [
            BookLevel::new(dec!(100), dec!(2)),
            BookLevel::new(dec!(101), dec!(1)),
        ];
        let walk = walk_asks(&asks, dec!(1_000_000));
        assert_eq!(walk.output, dec!(3));
        assert_eq!(walk.consumed, dec!(301)); // 200 + 101
    }

    #[test]
    fn test_partial_fill_below_ratio_rejected() {
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        // Only 0.001 BTC on offer against a 0.02 BTC ask requirement.
        let mut books = flat_books();
        let (key, snap) = book(
            "BTC-USDC",
            &[(dec!(49990), dec!(1))],
            &[(dec!(50000), dec!(0.001))],
        );
        books.insert(key, snap);

        let eval = evaluator.evaluate(&graph, &cycle, dec!(1000), &books, &HashMap::new());
        assert_eq!(eval.outcome, EvalOutcome::Rejected(RejectReason::Fill));
        assert_eq!(eval.limited_by, LimitedBy::Depth);
        assert!(eval.worst_leg_fill_ratio < dec!(0.9));
    }

    #[test]
    fn test_leg_below_min_notional_rejected() {
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        // 4 USDC < 5 min notional on the first leg.
        let eval = evaluator.evaluate(&graph, &cycle, dec!(4), &flat_books(), &HashMap::new());
        assert_eq!(eval.outcome, EvalOutcome::Rejected(RejectReason::Notional));
        assert_eq!(eval.limited_by, LimitedBy::MinNotional);
    }

    #[test]
    fn test_slippage_penalty_applied() {
        let graph = triangle_graph(Decimal::ZERO);
        let cycle = btc_first_cycle(&graph);
        let mut p = params();
        p.slippage_coefficient = dec!(0.01);
        let evaluator = PathEvaluator::new(p);
        let baseline = PathEvaluator::new(params());

        let with_penalty =
            evaluator.evaluate(&graph, &cycle, dec!(1000), &flat_books(), &HashMap::new());
        let without =
            baseline.evaluate(&graph, &cycle, dec!(1000), &flat_books(), &HashMap::new());
        assert!(with_penalty.risk_adjusted_return < without.risk_adjusted_return);
        assert_eq!(with_penalty.fee_adjusted_return, without.fee_adjusted_return);
    }

    #[test]
    fn test_walk_respects_qty_tick() {
        let mut registry = MarketRegistry::new();
        let mut coarse = spec("BTC-USDC", "BTC", "USDC", Decimal::ZERO);
        coarse.qty_tick = dec!(0.01);
        registry.register(coarse).unwrap();
        registry
            .register(spec("ETH-USDC", "ETH", "USDC", Decimal::ZERO))
            .unwrap();
        registry
            .register(spec("BTC-ETH", "BTC", "ETH", Decimal::ZERO))
            .unwrap();
        let graph = MarketGraph::from_registry(&registry);
        let cycle = btc_first_cycle(&graph);
        let evaluator = PathEvaluator::new(params());

        // 1000 / 50000 = 0.02 exactly; 1001 would leave a remainder that the
        // 0.01 tick floors away.
        let eval = evaluator.evaluate(&graph, &cycle, dec!(1001), &flat_books(), &HashMap::new());
        assert_eq!(eval.legs[0].output, dec!(0.02));
    }
}

//! Market graph, cycle enumeration, depth-walk evaluation, and the scan
//! loop.

pub mod dedupe;
pub mod enumerator;
pub mod evaluator;
pub mod graph;
pub mod scanner;

pub use enumerator::{enumerate_cycles, Cycle, CycleFilters};
pub use evaluator::{
    BookMap, EvalOutcome, Evaluation, LimitedBy, PathEvaluator, RejectReason, RiskParams,
};
pub use graph::{MarketEdge, MarketGraph};
pub use scanner::{Opportunity, OpportunityLeg, ScanConfig, ScanStats, Scanner};

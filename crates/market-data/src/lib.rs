//! Market data plane: registry of tradable markets, the live order-book
//! cache, volatility estimates, and the stream ingress tasks that feed them.

pub mod ingress;
pub mod orderbook;
pub mod registry;
pub mod volatility;

pub use ingress::{BookFeed, IngressConfig, IngressTask};
pub use orderbook::{ApplyOutcome, BookEvent, BookLevel, BookSide, BookSnapshot, OrderbookCache};
pub use registry::MarketRegistry;
pub use volatility::VolatilityCache;

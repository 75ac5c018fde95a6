//! Per-symbol order book: price-time-priority matching over two
//! price-indexed sides (spec.md §4.1).

mod book;
mod cache;
mod error;
mod fees;
mod iterators;
mod matching;
mod operations;
mod pool;
mod price_level;
mod snapshot;
mod stp;
mod trade;

pub use book::OrderBook;
pub use error::OrderBookError;
pub use fees::FeeSchedule;
pub use iterators::{LevelInfo, LevelsWithCumulativeDepth};
pub use operations::SubmitOutcome;
pub use price_level::PriceLevel;
pub use snapshot::{LevelSnapshot, OrderBookSnapshot};
pub use stp::STPMode;
pub use trade::{MatchOutcome, Trade, TradeListener};

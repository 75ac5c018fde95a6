//! Core value types shared by every other module: the fixed-point [`Amount`],
//! identity types, asset/symbol configuration, and the `Order` record.
//!
//! Folded in-crate rather than split across a separate companion crate:
//! `Hash32`, `Id`, `OrderType`, `Side`, `TimeInForce`, `UuidGenerator` and
//! friends all live here for a single, self-contained dependency tree.

mod amount;
mod asset;
mod ids;
mod order;
mod side;
mod tif;

pub use amount::{Amount, AmountError, SCALE, SCALE_DIGITS};
pub use asset::{Asset, Symbol, SymbolConfig};
pub use ids::{Hash32, IdGenerator, OrderId, TradeId, TradeIdGenerator, UserId};
pub use order::{Order, OrderKind, OrderState, TrailOffset, TriggerExecStyle};
pub use side::Side;
pub use tif::TimeInForce;

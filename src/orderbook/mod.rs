//! Client-side order book state.
//!
//! [`OrderBookStore`] holds the last accepted snapshot and [`delta::apply`]
//! merges `orderbook-change` messages into it.

pub mod delta;
mod store;

pub use delta::{ApplyReport, apply};
pub use store::OrderBookStore;

//! Client-side mirror of a remote intraday order book.
//!
//! Connects to an order book stream over mutual-TLS WebSockets, accepts a
//! full snapshot, applies incremental changes in strict sequence, and
//! resynchronizes whenever the stream becomes inconsistent. The mirrored
//! book can be saved to disk on demand or periodically.

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod models;
pub mod orderbook;
pub mod persist;
pub mod scheduler;
pub mod sync;
pub mod tls;
pub mod websocket;

pub use error::{MirrorError, Result};

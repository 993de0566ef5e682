//! Order book snapshot models.
//!
//! These types are both the wire format of an `orderbook-snapshot` payload
//! and the in-memory state kept by the
//! [`OrderBookStore`](crate::orderbook::OrderBookStore). Fields the client
//! does not interpret are carried in flattened maps so a saved snapshot
//! reproduces what the server sent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full authoritative order book state at one sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSnapshot {
    pub seq_no: u64,
    /// Server-reported latency in milliseconds; diagnostic only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_delta: Option<Decimal>,
    #[serde(default)]
    pub data: Vec<Period>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderBookSnapshot {
    /// Creates a snapshot with no periods.
    #[must_use]
    pub fn new(seq_no: u64) -> Self {
        Self {
            seq_no,
            time_delta: None,
            data: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Looks up a period by its `(start, end)` key.
    #[must_use]
    pub fn period(&self, key: &PeriodKey) -> Option<&Period> {
        self.data.iter().find(|p| &p.period == key)
    }
}

/// Identifies a trading period. Unique within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub start: String,
    pub end: String,
}

impl PeriodKey {
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One trading period with its ranked buy and sell lists.
///
/// List order is the server's priority order, not a client-side price
/// sort, and must be preserved exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub period: PeriodKey,
    /// Opaque per-period statistics, replaced wholesale on update.
    ///
    /// `None` means the key was absent; an explicit `null` is kept as
    /// `Some(Value::Null)` and written back out.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub statistics: Option<Value>,
    #[serde(default)]
    pub buy_list: Vec<PriceLevel>,
    #[serde(default)]
    pub sell_list: Vec<PriceLevel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Period {
    /// Creates a period with empty lists and no statistics.
    #[must_use]
    pub fn new(period: PeriodKey) -> Self {
        Self {
            period,
            statistics: None,
            buy_list: Vec::new(),
            sell_list: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A single ranked entry in a buy or sell list.
///
/// Keys beyond the three value fields are kept in `extra` and survive an
/// `update`, which only overwrites the values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub own_quantity: Decimal,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: Decimal, quantity: Decimal, own_quantity: Decimal) -> Self {
        Self {
            price,
            quantity,
            own_quantity,
            extra: Map::new(),
        }
    }

    /// Overwrites price, quantity and own quantity, keeping `extra`.
    pub fn set_values(&mut self, values: &PriceLevel) {
        self.price = values.price;
        self.quantity = values.quantity;
        self.own_quantity = values.own_quantity;
    }
}

/// Deserializes a field that is present, `null` included, as `Some`.
///
/// Paired with `#[serde(default)]` so an absent key stays `None`.
pub(crate) fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

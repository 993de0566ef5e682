//! Incremental `orderbook-change` models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::book::{PeriodKey, PriceLevel, present_value};

/// An incremental update that advances the book to `seq_no`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMessage {
    pub seq_no: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_delta: Option<Decimal>,
    #[serde(default)]
    pub data: Vec<PeriodChange>,
}

/// Changes to a single period.
///
/// Any key outside the recognized set ends up in `unrecognized`; the
/// applier reports those so an operator can request a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodChange {
    pub period: PeriodKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    /// `Some(Value::Null)` for an explicit `null`, which clears the
    /// period's statistics.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub statistics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_changes: Option<Vec<IndexedOp>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_changes: Option<Vec<IndexedOp>>,
    #[serde(flatten)]
    pub unrecognized: Map<String, Value>,
}

impl PeriodChange {
    /// Creates an empty change for `period`.
    #[must_use]
    pub fn new(period: PeriodKey) -> Self {
        Self {
            period,
            action: None,
            statistics: None,
            buy_changes: None,
            sell_changes: None,
            unrecognized: Map::new(),
        }
    }
}

/// Positional list operation. A missing or unrecognized action is
/// `Unknown` and skipped by the applier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpAction {
    Add,
    Update,
    Remove,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One operation against a buy or sell list, applied at `index`.
///
/// `index` is signed so that a negative value from the server is treated as
/// out of range rather than failing the whole message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedOp {
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub action: OpAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_quantity: Option<Decimal>,
}

impl IndexedOp {
    /// Builds an `add` operation.
    #[must_use]
    pub fn add(index: i64, level: PriceLevel) -> Self {
        Self::with_level(index, OpAction::Add, level)
    }

    /// Builds an `update` operation.
    #[must_use]
    pub fn update(index: i64, level: PriceLevel) -> Self {
        Self::with_level(index, OpAction::Update, level)
    }

    /// Builds a `remove` operation.
    #[must_use]
    pub fn remove(index: i64) -> Self {
        Self {
            index: Some(index),
            action: OpAction::Remove,
            price: None,
            quantity: None,
            own_quantity: None,
        }
    }

    fn with_level(index: i64, action: OpAction, level: PriceLevel) -> Self {
        Self {
            index: Some(index),
            action,
            price: Some(level.price),
            quantity: Some(level.quantity),
            own_quantity: Some(level.own_quantity),
        }
    }

    /// The price level carried by an `add` or `update`.
    ///
    /// Returns `None` when price or quantity is missing. A missing
    /// `ownQuantity` defaults to zero.
    #[must_use]
    pub fn level(&self) -> Option<PriceLevel> {
        Some(PriceLevel::new(
            self.price?,
            self.quantity?,
            self.own_quantity.unwrap_or(Decimal::ZERO),
        ))
    }
}

//! Wire models for the order book stream.
//!
//! Every frame is a JSON object with a `type` discriminator and an optional
//! `payload`. [`InboundMessage::parse`] classifies server frames and
//! [`OutboundMessage`] builds the two frames the client sends.

pub mod book;
pub mod change;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::MirrorError;

pub use book::{OrderBookSnapshot, Period, PeriodKey, PriceLevel};
pub use change::{ChangeMessage, IndexedOp, OpAction, PeriodChange};

/// Message types used on the order book stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ping,
    Pong,
    /// Full state push from the server, or a resync request from the client.
    OrderbookSnapshot,
    OrderbookChange,
}

impl MessageType {
    /// Returns the wire-format discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::OrderbookSnapshot => "orderbook-snapshot",
            MessageType::OrderbookChange => "orderbook-change",
        }
    }
}

/// A classified server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Ping,
    Snapshot(OrderBookSnapshot),
    Change(ChangeMessage),
    /// Any other discriminator, or none at all.
    Unknown(Option<String>),
}

impl InboundMessage {
    /// Parses and classifies a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::MalformedMessage`] if the frame is not a JSON
    /// object, or if a snapshot/change payload is missing or does not match
    /// the expected shape.
    pub fn parse(text: &str) -> Result<Self> {
        let mut value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| MirrorError::MalformedMessage(e.to_string()))?;

        let Some(object) = value.as_object_mut() else {
            return Err(MirrorError::MalformedMessage(
                "frame is not a JSON object".into(),
            ));
        };

        let msg_type = object
            .get("type")
            .and_then(|t| t.as_str())
            .map(String::from);
        let payload = object.remove("payload");

        match msg_type.as_deref() {
            Some("ping") => Ok(Self::Ping),
            Some("orderbook-snapshot") => Ok(Self::Snapshot(decode_payload(
                payload,
                MessageType::OrderbookSnapshot,
            )?)),
            Some("orderbook-change") => Ok(Self::Change(decode_payload(
                payload,
                MessageType::OrderbookChange,
            )?)),
            _ => Ok(Self::Unknown(msg_type)),
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    payload: Option<serde_json::Value>,
    msg_type: MessageType,
) -> Result<T> {
    let payload = payload.ok_or_else(|| {
        MirrorError::MalformedMessage(format!("{} without payload", msg_type.as_str()))
    })?;
    serde_json::from_value(payload)
        .map_err(|e| MirrorError::MalformedMessage(format!("invalid {} payload: {e}", msg_type.as_str())))
}

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    tpe: &'static str,
}

impl OutboundMessage {
    /// Reply to a server `ping`.
    #[must_use]
    pub fn pong() -> Self {
        Self {
            tpe: MessageType::Pong.as_str(),
        }
    }

    /// Asks the server to push a fresh full snapshot.
    #[must_use]
    pub fn snapshot_request() -> Self {
        Self {
            tpe: MessageType::OrderbookSnapshot.as_str(),
        }
    }

    /// Returns the wire discriminator of this frame.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        self.tpe
    }
}

/// The `{type, payload}` envelope a snapshot is pushed in, also used as
/// the on-disk format of saved snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    #[serde(rename = "type")]
    pub tpe: String,
    pub payload: OrderBookSnapshot,
}

impl SnapshotEnvelope {
    #[must_use]
    pub fn new(payload: OrderBookSnapshot) -> Self {
        Self {
            tpe: MessageType::OrderbookSnapshot.as_str().to_string(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ping() {
        let msg = InboundMessage::parse(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, InboundMessage::Ping);
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let msg = InboundMessage::parse(r#"{"type":"heartbeat","payload":{}}"#).unwrap();
        assert_eq!(msg, InboundMessage::Unknown(Some("heartbeat".into())));

        let msg = InboundMessage::parse(r#"{"payload":{}}"#).unwrap();
        assert_eq!(msg, InboundMessage::Unknown(None));
    }

    #[test]
    fn snapshot_without_payload_is_malformed() {
        let err = InboundMessage::parse(r#"{"type":"orderbook-snapshot"}"#).unwrap_err();
        assert!(matches!(err, MirrorError::MalformedMessage(_)));
    }

    #[test]
    fn non_object_frame_is_malformed() {
        assert!(InboundMessage::parse("[1,2,3]").is_err());
        assert!(InboundMessage::parse("not json").is_err());
    }

    #[test]
    fn outbound_frames_serialize_type_only() {
        let pong = serde_json::to_string(&OutboundMessage::pong()).unwrap();
        assert_eq!(pong, r#"{"type":"pong"}"#);

        let request = serde_json::to_string(&OutboundMessage::snapshot_request()).unwrap();
        assert_eq!(request, r#"{"type":"orderbook-snapshot"}"#);
    }
}

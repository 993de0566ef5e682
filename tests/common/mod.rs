//! Shared test utilities and fixtures.

use orderbook_mirror::models::InboundMessage;

pub const SNAPSHOT_JSON: &str = include_str!("../fixtures/snapshot.json");
pub const CHANGE_JSON: &str = include_str!("../fixtures/change.json");
pub const CHANGE_SEQUENTIAL_JSON: &str = include_str!("../fixtures/change_sequential.json");
pub const CHANGE_UNHANDLED_FIELDS_JSON: &str =
    include_str!("../fixtures/change_unhandled_fields.json");

/// Parses a fixture, panicking on failure.
#[allow(dead_code)]
pub fn parse(json: &str) -> InboundMessage {
    InboundMessage::parse(json).expect("Failed to parse fixture")
}

/// Returns a copy of a change fixture with its `seqNo` replaced.
#[allow(dead_code)]
pub fn with_seq_no(json: &str, seq_no: u64) -> String {
    let mut value: serde_json::Value = serde_json::from_str(json).expect("Invalid fixture JSON");
    value["payload"]["seqNo"] = seq_no.into();
    value.to_string()
}

//! Delta merge of `orderbook-change` messages.
//!
//! The applier does not check sequence continuity; the caller must have
//! verified `change.seq_no == last_seq_no + 1`. Nothing in a change can make
//! it fail: unmatched periods and out-of-range indices are absorbed as
//! no-ops and counted in the returned [`ApplyReport`].

use std::collections::HashMap;

use tracing::{debug, warn};

use super::OrderBookStore;
use crate::models::{ChangeMessage, IndexedOp, OpAction, PeriodKey, PriceLevel};

/// Which list of a period an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Result of applying a single [`IndexedOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    Applied,
    /// Index outside the list bounds for this action.
    OutOfRange,
    /// Index, price or quantity missing.
    Incomplete,
    UnknownAction,
}

/// What one call to [`apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub periods_matched: usize,
    pub unmatched_periods: Vec<PeriodKey>,
    pub ops_applied: usize,
    pub ops_out_of_range: usize,
    pub ops_skipped: usize,
    /// Period-change keys this client does not understand.
    pub unrecognized_fields: Vec<String>,
}

impl ApplyReport {
    /// Whether the change carried data the client could not merge, so a
    /// fresh snapshot should be requested to stay accurate.
    #[must_use]
    pub fn suggests_resync(&self) -> bool {
        !self.unrecognized_fields.is_empty()
    }
}

/// Merges `change` into the store and advances its sequence number.
///
/// Period changes are applied in order; within a period, buy then sell
/// operations are applied sequentially, each against the list left by the
/// previous one.
pub fn apply(store: &mut OrderBookStore, change: &ChangeMessage) -> ApplyReport {
    let mut report = ApplyReport::default();

    let Some(snapshot) = store.snapshot_mut() else {
        report.unmatched_periods = change.data.iter().map(|c| c.period.clone()).collect();
        return report;
    };

    let index: HashMap<PeriodKey, usize> = snapshot
        .data
        .iter()
        .enumerate()
        .map(|(i, p)| (p.period.clone(), i))
        .collect();

    for period_change in &change.data {
        let Some(&position) = index.get(&period_change.period) else {
            warn!(
                target: "orderbook_mirror::unmatched",
                seq_no = change.seq_no,
                period = %period_change.period,
                "Change references a period not in the snapshot, ignoring"
            );
            report.unmatched_periods.push(period_change.period.clone());
            continue;
        };
        let period_state = &mut snapshot.data[position];
        report.periods_matched += 1;

        if !period_change.unrecognized.is_empty() {
            let fields: Vec<String> = period_change.unrecognized.keys().cloned().collect();
            warn!(
                seq_no = change.seq_no,
                period = %period_change.period,
                fields = ?fields,
                "Unhandled fields in period change, request a fresh snapshot to pick them up"
            );
            report.unrecognized_fields.extend(fields);
        }

        if let Some(statistics) = &period_change.statistics {
            period_state.statistics = Some(statistics.clone());
        }

        if let Some(ops) = &period_change.buy_changes {
            apply_ops(&mut period_state.buy_list, ops, Side::Buy, &period_change.period, &mut report);
        }
        if let Some(ops) = &period_change.sell_changes {
            apply_ops(&mut period_state.sell_list, ops, Side::Sell, &period_change.period, &mut report);
        }
    }

    snapshot.seq_no = change.seq_no;
    snapshot.time_delta = change.time_delta;

    report
}

fn apply_ops(
    list: &mut Vec<PriceLevel>,
    ops: &[IndexedOp],
    side: Side,
    period: &PeriodKey,
    report: &mut ApplyReport,
) {
    for op in ops {
        match apply_op(list, op) {
            OpOutcome::Applied => report.ops_applied += 1,
            OpOutcome::OutOfRange => {
                // Separate target so recurring bounds violations can be filtered.
                warn!(
                    target: "orderbook_mirror::bounds",
                    side = side.as_str(),
                    %period,
                    index = ?op.index,
                    action = ?op.action,
                    len = list.len(),
                    "Delta index out of range, ignoring"
                );
                report.ops_out_of_range += 1;
            }
            OpOutcome::Incomplete | OpOutcome::UnknownAction => {
                debug!(side = side.as_str(), %period, ?op, "Skipping unusable delta operation");
                report.ops_skipped += 1;
            }
        }
    }
}

/// Applies one positional operation to `list`.
///
/// `add` accepts `index <= len`; `update` and `remove` need `index < len`.
/// Anything else leaves the list untouched.
pub fn apply_op(list: &mut Vec<PriceLevel>, op: &IndexedOp) -> OpOutcome {
    let Some(raw_index) = op.index else {
        return OpOutcome::Incomplete;
    };
    let Ok(index) = usize::try_from(raw_index) else {
        return OpOutcome::OutOfRange;
    };

    match op.action {
        OpAction::Add => {
            if index > list.len() {
                return OpOutcome::OutOfRange;
            }
            let Some(level) = op.level() else {
                return OpOutcome::Incomplete;
            };
            list.insert(index, level);
        }
        OpAction::Update => {
            if index >= list.len() {
                return OpOutcome::OutOfRange;
            }
            let Some(level) = op.level() else {
                return OpOutcome::Incomplete;
            };
            list[index].set_values(&level);
        }
        OpAction::Remove => {
            if index >= list.len() {
                return OpOutcome::OutOfRange;
            }
            list.remove(index);
        }
        OpAction::Unknown => return OpOutcome::UnknownAction,
    }

    OpOutcome::Applied
}

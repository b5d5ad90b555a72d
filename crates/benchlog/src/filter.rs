//! The completeness gate between "parsed" and "reported".
//!
//! A record either carries every required raw field or it is not reported at
//! all; no row with blank required cells ever reaches the output.

use std::collections::BTreeMap;

use log::warn;

use crate::record::PerformanceRecord;

/// A raw field that must be present for a record to be reportable.
pub struct RequiredField {
    pub name: &'static str,
    present: fn(&PerformanceRecord) -> bool,
}

/// The minimal raw fields a record needs to be meaningful downstream.
///
/// The requested throughput level is the record's key and is present by
/// construction. Optional fields (RTT detail, individual hardware counters,
/// per-component utilization) never reject a record. Derived metrics are
/// computed from these fields and are never consulted as validity signals.
pub const REQUIRED_FIELDS: &[RequiredField] = &[
    RequiredField {
        name: "kernel cycles",
        present: |r| r.kernel_cycles.is_some(),
    },
    RequiredField {
        name: "total cycles",
        present: |r| r.total_cycles.is_some(),
    },
    RequiredField {
        name: "instructions",
        present: |r| r.instructions.is_some(),
    },
];

/// Names of the required fields a record is missing; empty means reportable.
pub fn missing_fields(record: &PerformanceRecord) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .filter(|field| !(field.present)(record))
        .map(|field| field.name)
        .collect()
}

/// Drops every record missing a required field, returning how many were
/// dropped. Records that pass are final; nothing mutates them afterwards.
pub fn retain_complete(records: &mut BTreeMap<u64, PerformanceRecord>) -> usize {
    let before = records.len();
    records.retain(|key, record| {
        let missing = missing_fields(record);
        if missing.is_empty() {
            true
        } else {
            warn!(
                "dropping the {} Mb/s iteration: missing {}",
                key,
                missing.join(", ")
            );
            false
        }
    });
    before - records.len()
}

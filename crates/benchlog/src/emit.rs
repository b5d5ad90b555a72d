//! Serialization of the final record set into the comparison table.
//!
//! The column schema is a fixed superset of every field a record can carry,
//! identical across invocations and datasets, so two independently produced
//! tables stay joinable row-for-row on the throughput level. Absent fields
//! render as `NA` cells; a column is never dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::derive::{COOLDOWN_SECS, PACKET_COUNT, WARMUP_SECS};
use crate::error::Error;
use crate::record::{Component, PerformanceRecord};

/// Cell value for a field the record does not carry
const ABSENT: &str = "NA";

/// One output column: its header and how to render it from a record
struct Column {
    header: &'static str,
    value: fn(&PerformanceRecord) -> String,
}

/// The base schema, in output order. The fifteen per-component utilization
/// columns (`<component>_CPU_Util`, `_Kernel_Util`, `_User_Util` for each
/// entry of [`Component::ALL`]) follow these.
const COLUMNS: &[Column] = &[
    Column {
        header: "Requ Thrput (Mb/s)",
        value: |r| r.requested_mbps.to_string(),
    },
    Column {
        header: "Recv Thrput (Mb/s)",
        value: |r| f64_cell(r.received_mbps, 2),
    },
    Column {
        header: "Send Thrput (Mb/s)",
        value: |r| f64_cell(r.sent_mbps, 2),
    },
    Column {
        header: "Packet Size (bytes)",
        value: |r| u64_cell(r.packet_size),
    },
    Column {
        header: "Min RTT (μs)",
        value: |r| u64_cell(r.rtt_min_us),
    },
    Column {
        header: "Mean RTT (μs)",
        value: |r| u64_cell(r.rtt_mean_us),
    },
    Column {
        header: "Max RTT (μs)",
        value: |r| u64_cell(r.rtt_max_us),
    },
    Column {
        header: "RTT stdev (μs)",
        value: |r| f64_cell(r.rtt_stdev_us, 2),
    },
    Column {
        header: "Med RTT (μs)",
        value: |r| u64_cell(r.rtt_median_us),
    },
    Column {
        header: "Idle Cycles",
        value: |r| u64_cell(r.idle_cycles),
    },
    Column {
        header: "Total Cycles",
        value: |r| u64_cell(r.total_cycles),
    },
    Column {
        header: "CPU Util (Fraction)",
        value: |r| f64_cell(r.cpu_util, 4),
    },
    Column {
        header: "Kernel Cycles",
        value: |r| u64_cell(r.kernel_cycles),
    },
    Column {
        header: "User Cycles",
        value: |r| u64_cell(r.user_cycles),
    },
    Column {
        header: "Kernel Entries",
        value: |r| u64_cell(r.kernel_entries),
    },
    Column {
        header: "Schedules",
        value: |r| u64_cell(r.schedules),
    },
    Column {
        header: "Warm-up (s)",
        value: |_| WARMUP_SECS.to_string(),
    },
    Column {
        header: "Cool-down (s)",
        value: |_| COOLDOWN_SECS.to_string(),
    },
    Column {
        header: "Test Duration (s)",
        value: |r| f64_cell(r.test_duration_s, 2),
    },
    Column {
        header: "Total Time (s)",
        value: |r| f64_cell(r.total_time_s, 2),
    },
    Column {
        header: "Packets Sent",
        value: |_| PACKET_COUNT.to_string(),
    },
    Column {
        header: "Packet Rate (p/s)",
        value: |r| f64_cell(r.packet_rate, 2),
    },
    Column {
        header: "Total Packets",
        value: |_| PACKET_COUNT.to_string(),
    },
    Column {
        header: "L1 I-cache misses",
        value: |r| u64_cell(r.l1_icache_misses),
    },
    Column {
        header: "L1 D-cache misses",
        value: |r| u64_cell(r.l1_dcache_misses),
    },
    Column {
        header: "L1 I-TLB misses",
        value: |r| u64_cell(r.itlb_misses),
    },
    Column {
        header: "L1 D-TLB misses",
        value: |r| u64_cell(r.dtlb_misses),
    },
    Column {
        header: "Instructions",
        value: |r| u64_cell(r.instructions),
    },
    Column {
        header: "Instructions per Second",
        value: |r| u64_cell(r.instructions_per_sec),
    },
    Column {
        header: "Branch mispredictions",
        value: |r| u64_cell(r.branch_mispredictions),
    },
    Column {
        header: "Cycles Per Packet",
        value: |r| u64_cell(r.cycles_per_packet),
    },
    Column {
        header: "User cycles per packet",
        value: |r| u64_cell(r.user_cycles_per_packet),
    },
    Column {
        header: "Kernel cycles per packet",
        value: |r| u64_cell(r.kernel_cycles_per_packet),
    },
    Column {
        header: "Kernel entries per packet",
        value: |r| f64_cell(r.kernel_entries_per_packet, 2),
    },
    Column {
        header: "L1 I-cache misses per packet",
        value: |r| f64_cell(r.icache_misses_per_packet, 2),
    },
    Column {
        header: "L1 D-cache misses per packet",
        value: |r| f64_cell(r.dcache_misses_per_packet, 2),
    },
    Column {
        header: "L1 I-TLB misses per packet",
        value: |r| f64_cell(r.itlb_misses_per_packet, 2),
    },
    Column {
        header: "L1 D-TLB misses per packet",
        value: |r| f64_cell(r.dtlb_misses_per_packet, 2),
    },
    Column {
        header: "instructions per packet",
        value: |r| u64_cell(r.instructions_per_packet),
    },
    Column {
        header: "Branch mis-pred per packet",
        value: |r| f64_cell(r.branch_mispred_per_packet, 2),
    },
    Column {
        header: "Bad Packets",
        value: |r| u64_cell(r.bad_packets),
    },
    Column {
        header: "Core Cycles",
        value: |r| u64_cell(r.core_cycles),
    },
    Column {
        header: "System Cycles",
        value: |r| u64_cell(r.system_cycles),
    },
];

fn u64_cell(value: Option<u64>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| v.to_string())
}

fn f64_cell(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{:.*}", precision, v))
}

/// The full header row, base columns then component columns
fn header_row() -> String {
    let mut headers: Vec<String> = COLUMNS.iter().map(|c| c.header.to_string()).collect();
    for component in Component::ALL {
        headers.push(format!("{component}_CPU_Util"));
        headers.push(format!("{component}_Kernel_Util"));
        headers.push(format!("{component}_User_Util"));
    }
    headers.join(",")
}

fn record_row(record: &PerformanceRecord) -> String {
    let mut cells: Vec<String> = COLUMNS.iter().map(|c| (c.value)(record)).collect();
    for component in Component::ALL {
        match record.components.get(&component) {
            Some(util) => {
                cells.push(format!("{:.4}", util.cpu));
                cells.push(format!("{:.4}", util.kernel));
                cells.push(format!("{:.4}", util.user));
            }
            None => {
                cells.extend([ABSENT.to_string(), ABSENT.to_string(), ABSENT.to_string()]);
            }
        }
    }
    cells.join(",")
}

/// Writes the table: one header row, one row per record in ascending key
/// order. The file is staged as a `.tmp` sibling and renamed into place on
/// success, so a failed run never leaves a half-written table behind.
pub fn write_records(
    records: &BTreeMap<u64, PerformanceRecord>,
    path: &Path,
) -> Result<(), Error> {
    let mut out = header_row();
    out.push('\n');
    for record in records.values() {
        out.push_str(&record_row(record));
        out.push('\n');
    }

    let staged = staging_path(path);
    fs::write(&staged, out).map_err(|e| Error::WriteFailure(path.to_path_buf(), e))?;
    fs::rename(&staged, path).map_err(|e| Error::WriteFailure(path.to_path_buf(), e))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_os_string();
    staged.push(".tmp");
    PathBuf::from(staged)
}

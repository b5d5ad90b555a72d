//! Extraction of the IQ capture: the throughput/latency side of a run.
//!
//! The capture is free-form load-generator output containing one tabular
//! result block. The block is located by the `Result Summary:` marker when
//! present; otherwise header lines are recognized anywhere in the file, which
//! also covers harnesses that re-print the header before every row. Fields
//! are matched by header label, so column order and unknown extra columns do
//! not matter.

use std::collections::HashMap;

use crate::error::ParseFault;

const RESULT_SUMMARY_MARKER: &str = "Result Summary:";

const REQUESTED_THROUGHPUT: &str = "Requested_Throughput";
const RECEIVE_THROUGHPUT: &str = "Receive_Throughput";
const SEND_THROUGHPUT: &str = "Send_Throughput";
const PACKET_SIZE: &str = "Packet_Size";
const MINIMUM_RTT: &str = "Minimum_RTT";
const AVERAGE_RTT: &str = "Average_RTT";
const MAXIMUM_RTT: &str = "Maximum_RTT";
const STDEV_RTT: &str = "Stdev_RTT";
const MEDIAN_RTT: &str = "Median_RTT";
const BAD_PACKETS: &str = "Bad_Packets";
const IDLE_CYCLES: &str = "Idle_Cycles";
const TOTAL_CYCLES: &str = "Total_Cycles";

/// One iteration's worth of fields from the IQ capture.
///
/// Throughput labels arrive in bits/s and are converted here: the requested
/// level becomes the integer Mb/s iteration key, receive/send become
/// fractional Mb/s.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IqIteration {
    pub requested_mbps: u64,
    pub received_mbps: Option<f64>,
    pub sent_mbps: Option<f64>,
    pub packet_size: Option<u64>,
    pub rtt_min_us: Option<u64>,
    pub rtt_mean_us: Option<u64>,
    pub rtt_max_us: Option<u64>,
    pub rtt_stdev_us: Option<f64>,
    pub rtt_median_us: Option<u64>,
    pub bad_packets: Option<u64>,
    pub idle_cycles: Option<u64>,
    pub total_cycles: Option<u64>,
}

/// Extracts all iterations from an IQ capture, in file order.
///
/// Duplicate requested-throughput keys keep the first occurrence; later ones
/// are dropped with a warning. Rows whose requested-throughput cell fails to
/// parse cannot join anything and are skipped entirely; any other non-numeric
/// cell only loses that one field. Both cases are reported as faults.
pub fn parse_iq(text: &str) -> (Vec<IqIteration>, Vec<ParseFault>) {
    let mut iterations: Vec<IqIteration> = Vec::new();
    let mut faults = Vec::new();

    // With a summary marker, everything before it is in-flight output and
    // skipped; the table after the marker is authoritative.
    let marker_line = text.lines().position(|l| l.contains(RESULT_SUMMARY_MARKER));

    let mut columns: Option<HashMap<String, usize>> = None;
    for (idx, line) in text.lines().enumerate() {
        if let Some(marker) = marker_line {
            if idx <= marker {
                continue;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.iter().any(|c| *c == REQUESTED_THROUGHPUT) {
            columns = Some(
                cells
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (c.to_string(), i))
                    .collect(),
            );
            continue;
        }
        let Some(cols) = &columns else { continue };
        if cells.len() < cols.len() {
            // not a data row; unrecognized text is ignored
            continue;
        }

        let row = Row {
            cells: &cells,
            line: idx + 1,
        };
        let Some(requested_bits) = row.u64(cols, REQUESTED_THROUGHPUT, &mut faults) else {
            continue;
        };
        let key = requested_bits / 1_000_000;
        if iterations.iter().any(|it| it.requested_mbps == key) {
            log::warn!(
                "duplicate {} Mb/s iteration in IQ capture at line {}; keeping the first",
                key,
                row.line
            );
            continue;
        }

        iterations.push(IqIteration {
            requested_mbps: key,
            received_mbps: row.f64(cols, RECEIVE_THROUGHPUT, &mut faults).map(|b| b / 1e6),
            sent_mbps: row.f64(cols, SEND_THROUGHPUT, &mut faults).map(|b| b / 1e6),
            packet_size: row.u64(cols, PACKET_SIZE, &mut faults),
            rtt_min_us: row.u64(cols, MINIMUM_RTT, &mut faults),
            rtt_mean_us: row.u64(cols, AVERAGE_RTT, &mut faults),
            rtt_max_us: row.u64(cols, MAXIMUM_RTT, &mut faults),
            rtt_stdev_us: row.f64(cols, STDEV_RTT, &mut faults),
            rtt_median_us: row.u64(cols, MEDIAN_RTT, &mut faults),
            bad_packets: row.u64(cols, BAD_PACKETS, &mut faults),
            idle_cycles: row.u64(cols, IDLE_CYCLES, &mut faults),
            total_cycles: row.u64(cols, TOTAL_CYCLES, &mut faults),
        });
    }

    (iterations, faults)
}

struct Row<'a> {
    cells: &'a [&'a str],
    line: usize,
}

impl Row<'_> {
    fn cell(&self, cols: &HashMap<String, usize>, label: &str) -> Option<&str> {
        cols.get(label).and_then(|&i| self.cells.get(i)).copied()
    }

    fn u64(
        &self,
        cols: &HashMap<String, usize>,
        label: &str,
        faults: &mut Vec<ParseFault>,
    ) -> Option<u64> {
        let cell = self.cell(cols, label)?;
        match cell.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                faults.push(ParseFault {
                    line: self.line,
                    label: label.to_string(),
                    text: cell.to_string(),
                });
                None
            }
        }
    }

    fn f64(
        &self,
        cols: &HashMap<String, usize>,
        label: &str,
        faults: &mut Vec<ParseFault>,
    ) -> Option<f64> {
        let cell = self.cell(cols, label)?;
        match cell.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                faults.push(ParseFault {
                    line: self.line,
                    label: label.to_string(),
                    text: cell.to_string(),
                });
                None
            }
        }
    }
}

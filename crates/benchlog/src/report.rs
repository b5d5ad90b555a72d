//! End-to-end report generation: the single entry point the CLI drives.

use std::fs;
use std::path::Path;

use log::warn;

use crate::error::Error;
use crate::{counters, derive, emit, filter, iq, merge};

/// Outcome counts for one completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    /// Records written to the output table
    pub written: usize,
    /// Iterations dropped by the completeness filter
    pub dropped: usize,
    /// Recoverable parse faults across both captures
    pub faults: usize,
}

/// Reads the two captures, builds the record set, and writes the table.
///
/// Parse faults are logged and recovered; they only fail the run when no
/// iteration at all survives extraction. I/O failures on either input or the
/// output are fatal and leave no partial output behind.
pub fn generate_report(
    iq_path: &Path,
    counter_path: &Path,
    output_path: &Path,
) -> Result<ReportSummary, Error> {
    let iq_text = fs::read_to_string(iq_path)
        .map_err(|e| Error::InputNotFound(iq_path.to_path_buf(), e))?;
    let counter_text = fs::read_to_string(counter_path)
        .map_err(|e| Error::InputNotFound(counter_path.to_path_buf(), e))?;

    let (iq_iterations, iq_faults) = iq::parse_iq(&iq_text);
    for fault in &iq_faults {
        warn!("{}: {}", iq_path.display(), fault);
    }
    let (counter_iterations, counter_faults) = counters::parse_counters(&counter_text);
    for fault in &counter_faults {
        warn!("{}: {}", counter_path.display(), fault);
    }

    if iq_iterations.is_empty() && counter_iterations.is_empty() {
        return Err(Error::NoIterations(iq_path.to_path_buf()));
    }

    let mut records = merge::merge_iterations(&iq_iterations, &counter_iterations);
    for record in records.values_mut() {
        derive::enrich(record);
    }
    let dropped = filter::retain_complete(&mut records);
    if records.is_empty() {
        warn!("every extracted iteration was incomplete; writing a header-only table");
    }
    emit::write_records(&records, output_path)?;

    Ok(ReportSummary {
        written: records.len(),
        dropped,
        faults: iq_faults.len() + counter_faults.len(),
    })
}

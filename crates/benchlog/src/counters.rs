//! Extraction of the counter capture: cycle accounting, hardware counters,
//! and per-component utilization.
//!
//! Two capture shapes exist in the wild and are auto-detected:
//!
//! - The *sectioned* shape (any line starting `System Total`): per-iteration
//!   `TEST` blocks with component utilization rows, `System Total <N>Mb/s`
//!   rows carrying whole-system cycle counters and the iteration's throughput
//!   key, and one hardware-counter table with a row per iteration.
//! - The *brace* shape: `{ ... }` blocks of `label: value` pairs, hardware
//!   counters and utilisation totals alternating, with no throughput keys at
//!   all. Key-less iterations are paired with the IQ capture by position
//!   during aggregation.

use std::collections::{BTreeMap, HashMap};

use crate::error::ParseFault;
use crate::record::{Component, ComponentUtil};

const SYSTEM_TOTAL_PREFIX: &str = "System Total ";
const TEST_PREFIX: &str = "TEST";

const L1_ICACHE: &str = "L1 i-cache misses";
const L1_DCACHE: &str = "L1 d-cache misses";
const L1_ITLB: &str = "L1 i-tlb misses";
const L1_DTLB: &str = "L1 d-tlb misses";
const INSTRUCTIONS: &str = "Instructions";
const BRANCH_MISPREDICTIONS: &str = "Branch mispredictions";

const KERNEL_UTILISATION: &str = "KernelUtilisation";
const KERNEL_ENTRIES: &str = "KernelEntries";
const NUMBER_SCHEDULES: &str = "NumberSchedules";
const TOTAL_UTILISATION: &str = "TotalUtilisation";

/// Labels recognized inside a brace block; everything else in a block is
/// ignored rather than faulted.
const BRACE_LABELS: [&str; 10] = [
    L1_ICACHE,
    L1_DCACHE,
    L1_ITLB,
    L1_DTLB,
    INSTRUCTIONS,
    BRANCH_MISPREDICTIONS,
    KERNEL_UTILISATION,
    KERNEL_ENTRIES,
    NUMBER_SCHEDULES,
    TOTAL_UTILISATION,
];

/// One iteration's worth of fields from the counter capture.
///
/// `requested_mbps` is present only when the capture labels its iterations
/// (sectioned shape); brace-shaped captures yield `None` and rely on
/// positional pairing in the aggregator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CounterIteration {
    pub requested_mbps: Option<u64>,
    pub core_cycles: Option<u64>,
    pub system_cycles: Option<u64>,
    pub kernel_cycles: Option<u64>,
    pub user_cycles: Option<u64>,
    pub kernel_entries: Option<u64>,
    pub schedules: Option<u64>,
    pub l1_icache_misses: Option<u64>,
    pub l1_dcache_misses: Option<u64>,
    pub itlb_misses: Option<u64>,
    pub dtlb_misses: Option<u64>,
    pub instructions: Option<u64>,
    pub branch_mispredictions: Option<u64>,
    pub components: BTreeMap<Component, ComponentUtil>,
}

/// Extracts all iterations from a counter capture, in file order.
pub fn parse_counters(text: &str) -> (Vec<CounterIteration>, Vec<ParseFault>) {
    let sectioned = text
        .lines()
        .any(|l| l.trim_start().starts_with(SYSTEM_TOTAL_PREFIX));
    if sectioned {
        parse_sectioned(text)
    } else {
        parse_braced(text)
    }
}

#[derive(Debug, Default)]
struct SystemTotals {
    requested_mbps: Option<u64>,
    core_cycles: Option<u64>,
    system_cycles: Option<u64>,
    kernel_cycles: Option<u64>,
    user_cycles: Option<u64>,
    kernel_entries: Option<u64>,
    schedules: Option<u64>,
}

#[derive(Debug, Default)]
struct HwCounters {
    l1_icache_misses: Option<u64>,
    l1_dcache_misses: Option<u64>,
    itlb_misses: Option<u64>,
    dtlb_misses: Option<u64>,
    instructions: Option<u64>,
    branch_mispredictions: Option<u64>,
}

fn parse_sectioned(text: &str) -> (Vec<CounterIteration>, Vec<ParseFault>) {
    let mut faults = Vec::new();
    let mut totals: Vec<SystemTotals> = Vec::new();
    let mut component_blocks: Vec<BTreeMap<Component, ComponentUtil>> = Vec::new();
    let mut hw_rows: Vec<HwCounters> = Vec::new();
    let mut in_hw_table = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let line_no = idx + 1;
        if line.is_empty() {
            continue;
        }

        if line.starts_with(TEST_PREFIX) {
            component_blocks.push(BTreeMap::new());
            continue;
        }
        if let Some(rest) = line.strip_prefix(SYSTEM_TOTAL_PREFIX) {
            totals.push(parse_system_total(rest, line_no, &mut faults));
            continue;
        }

        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if let Some(component) = Component::from_label(cells[0]) {
            // component rows outside a TEST block have no iteration to join
            if let Some(block) = component_blocks.last_mut() {
                if let Some(util) = parse_component_row(&cells, line_no, &mut faults) {
                    block.insert(component, util);
                }
            }
            continue;
        }
        if line.contains(L1_ICACHE) && line.contains(L1_DCACHE) {
            in_hw_table = true;
            continue;
        }
        if in_hw_table && cells.len() >= 6 && numeric_or_empty(cells[0]) {
            hw_rows.push(parse_hw_row(&cells, line_no, &mut faults));
            continue;
        }
    }

    let count = totals.len().max(component_blocks.len()).max(hw_rows.len());
    let mut iterations = Vec::with_capacity(count);
    for i in 0..count {
        let mut iteration = CounterIteration::default();
        if let Some(t) = totals.get(i) {
            iteration.requested_mbps = t.requested_mbps;
            iteration.core_cycles = t.core_cycles;
            iteration.system_cycles = t.system_cycles;
            iteration.kernel_cycles = t.kernel_cycles;
            iteration.user_cycles = t.user_cycles;
            iteration.kernel_entries = t.kernel_entries;
            iteration.schedules = t.schedules;
        }
        if let Some(block) = component_blocks.get(i) {
            iteration.components = block.clone();
        }
        if let Some(hw) = hw_rows.get(i) {
            iteration.l1_icache_misses = hw.l1_icache_misses;
            iteration.l1_dcache_misses = hw.l1_dcache_misses;
            iteration.itlb_misses = hw.itlb_misses;
            iteration.dtlb_misses = hw.dtlb_misses;
            iteration.instructions = hw.instructions;
            iteration.branch_mispredictions = hw.branch_mispredictions;
        }
        iterations.push(iteration);
    }
    (iterations, faults)
}

/// Parses `<N>Mb/s,<core>,<system>,<kernel>,<user>,<entries>,<schedules>`,
/// the remainder of a `System Total` row.
fn parse_system_total(rest: &str, line_no: usize, faults: &mut Vec<ParseFault>) -> SystemTotals {
    let cells: Vec<&str> = rest.split(',').map(str::trim).collect();
    let mut totals = SystemTotals::default();

    let level = cells[0].trim_end_matches("Mb/s");
    match level.parse() {
        Ok(mbps) => totals.requested_mbps = Some(mbps),
        Err(_) => faults.push(ParseFault {
            line: line_no,
            label: "System Total throughput".to_string(),
            text: cells[0].to_string(),
        }),
    }

    totals.core_cycles = numeric_cell(&cells, 1, "Core Cycles", line_no, faults);
    totals.system_cycles = numeric_cell(&cells, 2, "System Cycles", line_no, faults);
    totals.kernel_cycles = numeric_cell(&cells, 3, "Kernel Cycles", line_no, faults);
    totals.user_cycles = numeric_cell(&cells, 4, "User Cycles", line_no, faults);
    totals.kernel_entries = numeric_cell(&cells, 5, "Kernel Entries", line_no, faults);
    totals.schedules = numeric_cell(&cells, 6, "Schedules", line_no, faults);
    totals
}

/// Component rows carry utilization fractions in columns 8-10. The user
/// fraction is optional; older captures only report CPU and kernel.
fn parse_component_row(
    cells: &[&str],
    line_no: usize,
    faults: &mut Vec<ParseFault>,
) -> Option<ComponentUtil> {
    if cells.len() < 9 {
        return None;
    }
    let cpu = fraction_cell(cells, 7, "component CPU utilization", line_no, faults)?;
    let kernel = fraction_cell(cells, 8, "component kernel utilization", line_no, faults)?;
    let user = match cells.get(9) {
        Some(cell) if !cell.is_empty() => {
            fraction_cell(cells, 9, "component user utilization", line_no, faults).unwrap_or(0.0)
        }
        _ => 0.0,
    };
    Some(ComponentUtil { cpu, kernel, user })
}

fn parse_hw_row(cells: &[&str], line_no: usize, faults: &mut Vec<ParseFault>) -> HwCounters {
    HwCounters {
        l1_icache_misses: numeric_cell(cells, 0, L1_ICACHE, line_no, faults),
        l1_dcache_misses: numeric_cell(cells, 1, L1_DCACHE, line_no, faults),
        itlb_misses: numeric_cell(cells, 2, L1_ITLB, line_no, faults),
        dtlb_misses: numeric_cell(cells, 3, L1_DTLB, line_no, faults),
        instructions: numeric_cell(cells, 4, INSTRUCTIONS, line_no, faults),
        branch_mispredictions: numeric_cell(cells, 5, BRANCH_MISPREDICTIONS, line_no, faults),
    }
}

/// An empty cell counts as zero (the harness omits counters that never
/// fired); a non-numeric cell is a fault and the field stays absent.
fn numeric_cell(
    cells: &[&str],
    index: usize,
    label: &str,
    line_no: usize,
    faults: &mut Vec<ParseFault>,
) -> Option<u64> {
    let cell = *cells.get(index)?;
    if cell.is_empty() {
        return Some(0);
    }
    match cell.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            faults.push(ParseFault {
                line: line_no,
                label: label.to_string(),
                text: cell.to_string(),
            });
            None
        }
    }
}

fn fraction_cell(
    cells: &[&str],
    index: usize,
    label: &str,
    line_no: usize,
    faults: &mut Vec<ParseFault>,
) -> Option<f64> {
    let cell = *cells.get(index)?;
    match cell.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            faults.push(ParseFault {
                line: line_no,
                label: label.to_string(),
                text: cell.to_string(),
            });
            None
        }
    }
}

fn numeric_or_empty(cell: &str) -> bool {
    cell.chars().all(|c| c.is_ascii_digit())
}

fn parse_braced(text: &str) -> (Vec<CounterIteration>, Vec<ParseFault>) {
    let mut faults = Vec::new();
    let mut hw_blocks: Vec<HwCounters> = Vec::new();
    let mut util_blocks: Vec<SystemTotals> = Vec::new();
    let mut current: Option<HashMap<String, u64>> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let Some(block) = current.as_mut() else {
            if line.ends_with('{') {
                current = Some(HashMap::new());
            }
            continue;
        };
        if line.starts_with('}') {
            let finished = std::mem::take(block);
            current = None;
            if finished.contains_key(L1_ICACHE) {
                hw_blocks.push(HwCounters {
                    l1_icache_misses: finished.get(L1_ICACHE).copied(),
                    l1_dcache_misses: finished.get(L1_DCACHE).copied(),
                    itlb_misses: finished.get(L1_ITLB).copied(),
                    dtlb_misses: finished.get(L1_DTLB).copied(),
                    instructions: finished.get(INSTRUCTIONS).copied(),
                    branch_mispredictions: finished.get(BRANCH_MISPREDICTIONS).copied(),
                });
            } else if finished.contains_key(KERNEL_UTILISATION) {
                util_blocks.push(SystemTotals {
                    requested_mbps: None,
                    core_cycles: finished.get(TOTAL_UTILISATION).copied(),
                    system_cycles: None,
                    kernel_cycles: finished.get(KERNEL_UTILISATION).copied(),
                    // this shape never splits out user time
                    user_cycles: Some(0),
                    kernel_entries: finished.get(KERNEL_ENTRIES).copied(),
                    schedules: finished.get(NUMBER_SCHEDULES).copied(),
                });
            }
            continue;
        }
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let (label, value) = (label.trim(), value.trim());
        if !BRACE_LABELS.contains(&label) {
            continue;
        }
        match value.parse() {
            Ok(v) => {
                block.insert(label.to_string(), v);
            }
            Err(_) => faults.push(ParseFault {
                line: idx + 1,
                label: label.to_string(),
                text: value.to_string(),
            }),
        }
    }

    let count = hw_blocks.len().max(util_blocks.len());
    let mut iterations = Vec::with_capacity(count);
    for i in 0..count {
        let mut iteration = CounterIteration::default();
        if let Some(hw) = hw_blocks.get(i) {
            iteration.l1_icache_misses = hw.l1_icache_misses;
            iteration.l1_dcache_misses = hw.l1_dcache_misses;
            iteration.itlb_misses = hw.itlb_misses;
            iteration.dtlb_misses = hw.dtlb_misses;
            iteration.instructions = hw.instructions;
            iteration.branch_mispredictions = hw.branch_mispredictions;
        }
        if let Some(util) = util_blocks.get(i) {
            iteration.core_cycles = util.core_cycles;
            iteration.kernel_cycles = util.kernel_cycles;
            iteration.user_cycles = util.user_cycles;
            iteration.kernel_entries = util.kernel_entries;
            iteration.schedules = util.schedules;
        }
        iterations.push(iteration);
    }
    (iterations, faults)
}

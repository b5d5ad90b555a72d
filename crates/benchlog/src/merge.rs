//! Aggregation of the two captures into one record per iteration.
//!
//! The join key is the requested throughput level. Whatever levels actually
//! appear are used as-is; the canonical sweep (10-1000 Mb/s) is never assumed.

use std::collections::BTreeMap;

use log::warn;

use crate::counters::CounterIteration;
use crate::iq::IqIteration;
use crate::record::PerformanceRecord;

/// Merges IQ and counter iterations into records keyed by throughput level.
///
/// Keys are compared exactly. An iteration present in only one capture is
/// carried forward with that capture's fields alone and left for the
/// completeness filter to judge. Counter iterations without a key (brace
/// shape) pair with the IQ iterations by position in file order. If the two
/// captures advertise keys with no overlap at all, a warning is raised since
/// the output may end up empty after filtering.
pub fn merge_iterations(
    iq: &[IqIteration],
    counters: &[CounterIteration],
) -> BTreeMap<u64, PerformanceRecord> {
    let mut records: BTreeMap<u64, PerformanceRecord> = BTreeMap::new();

    for iteration in iq {
        let record = records
            .entry(iteration.requested_mbps)
            .or_insert_with(|| PerformanceRecord::new(iteration.requested_mbps));
        record.received_mbps = iteration.received_mbps;
        record.sent_mbps = iteration.sent_mbps;
        record.packet_size = iteration.packet_size;
        record.rtt_min_us = iteration.rtt_min_us;
        record.rtt_mean_us = iteration.rtt_mean_us;
        record.rtt_max_us = iteration.rtt_max_us;
        record.rtt_stdev_us = iteration.rtt_stdev_us;
        record.rtt_median_us = iteration.rtt_median_us;
        record.bad_packets = iteration.bad_packets;
        record.idle_cycles = iteration.idle_cycles;
        record.total_cycles = iteration.total_cycles;
    }

    let mut seen_counter_keys: Vec<u64> = Vec::new();
    let mut unkeyed_index = 0;
    let mut any_keyed = false;
    let mut any_overlap = false;
    for iteration in counters {
        let key = match iteration.requested_mbps {
            Some(key) => {
                any_keyed = true;
                if records.contains_key(&key) {
                    any_overlap = true;
                }
                key
            }
            None => {
                let paired = iq.get(unkeyed_index).map(|it| it.requested_mbps);
                unkeyed_index += 1;
                match paired {
                    Some(key) => key,
                    None => {
                        warn!(
                            "counter iteration {} has no throughput key and no IQ iteration to pair with; dropped",
                            unkeyed_index
                        );
                        continue;
                    }
                }
            }
        };
        if seen_counter_keys.contains(&key) {
            warn!(
                "duplicate {} Mb/s iteration in counter capture; keeping the first",
                key
            );
            continue;
        }
        seen_counter_keys.push(key);

        let record = records
            .entry(key)
            .or_insert_with(|| PerformanceRecord::new(key));
        record.core_cycles = iteration.core_cycles;
        record.system_cycles = iteration.system_cycles;
        record.kernel_cycles = iteration.kernel_cycles;
        record.user_cycles = iteration.user_cycles;
        record.kernel_entries = iteration.kernel_entries;
        record.schedules = iteration.schedules;
        record.l1_icache_misses = iteration.l1_icache_misses;
        record.l1_dcache_misses = iteration.l1_dcache_misses;
        record.itlb_misses = iteration.itlb_misses;
        record.dtlb_misses = iteration.dtlb_misses;
        record.instructions = iteration.instructions;
        record.branch_mispredictions = iteration.branch_mispredictions;
        record.components = iteration.components.clone();
    }

    if any_keyed && !iq.is_empty() && !any_overlap {
        warn!("the IQ and counter captures share no throughput levels; the output may be empty after filtering");
    }

    // Captures that only report core cycles stand in for the system total
    for record in records.values_mut() {
        if record.total_cycles.is_none() {
            record.total_cycles = record.core_cycles;
        }
    }

    records
}

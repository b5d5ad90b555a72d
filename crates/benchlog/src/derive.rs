//! Derived-metric enrichment under the fixed experimental constants.

use crate::record::PerformanceRecord;

/// Packets transmitted in every iteration. Per-packet metrics always divide
/// by this constant, never by an observed packet count, so they stay
/// comparable across runs with different receive rates.
pub const PACKET_COUNT: u64 = 200_000;

/// UDP payload bytes per packet
pub const PACKET_PAYLOAD_BYTES: u64 = 1472;

/// Per-packet wire overhead bytes
pub const PACKET_OVERHEAD_BYTES: u64 = 56;

/// Bytes one packet occupies on the wire
pub const PACKET_WIRE_BYTES: u64 = PACKET_PAYLOAD_BYTES + PACKET_OVERHEAD_BYTES;

/// Idle bookend before transmission starts, seconds
pub const WARMUP_SECS: u64 = 10;

/// Idle bookend after transmission ends, seconds
pub const COOLDOWN_SECS: u64 = 10;

/// Fills in the derived metrics of a merged record.
///
/// Cycles and instructions keep accruing during warm-up and cool-down, so
/// every time-normalized metric divides by the total wall time including both
/// bookends, never the steady-state window alone. A derivation whose inputs
/// would divide by zero leaves its field absent; that is not a completeness
/// failure, since the raw fields were present.
pub fn enrich(record: &mut PerformanceRecord) {
    // System utilization arrives as raw cycle counts, so it is the one
    // fraction derived here; per-component fractions pass through untouched.
    if let (Some(idle), Some(total)) = (record.idle_cycles, record.total_cycles) {
        if total > 0 {
            record.cpu_util = Some(1.0 - idle as f64 / total as f64);
        }
    }

    // Captures without a user-cycle split report it as zero or not at all
    if record.user_cycles.map_or(true, |user| user == 0) {
        if let (Some(total), Some(kernel), Some(idle)) =
            (record.total_cycles, record.kernel_cycles, record.idle_cycles)
        {
            if let Some(user) = total.checked_sub(kernel).and_then(|v| v.checked_sub(idle)) {
                record.user_cycles = Some(user);
            }
        }
    }

    // The packet rate is implied by the requested level and the fixed wire
    // size; a zero-throughput iteration has no rate and no durations.
    if record.requested_mbps > 0 {
        let rate = record.requested_mbps as f64 * 1e6 / (PACKET_WIRE_BYTES * 8) as f64;
        let steady_secs = PACKET_COUNT as f64 / rate;
        let total_secs = steady_secs + (WARMUP_SECS + COOLDOWN_SECS) as f64;
        record.packet_rate = Some(rate);
        record.test_duration_s = Some(steady_secs);
        record.total_time_s = Some(total_secs);

        if let Some(instructions) = record.instructions.filter(|&i| i > 0) {
            record.instructions_per_sec = Some((instructions as f64 / total_secs).round() as u64);
        }
    }

    let packets = PACKET_COUNT as f64;
    record.cycles_per_packet = record.total_cycles.map(|c| c / PACKET_COUNT);
    record.user_cycles_per_packet = record
        .user_cycles
        .filter(|&user| user > 0)
        .map(|user| user / PACKET_COUNT);
    record.kernel_cycles_per_packet = record.kernel_cycles.map(|c| c / PACKET_COUNT);
    record.kernel_entries_per_packet = record.kernel_entries.map(|e| e as f64 / packets);
    record.icache_misses_per_packet = record.l1_icache_misses.map(|v| v as f64 / packets);
    record.dcache_misses_per_packet = record.l1_dcache_misses.map(|v| v as f64 / packets);
    record.itlb_misses_per_packet = record.itlb_misses.map(|v| v as f64 / packets);
    record.dtlb_misses_per_packet = record.dtlb_misses.map(|v| v as f64 / packets);
    record.instructions_per_packet = record.instructions.map(|i| i / PACKET_COUNT);
    record.branch_mispred_per_packet = record.branch_mispredictions.map(|v| v as f64 / packets);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("field should be present");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_instructions_per_second_hand_check() {
        // 100 Mb/s of 1528-byte packets is 10^8/12224 p/s, so 200,000 packets
        // take 24.448 s on the wire and 44.448 s including both bookends.
        let mut record = PerformanceRecord::new(100);
        record.instructions = Some(44_448_000_000);
        enrich(&mut record);

        assert_close(record.test_duration_s, 24.448);
        assert_close(record.total_time_s, 44.448);
        assert_eq!(record.instructions_per_sec, Some(1_000_000_000));
    }

    #[rstest]
    #[case(10, 244.48)]
    #[case(100, 24.448)]
    #[case(1000, 2.4448)]
    fn test_steady_state_duration(#[case] requested_mbps: u64, #[case] expected_secs: f64) {
        let mut record = PerformanceRecord::new(requested_mbps);
        enrich(&mut record);
        assert_close(record.test_duration_s, expected_secs);
        assert_close(record.total_time_s, expected_secs + 20.0);
    }

    #[test]
    fn test_zero_requested_throughput_skips_rate_metrics() {
        let mut record = PerformanceRecord::new(0);
        record.instructions = Some(1_000_000);
        record.total_cycles = Some(400_000);
        enrich(&mut record);

        assert_eq!(record.packet_rate, None);
        assert_eq!(record.test_duration_s, None);
        assert_eq!(record.total_time_s, None);
        assert_eq!(record.instructions_per_sec, None);
        // per-packet metrics divide by the fixed constant and still appear
        assert_eq!(record.cycles_per_packet, Some(2));
    }

    #[test]
    fn test_per_packet_uses_fixed_count_not_observed_rate() {
        let mut fast = PerformanceRecord::new(100);
        fast.received_mbps = Some(99.1);
        fast.packet_size = Some(1472);
        fast.l1_dcache_misses = Some(500_000);
        fast.instructions = Some(2_000_000);
        enrich(&mut fast);

        let mut slow = fast.clone();
        slow.received_mbps = Some(17.3);
        slow.packet_size = Some(9000);
        enrich(&mut slow);

        assert_eq!(fast.dcache_misses_per_packet, Some(2.5));
        assert_eq!(slow.dcache_misses_per_packet, Some(2.5));
        assert_eq!(fast.instructions_per_packet, Some(10));
        assert_eq!(slow.instructions_per_packet, Some(10));
    }

    #[test]
    fn test_cpu_util_from_idle_and_total() {
        let mut record = PerformanceRecord::new(10);
        record.idle_cycles = Some(300_000);
        record.total_cycles = Some(1_000_000);
        enrich(&mut record);
        assert_close(record.cpu_util, 0.7);
    }

    #[test]
    fn test_cpu_util_skipped_on_zero_total() {
        let mut record = PerformanceRecord::new(10);
        record.idle_cycles = Some(0);
        record.total_cycles = Some(0);
        enrich(&mut record);
        assert_eq!(record.cpu_util, None);
    }

    #[test]
    fn test_user_cycles_backfill() {
        let mut record = PerformanceRecord::new(10);
        record.total_cycles = Some(1_000_000);
        record.kernel_cycles = Some(300_000);
        record.idle_cycles = Some(500_000);
        enrich(&mut record);
        assert_eq!(record.user_cycles, Some(200_000));
        assert_eq!(record.user_cycles_per_packet, Some(1));
    }

    #[test]
    fn test_reported_user_cycles_kept() {
        let mut record = PerformanceRecord::new(10);
        record.total_cycles = Some(1_000_000);
        record.kernel_cycles = Some(300_000);
        record.idle_cycles = Some(500_000);
        record.user_cycles = Some(123_456);
        enrich(&mut record);
        assert_eq!(record.user_cycles, Some(123_456));
    }

    #[test]
    fn test_user_cycles_backfill_skipped_on_underflow() {
        let mut record = PerformanceRecord::new(10);
        record.total_cycles = Some(100);
        record.kernel_cycles = Some(300_000);
        record.idle_cycles = Some(500_000);
        enrich(&mut record);
        assert_eq!(record.user_cycles, None);
    }

    #[test]
    fn test_zero_instructions_leave_rate_absent() {
        let mut record = PerformanceRecord::new(100);
        record.instructions = Some(0);
        enrich(&mut record);
        assert_eq!(record.instructions_per_sec, None);
        assert_eq!(record.instructions_per_packet, Some(0));
    }
}

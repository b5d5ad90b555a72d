use std::collections::BTreeMap;
use std::fmt;

/// The subsystems whose scheduler accounting the benchmark harness reports.
///
/// A capture may carry counters for any subset of these; an unknown component
/// name in a capture is ignored outright, so a record can never hold
/// utilization for a component outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Component {
    Client0,
    Client0NetCopier,
    EthernetDriver,
    NetVirtRx,
    NetVirtTx,
}

impl Component {
    /// All known components, in output-column order
    pub const ALL: [Component; 5] = [
        Component::Client0,
        Component::Client0NetCopier,
        Component::EthernetDriver,
        Component::NetVirtRx,
        Component::NetVirtTx,
    ];

    /// The component's name as it appears in captures and output headers
    pub fn label(&self) -> &'static str {
        match self {
            Component::Client0 => "client0",
            Component::Client0NetCopier => "client0_net_copier",
            Component::EthernetDriver => "ethernet_driver",
            Component::NetVirtRx => "net_virt_rx",
            Component::NetVirtTx => "net_virt_tx",
        }
    }

    /// Looks up a component by its capture label
    pub fn from_label(label: &str) -> Option<Component> {
        Component::ALL.iter().copied().find(|c| c.label() == label)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// CPU time fractions attributed to one component during an iteration.
///
/// The harness reports these already normalized to 0.0-1.0; they are carried
/// through as-is, never re-derived from cycle counts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComponentUtil {
    pub cpu: f64,
    pub kernel: f64,
    pub user: f64,
}

/// One benchmark iteration, keyed by the requested throughput level in Mb/s.
///
/// Built by merging the two captures for one key, then enriched with derived
/// metrics. Every field except the key is optional: absence means the source
/// logs did not carry it, and the completeness filter decides whether the
/// record is still reportable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerformanceRecord {
    /// Requested throughput in Mb/s; unique within a dataset and the join key
    /// between the two captures
    pub requested_mbps: u64,

    // Throughput and latency, from the IQ capture
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

    // Cycle accounting, from the counter capture
    pub core_cycles: Option<u64>,
    pub system_cycles: Option<u64>,
    pub kernel_cycles: Option<u64>,
    pub user_cycles: Option<u64>,
    pub kernel_entries: Option<u64>,
    pub schedules: Option<u64>,

    // Hardware counters, from the counter capture
    pub l1_icache_misses: Option<u64>,
    pub l1_dcache_misses: Option<u64>,
    pub itlb_misses: Option<u64>,
    pub dtlb_misses: Option<u64>,
    pub instructions: Option<u64>,
    pub branch_mispredictions: Option<u64>,

    /// Per-component utilization; any subset of the known components
    pub components: BTreeMap<Component, ComponentUtil>,

    // Derived metrics, filled in by the enrichment pass
    pub cpu_util: Option<f64>,
    pub packet_rate: Option<f64>,
    pub test_duration_s: Option<f64>,
    pub total_time_s: Option<f64>,
    pub instructions_per_sec: Option<u64>,
    pub cycles_per_packet: Option<u64>,
    pub user_cycles_per_packet: Option<u64>,
    pub kernel_cycles_per_packet: Option<u64>,
    pub kernel_entries_per_packet: Option<f64>,
    pub icache_misses_per_packet: Option<f64>,
    pub dcache_misses_per_packet: Option<f64>,
    pub itlb_misses_per_packet: Option<f64>,
    pub dtlb_misses_per_packet: Option<f64>,
    pub instructions_per_packet: Option<u64>,
    pub branch_mispred_per_packet: Option<f64>,
}

impl PerformanceRecord {
    /// Creates an empty record for one requested throughput level
    pub fn new(requested_mbps: u64) -> Self {
        Self {
            requested_mbps,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_label_round_trip() {
        for component in Component::ALL {
            assert_eq!(Component::from_label(component.label()), Some(component));
        }
    }

    #[test]
    fn test_unknown_component_label() {
        assert_eq!(Component::from_label("serial_driver"), None);
        assert_eq!(Component::from_label(""), None);
    }
}

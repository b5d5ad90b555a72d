//! End-to-end tests: raw captures in, finished table out.

use std::env;
use std::fs;
use std::path::PathBuf;

use benchlog::{generate_report, Error};

const IQ_CAPTURE: &str = "\
ipbench run starting
Result Summary:
Requested_Throughput,Receive_Throughput,Send_Throughput,Packet_Size,Minimum_RTT,Average_RTT,Maximum_RTT,Stdev_RTT,Median_RTT,Bad_Packets,Idle_Cycles,Total_Cycles
10000000,9870000,9990000,1472,90,120,300,8.5,118,0,600000,1000000
20000000,19700000,19980000,1472,95,130,350,9.5,128,1,550000,1000000
50000000,49300000,49900000,1472,98,140,380,10.5,138,0,530000,1000000
100000000,98700000,99900000,1472,100,151,412,12.5,148,0,500000,1000000
";

// TEST blocks arrive in a different order than the IQ capture to prove the
// join is by key, not position.
const COUNTER_CAPTURE: &str = "\
Core Cycles,System Cycles,Kernel Cycles,User Cycles,Kernel Entries,Schedules
TEST 1
ethernet_driver,1,2,3,4,5,6,0.1234,0.0456,0.0778
System Total 100Mb/s,2000000,1990000,300000,0,1500,900
TEST 2
ethernet_driver,1,2,3,4,5,6,0.0111,0.0055,0.0056
net_virt_rx,1,2,3,4,5,6,0.0222,0.0100,0.0122
System Total 10Mb/s,2100000,2090000,310000,0,1600,910
TEST 3
System Total 20Mb/s,2200000,2190000,320000,0,1700,920

L1 i-cache misses,L1 d-cache misses,L1 i-tlb misses,L1 d-tlb misses,Instructions,Branch mispredictions
11,12,13,14,44448000000,16
31,32,33,34,35,36
41,42,43,44,45,46
";

struct TestDir {
    root: PathBuf,
}

impl TestDir {
    fn new(name: &str) -> Self {
        let root = env::temp_dir().join(format!("benchlog_it_{}_{}", std::process::id(), name));
        fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.root).ok();
    }
}

#[test]
fn test_full_pipeline() {
    let dir = TestDir::new("full");
    let iq = dir.write("run_iq.txt", IQ_CAPTURE);
    let counters = dir.write("run_out.txt", COUNTER_CAPTURE);
    let output = dir.path("run_records.csv");

    let summary = generate_report(&iq, &counters, &output).unwrap();
    assert_eq!(summary.written, 3);
    // 50 Mb/s has no counter iteration and fails the completeness filter
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.faults, 0);

    let written = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Requ Thrput (Mb/s),"));
    assert!(lines[1].starts_with("10,"));
    assert!(lines[2].starts_with("20,"));
    assert!(lines[3].starts_with("100,"));
    assert!(!written.contains("\n50,"));
}

#[test]
fn test_hand_computed_row() {
    let dir = TestDir::new("hand");
    let iq = dir.write("run_iq.txt", IQ_CAPTURE);
    let counters = dir.write("run_out.txt", COUNTER_CAPTURE);
    let output = dir.path("run_records.csv");

    generate_report(&iq, &counters, &output).unwrap();
    let written = fs::read_to_string(&output).unwrap();
    let row = written
        .lines()
        .find(|l| l.starts_with("100,"))
        .expect("the 100 Mb/s row should be present");

    // 100 Mb/s of 1528-byte packets: 8180.63 p/s, 24.45 s steady state,
    // 44.45 s with the bookends, and 4.4448e10 instructions come out at
    // exactly 1e9 instructions per second. User cycles backfill to
    // total - kernel - idle = 200,000, one cycle per packet.
    let expected = concat!(
        "100,98.70,99.90,1472,100,151,412,12.50,148,500000,1000000,0.5000,",
        "300000,200000,1500,900,10,10,24.45,44.45,200000,8180.63,200000,",
        "11,12,13,14,44448000000,1000000000,16,",
        "5,1,1,0.01,0.00,0.00,0.00,0.00,222240,0.00,",
        "0,2000000,1990000,",
        "NA,NA,NA,NA,NA,NA,0.1234,0.0456,0.0778,NA,NA,NA,NA,NA,NA"
    );
    assert_eq!(row, expected);
}

#[test]
fn test_reruns_are_byte_identical() {
    let dir = TestDir::new("determinism");
    let iq = dir.write("run_iq.txt", IQ_CAPTURE);
    let counters = dir.write("run_out.txt", COUNTER_CAPTURE);
    let first_out = dir.path("first.csv");
    let second_out = dir.path("second.csv");

    generate_report(&iq, &counters, &first_out).unwrap();
    generate_report(&iq, &counters, &second_out).unwrap();

    assert_eq!(
        fs::read(&first_out).unwrap(),
        fs::read(&second_out).unwrap()
    );
}

#[test]
fn test_no_staging_file_left_behind() {
    let dir = TestDir::new("staging");
    let iq = dir.write("run_iq.txt", IQ_CAPTURE);
    let counters = dir.write("run_out.txt", COUNTER_CAPTURE);
    let output = dir.path("run_records.csv");

    generate_report(&iq, &counters, &output).unwrap();
    assert!(output.exists());
    let leftovers: Vec<_> = fs::read_dir(&dir.root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_missing_input_is_fatal_and_writes_nothing() {
    let dir = TestDir::new("missing_input");
    let counters = dir.write("run_out.txt", COUNTER_CAPTURE);
    let output = dir.path("run_records.csv");

    let result = generate_report(&dir.path("absent.txt"), &counters, &output);
    assert!(matches!(result, Err(Error::InputNotFound(_, _))));
    assert!(!output.exists());
}

#[test]
fn test_zero_extracted_iterations_is_fatal() {
    let dir = TestDir::new("zero_iterations");
    let iq = dir.write("run_iq.txt", "no table in here\n");
    let counters = dir.write("run_out.txt", "nothing here either\n");
    let output = dir.path("run_records.csv");

    let result = generate_report(&iq, &counters, &output);
    assert!(matches!(result, Err(Error::NoIterations(_))));
    assert!(!output.exists());
}

#[test]
fn test_all_incomplete_yields_header_only_table() {
    let dir = TestDir::new("header_only");
    let iq = dir.write("run_iq.txt", IQ_CAPTURE);
    let counters = dir.write("run_out.txt", "no counters captured\n");
    let output = dir.path("run_records.csv");

    let summary = generate_report(&iq, &counters, &output).unwrap();
    assert_eq!(summary.written, 0);
    assert_eq!(summary.dropped, 4);

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written.lines().count(), 1);
}

#[test]
fn test_component_absence_in_one_dataset_is_independent() {
    let dir = TestDir::new("independent");
    let iq = dir.write("run_iq.txt", IQ_CAPTURE);
    let counters = dir.write("run_out.txt", COUNTER_CAPTURE);
    let output = dir.path("run_records.csv");
    generate_report(&iq, &counters, &output).unwrap();
    let written = fs::read_to_string(&output).unwrap();

    // 10 Mb/s carries two components, 20 Mb/s none; both rows exist with
    // the same width and the 20 Mb/s component cells are all NA.
    let row_10 = written.lines().find(|l| l.starts_with("10,")).unwrap();
    let row_20 = written.lines().find(|l| l.starts_with("20,")).unwrap();
    assert_eq!(
        row_10.split(',').count(),
        row_20.split(',').count()
    );
    assert!(row_10.contains("0.0111,0.0055,0.0056"));
    assert!(row_10.contains("0.0222,0.0100,0.0122"));
    let component_cells: Vec<&str> = row_20.split(',').skip(43).collect();
    assert_eq!(component_cells.len(), 15);
    assert!(component_cells.iter().all(|c| *c == "NA"));
}

// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

use std::{io::Write, sync::Arc};

use randbattery::{
    output::{FileSink, MemorySink, OutputSink},
    rngs::{xorshift::XorShift128, ReferenceRand},
    stream::{FileStream, MemoryStream, RngStream},
    suite::{BirthdaySpacings, BitGroup, CountBits, MonteCarlo},
    BatteryConfig, BatteryError, ResultKind, Test,
};

fn detail_value(test: &dyn Test, prefix: &str) -> f64 {
    let line = test
        .details()
        .unwrap()
        .iter()
        .find(|d| d.starts_with(prefix))
        .unwrap_or_else(|| panic!("no detail {prefix:?}"));
    line.rsplit(':').next().unwrap().trim().parse().unwrap()
}

#[test]
fn alternating_bytes_balance_single_bits() {
    let data: Vec<u8> = (0..1_000_000).map(|i| if i % 2 == 0 { 0x00 } else { 0xFF }).collect();
    let mut test = CountBits::new(BitGroup::One, BatteryConfig::default());
    test.register_input(Box::new(MemoryStream::new(data)));
    test.run_test().unwrap();

    let details = test.details().unwrap();
    assert!(details.contains(&"bit 0\t\t: 4000000\tdeviation 0".to_owned()));
    assert!(details.contains(&"bit 1\t\t: 4000000\tdeviation 0".to_owned()));
    assert!(details.contains(&"the sum is\t\t: 0".to_owned()));
    assert_eq!(test.result().unwrap(), ResultKind::Pass);
    assert!(test.errors().unwrap().is_empty());
}

#[test]
fn seeded_generator_gives_interior_p_value() {
    let mut test = CountBits::new(BitGroup::One, BatteryConfig::default());
    test.register_input(Box::new(RngStream::<ReferenceRand>::new(1234, Some(1 << 20))));
    test.run_test().unwrap();
    let p = detail_value(&test, "chi-square p-value");
    assert!(p > 0.0 && p < 1.0, "{p}");
}

#[test]
fn fresh_instances_agree() {
    let run = || {
        let sink = Arc::new(MemorySink::new());
        let mut test = BirthdaySpacings::new(BatteryConfig::default())
            .with_samples(40)
            .with_shifts(vec![8, 0]);
        test.register_input(Box::new(RngStream::<XorShift128>::new(77, None)));
        test.add_output_destination(sink.clone());
        test.test("determinism").unwrap();
        (test.details().unwrap().to_vec(), test.result().unwrap(), sink.contents())
    };
    let first = run();
    assert_eq!(first, run());
    assert!(first.2.starts_with("determinism: BirthdaySpacings\r\n"));
}

#[test]
fn accessors_and_second_run_are_usage_errors() {
    let mut test = MonteCarlo::new(BatteryConfig::default()).with_pairs(100);
    assert!(matches!(test.result(), Err(BatteryError::NotRun("MonteCarlo"))));
    test.register_input(Box::new(MemoryStream::new(vec![0u8; 200])));
    test.run_test().unwrap();
    assert!(matches!(test.run_test(), Err(BatteryError::AlreadyRun(_))));
    assert_eq!(detail_value(&test, "pi estimate"), 4.0);
}

#[test]
fn file_input_and_file_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("random.bin");
    let mut file = std::fs::File::create(&input).unwrap();
    let bytes: Vec<u8> = (0..65_536u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    file.write_all(&bytes).unwrap();
    drop(file);

    let report = dir.path().join("report.txt");
    let sink: Arc<dyn OutputSink> = Arc::new(FileSink::append(&report).unwrap());
    let mut test = CountBits::new(BitGroup::Eight, BatteryConfig::default());
    test.register_input(Box::new(FileStream::new(&input)));
    test.add_output_destination(sink);
    test.test("file").unwrap();

    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.starts_with("file: Count8Bits\r\n"));
    assert!(text.contains("bytes read\t\t: 65536\r\n"));
    assert!(text.contains("result\t\t\t: "));
}

// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Running several tests of the suite over one source of random data.

use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::{info, warn};

use crate::{
    base::{CancelToken, ResultKind, Test},
    config::BatteryConfig,
    error::BatteryError,
    output::{MemorySink, OutputSink, Printer},
    stream::RandomStream,
    strings,
    suite::{
        BinaryRank, BirthdaySpacings, BitGroup, ByteSource, CountBits, CountTheOnes,
        MinimumDistance, MonteCarlo, Occupancy, OccupancyConfig, RankConfig, Runs, Squeeze,
    },
    utils,
};

/// Every test the battery knows about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TestKind {
    Count1Bit,
    Count2Bits,
    Count3Bits,
    Count4Bits,
    Count8Bits,
    Count16Bits,
    BirthdaySpacings,
    BinaryRank6x8,
    BinaryRank31x31,
    BinaryRank32x32,
    MonteCarlo,
    MinimumDistance,
    Opso,
    Oqso,
    Dna,
    Bitstream,
    CountThe1sStream,
    CountThe1sSpecificBytes,
    Run,
    Squeeze,
}

impl TestKind {
    pub const ALL: [TestKind; 20] = [
        TestKind::Count1Bit,
        TestKind::Count2Bits,
        TestKind::Count3Bits,
        TestKind::Count4Bits,
        TestKind::Count8Bits,
        TestKind::Count16Bits,
        TestKind::BirthdaySpacings,
        TestKind::BinaryRank6x8,
        TestKind::BinaryRank31x31,
        TestKind::BinaryRank32x32,
        TestKind::MonteCarlo,
        TestKind::MinimumDistance,
        TestKind::Opso,
        TestKind::Oqso,
        TestKind::Dna,
        TestKind::Bitstream,
        TestKind::CountThe1sStream,
        TestKind::CountThe1sSpecificBytes,
        TestKind::Run,
        TestKind::Squeeze,
    ];

    /// Name of the test, identical to the name it reports under.
    pub fn name(self) -> &'static str {
        match self {
            TestKind::Count1Bit => BitGroup::One.test_name(),
            TestKind::Count2Bits => BitGroup::Two.test_name(),
            TestKind::Count3Bits => BitGroup::Three.test_name(),
            TestKind::Count4Bits => BitGroup::Four.test_name(),
            TestKind::Count8Bits => BitGroup::Eight.test_name(),
            TestKind::Count16Bits => BitGroup::Sixteen.test_name(),
            TestKind::BirthdaySpacings => "BirthdaySpacings",
            TestKind::BinaryRank6x8 => RankConfig::six_by_eight().name,
            TestKind::BinaryRank31x31 => RankConfig::thirty_one_by_thirty_one().name,
            TestKind::BinaryRank32x32 => RankConfig::thirty_two_by_thirty_two().name,
            TestKind::MonteCarlo => "MonteCarlo",
            TestKind::MinimumDistance => "MinimumDistance",
            TestKind::Opso => "OPSO",
            TestKind::Oqso => "OQSO",
            TestKind::Dna => "DNA",
            TestKind::Bitstream => "Bitstream",
            TestKind::CountThe1sStream => "CountThe1sStream",
            TestKind::CountThe1sSpecificBytes => "CountThe1sSpecificBytes",
            TestKind::Run => "Run",
            TestKind::Squeeze => "Squeeze",
        }
    }

    /// A fresh instance of the test with its classical sample sizes.
    pub fn create(self, config: BatteryConfig) -> Box<dyn Test> {
        match self {
            TestKind::Count1Bit => Box::new(CountBits::new(BitGroup::One, config)),
            TestKind::Count2Bits => Box::new(CountBits::new(BitGroup::Two, config)),
            TestKind::Count3Bits => Box::new(CountBits::new(BitGroup::Three, config)),
            TestKind::Count4Bits => Box::new(CountBits::new(BitGroup::Four, config)),
            TestKind::Count8Bits => Box::new(CountBits::new(BitGroup::Eight, config)),
            TestKind::Count16Bits => Box::new(CountBits::new(BitGroup::Sixteen, config)),
            TestKind::BirthdaySpacings => Box::new(BirthdaySpacings::new(config)),
            TestKind::BinaryRank6x8 => {
                Box::new(BinaryRank::new(RankConfig::six_by_eight(), config))
            }
            TestKind::BinaryRank31x31 => Box::new(BinaryRank::new(
                RankConfig::thirty_one_by_thirty_one(),
                config,
            )),
            TestKind::BinaryRank32x32 => Box::new(BinaryRank::new(
                RankConfig::thirty_two_by_thirty_two(),
                config,
            )),
            TestKind::MonteCarlo => Box::new(MonteCarlo::new(config)),
            TestKind::MinimumDistance => Box::new(MinimumDistance::new(config)),
            TestKind::Opso => Box::new(Occupancy::new(OccupancyConfig::opso(), config)),
            TestKind::Oqso => Box::new(Occupancy::new(OccupancyConfig::oqso(), config)),
            TestKind::Dna => Box::new(Occupancy::new(OccupancyConfig::dna(), config)),
            TestKind::Bitstream => Box::new(Occupancy::new(OccupancyConfig::bitstream(), config)),
            TestKind::CountThe1sStream => {
                Box::new(CountTheOnes::new(ByteSource::stream(), config))
            }
            TestKind::CountThe1sSpecificBytes => {
                Box::new(CountTheOnes::new(ByteSource::specific_bytes(), config))
            }
            TestKind::Run => Box::new(Runs::new(config)),
            TestKind::Squeeze => Box::new(Squeeze::new(config)),
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestKind {
    type Err = BatteryError;

    /// Case insensitive lookup by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BatteryError::UnknownTest(s.to_owned()))
    }
}

/// How a single test of a battery run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Finished(ResultKind),
    Cancelled,
    /// The test refused to run, e.g. because the stream was too short.
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub kind: TestKind,
    pub status: Status,
    /// Number of error lines in the report.
    pub errors: usize,
    pub time_used: Duration,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.status == Status::Finished(ResultKind::Pass)
    }

    pub fn format(&self) -> String {
        let status = match &self.status {
            Status::Finished(result) => result.label().to_owned(),
            Status::Cancelled => strings::CANCELLED_STR.to_owned(),
            Status::Aborted(reason) => format!("{} ({reason})", strings::NOT_RUN_STR),
        };
        format!(
            "{:<32}: Time: {:>12}     errors: {:>3}   - {}",
            self.kind.name(),
            utils::format_elapsed_time(self.time_used),
            self.errors,
            status
        )
    }
}

/// Options of a battery run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Label printed in front of every report.
    pub label: String,
    /// Run the tests on one thread each.
    pub parallel: bool,
    pub cancel: CancelToken,
}

/// Run one test to completion and send its report to `printer` in one piece.
fn run_single_test(
    kind: TestKind,
    config: BatteryConfig,
    stream: Box<dyn RandomStream>,
    printer: &Printer,
    options: &RunOptions,
) -> Outcome {
    let start = Instant::now();
    let report = Arc::new(MemorySink::new());
    let mut test = kind.create(config);
    test.register_input(stream);
    test.add_output_destination(report.clone());
    test.set_cancel_token(options.cancel.clone());

    let status = match test.test(&options.label) {
        Ok(()) => match test.result() {
            Ok(result) => Status::Finished(result),
            Err(err) => Status::Aborted(err.to_string()),
        },
        Err(BatteryError::Cancelled(_)) => Status::Cancelled,
        Err(err) => {
            printer.puts(&format!("{}: {kind}\r\nerror\t\t\t: {err}", options.label));
            Status::Aborted(err.to_string())
        }
    };
    printer.printf(&report.contents());
    Outcome {
        kind,
        status,
        errors: test.errors().map_or(0, |e| e.len()),
        time_used: start.elapsed(),
    }
}

/// Run `kinds` with a fresh stream from `streams` for each test.
///
/// Reports go to `sinks`, or to stdout when there are none, one complete
/// report at a time. Outcomes are returned in the order of `kinds`.
pub fn run_battery<F>(
    kinds: &[TestKind],
    config: BatteryConfig,
    streams: F,
    sinks: &[Arc<dyn OutputSink>],
    options: &RunOptions,
) -> Vec<Outcome>
where
    F: Fn(TestKind) -> Box<dyn RandomStream> + Sync,
{
    let mut printer = Printer::new();
    for sink in sinks {
        printer.add(sink.clone());
    }
    info!(
        "running {} tests{}",
        kinds.len(),
        if options.parallel { " in parallel" } else { "" }
    );

    if !options.parallel {
        return kinds
            .iter()
            .map(|&kind| run_single_test(kind, config, streams(kind), &printer, options))
            .collect();
    }
    let streams = &streams;
    let printer = &printer;
    thread::scope(|scope| {
        let handles: Vec<_> = kinds
            .iter()
            .map(|&kind| {
                let handle = scope.spawn(move || {
                    run_single_test(kind, config, streams(kind), printer, options)
                });
                (kind, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(kind, handle)| {
                handle.join().unwrap_or_else(|_| {
                    warn!("{kind} panicked");
                    Outcome {
                        kind,
                        status: Status::Aborted("panicked".to_owned()),
                        errors: 0,
                        time_used: Duration::ZERO,
                    }
                })
            })
            .collect()
    })
}

/// Summary of a battery run in the same vocabulary as the test reports.
pub fn format_summary(outcomes: &[Outcome]) -> String {
    let passed = outcomes.iter().filter(|o| o.passed()).count();
    let lines: Vec<String> = outcomes.iter().map(Outcome::format).collect();
    let total_time: Duration = outcomes.iter().map(|o| o.time_used).sum();
    format!(
        "{}\nOverall result: {}          ( {} / {} passed)\nTotal test time: {}",
        lines.join("\n"),
        if passed == outcomes.len() {
            strings::PASS_STR
        } else {
            strings::FAIL_STR
        },
        passed,
        outcomes.len(),
        utils::format_elapsed_time(total_time)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rngs::ReferenceRand,
        stream::{MemoryStream, RngStream},
    };

    #[test]
    fn names_round_trip() {
        for kind in TestKind::ALL {
            assert_eq!(kind.name().parse::<TestKind>().unwrap(), kind);
            assert_eq!(kind.create(BatteryConfig::default()).name(), kind.name());
        }
        assert_eq!("opso".parse::<TestKind>().unwrap(), TestKind::Opso);
        assert!(matches!(
            "Diehard".parse::<TestKind>(),
            Err(BatteryError::UnknownTest(name)) if name == "Diehard"
        ));
    }

    #[test]
    fn short_stream_runs_every_test() {
        let data: Arc<[u8]> = (0..4096u32).map(|i| (i * 7919 % 251) as u8).collect();
        let sink = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn OutputSink>> = vec![sink.clone()];
        let options = RunOptions {
            label: "short".to_owned(),
            ..RunOptions::default()
        };
        let outcomes = run_battery(
            &TestKind::ALL,
            BatteryConfig::default(),
            |_| Box::new(MemoryStream::new(data.clone())),
            &sinks,
            &options,
        );
        assert_eq!(outcomes.len(), TestKind::ALL.len());
        for outcome in &outcomes {
            match outcome.kind {
                TestKind::Run => assert!(matches!(outcome.status, Status::Aborted(_))),
                _ => assert!(matches!(outcome.status, Status::Finished(_)), "{outcome:?}"),
            }
        }
        let report = sink.contents();
        assert_eq!(report.matches("short: ").count(), TestKind::ALL.len());
        assert!(report.contains("short: Squeeze\r\n"));
    }

    #[test]
    fn parallel_matches_sequential() {
        let kinds = [TestKind::Count1Bit, TestKind::Count8Bits, TestKind::MonteCarlo];
        let streams = |_: TestKind| -> Box<dyn RandomStream> {
            Box::new(RngStream::<ReferenceRand>::new(42, Some(100_000)))
        };
        let sinks: Vec<Arc<dyn OutputSink>> = vec![Arc::new(MemorySink::new())];
        let sequential = run_battery(
            &kinds,
            BatteryConfig::default(),
            streams,
            &sinks,
            &RunOptions::default(),
        );
        let parallel = run_battery(
            &kinds,
            BatteryConfig::default(),
            streams,
            &sinks,
            &RunOptions {
                parallel: true,
                ..RunOptions::default()
            },
        );
        let statuses = |o: &[Outcome]| -> Vec<(TestKind, Status)> {
            o.iter().map(|o| (o.kind, o.status.clone())).collect()
        };
        assert_eq!(statuses(&sequential), statuses(&parallel));
    }

    #[test]
    fn cancelled_battery_reports_cancelled() {
        let options = RunOptions::default();
        options.cancel.cancel();
        let outcomes = run_battery(
            &[TestKind::Count1Bit, TestKind::Squeeze],
            BatteryConfig::default(),
            |_| Box::new(MemoryStream::new(vec![0u8; 64])),
            &[Arc::new(MemorySink::new()) as Arc<dyn OutputSink>],
            &options,
        );
        assert!(outcomes.iter().all(|o| o.status == Status::Cancelled));
        assert!(format_summary(&outcomes).contains("( 0 / 2 passed)"));
    }

    #[test]
    fn summary_lists_every_outcome() {
        let outcomes = vec![
            Outcome {
                kind: TestKind::Count1Bit,
                status: Status::Finished(ResultKind::Pass),
                errors: 0,
                time_used: Duration::from_millis(3),
            },
            Outcome {
                kind: TestKind::Run,
                status: Status::Aborted("too short".to_owned()),
                errors: 0,
                time_used: Duration::ZERO,
            },
        ];
        let summary = format_summary(&outcomes);
        assert!(summary.contains("PASSED"));
        assert!(summary.contains("NOT RUN (too short)"));
        assert!(summary.contains("Overall result: FAILED!!          ( 1 / 2 passed)"));
    }
}

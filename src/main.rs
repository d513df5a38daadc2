// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Command line front end: run the battery over a file or a built-in generator.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, ValueEnum};
use log::{error, warn};

use randbattery::{
    battery::{format_summary, run_battery, Outcome, RunOptions, TestKind},
    config::{BatteryConfig, KsMode, DEFAULT_SIGNIFICANCE},
    error::Result,
    output::{FileSink, OutputSink, Printer, StdoutSink},
    rngs::{lcg::Randu, testgens, xorshift::XorShift128, ReferenceRand},
    stream::{FileStream, RandomStream, RngStream},
    utils, CancelToken,
};

/// Generators that can stand in for an input file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Generator {
    /// The rand crate's StdRng.
    Reference,
    Xorshift,
    /// The infamous IBM generator, fails most tests.
    Randu,
    Zeros,
    Ones,
    AlternatingBytes,
}

#[derive(Parser, Debug)]
#[command(name = "randbattery", version)]
#[command(about = "Run Diehard style randomness tests over a byte stream")]
struct Cli {
    /// File of random bytes to test.
    #[arg(long, short)]
    file: Option<PathBuf>,

    /// Generator to test when no file is given.
    #[arg(long, value_enum, default_value_t = Generator::Reference)]
    generator: Generator,

    /// Seed of the generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Bytes produced by the generator before its stream ends.
    #[arg(long, default_value_t = 1 << 24)]
    limit: usize,

    /// Comma separated tests to run, all when omitted.
    #[arg(long, short, value_delimiter = ',')]
    tests: Vec<TestKind>,

    /// Summary p-values below this level fail a test.
    #[arg(long, default_value_t = DEFAULT_SIGNIFICANCE)]
    significance: f64,

    /// Input of the KS value reported by the bit counting tests.
    #[arg(long, default_value_t = KsMode::RawCounts)]
    ks_mode: KsMode,

    /// Run the tests on one thread each.
    #[arg(long)]
    parallel: bool,

    /// Also append the reports to this file.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// List the available tests and exit.
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn stream(&self) -> Box<dyn RandomStream> {
        if let Some(path) = &self.file {
            return Box::new(FileStream::new(path));
        }
        let (seed, limit) = (self.seed, Some(self.limit));
        match self.generator {
            Generator::Reference => Box::new(RngStream::<ReferenceRand>::new(seed, limit)),
            Generator::Xorshift => Box::new(RngStream::<XorShift128>::new(seed, limit)),
            Generator::Randu => Box::new(RngStream::<Randu>::new(seed, limit)),
            Generator::Zeros => Box::new(RngStream::<testgens::OnlyZero>::new(seed, limit)),
            Generator::Ones => Box::new(RngStream::<testgens::OnlyOne>::new(seed, limit)),
            Generator::AlternatingBytes => {
                Box::new(RngStream::<testgens::AlternatingBytes>::new(seed, limit))
            }
        }
    }

    /// Human readable description of the input.
    fn source(&self) -> Result<String> {
        Ok(match &self.file {
            Some(path) => {
                let size = std::fs::metadata(path)?.len() as usize;
                format!("{} ({})", path.display(), utils::format_byte_count(size))
            }
            None => format!(
                "{:?} generator, seed {:#018x} ({})",
                self.generator,
                self.seed,
                utils::format_byte_count(self.limit)
            ),
        })
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let source = cli.source()?;
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("cannot install the Ctrl-C handler: {err}");
    }

    let mut sinks: Vec<Arc<dyn OutputSink>> = vec![Arc::new(StdoutSink)];
    if let Some(path) = &cli.output {
        sinks.push(Arc::new(FileSink::append(path)?));
    }
    let mut printer = Printer::new();
    for sink in &sinks {
        printer.add(sink.clone());
    }
    printer.puts(&format!(
        "\r\nTesting: {source}\r\nStarted: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    let kinds = if cli.tests.is_empty() {
        TestKind::ALL.to_vec()
    } else {
        cli.tests.clone()
    };
    let config = BatteryConfig::default()
        .with_significance(cli.significance)
        .with_ks_mode(cli.ks_mode);
    let options = RunOptions {
        label: source.clone(),
        parallel: cli.parallel,
        cancel,
    };
    let outcomes = run_battery(&kinds, config, |_| cli.stream(), &sinks, &options);

    printer.puts(&format!("\r\nSummary for: {source}"));
    printer.puts(&format_summary(&outcomes));
    Ok(outcomes.iter().all(Outcome::passed))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if cli.list {
        for kind in TestKind::ALL {
            println!("{kind}");
        }
        return ExitCode::SUCCESS;
    }
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{err}");
            ExitCode::from(2)
        }
    }
}

// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Harness shared by every test of the battery.
//!
//! [`Base`] keeps the bookkeeping of a single test run: the registered input
//! stream, the output sinks, the detail and error lines and the final
//! [`ResultKind`]. Concrete tests embed a `Base` and implement [`Test`],
//! which supplies the run lifecycle on top of the test specific
//! [`Test::execute`].

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use log::{debug, info, warn};

use crate::{
    conditioning,
    config::BatteryConfig,
    error::{BatteryError, Result},
    output::{OutputSink, Printer},
    stream::RandomStream,
    strings, utils,
};

/// Outcome of a test.
///
/// Only `Fail` and `Pass` are assigned by the current tests; `Low`,
/// `Medium` and `High` are reserved for a finer grading scale.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResultKind {
    #[default]
    Fail,
    Low,
    Medium,
    High,
    Pass,
}

impl ResultKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResultKind::Fail => strings::FAIL_STR,
            ResultKind::Low => strings::LOW_STR,
            ResultKind::Medium => strings::MEDIUM_STR,
            ResultKind::High => strings::HIGH_STR,
            ResultKind::Pass => strings::PASS_STR,
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shared flag asking long running tests to stop between passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// State shared by all tests: input, output and the recorded report.
pub struct Base {
    name: &'static str,
    config: BatteryConfig,
    stream: Option<Box<dyn RandomStream>>,
    printer: Printer,
    cancel: CancelToken,
    has_been_run: bool,
    result: ResultKind,
    details: Vec<String>,
    errors: Vec<String>,
}

impl Base {
    pub fn new(name: &'static str, config: BatteryConfig) -> Self {
        Base {
            name,
            config,
            stream: None,
            printer: Printer::new(),
            cancel: CancelToken::new(),
            has_been_run: false,
            result: ResultKind::Fail,
            details: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &BatteryConfig {
        &self.config
    }

    // Input

    /// Register the stream the test reads from. Only one stream is kept.
    pub fn register_input(&mut self, stream: Box<dyn RandomStream>) {
        self.stream = Some(stream);
    }

    pub fn is_open(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_open())
    }

    pub fn open_input_stream(&mut self) -> bool {
        let opened = self.stream.as_mut().is_some_and(|s| s.open());
        if !opened {
            warn!("{}: input stream could not be opened", self.name);
        }
        opened
    }

    pub fn close_input_stream(&mut self) -> bool {
        self.stream.as_mut().is_some_and(|s| s.close())
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.stream.as_mut()?.read_byte()
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.stream.as_mut()?.read_u32()
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        self.stream.as_mut()?.read_u64()
    }

    /// Read a 32 bit word and scale it into [0, 1).
    pub fn read_unit(&mut self) -> Option<f64> {
        self.read_u32().map(conditioning::u32_to_unit)
    }

    // Output

    pub fn add_output_destination(&mut self, sink: Arc<dyn OutputSink>) -> bool {
        self.printer.add(sink)
    }

    pub fn remove_output_destination(&mut self, sink: &Arc<dyn OutputSink>) -> bool {
        self.printer.remove(sink)
    }

    pub fn printf(&self, text: &str) {
        self.printer.printf(text);
    }

    pub fn puts(&self, text: &str) {
        self.printer.puts(text);
    }

    // Cancellation

    pub fn set_cancel_token(&mut self, cancel: CancelToken) {
        self.cancel = cancel;
    }

    /// Fails with [`BatteryError::Cancelled`] once the token was tripped.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BatteryError::Cancelled(self.name));
        }
        Ok(())
    }

    // Report

    pub fn add_detail(&mut self, detail: impl Into<String>) {
        self.details.push(detail.into());
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        debug!("{}: {error}", self.name);
        self.errors.push(error);
    }

    pub fn set_result(&mut self, result: ResultKind) {
        self.result = result;
    }

    /// Pass when `p_value` reaches the configured significance level.
    pub fn decide(&mut self, p_value: f64) {
        let result = if p_value >= self.config.significance {
            ResultKind::Pass
        } else {
            ResultKind::Fail
        };
        self.set_result(result);
    }

    pub fn has_been_run(&self) -> bool {
        self.has_been_run
    }

    pub fn details(&self) -> Result<&[String]> {
        self.ensure_run()?;
        Ok(&self.details)
    }

    pub fn errors(&self) -> Result<&[String]> {
        self.ensure_run()?;
        Ok(&self.errors)
    }

    pub fn result(&self) -> Result<ResultKind> {
        self.ensure_run()?;
        Ok(self.result)
    }

    fn ensure_run(&self) -> Result<()> {
        if !self.has_been_run {
            return Err(BatteryError::NotRun(self.name));
        }
        Ok(())
    }

    fn mark_run(&mut self) {
        self.has_been_run = true;
    }

    fn discard_report(&mut self) {
        self.result = ResultKind::Fail;
        self.details.clear();
        self.errors.clear();
    }
}

/// A statistical test of the battery.
pub trait Test: Send {
    /// Short description of what the test measures.
    fn help(&self) -> &'static str;

    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;

    /// The test specific algorithm: read the stream, accumulate, record
    /// details and the result.
    fn execute(&mut self) -> Result<()>;

    fn name(&self) -> &'static str {
        self.base().name()
    }

    /// Run the test once. A second call fails with [`BatteryError::AlreadyRun`].
    fn run_test(&mut self) -> Result<()> {
        let name = self.name();
        if self.base().has_been_run() {
            return Err(BatteryError::AlreadyRun(name));
        }
        info!("running {name}");
        let start = Instant::now();
        match self.execute() {
            Ok(()) => {
                let base = self.base_mut();
                base.mark_run();
                info!(
                    "{name} finished in {}: {}",
                    utils::format_elapsed_time(start.elapsed()),
                    base.result
                );
                Ok(())
            }
            Err(err) => {
                let base = self.base_mut();
                base.close_input_stream();
                base.discard_report();
                warn!("{name} aborted: {err}");
                Err(err)
            }
        }
    }

    /// Run the test and write its report to the output sinks.
    fn test(&mut self, label: &str) -> Result<()> {
        self.run_test()?;
        let base = self.base();
        base.puts(&format!("{label}: {}", self.name()));
        for detail in &base.details {
            base.puts(detail);
        }
        for error in &base.errors {
            base.puts(&format!("error\t\t\t: {error}"));
        }
        base.puts(&format!("result\t\t\t: {}", base.result));
        Ok(())
    }

    fn details(&self) -> Result<&[String]> {
        self.base().details()
    }

    fn errors(&self) -> Result<&[String]> {
        self.base().errors()
    }

    fn result(&self) -> Result<ResultKind> {
        self.base().result()
    }

    fn has_been_run(&self) -> bool {
        self.base().has_been_run()
    }

    fn register_input(&mut self, stream: Box<dyn RandomStream>) {
        self.base_mut().register_input(stream);
    }

    fn add_output_destination(&mut self, sink: Arc<dyn OutputSink>) -> bool {
        self.base_mut().add_output_destination(sink)
    }

    fn remove_output_destination(&mut self, sink: &Arc<dyn OutputSink>) -> bool {
        self.base_mut().remove_output_destination(sink)
    }

    fn set_cancel_token(&mut self, cancel: CancelToken) {
        self.base_mut().set_cancel_token(cancel);
    }
}

// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Destinations for the textual test reports.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use log::warn;

/// Receives report text. Shared between tests that may run on different
/// threads, so implementations synchronise internally.
pub trait OutputSink: Send + Sync {
    fn write(&self, text: &str);
}

/// Writes to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = stdout.write_all(text.as_bytes()) {
            warn!("cannot write report to stdout: {err}");
        }
    }
}

/// Collects everything written into a string.
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: Mutex<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl OutputSink for MemorySink {
    fn write(&self, text: &str) {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_str(text);
    }
}

/// Appends to a file.
#[derive(Debug)]
pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileSink {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl OutputSink for FileSink {
    fn write(&self, text: &str) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writer.write_all(text.as_bytes()).and_then(|_| writer.flush()) {
            warn!("cannot write report to file: {err}");
        }
    }
}

fn same_sink(a: &Arc<dyn OutputSink>, b: &Arc<dyn OutputSink>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Broadcasts text to every registered sink, or to stdout when none is
/// registered.
#[derive(Clone, Default)]
pub struct Printer {
    sinks: Vec<Arc<dyn OutputSink>>,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. A sink already registered is not added twice.
    pub fn add(&mut self, sink: Arc<dyn OutputSink>) -> bool {
        if self.sinks.iter().any(|s| same_sink(s, &sink)) {
            return false;
        }
        self.sinks.push(sink);
        true
    }

    pub fn remove(&mut self, sink: &Arc<dyn OutputSink>) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|s| !same_sink(s, sink));
        self.sinks.len() != before
    }

    pub fn printf(&self, text: &str) {
        if self.sinks.is_empty() {
            StdoutSink.write(text);
            return;
        }
        for sink in &self.sinks {
            sink.write(text);
        }
    }

    /// [`Printer::printf`] followed by a line break.
    pub fn puts(&self, text: &str) {
        self.printf(&format!("{text}\r\n"));
    }
}

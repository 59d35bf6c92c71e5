//! Destinations for per-unit outcome reports.
//!
//! Sinks are called concurrently from every dispatch task. Each
//! implementation keeps one report from interleaving with another, but no
//! ordering across reports is promised.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::outcome::{DispatchOutcome, OutcomeReport};

pub trait OutcomeSink: Send + Sync {
    fn report(&self, report: &OutcomeReport);
}

impl<S: OutcomeSink + ?Sized> OutcomeSink for Arc<S> {
    fn report(&self, report: &OutcomeReport) {
        (**self).report(report)
    }
}

/// Where the binary sends per-unit reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Plain `Response received -> ...` lines on stdout.
    #[default]
    Console,
    /// Structured tracing events, formatted by the log subscriber.
    Tracing,
}

impl OutputMode {
    pub fn label(&self) -> &'static str {
        match self {
            OutputMode::Console => "console",
            OutputMode::Tracing => "tracing",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "console" => Ok(OutputMode::Console),
            "tracing" => Ok(OutputMode::Tracing),
            other => Err(format!(
                "Unknown output mode '{}'. Use 'console' or 'tracing'.",
                other
            )),
        }
    }
}

/// Builds the sink for an output mode.
pub fn build_sink(mode: OutputMode) -> Arc<dyn OutcomeSink> {
    match mode {
        OutputMode::Console => Arc::new(ConsoleSink),
        OutputMode::Tracing => Arc::new(TracingSink),
    }
}

/// Writes one line per report to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutcomeSink for ConsoleSink {
    fn report(&self, report: &OutcomeReport) {
        // The stdout lock is held for the whole line.
        let mut out = io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", report.line()) {
            warn!(index = report.index, error = %e, "Failed to write outcome line");
        }
    }
}

/// Writes one line per report to any writer.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> OutcomeSink for WriterSink<W> {
    fn report(&self, report: &OutcomeReport) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(writer, "{}", report.line()) {
            warn!(index = report.index, error = %e, "Failed to write outcome line");
        }
    }
}

/// Emits each report as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn report(&self, report: &OutcomeReport) {
        match &report.outcome {
            DispatchOutcome::Completed { status, .. } => info!(
                index = report.index,
                code = %report.code,
                status_code = status,
                latency_ms = report.latency.as_millis() as u64,
                "Response received"
            ),
            DispatchOutcome::Failed(e) => error!(
                index = report.index,
                code = %report.code,
                error = %e,
                error_category = e.label(),
                latency_ms = report.latency.as_millis() as u64,
                "Request failed"
            ),
        }
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<OutcomeReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<OutcomeReport> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutcomeSink for MemorySink {
    fn report(&self, report: &OutcomeReport) {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(report.clone());
    }
}

/// Forwards every report to several sinks in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn OutcomeSink>>) -> Self {
        Self { sinks }
    }
}

impl OutcomeSink for FanoutSink {
    fn report(&self, report: &OutcomeReport) {
        for sink in &self.sinks {
            sink.report(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DispatchError;
    use std::time::Duration;
    use tokio::time::Instant;

    fn report(index: usize, outcome: DispatchOutcome) -> OutcomeReport {
        OutcomeReport {
            index,
            code: format!("CODE {}", index + 1),
            outcome,
            launched_at: Instant::now(),
            latency: Duration::from_millis(1),
        }
    }

    #[test]
    fn writer_sink_writes_one_line_per_report() {
        let sink = WriterSink::new(Vec::new());
        sink.report(&report(
            0,
            DispatchOutcome::Completed {
                status: 201,
                reason: "Created".to_string(),
            },
        ));
        sink.report(&report(1, DispatchOutcome::Failed(DispatchError::Cancelled)));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Response received -> 0: 201 Created",
                "Request failed -> 1: request cancelled before a response arrived",
            ]
        );
    }

    #[test]
    fn concurrent_writes_do_not_interleave() {
        let sink = Arc::new(WriterSink::new(Vec::new()));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        sink.report(&report(
                            t * 50 + i,
                            DispatchOutcome::Completed {
                                status: 200,
                                reason: "OK".to_string(),
                            },
                        ));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let sink = Arc::try_unwrap(sink).ok().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 400);
        assert!(lines
            .iter()
            .all(|l| l.starts_with("Response received -> ") && l.ends_with(": 200 OK")));
    }

    #[test]
    fn output_mode_parses_case_insensitively() {
        assert_eq!("console".parse::<OutputMode>().unwrap(), OutputMode::Console);
        assert_eq!(" Tracing ".parse::<OutputMode>().unwrap(), OutputMode::Tracing);
        assert_eq!(OutputMode::default(), OutputMode::Console);
        assert_eq!(OutputMode::Tracing.to_string(), "tracing");

        let err = "syslog".parse::<OutputMode>().unwrap_err();
        assert!(err.contains("syslog"), "error: {}", err);
    }

    #[test]
    fn tracing_output_reports_both_outcomes() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();

        let sink = build_sink(OutputMode::Tracing);
        tracing::subscriber::with_default(subscriber, || {
            sink.report(&report(
                0,
                DispatchOutcome::Completed {
                    status: 200,
                    reason: "OK".to_string(),
                },
            ));
            sink.report(&report(1, DispatchOutcome::Failed(DispatchError::Cancelled)));
        });

        // Sinks built for either mode fan out like any other sink.
        let memory = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new(vec![
            build_sink(OutputMode::Tracing),
            memory.clone() as Arc<dyn OutcomeSink>,
        ]);
        fanout.report(&report(2, DispatchOutcome::Failed(DispatchError::Cancelled)));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new(vec![a.clone() as Arc<dyn OutcomeSink>, b.clone()]);

        fanout.report(&report(2, DispatchOutcome::Failed(DispatchError::Cancelled)));

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(b.reports()[0].index, 2);
    }
}

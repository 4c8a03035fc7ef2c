//! Pipeline progress reporting.
//!
//! Long-running phases (PDF parsing, image decoding, embedding, report
//! writing) emit [`ProgressEvent`]s through a [`ProgressReporter`]. The CLI
//! picks an implementation; library callers can plug in their own.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::{IsTerminal, Write};

/// Phase of the pipeline an event belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Text-layer extraction, one step per page/slide/sheet.
    Parsing,
    /// OCR polling, one step per resolved or abandoned image.
    DecodingImages,
    /// Embedding and inserting passages, one step per passage.
    Indexing,
    /// Report writing, one step per topic.
    Reporting,
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::Parsing => "parsing",
            Phase::DecodingImages => "decoding images",
            Phase::Indexing => "indexing",
            Phase::Reporting => "reporting",
        }
    }
}

/// A single progress event: `n` of `total` steps done for `subject`.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub subject: String,
    pub n: u64,
    pub total: u64,
}

/// Receives progress events from the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "report.pdf  parsing  3 / 12".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = format!(
            "{}  {}  {} / {}\n",
            event.subject,
            event.phase.label(),
            format_number(event.n),
            format_number(event.total)
        );
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = serde_json::json!({
            "event": "progress",
            "phase": event.phase.label(),
            "subject": event.subject,
            "n": event.n,
            "total": event.total,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if std::io::stderr().is_terminal() {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

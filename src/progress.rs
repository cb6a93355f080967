//! Streaming extraction of structured progress from engine output
//!
//! The repair engine reports progress as human-readable text, typically
//! `\r`-terminated updates like `Verifying: 45.3%` interleaved with
//! `\n`-terminated log lines. [`ProgressExtractor`] is a push-based consumer
//! that turns that stream into structured [`ProgressEvent`]s as the bytes
//! arrive: it implements [`std::io::Write`] so it can be attached directly as
//! the engine's output sink, regardless of whether the transport is a pipe, an
//! in-memory buffer, or a captured stream.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::{Arc, LazyLock};

/// Fixed denominator for progress events: 1000 represents 100.0%
pub const PROGRESS_SCALE: u64 = 1000;

/// The named stage of a repair run surfaced via progress text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Scanning target files on disk
    Scanning,
    /// Loading recovery-set packets
    Loading,
    /// Verifying file contents against block checksums
    Verifying,
    /// Reconstructing damaged or missing data
    Repairing,
}

impl Phase {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "Scanning" => Some(Phase::Scanning),
            "Loading" => Some(Phase::Loading),
            "Verifying" => Some(Phase::Verifying),
            "Repairing" => Some(Phase::Repairing),
            _ => None,
        }
    }
}

/// A single structured progress observation
///
/// Ephemeral: events are forwarded to the configured callback and never
/// stored. Percentages may repeat or step backwards when the engine re-emits
/// a line; no monotonicity is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The stage the engine reported
    pub phase: Phase,
    /// Progress scaled to `denominator`, i.e. `round(percent * 10)`
    pub numerator: u64,
    /// Always [`PROGRESS_SCALE`]
    pub denominator: u64,
}

/// Severity classification for non-progress engine output lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    /// Informational output
    Info,
    /// Damage reports and other recoverable conditions
    Warning,
    /// Failures reported by the engine
    Error,
}

/// Callback invoked for each progress event: `(phase, numerator, denominator)`
pub type ProgressCallback = Arc<dyn Fn(Phase, u64, u64) + Send + Sync>;

/// Callback invoked for each complete non-progress output line
pub type MessageCallback = Arc<dyn Fn(MessageLevel, &str) + Send + Sync>;

// Accepts "Verifying: 45.3%" as well as integer percentages and lines with a
// prefix before the keyword; the first match in a line wins.
#[allow(clippy::expect_used)]
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Scanning|Loading|Verifying|Repairing):\s*(\d+(?:\.\d+)?)%").expect("valid regex")
});

/// Incremental parser turning unstructured engine output into progress events
///
/// Bytes are accumulated until a line terminator (`\r` or `\n`); each
/// completed line is matched against the progress pattern and then discarded,
/// so the internal buffer only ever holds the current incomplete line. Writes
/// of arbitrary spans are accepted, down to a single byte, and a line split
/// across any number of writes produces the same event as the whole line at
/// once.
///
/// Lines that match the pattern become one [`ProgressEvent`] each; malformed
/// or unrelated lines are forwarded to the message callback when one is
/// configured and silently dropped otherwise. Parse failures never surface as
/// write errors.
///
/// With no callbacks attached the extractor degrades to a cheap discard sink,
/// so it can be installed unconditionally without slowing the engine.
///
/// The extractor performs no synchronization: it runs on whatever thread the
/// engine writes from and expects a single producer.
pub struct ProgressExtractor {
    buffer: Vec<u8>,
    progress: Option<ProgressCallback>,
    messages: Option<MessageCallback>,
}

impl ProgressExtractor {
    /// Create an extractor forwarding events to `progress`
    ///
    /// Pass `None` to create a discard sink.
    pub fn new(progress: Option<ProgressCallback>) -> Self {
        Self::with_messages(progress, None)
    }

    /// Create an extractor with progress and message callbacks
    ///
    /// Non-progress lines are classified by severity and handed to `messages`
    /// as they complete; progress lines never reach the message callback.
    pub fn with_messages(
        progress: Option<ProgressCallback>,
        messages: Option<MessageCallback>,
    ) -> Self {
        Self {
            buffer: Vec::new(),
            progress,
            messages,
        }
    }

    /// True when no callback is attached and all output is discarded
    pub fn is_discarding(&self) -> bool {
        self.progress.is_none() && self.messages.is_none()
    }

    fn dispatch_line(&self, raw: &[u8]) {
        if raw.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(raw);
        if let Some(caps) = PROGRESS_RE.captures(&line) {
            if let Some(event) = event_from_captures(&caps) {
                if let Some(progress) = &self.progress {
                    progress(event.phase, event.numerator, event.denominator);
                }
                return;
            }
        }
        if let Some(messages) = &self.messages {
            messages(classify_line(&line), line.trim_end());
        }
    }
}

impl io::Write for ProgressExtractor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Discard mode: report the span consumed without buffering anything.
        if self.is_discarding() {
            return Ok(buf.len());
        }
        for &byte in buf {
            if byte == b'\r' || byte == b'\n' {
                let line = std::mem::take(&mut self.buffer);
                self.dispatch_line(&line);
            } else {
                self.buffer.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn event_from_captures(caps: &regex::Captures<'_>) -> Option<ProgressEvent> {
    let phase = Phase::from_keyword(caps.get(1)?.as_str())?;
    let percent: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(ProgressEvent {
        phase,
        numerator: (percent * 10.0).round() as u64,
        denominator: PROGRESS_SCALE,
    })
}

// Severity is inferred from the vocabulary the engine uses in its log lines;
// damage reports are warnings because they are recoverable until the run's
// result code says otherwise.
fn classify_line(line: &str) -> MessageLevel {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("fatal") {
        MessageLevel::Error
    } else if lower.contains("damaged") || lower.contains("missing") || lower.contains("warning") {
        MessageLevel::Warning
    } else {
        MessageLevel::Info
    }
}

//! Observability sink for queue actions.
//!
//! Each successful send or read emits one timestamped line:
//!
//! ```text
//! [2026-08-05T09:14:03.182735611Z] Action: Send, File: queue_data/queue_1754212.jsonl
//! ```
//!
//! The sink is a side effect with no influence on queue state: implementations
//! swallow their own failures, and the queue never inspects the outcome.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Queue action recorded to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Send,
    Read,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Send => "Send",
            Action::Read => "Read",
        }
    }
}

/// Destination for action lines.
///
/// Any line-oriented sink satisfies the contract. `record` must not block on
/// queue state and must not panic; failures stay inside the sink.
pub trait ActionSink: Send + Sync {
    fn record(&self, timestamp_ns: u64, action: Action, store: &Path);
}

/// Renders one action line: `[<RFC3339>] Action: <Send|Read>, File: <path>`.
pub fn format_line(timestamp_ns: u64, action: Action, store: &Path) -> String {
    let rendered = OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ns))
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_else(|| timestamp_ns.to_string());
    format!(
        "[{rendered}] Action: {}, File: {}",
        action.name(),
        store.display()
    )
}

/// Sink that writes each action line to an [`io::Write`](std::io::Write).
///
/// `WriteSink::new(std::io::stdout())` reproduces the classic
/// print-to-console behavior.
pub struct WriteSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriteSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> ActionSink for WriteSink<W> {
    fn record(&self, timestamp_ns: u64, action: Action, store: &Path) {
        let line = format_line(timestamp_ns, action, store);
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
        }
    }
}

/// Sink that forwards action lines through the `log` facade at info level.
///
/// This is the default sink: whichever logger the host process installed
/// receives the lines under the `linequeue::action` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeSink;

impl ActionSink for FacadeSink {
    fn record(&self, timestamp_ns: u64, action: Action, store: &Path) {
        log::info!(
            target: "linequeue::action",
            "{}",
            format_line(timestamp_ns, action, store)
        );
    }
}

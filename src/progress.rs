//! Progress reporting for link checks and batch imports.
//!
//! Both long-running flows report after every individual completion so a
//! caller can render a live counter. Progress goes to **stderr** so stdout
//! stays free for whatever the embedding application prints.

use std::io::Write;

use crate::importer::BatchImportProgress;
use crate::link_check::LinkStatus;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// One URL finished probing. `valid`/`invalid` are running tallies.
    LinkChecked {
        current: u64,
        total: u64,
        result: LinkStatus,
        valid: u64,
        invalid: u64,
    },
    /// One import item was resolved (created, failed, or skipped).
    Import(BatchImportProgress),
}

/// Receives progress events. Called from the driving task, never concurrently.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "import  12 / 40 items  (ok 10, failed 1, skipped 1)".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::LinkChecked {
                current,
                total,
                result,
                ..
            } => format!(
                "check  {} / {} links  {}  {}{}\n",
                format_number(*current),
                format_number(*total),
                if result.is_valid { "ok  " } else { "dead" },
                result.url,
                link_reason(result)
            ),
            ProgressEvent::Import(p) => format!(
                "import  {} / {} items  (ok {}, failed {}, skipped {})\n",
                format_number(p.current),
                format_number(p.total),
                format_number(p.success),
                format_number(p.failed),
                format_number(p.skipped)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn event_json(event: &ProgressEvent) -> serde_json::Value {
    match event {
        ProgressEvent::LinkChecked {
            current,
            total,
            result,
            valid,
            invalid,
        } => serde_json::json!({
            "event": "progress",
            "phase": "link_check",
            "n": current,
            "total": total,
            "url": result.url,
            "is_valid": result.is_valid,
            "statusCode": result.status_code,
            "error": result.error,
            "checkedAt": result.checked_at.to_rfc3339(),
            "valid": valid,
            "invalid": invalid
        }),
        ProgressEvent::Import(p) => serde_json::json!({
            "event": "progress",
            "phase": "import",
            "n": p.current,
            "total": p.total,
            "success": p.success,
            "failed": p.failed,
            "skipped": p.skipped
        }),
    }
}

/// Suffix explaining a dead link: `  (404)` or `  (timeout)`.
fn link_reason(result: &LinkStatus) -> String {
    if result.is_valid {
        return String::new();
    }
    match (&result.error, result.status_code) {
        (Some(error), _) => format!("  ({})", error),
        (None, Some(code)) => format!("  ({})", code),
        (None, None) => String::new(),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress mode: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
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

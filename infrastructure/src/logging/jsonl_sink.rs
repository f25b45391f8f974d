//! JSONL event sink
//!
//! Persists rounds and decisions as one JSON object per line with a `type`
//! field and UTC timestamp, appended via a buffered writer. Conforms to the
//! non-fallible [`EventSink`] contract: every error is swallowed after a
//! diagnostic warning.

use council_application::ports::event_sink::EventSink;
use council_domain::{ConsensusDecision, Round};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Audit sink writing one JSON object per line
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes per write and on Drop.
pub struct JsonlEventSink {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventSink {
    /// Create a sink appending to the given path
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, record: serde_json::Value) {
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // Flush per record for crash safety; JSONL is append-only
            let _ = writer.flush();
        }
    }

    fn timestamp() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

impl EventSink for JsonlEventSink {
    fn log_round(&self, request_id: &str, round: &Round) {
        let exchanges = match serde_json::to_value(&round.exchanges) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialize round {}: {}", round.round_number, e);
                return;
            }
        };
        self.write_record(serde_json::json!({
            "type": "round",
            "timestamp": Self::timestamp(),
            "request_id": request_id,
            "round": round.round_number,
            "exchanges": exchanges,
        }));
    }

    fn log_decision(&self, request_id: &str, decision: &ConsensusDecision) {
        let decision = match serde_json::to_value(decision) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialize decision: {}", e);
                return;
            }
        };
        self.write_record(serde_json::json!({
            "type": "decision",
            "timestamp": Self::timestamp(),
            "request_id": request_id,
            "decision": decision,
        }));
    }
}

impl Drop for JsonlEventSink {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

//! Structured JSONL engine log for debugging and turn reconstruction.
//!
//! Machine-parseable logging with:
//! - Monotonic sequence numbers for ordering
//! - ISO 8601 timestamps with microsecond precision
//! - Session-key and turn-id fields for correlation
//! - Structured event data in JSON format

use crate::domain::{RoleId, SessionKey};
use crate::supervisor::RoutingDecision;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Structured JSONL logger shared by all sessions of one engine instance.
pub struct EngineLogger {
    seq: AtomicU64,
    log_file: Mutex<File>,
    log_path: PathBuf,
}

/// A single log entry in JSONL format.
#[derive(Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number (unique across the engine instance)
    pub seq: u64,
    /// ISO 8601 timestamp with microseconds
    pub ts: String,
    /// Session key the entry belongs to
    pub session_key: String,
    /// Turn ID (one per `step` invocation)
    pub turn_id: String,
    /// Component that emitted the log
    pub component: String,
    /// Structured event data
    pub event: Value,
}

impl EngineLogger {
    /// Creates a new engine logger.
    ///
    /// Entries are appended to `<logs_dir>/events.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the logs directory cannot be created or the log
    /// file cannot be opened.
    pub fn new(logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            seq: AtomicU64::new(0),
            log_file: Mutex::new(file),
            log_path,
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logs a structured event. Thread-safe; write failures are swallowed
    /// so logging can never fail a turn.
    pub fn log(&self, key: &SessionKey, turn_id: &Uuid, component: &str, event: impl Serialize) {
        let entry = LogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            session_key: key.as_str().to_string(),
            turn_id: turn_id.to_string(),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = self.log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{line}");
                let _ = file.flush();
            }
        }
    }

    /// Logs a supervisor routing decision.
    pub fn log_routing(&self, key: &SessionKey, turn_id: &Uuid, decision: &RoutingDecision) {
        self.log(
            key,
            turn_id,
            "Supervisor",
            serde_json::json!({
                "type": "RoutingDecision",
                "next_role": decision.next_role,
                "reason": decision.reason,
            }),
        );
    }

    /// Logs a role invocation start.
    pub fn log_role_invocation(&self, key: &SessionKey, turn_id: &Uuid, role: RoleId) {
        self.log(
            key,
            turn_id,
            "Role",
            serde_json::json!({
                "type": "Invocation",
                "role": role,
            }),
        );
    }

    /// Logs a role invocation completion.
    pub fn log_role_complete(&self, key: &SessionKey, turn_id: &Uuid, role: RoleId, success: bool) {
        self.log(
            key,
            turn_id,
            "Role",
            serde_json::json!({
                "type": "Complete",
                "role": role,
                "success": success,
            }),
        );
    }

    /// Logs a checkpoint write.
    pub fn log_checkpoint(&self, key: &SessionKey, turn_id: &Uuid, step: u64) {
        self.log(
            key,
            turn_id,
            "Store",
            serde_json::json!({
                "type": "Checkpoint",
                "step": step,
            }),
        );
    }

    /// Logs the terminal result of a turn.
    pub fn log_turn_complete(&self, key: &SessionKey, turn_id: &Uuid, result: &str) {
        self.log(
            key,
            turn_id,
            "Orchestrator",
            serde_json::json!({
                "type": "TurnComplete",
                "result": result,
            }),
        );
    }

    /// Returns the path to the log file.
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

//! Error types for the engine.

use crate::domain::types::{RoleId, SessionKey};
use std::fmt::{Display, Formatter};

/// Errors surfaced by the orchestration engine.
///
/// Budget exhaustion is deliberately absent: it is an expected terminal
/// condition reported as `TerminalResult::Aborted`, not an error.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// External role call failed after the single retry.
    RoleInvocation { role: RoleId, message: String },
    /// A critique targeted a draft version that does not exist.
    /// Integrity error; never retried.
    VersionNotFound { version: u32 },
    /// A step is already in flight for this session key.
    /// The caller should retry later; the engine does not queue.
    SessionBusy { key: SessionKey },
    /// Checkpoint write failed. The session remains at its last durable
    /// snapshot.
    Persistence { message: String },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoleInvocation { role, message } => {
                write!(f, "role invocation failed ({role}): {message}")
            }
            Self::VersionNotFound { version } => {
                write!(f, "draft version {version} not found")
            }
            Self::SessionBusy { key } => {
                write!(f, "session busy: a step is in flight for key {key}")
            }
            Self::Persistence { message } => write!(f, "persistence failure: {message}"),
        }
    }
}

impl std::error::Error for EngineError {}

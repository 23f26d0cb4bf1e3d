//! File-based session store implementation.
//!
//! Per session key, two files under `<root>/<key-hash>/`:
//! - `snapshot.json` - the latest snapshot, replaced atomically via temp
//!   file + rename
//! - `checkpoints.jsonl` - append-only checkpoint log (one JSON object per
//!   line) written under an exclusive file lock
//!
//! Loading prefers the snapshot and falls back to the last parseable
//! checkpoint record, so a crash between the two writes loses at most the
//! un-logged snapshot.

use crate::domain::SessionKey;
use crate::foundry_paths;
use crate::session::Session;
use crate::store::SessionStore;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;

/// Current snapshot format version.
/// Increment this when making breaking changes to the snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The snapshot file payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Snapshot format version for migration compatibility
    pub version: u32,
    /// Timestamp when this snapshot was written (RFC3339 format)
    pub saved_at: String,
    /// The full session state
    pub session: Session,
}

/// One record in the append-only checkpoint log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub snapshot_version: u32,
    pub key: SessionKey,
    /// The session's step counter at checkpoint time.
    pub step: u64,
    pub recorded_at: String,
    pub session: Session,
}

/// File-backed session store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Creates a store rooted at the home-based default
    /// (`~/.exercise-foundry/sessions/`).
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(foundry_paths::sessions_dir()?))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn session_dir(&self, key: &SessionKey) -> PathBuf {
        foundry_paths::session_dir(&self.root, key)
    }

    /// Reads the snapshot file, returning `None` when it does not exist.
    fn load_snapshot(&self, key: &SessionKey) -> Result<Option<Session>> {
        let path = foundry_paths::snapshot_path(&self.session_dir(key));
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read snapshot file: {}", path.display()))
            }
        };

        // A corrupt snapshot is recoverable (the checkpoint log still has
        // the state); a snapshot from a newer engine is not.
        let snapshot: SessionSnapshot = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Unparseable snapshot file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        if snapshot.version > SNAPSHOT_VERSION {
            bail!(
                "Snapshot version {} is newer than supported version {}",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }

        Ok(Some(snapshot.session))
    }

    /// Replays the checkpoint log and returns the last parseable record's
    /// session, if any. Unparseable lines are skipped.
    fn load_from_checkpoint_log(&self, key: &SessionKey) -> Result<Option<Session>> {
        let path = foundry_paths::checkpoint_log_path(&self.session_dir(key));
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to open checkpoint log: {}", path.display())
                })
            }
        };

        file.lock_shared()
            .with_context(|| format!("Failed to lock checkpoint log: {}", path.display()))?;

        let reader = BufReader::new(&file);
        let mut last: Option<Session> = None;
        let mut skipped_lines = 0usize;

        for line in reader.lines() {
            let line =
                line.with_context(|| format!("Failed to read checkpoint log: {}", path.display()))?;
            match serde_json::from_str::<CheckpointRecord>(&line) {
                Ok(record) if record.snapshot_version <= SNAPSHOT_VERSION => {
                    last = Some(record.session);
                }
                _ => skipped_lines += 1,
            }
        }

        if skipped_lines > 0 {
            tracing::warn!(
                "Skipped {} unparseable lines in checkpoint log {}",
                skipped_lines,
                path.display()
            );
        }

        Ok(last)
    }

    /// Appends a checkpoint record under an exclusive lock and syncs it.
    fn append_checkpoint(&self, session: &Session) -> Result<()> {
        let dir = self.session_dir(&session.key);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session directory: {}", dir.display()))?;

        let path = foundry_paths::checkpoint_log_path(&dir);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open checkpoint log: {}", path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to lock checkpoint log: {}", path.display()))?;

        let record = CheckpointRecord {
            snapshot_version: SNAPSHOT_VERSION,
            key: session.key.clone(),
            step: session.step_counter,
            recorded_at: Utc::now().to_rfc3339(),
            session: session.clone(),
        };
        let line = serde_json::to_string(&record).context("Failed to serialize checkpoint")?;

        writeln!(file, "{line}")
            .with_context(|| format!("Failed to append checkpoint: {}", path.display()))?;
        file.flush()
            .with_context(|| format!("Failed to flush checkpoint log: {}", path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync checkpoint log: {}", path.display()))?;

        Ok(())
    }

    /// Writes the snapshot file atomically via temp file + rename.
    fn write_snapshot(&self, session: &Session) -> Result<()> {
        let dir = self.session_dir(&session.key);
        let path = foundry_paths::snapshot_path(&dir);

        let snapshot = SessionSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now().to_rfc3339(),
            session: session.clone(),
        };
        let content =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("Failed to write temp snapshot: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to rename temp snapshot to: {}", path.display()))?;

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &SessionKey) -> Result<Option<Session>> {
        // The snapshot is authoritative; the log covers a torn checkpoint
        // or a snapshot that failed to parse.
        match self.load_snapshot(key)? {
            Some(session) => Ok(Some(session)),
            None => self.load_from_checkpoint_log(key),
        }
    }

    fn checkpoint(&self, session: &Session) -> Result<()> {
        self.append_checkpoint(session)?;
        self.write_snapshot(session)
    }
}

#[cfg(test)]
#[path = "tests/file_store_tests.rs"]
mod tests;

//! Home-based storage paths for engine persistence.
//!
//! Default layout under `~/.exercise-foundry/`:
//! - `sessions/<key-hash>/snapshot.json` - latest session snapshot
//! - `sessions/<key-hash>/checkpoints.jsonl` - append-only checkpoint log
//! - `logs/events.jsonl` - structured engine log

use crate::domain::SessionKey;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// The name of the engine's home directory.
const FOUNDRY_DIR: &str = ".exercise-foundry";

/// Returns the home-based engine directory: `~/.exercise-foundry/`
///
/// Creates the directory if it doesn't exist.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or the
/// directory cannot be created.
pub fn foundry_home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory for session storage")?;
    let foundry_dir = home.join(FOUNDRY_DIR);
    fs::create_dir_all(&foundry_dir).with_context(|| {
        format!(
            "Failed to create foundry directory: {}",
            foundry_dir.display()
        )
    })?;
    Ok(foundry_dir)
}

/// Returns the default sessions root: `~/.exercise-foundry/sessions/`
///
/// Creates the directory if it doesn't exist.
pub fn sessions_dir() -> Result<PathBuf> {
    let dir = foundry_home_dir()?.join("sessions");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create sessions directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the default engine logs directory: `~/.exercise-foundry/logs/`
///
/// Creates the directory if it doesn't exist.
pub fn logs_dir() -> Result<PathBuf> {
    let dir = foundry_home_dir()?.join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the storage directory for one session key under a root.
///
/// Session keys are opaque caller-supplied strings, so the directory name
/// is a hash rather than the key itself.
pub fn session_dir(root: &Path, key: &SessionKey) -> PathBuf {
    root.join(session_key_hash(key))
}

/// Returns the snapshot file path inside a session directory.
pub fn snapshot_path(session_dir: &Path) -> PathBuf {
    session_dir.join("snapshot.json")
}

/// Returns the checkpoint log path inside a session directory.
pub fn checkpoint_log_path(session_dir: &Path) -> PathBuf {
    session_dir.join("checkpoints.jsonl")
}

/// Computes a session-key hash (SHA256 truncated to 12 hex characters).
pub fn session_key_hash(key: &SessionKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_str().as_bytes());
    let result = hasher.finalize();

    // First 6 bytes (12 hex characters)
    hex_encode(&result[..6])
}

/// Encodes bytes as lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_hash_is_stable_and_short() {
        let key = SessionKey::from("thread-42");
        let a = session_key_hash(&key);
        let b = session_key_hash(&key);
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_keys_hash_differently() {
        let a = session_key_hash(&SessionKey::from("thread-1"));
        let b = session_key_hash(&SessionKey::from("thread-2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_dir_layout() {
        let key = SessionKey::from("thread-1");
        let dir = session_dir(Path::new("/data"), &key);
        assert!(dir.starts_with("/data"));
        assert_eq!(snapshot_path(&dir).file_name().unwrap(), "snapshot.json");
        assert_eq!(
            checkpoint_log_path(&dir).file_name().unwrap(),
            "checkpoints.jsonl"
        );
    }
}

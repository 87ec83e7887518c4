//! # Storage Module - Progression State Persistence
//!
//! Every piece of durable session state lives in its own JSON document under the
//! configured data directory:
//!
//! ```text
//! data/
//! ├── tokens.json      ← acquired tokens (sorted, known codes first)
//! ├── delivered.json   ← delivery record (email ids, at-most-once)
//! ├── player.json      ← player handle
//! └── mailbox.json     ← live inbox, sent items and queued outbox
//! ```
//!
//! Writes go through [`write_json_atomic`]: exclusive `fs2` lock on the
//! destination, temp file in the same directory, fsync, rename. A write has hit
//! the disk before the mutating call that triggered it returns, so an abrupt
//! termination between a delivery and the next launch cannot re-deliver.
//!
//! Missing files mean fresh state. A file that exists but does not parse is an
//! error; the engine never silently resets progress.

use crate::errors::Result;
use fs2::FileExt;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const TOKENS_FILE: &str = "tokens.json";
const DELIVERED_FILE: &str = "delivered.json";
const PLAYER_FILE: &str = "player.json";
const MAILBOX_FILE: &str = "mailbox.json";

/// Locations of the persisted state documents.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// Use `root` as the data directory, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tokens(&self) -> PathBuf {
        self.root.join(TOKENS_FILE)
    }

    pub fn delivered(&self) -> PathBuf {
        self.root.join(DELIVERED_FILE)
    }

    pub fn player(&self) -> PathBuf {
        self.root.join(PLAYER_FILE)
    }

    pub fn mailbox(&self) -> PathBuf {
        self.root.join(MAILBOX_FILE)
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    // Lock the destination (create if missing) for the duration of the swap
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("state.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                tmp.sync_all()?;
                break candidate;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    };

    fs::rename(&tmp_path, path)?;
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    drop(lock_file);
    debug!("persisted {}", path.display());
    Ok(())
}

/// Read a JSON document, returning `None` when the file does not exist or is empty.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let cleaned = content.trim_start_matches('\0').trim();
    if cleaned.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(cleaned)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn missing_file_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let got: Option<Vec<String>> = read_json(&tmp.path().join("absent.json")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn atomic_write_replaces_previous_content() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = StateDir::open(tmp.path().join("data")).unwrap();
        let path = dir.delivered();

        let first: BTreeSet<String> = ["welcome_001".to_string()].into_iter().collect();
        write_json_atomic(&path, &first).unwrap();
        let mut second = first.clone();
        second.insert("rain_intro_001".to_string());
        write_json_atomic(&path, &second).unwrap();

        let back: BTreeSet<String> = read_json(&path).unwrap().unwrap();
        assert_eq!(back, second);

        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        fs::write(&path, "{not json").unwrap();
        let got: Result<Option<Vec<String>>> = read_json(&path);
        assert!(got.is_err());
    }
}

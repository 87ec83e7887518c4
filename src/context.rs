//! Session-scoped progression state, owned by the session controller and passed
//! by reference to every component that reads or mutates it.

use crate::email::{DeliveryRecord, Mailbox};
use crate::errors::{ProgressionError, Result};
use crate::storage::{read_json, write_json_atomic, StateDir};
use crate::tokens::{TokenSnapshot, TokenStore};
use crate::validation::validate_handle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Handle shown in placeholders before the player has registered one.
pub const DEFAULT_HANDLE: &str = "operative";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlayerFile {
    #[serde(default)]
    handle: Option<String>,
}

/// The player's registered handle.
#[derive(Debug)]
pub struct PlayerProfile {
    handle: Option<String>,
    fallback: String,
    path: Option<PathBuf>,
}

impl PlayerProfile {
    pub fn in_memory(fallback: &str) -> Self {
        Self {
            handle: None,
            fallback: fallback.to_string(),
            path: None,
        }
    }

    pub fn open<P: AsRef<Path>>(path: P, fallback: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file: PlayerFile = read_json(&path)?.unwrap_or_default();
        Ok(Self {
            handle: file.handle,
            fallback: fallback.to_string(),
            path: Some(path),
        })
    }

    /// The registered handle, if any.
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Registered handle or the configured fallback.
    pub fn display_handle(&self) -> &str {
        self.handle.as_deref().unwrap_or(&self.fallback)
    }

    /// Validate, lower-case and store a new handle. Returns the stored value.
    pub(crate) fn set_handle(&mut self, raw: &str) -> Result<String> {
        let handle = validate_handle(raw).map_err(|e| ProgressionError::InvalidHandle(e.to_string()))?;
        self.handle = Some(handle.clone());
        if let Some(path) = &self.path {
            write_json_atomic(
                path,
                &PlayerFile {
                    handle: self.handle.clone(),
                },
            )?;
        }
        Ok(handle)
    }
}

/// Tokens, delivery record, mailbox and player profile for one save.
#[derive(Debug)]
pub struct ProgressionContext {
    pub(crate) tokens: TokenStore,
    pub(crate) delivered: DeliveryRecord,
    pub(crate) mailbox: Mailbox,
    pub(crate) player: PlayerProfile,
}

impl ProgressionContext {
    /// Fresh state that is never persisted.
    pub fn in_memory() -> Self {
        Self::in_memory_with_handle(DEFAULT_HANDLE)
    }

    pub fn in_memory_with_handle(fallback: &str) -> Self {
        Self {
            tokens: TokenStore::in_memory(),
            delivered: DeliveryRecord::in_memory(),
            mailbox: Mailbox::in_memory(),
            player: PlayerProfile::in_memory(fallback),
        }
    }

    /// Reload every persisted document under `dir`.
    pub fn open(dir: &StateDir, fallback: &str) -> Result<Self> {
        Ok(Self {
            tokens: TokenStore::open(dir.tokens())?,
            delivered: DeliveryRecord::open(dir.delivered())?,
            mailbox: Mailbox::open(dir.mailbox())?,
            player: PlayerProfile::open(dir.player(), fallback)?,
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        self.tokens.snapshot()
    }

    pub fn delivered(&self) -> &DeliveryRecord {
        &self.delivered
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn player(&self) -> &PlayerProfile {
        &self.player
    }

    /// Recipient address used for delivered mail.
    pub fn recipient(&self) -> &str {
        self.player.display_handle()
    }
}

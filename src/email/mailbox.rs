//! The player-visible mailbox: delivered inbox, sent items and queued outbox.

use super::Email;
use crate::errors::Result;
use crate::storage::{read_json, write_json_atomic};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MailboxFile {
    #[serde(default)]
    inbox: Vec<Email>,
    #[serde(default)]
    sent: Vec<Email>,
    #[serde(default)]
    outbox: Vec<Email>,
}

/// Live mailbox view. Mutations persist before returning when opened on a path.
#[derive(Debug, Default)]
pub struct Mailbox {
    state: MailboxFile,
    path: Option<PathBuf>,
}

impl Mailbox {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state: MailboxFile = read_json(&path)?.unwrap_or_default();
        debug!(
            "Mailbox loaded: {} inbox, {} sent, {} queued",
            state.inbox.len(),
            state.sent.len(),
            state.outbox.len()
        );
        Ok(Self {
            state,
            path: Some(path),
        })
    }

    /// Delivered messages in arrival order.
    pub fn inbox(&self) -> &[Email] {
        &self.state.inbox
    }

    pub fn sent(&self) -> &[Email] {
        &self.state.sent
    }

    /// Messages to recipients outside the NPC network, held indefinitely.
    pub fn outbox(&self) -> &[Email] {
        &self.state.outbox
    }

    pub fn find(&self, id: &str) -> Option<&Email> {
        self.state.inbox.iter().find(|e| e.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.state.inbox.iter().filter(|e| !e.read).count()
    }

    /// How many inbox messages carry `id`.
    pub fn count_id(&self, id: &str) -> usize {
        self.state.inbox.iter().filter(|e| e.id == id).count()
    }

    pub(crate) fn push_inbox(&mut self, email: Email) -> Result<()> {
        self.state.inbox.push(email);
        self.persist()
    }

    pub(crate) fn push_sent(&mut self, email: Email) -> Result<()> {
        self.state.sent.push(email);
        self.persist()
    }

    pub(crate) fn queue_outbox(&mut self, email: Email) -> Result<()> {
        self.state.outbox.push(email);
        self.persist()
    }

    /// Flag an inbox message as read. Returns `true` on the first read only.
    pub(crate) fn mark_read(&mut self, id: &str) -> Result<bool> {
        let Some(email) = self.state.inbox.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        if email.read {
            return Ok(false);
        }
        email.read = true;
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        if let Some(path) = &self.path {
            write_json_atomic(path, &self.state)?;
        }
        Ok(())
    }
}

//! # Email Database
//!
//! Static inbox definitions and outbox templates, plus the durable
//! [`DeliveryRecord`] that makes delivery at-most-once.
//!
//! The database itself never changes after load. Delivery writes to the
//! [`ProgressionContext`] passed in: the id goes into the delivery record
//! (persisted first), then the materialized email goes into the mailbox.

use super::source::{load_inbox_from_json, load_outbox_from_json, parse_inbox, parse_outbox};
use super::{narrative_stamp, Email, InboxEntry, OutboxTemplate, Substitutions, USERNAME_PLACEHOLDER};
use crate::context::{ProgressionContext, DEFAULT_HANDLE};
use crate::errors::{ProgressionError, Result};
use crate::logutil::{escape_log, preview_lines};
use crate::storage::{read_json, write_json_atomic};
use crate::tokens::{Token, TokenSnapshot};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Durable set of already-delivered email ids.
///
/// Only the crate can insert; the presentation layer reads.
#[derive(Debug, Default)]
pub struct DeliveryRecord {
    ids: BTreeSet<String>,
    path: Option<PathBuf>,
}

impl DeliveryRecord {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let ids: BTreeSet<String> = read_json(&path)?.unwrap_or_default();
        Ok(Self {
            ids,
            path: Some(path),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Record `id`, persisting before returning. `false` if already present.
    pub(crate) fn insert(&mut self, id: &str) -> Result<bool> {
        if !self.ids.insert(id.to_string()) {
            return Ok(false);
        }
        if let Some(path) = &self.path {
            write_json_atomic(path, &self.ids)?;
        }
        Ok(true)
    }
}

/// Inbox definitions and outbox templates, in source order.
#[derive(Debug, Clone, Default)]
pub struct EmailDatabase {
    inbox: Vec<InboxEntry>,
    outbox: Vec<OutboxTemplate>,
}

impl EmailDatabase {
    /// Parse both source documents. Any malformed entry fails the whole load.
    pub fn load(inbox_source: &str, outbox_source: &str, now: DateTime<Utc>) -> Result<Self> {
        let inbox = parse_inbox(inbox_source, "inbox", now)?;
        let outbox = parse_outbox(outbox_source, "outbox")?;
        Ok(Self::from_parts(inbox, outbox))
    }

    /// Load both source documents from disk.
    pub fn load_files<P: AsRef<Path>, Q: AsRef<Path>>(
        inbox_path: P,
        outbox_path: Q,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let inbox = load_inbox_from_json(inbox_path, now)?;
        let outbox = load_outbox_from_json(outbox_path)?;
        Ok(Self::from_parts(inbox, outbox))
    }

    pub fn from_parts(inbox: Vec<InboxEntry>, outbox: Vec<OutboxTemplate>) -> Self {
        info!(
            "Email database loaded: {} inbox definitions, {} outbox templates",
            inbox.len(),
            outbox.len()
        );
        Self { inbox, outbox }
    }

    pub fn inbox_entries(&self) -> &[InboxEntry] {
        &self.inbox
    }

    pub fn outbox_templates(&self) -> &[OutboxTemplate] {
        &self.outbox
    }

    pub fn entry(&self, id: &str) -> Option<&InboxEntry> {
        self.inbox.iter().find(|e| e.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&OutboxTemplate> {
        self.outbox.iter().find(|t| t.id == id)
    }

    /// Inbox definitions not yet in the delivery record, in source order.
    pub fn pending_inbox(&self, record: &DeliveryRecord) -> Vec<&InboxEntry> {
        self.inbox.iter().filter(|e| !record.contains(&e.id)).collect()
    }

    /// Record `id` as delivered and append it to the live inbox.
    ///
    /// Returns `false` without side effects if `id` was already delivered.
    pub fn mark_delivered(&self, ctx: &mut ProgressionContext, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let entry = self
            .entry(id)
            .ok_or_else(|| ProgressionError::UnknownEmail(id.to_string()))?;
        Ok(deliver(ctx, entry, &Substitutions::new(), now)?.is_some())
    }

    /// Deliver a manual email now with extra `{key}` substitutions.
    ///
    /// `None` when it was already delivered.
    pub fn deliver_by_id(
        &self,
        ctx: &mut ProgressionContext,
        id: &str,
        extra: &Substitutions,
        now: DateTime<Utc>,
    ) -> Result<Option<Email>> {
        let entry = self
            .entry(id)
            .ok_or_else(|| ProgressionError::UnknownEmail(id.to_string()))?;
        deliver(ctx, entry, extra, now)
    }

    /// Templates the player may currently send, in source order.
    pub fn pending_outbox_templates(&self, tokens: &TokenSnapshot) -> Vec<&OutboxTemplate> {
        self.outbox
            .iter()
            .filter(|t| t.precondition.is_satisfied(tokens))
            .collect()
    }

    /// Materialize a template into an email ready to send.
    ///
    /// The sender is the `{username}` substitution, or the default handle.
    pub fn render(&self, template: &OutboxTemplate, subs: &Substitutions) -> Email {
        let sender = subs.get(USERNAME_PLACEHOLDER).unwrap_or(DEFAULT_HANDLE);
        Email {
            id: template.id.clone(),
            sender: sender.to_string(),
            recipient: template.recipient.clone(),
            subject: subs.apply(&template.subject),
            body: template.body.iter().map(|l| subs.apply(l)).collect(),
            timestamp: narrative_stamp(Utc::now()),
            read: false,
        }
    }

    /// Tokens granted by reading `id`, if it is a known definition.
    pub fn read_rewards(&self, id: &str) -> &[Token] {
        self.entry(id).map(|e| e.grant_tokens.as_slice()).unwrap_or(&[])
    }
}

/// Shared delivery path for the evaluator, `mark_delivered` and `deliver_by_id`.
pub(crate) fn deliver(
    ctx: &mut ProgressionContext,
    entry: &InboxEntry,
    extra: &Substitutions,
    now: DateTime<Utc>,
) -> Result<Option<Email>> {
    if ctx.delivered.contains(&entry.id) {
        debug!("Duplicate delivery attempt for '{}' ignored", entry.id);
        return Ok(None);
    }
    let mut subs = Substitutions::for_player(ctx.player.display_handle());
    subs.extend(extra);
    let email = entry.materialize(ctx.recipient(), &subs, now);

    ctx.delivered.insert(&entry.id)?;
    ctx.mailbox.push_inbox(email.clone())?;
    info!(
        "Delivered email '{}' from {}",
        escape_log(&email.subject),
        email.sender
    );
    debug!("[{}] {}", email.id, preview_lines(&email.body));
    Ok(Some(email))
}

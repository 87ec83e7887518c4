//! # Email Types
//!
//! Inbox definitions ([`InboxEntry`]) and outbox templates ([`OutboxTemplate`])
//! are loaded once from declarative JSON documents (see [`source`]) and never
//! change at runtime. Delivering one produces a materialized [`Email`] that
//! lands in the player's [`Mailbox`].
//!
//! Both kinds of definition carry a [`Precondition`]: either always satisfied
//! or gated on a single token.

pub mod database;
pub mod mailbox;
pub mod source;

pub use database::{DeliveryRecord, EmailDatabase};
pub use mailbox::Mailbox;

use crate::tokens::{Token, TokenSnapshot};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Every in-game timestamp is shown in the narrative year.
pub const NARRATIVE_YEAR: i32 = 1989;

/// Placeholder substituted with the player handle.
pub const USERNAME_PLACEHOLDER: &str = "username";

/// A materialized message in the player's mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    /// Body lines in order, blank lines included.
    pub body: Vec<String>,
    pub timestamp: String,
    #[serde(default)]
    pub read: bool,
}

impl Email {
    pub fn body_text(&self) -> String {
        self.body.join("\n")
    }
}

/// Delivery gate shared by inbox entries and outbox templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Always,
    Token(Token),
}

impl Precondition {
    pub fn is_satisfied(&self, tokens: &TokenSnapshot) -> bool {
        match self {
            Precondition::Always => true,
            Precondition::Token(t) => tokens.contains(t),
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            Precondition::Always => None,
            Precondition::Token(t) => Some(t),
        }
    }
}

/// How an inbox entry reaches the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Delivered on the first evaluation pass of a session, ungated.
    OnStart,
    /// Delivered by the trigger evaluator once the precondition holds.
    Auto,
    /// Delivered only by an explicit `deliver_by_id`.
    Manual,
}

/// When the timestamp of a delivered email is decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// A fixed value from the source document, already in the narrative year.
    Fixed(String),
    /// "Use current time": captured once when the database was loaded.
    CurrentTime(String),
    /// Stamped with the clock at the moment of delivery.
    AtDelivery,
}

impl TimestampPolicy {
    pub fn resolve(&self, now: DateTime<Utc>) -> String {
        match self {
            TimestampPolicy::Fixed(s) | TimestampPolicy::CurrentTime(s) => s.clone(),
            TimestampPolicy::AtDelivery => narrative_stamp(now),
        }
    }
}

/// A statically defined inbox message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxEntry {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: Vec<String>,
    pub timestamp: TimestampPolicy,
    pub precondition: Precondition,
    pub mode: DeliveryMode,
    /// Tokens granted the first time the player reads the delivered email.
    pub grant_tokens: Vec<Token>,
}

impl InboxEntry {
    /// Build the player-facing email with placeholders applied.
    pub fn materialize(&self, recipient: &str, subs: &Substitutions, now: DateTime<Utc>) -> Email {
        Email {
            id: self.id.clone(),
            sender: self.sender.clone(),
            recipient: recipient.to_string(),
            subject: subs.apply(&self.subject),
            body: self.body.iter().map(|l| subs.apply(l)).collect(),
            timestamp: self.timestamp.resolve(now),
            read: false,
        }
    }
}

/// A parametrized message the player may send to an NPC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxTemplate {
    pub id: String,
    pub recipient: String,
    pub subject: String,
    pub body: Vec<String>,
    pub precondition: Precondition,
}

/// Ordered `{key}` → value replacements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions(Vec<(String, String)>);

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitutions carrying only `{username}`.
    pub fn for_player(handle: &str) -> Self {
        Self::new().with(USERNAME_PLACEHOLDER, handle)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Append `other` after the existing pairs.
    pub fn extend(&mut self, other: &Substitutions) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (key, value) in &self.0 {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }
}

/// Format `now` as `1989-MM-DD HH:MM`.
pub fn narrative_stamp(now: DateTime<Utc>) -> String {
    format!(
        "{} {}",
        narrative_date(now.date_naive()).format("%Y-%m-%d"),
        now.format("%H:%M")
    )
}

/// Move `date` into the narrative year. 29 February becomes the 28th.
pub fn narrative_date(date: NaiveDate) -> NaiveDate {
    date.with_year(NARRATIVE_YEAR)
        .or_else(|| NaiveDate::from_ymd_opt(NARRATIVE_YEAR, date.month(), 28))
        .unwrap_or(date)
}

/// Move a `YYYY-MM-DD[ HH:MM[:SS]]` string into the narrative year.
///
/// Returns `None` when the date or time is not a real calendar value.
pub fn normalize_fixed_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (date_part, time_part) = match raw.split_once(' ') {
        Some((d, t)) => (d, t.trim()),
        None => (raw, ""),
    };
    let date = narrative_date(NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?);
    if time_part.is_empty() {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    let time = NaiveTime::parse_from_str(time_part, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M:%S"))
        .ok()?;
    Some(date.and_time(time).format("%Y-%m-%d %H:%M").to_string())
}

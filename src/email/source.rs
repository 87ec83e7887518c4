//! Loaders for the declarative inbox and outbox documents.
//!
//! Inbox document: `{"emails": [ ... ]}`. Outbox document:
//! `{"email_templates": [ ... ]}`. Entries are flat records:
//!
//! ```json
//! {
//!   "id": "rain_intro_001",
//!   "sender": "rain@ciphernet.net",
//!   "subject": "ops",
//!   "bodylines": 3,
//!   "body1": "Hey {username},",
//!   "body2": null,
//!   "body3": "-rain",
//!   "timestamp": "1989-06-01 22:10",
//!   "auto_send": true,
//!   "token_required": "yes",
//!   "token_name": "PSEM2"
//! }
//! ```
//!
//! Any structural problem is a [`ProgressionError::MalformedData`]. An unknown
//! but well-formed token name is fine: it just has not been unlocked yet.

use super::{
    normalize_fixed_timestamp, narrative_stamp, DeliveryMode, InboxEntry, OutboxTemplate,
    Precondition, TimestampPolicy,
};
use crate::errors::{ProgressionError, Result};
use crate::tokens::Token;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

type Record = Map<String, Value>;

/// Upper bound on `bodylines`; anything larger is a typo, not a letter.
const MAX_BODY_LINES: usize = 512;

#[derive(Deserialize)]
struct InboxDocument {
    emails: Vec<Value>,
}

#[derive(Deserialize)]
struct OutboxDocument {
    email_templates: Vec<Value>,
}

/// Parse an inbox document. `now` resolves `"timestamp": "now"` entries.
pub fn parse_inbox(json: &str, source_name: &str, now: DateTime<Utc>) -> Result<Vec<InboxEntry>> {
    let doc: InboxDocument = serde_json::from_str(json)
        .map_err(|e| ProgressionError::malformed(source_name, "<document>", e.to_string()))?;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(doc.emails.len());
    for (idx, value) in doc.emails.iter().enumerate() {
        let reader = RecordReader::new(source_name, idx, value)?;
        let entry = reader.inbox_entry(now)?;
        if !seen.insert(entry.id.clone()) {
            return Err(ProgressionError::malformed(source_name, &entry.id, "duplicate id"));
        }
        out.push(entry);
    }
    Ok(out)
}

/// Parse an outbox template document.
pub fn parse_outbox(json: &str, source_name: &str) -> Result<Vec<OutboxTemplate>> {
    let doc: OutboxDocument = serde_json::from_str(json)
        .map_err(|e| ProgressionError::malformed(source_name, "<document>", e.to_string()))?;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(doc.email_templates.len());
    for (idx, value) in doc.email_templates.iter().enumerate() {
        let reader = RecordReader::new(source_name, idx, value)?;
        let template = reader.outbox_template()?;
        if !seen.insert(template.id.clone()) {
            return Err(ProgressionError::malformed(source_name, &template.id, "duplicate id"));
        }
        out.push(template);
    }
    Ok(out)
}

/// Load inbox entries from a JSON file.
pub fn load_inbox_from_json<P: AsRef<Path>>(path: P, now: DateTime<Utc>) -> Result<Vec<InboxEntry>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_inbox(&contents, &path.display().to_string(), now)
}

/// Load outbox templates from a JSON file.
pub fn load_outbox_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<OutboxTemplate>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_outbox(&contents, &path.display().to_string())
}

struct RecordReader<'a> {
    source: &'a str,
    entry: String,
    map: &'a Record,
}

impl<'a> RecordReader<'a> {
    fn new(source: &'a str, idx: usize, value: &'a Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProgressionError::malformed(source, format!("#{}", idx), "entry is not an object"))?;
        // Name the entry by id when one is present so diagnostics point somewhere useful
        let entry = match map.get("id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => format!("#{}", idx),
        };
        Ok(Self { source, entry, map })
    }

    fn err(&self, reason: impl Into<String>) -> ProgressionError {
        ProgressionError::malformed(self.source, self.entry.clone(), reason)
    }

    fn inbox_entry(&self, now: DateTime<Utc>) -> Result<InboxEntry> {
        let mode = if self.flag("send_on_start")? {
            DeliveryMode::OnStart
        } else if self.flag("auto_send")? {
            DeliveryMode::Auto
        } else {
            DeliveryMode::Manual
        };
        Ok(InboxEntry {
            id: self.required_str("id")?,
            sender: self.required_str("sender")?,
            subject: self.required_str("subject")?,
            body: self.body_lines()?,
            timestamp: self.timestamp_policy(now)?,
            precondition: self.precondition()?,
            mode,
            grant_tokens: self.grant_tokens()?,
        })
    }

    fn outbox_template(&self) -> Result<OutboxTemplate> {
        Ok(OutboxTemplate {
            id: self.required_str("id")?,
            recipient: self.required_str("recipient")?,
            subject: self.required_str("subject")?,
            body: self.body_lines()?,
            precondition: self.precondition()?,
        })
    }

    fn required_str(&self, key: &str) -> Result<String> {
        match self.map.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(Value::String(_)) => Err(self.err(format!("field '{}' is empty", key))),
            Some(_) => Err(self.err(format!("field '{}' must be a string", key))),
            None => Err(self.err(format!("missing required field '{}'", key))),
        }
    }

    /// Two-valued flag: JSON bool or "yes"/"no"/"true"/"false" in any case. Absent is false.
    fn flag(&self, key: &str) -> Result<bool> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" => Ok(true),
                "no" | "false" | "" => Ok(false),
                other => Err(self.err(format!("field '{}' has unrecognised value '{}'", key, other))),
            },
            Some(_) => Err(self.err(format!("field '{}' must be yes/no", key))),
        }
    }

    fn precondition(&self) -> Result<Precondition> {
        if !self.flag("token_required")? {
            return Ok(Precondition::Always);
        }
        let raw = match self.map.get("token_name") {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Null) | None => {
                return Err(self.err("token_required is set but token_name is missing"))
            }
            Some(_) => return Err(self.err("token_name must be a string")),
        };
        let token = Token::parse(raw)
            .map_err(|_| self.err(format!("unresolvable token reference '{}'", raw)))?;
        Ok(Precondition::Token(token))
    }

    fn grant_tokens(&self) -> Result<Vec<Token>> {
        match self.map.get("grant_tokens") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .and_then(|s| Token::parse(s).ok())
                        .ok_or_else(|| self.err(format!("invalid grant token {}", v)))
                })
                .collect(),
            Some(_) => Err(self.err("grant_tokens must be an array of token names")),
        }
    }

    fn timestamp_policy(&self, now: DateTime<Utc>) -> Result<TimestampPolicy> {
        match self.map.get("timestamp") {
            None | Some(Value::Null) => Ok(TimestampPolicy::AtDelivery),
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("now") => {
                Ok(TimestampPolicy::CurrentTime(narrative_stamp(now)))
            }
            Some(Value::String(s)) => normalize_fixed_timestamp(s)
                .map(TimestampPolicy::Fixed)
                .ok_or_else(|| self.err(format!("unparseable timestamp '{}'", s))),
            Some(_) => Err(self.err("timestamp must be a string")),
        }
    }

    fn declared_line_count(&self) -> Result<Option<usize>> {
        match self.map.get("bodylines") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|v| Some(v as usize))
                .ok_or_else(|| self.err("bodylines must be a non-negative integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| self.err(format!("bodylines '{}' is not a number", s))),
            Some(_) => Err(self.err("bodylines must be a number")),
        }
    }

    /// Collect `body<N>` slots by index. `None` marks an explicit `null`.
    fn body_slots(&self) -> Result<BTreeMap<usize, Option<String>>> {
        let mut slots = BTreeMap::new();
        for (key, value) in self.map {
            let Some(idx) = key.strip_prefix("body").and_then(|n| n.parse::<usize>().ok()) else {
                continue;
            };
            if idx == 0 {
                return Err(self.err("body slots start at body1"));
            }
            let line = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => return Err(self.err(format!("{} must be a string", key))),
            };
            slots.insert(idx, line);
        }
        Ok(slots)
    }

    fn body_lines(&self) -> Result<Vec<String>> {
        if let Some(value) = self.map.get("body") {
            match value {
                Value::String(s) => return Ok(s.split('\n').map(str::to_string).collect()),
                Value::Null => {}
                _ => return Err(self.err("body must be a string")),
            }
        }

        let slots = self.body_slots()?;
        let declared = self.declared_line_count()?;
        let highest = slots.keys().next_back().copied().unwrap_or(0);

        let count = match declared {
            Some(n) if n > MAX_BODY_LINES => {
                return Err(self.err(format!("bodylines {} exceeds {}", n, MAX_BODY_LINES)));
            }
            // Slots past the declared count are ignored
            Some(n) => n,
            None => {
                // Without a declared count, read consecutive slots from body1
                let mut n = 0;
                while slots.contains_key(&(n + 1)) {
                    n += 1;
                }
                if highest > n {
                    return Err(self.err(format!("body{} is missing before body{}", n + 1, highest)));
                }
                n
            }
        };

        let mut lines = Vec::with_capacity(count);
        for idx in 1..=count {
            match slots.get(&idx) {
                Some(Some(line)) => lines.push(line.clone()),
                Some(None) => lines.push(String::new()),
                None => {
                    // A gap is only tolerated when nothing populated follows it, even past the count
                    if let Some((&later, _)) = slots.range(idx + 1..).find(|(_, v)| v.is_some()) {
                        return Err(self.err(format!("body{} is missing before body{}", idx, later)));
                    }
                    lines.push(String::new());
                }
            }
        }

        if lines.is_empty() {
            return Err(self.err("missing body"));
        }
        Ok(lines)
    }
}

//! # Token Store
//!
//! Tokens are monotonic capability markers: once acquired they are never
//! removed. Names are case-normalised (`psem2` and `PSEM2` are the same token)
//! and must match `[A-Z0-9_]+` after trimming.
//!
//! A [`TokenStore`] opened on a path rewrites its file on every new grant and
//! reloads it on open, so progress survives restarts. Evaluators read through a
//! [`TokenSnapshot`].

pub mod catalogue;

use crate::errors::{ProgressionError, Result};
use crate::storage::{read_json, write_json_atomic};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Trim and upper-case a raw token name. Empty input yields `None`.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_uppercase())
    }
}

/// A validated, upper-case token code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Normalise and validate a token name.
    pub fn parse(raw: &str) -> Result<Self> {
        let code = normalize(raw).ok_or_else(|| ProgressionError::InvalidToken(raw.to_string()))?;
        if !code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ProgressionError::InvalidToken(raw.to_string()));
        }
        Ok(Token(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Token {
    type Error = ProgressionError;

    fn try_from(value: String) -> Result<Self> {
        Token::parse(&value)
    }
}

impl From<Token> for String {
    fn from(t: Token) -> Self {
        t.0
    }
}

/// Read-only view of the token set handed to evaluators and the responder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSnapshot(BTreeSet<Token>);

impl TokenSnapshot {
    /// Membership check by raw name; invalid names are never held.
    pub fn has(&self, raw: &str) -> bool {
        match Token::parse(raw) {
            Ok(t) => self.0.contains(&t),
            Err(_) => false,
        }
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.0.contains(token)
    }

    /// True when any of `codes` is held.
    pub fn has_any(&self, codes: &[&str]) -> bool {
        codes.iter().any(|c| self.has(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Token> for TokenSnapshot {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        TokenSnapshot(iter.into_iter().collect())
    }
}

/// The set of acquired tokens. There is deliberately no removal operation.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: BTreeSet<Token>,
    path: Option<PathBuf>,
}

impl TokenStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store persisted at `path` (fresh if the file is absent).
    ///
    /// Entries that no longer parse as tokens are skipped with a warning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw: Vec<String> = read_json(&path)?.unwrap_or_default();
        let mut tokens = BTreeSet::new();
        for entry in raw {
            match Token::parse(&entry) {
                Ok(t) => {
                    tokens.insert(t);
                }
                Err(_) => warn!("Ignoring invalid persisted token '{}'", entry),
            }
        }
        debug!("Token store loaded: {} tokens from {}", tokens.len(), path.display());
        Ok(Self {
            tokens,
            path: Some(path),
        })
    }

    /// Acquire a token. Returns `true` when it was not already held.
    pub fn add(&mut self, raw: &str) -> Result<bool> {
        self.add_with_reason(raw, None)
    }

    /// Acquire a token, logging `reason` alongside the grant.
    pub fn add_with_reason(&mut self, raw: &str, reason: Option<&str>) -> Result<bool> {
        let token = Token::parse(raw)?;
        if self.tokens.contains(&token) {
            debug!("Token {} already held", token);
            return Ok(false);
        }
        let label = catalogue::describe(&token).to_string();
        self.tokens.insert(token);
        self.persist()?;
        match reason {
            Some(r) => info!("Token acquired: {} ({})", label, r),
            None => info!("Token acquired: {}", label),
        }
        Ok(true)
    }

    pub fn has(&self, raw: &str) -> bool {
        match Token::parse(raw) {
            Ok(t) => self.tokens.contains(&t),
            Err(_) => false,
        }
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot(self.tokens.clone())
    }

    /// Known tokens first, then custom ones, alphabetical within each group.
    pub fn sorted(&self) -> Vec<Token> {
        let mut out: Vec<Token> = self.tokens.iter().cloned().collect();
        out.sort_by(|a, b| catalogue::sort_key(a).cmp(&catalogue::sort_key(b)));
        out
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn persist(&self) -> Result<()> {
        if let Some(path) = &self.path {
            let codes: Vec<String> = self.sorted().into_iter().map(String::from).collect();
            write_json_atomic(path, &codes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_case_and_whitespace() {
        let t = Token::parse("  psem2 ").unwrap();
        assert_eq!(t.as_str(), "PSEM2");
    }

    #[test]
    fn parse_rejects_empty_and_punctuation() {
        assert!(Token::parse("   ").is_err());
        assert!(Token::parse("games-1").is_err());
        assert!(Token::parse("two words").is_err());
    }

    #[test]
    fn add_is_idempotent() {
        let mut store = TokenStore::in_memory();
        assert!(store.add("psem").unwrap());
        assert!(!store.add("PSEM").unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.has("Psem"));
    }

    #[test]
    fn invalid_names_are_never_held() {
        let mut store = TokenStore::in_memory();
        assert!(store.add("bad token").is_err());
        assert!(!store.has("bad token"));
        assert!(store.is_empty());
    }

    #[test]
    fn sorted_lists_known_tokens_first() {
        let mut store = TokenStore::in_memory();
        store.add("zeta_custom").unwrap();
        store.add("games1").unwrap();
        store.add("alpha_custom").unwrap();
        store.add("psem").unwrap();
        let order: Vec<String> = store.sorted().into_iter().map(String::from).collect();
        assert_eq!(order, vec!["GAMES1", "PSEM", "ALPHA_CUSTOM", "ZETA_CUSTOM"]);
    }

    #[test]
    fn snapshot_is_detached_from_later_grants() {
        let mut store = TokenStore::in_memory();
        store.add("psem").unwrap();
        let snap = store.snapshot();
        store.add("games1").unwrap();
        assert!(snap.has("psem"));
        assert!(!snap.has("games1"));
        assert!(snap.has_any(&["GAMES1", "PSEM"]));
    }

    #[test]
    fn grants_survive_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        {
            let mut store = TokenStore::open(&path).unwrap();
            store.add("psem2").unwrap();
            store.add_with_reason("jax1", Some("volunteered")).unwrap();
        }
        let reloaded = TokenStore::open(&path).unwrap();
        assert!(reloaded.has("PSEM2"));
        assert!(reloaded.has("jax1"));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn deserializing_invalid_token_fails() {
        let bad: std::result::Result<Token, _> = serde_json::from_str("\"no way\"");
        assert!(bad.is_err());
    }
}

//! Player input validation: handles and composed messages.

use std::collections::HashSet;

/// Longest subject the compose screen accepts.
pub const MAX_SUBJECT_CHARS: usize = 100;
/// Longest body the compose screen accepts.
pub const MAX_BODY_CHARS: usize = 2000;

/// Handle validation errors with helpful messages
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("Handle is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Handle is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Handle contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Handle '{0}' is reserved")]
    Reserved(String),
}

/// Handle validation rules configuration
#[derive(Debug, Clone)]
pub struct HandleRules {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for HandleRules {
    fn default() -> Self {
        HandleRules {
            min_length: 2,
            max_length: 24,
        }
    }
}

fn reserved_handles() -> HashSet<&'static str> {
    [
        // Placeholders the BBS shows before registration
        "unknown", "guest", "operative",
        // Staff and system names
        "sysop", "root", "admin", "system", "mailer-daemon", "postmaster",
        // NPC handles
        "glyphis", "rain", "jaxkando", "uncle-am",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a handle with the given rules, returning it lower-cased.
pub fn validate_handle_with(raw: &str, rules: &HandleRules) -> Result<String, HandleError> {
    let handle = raw.trim().to_lowercase();
    let len = handle.chars().count();
    if len < rules.min_length {
        return Err(HandleError::TooShort {
            min: rules.min_length,
        });
    }
    if len > rules.max_length {
        return Err(HandleError::TooLong {
            max: rules.max_length,
        });
    }

    let invalid: HashSet<char> = handle
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || *c == '.'))
        .collect();
    if !invalid.is_empty() {
        let mut chars: Vec<char> = invalid.into_iter().collect();
        chars.sort_unstable();
        return Err(HandleError::InvalidCharacters {
            chars: chars.into_iter().collect(),
        });
    }
    if handle.contains("..") {
        return Err(HandleError::InvalidCharacters { chars: "..".into() });
    }

    if reserved_handles().contains(handle.as_str()) {
        return Err(HandleError::Reserved(handle));
    }
    Ok(handle)
}

/// Validate a handle with the default rules.
pub fn validate_handle(raw: &str) -> Result<String, HandleError> {
    validate_handle_with(raw, &HandleRules::default())
}

/// Strip control characters (newlines kept) and cap at `max_chars`.
pub fn sanitize_compose(text: &str, max_chars: usize) -> String {
    text.chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .take(max_chars)
        .collect::<String>()
        .trim()
        .to_string()
}

use thiserror::Error;

/// Errors raised by the progression engine.
///
/// Load-time variants (`MalformedData`) halt startup. `UnknownCharacter` is
/// contained to the single send that raised it by the session controller.
#[derive(Debug, Error)]
pub enum ProgressionError {
    /// A source document entry is structurally invalid.
    #[error("malformed {source_name} entry '{entry}': {reason}")]
    MalformedData {
        source_name: String,
        entry: String,
        reason: String,
    },

    /// An outgoing email addresses an NPC with no character profile.
    #[error("no character profile for {0}")]
    UnknownCharacter(String),

    /// Delivery was requested for an id the email database does not define.
    #[error("unknown email id: {0}")]
    UnknownEmail(String),

    /// A token name that does not normalise to `[A-Z0-9_]+`.
    #[error("invalid token name: '{0}'")]
    InvalidToken(String),

    /// A player handle that failed validation.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Wrapper around IO errors (state directory, source documents).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON encode/decode errors.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProgressionError {
    pub(crate) fn malformed(
        source_name: &str,
        entry: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ProgressionError::MalformedData {
            source_name: source_name.to_string(),
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// True for configuration errors that must stop startup.
    pub fn is_load_error(&self) -> bool {
        matches!(self, ProgressionError::MalformedData { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProgressionError>;

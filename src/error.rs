//! Error types for triage-rs.
//!
//! Each layer owns a `thiserror` enum; [`Error`] unifies them for the CLI
//! and library entry points.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Load-time configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session bookkeeping failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Credential pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Provider-level failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Embedding backend failure.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a provider failure should be handled by the credential pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rate limit, overload, 5xx, connection failure or timeout.
    /// The credential cools down and the request moves on.
    Transient,
    /// The credential itself was rejected. It is disabled for good.
    Authentication,
    /// The request cannot succeed on any credential.
    Fatal,
}

impl FailureKind {
    /// Classifies an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            408 | 409 | 425 | 429 | 500..=599 => Self::Transient,
            _ => Self::Fatal,
        }
    }

    /// Returns the lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Authentication => "authentication",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a single provider call.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The provider rejected or failed the request.
    #[error("{kind} provider failure{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Provider {
        /// Failure classification.
        kind: FailureKind,
        /// Provider message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The request did not complete in time.
    #[error("provider request timed out after {}s", .after.as_secs_f64())]
    Timeout {
        /// Configured timeout.
        after: Duration,
    },

    /// No API key was configured for a provider that needs one.
    #[error("API key missing: set OPENAI_API_KEYS or OPENAI_API_KEY")]
    ApiKeyMissing,

    /// Unknown provider name in configuration.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Configured name.
        name: String,
    },
}

impl AgentError {
    /// Returns how the pool should treat this failure.
    #[must_use]
    pub const fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Provider { kind, .. } => *kind,
            Self::Timeout { .. } => FailureKind::Transient,
            Self::ApiKeyMissing => FailureKind::Authentication,
            Self::UnsupportedProvider { .. } => FailureKind::Fatal,
        }
    }
}

/// Errors surfaced by the credential pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every credential is cooling down or disabled.
    #[error("credential pool exhausted: {cooling} cooling down, {disabled} disabled of {total}")]
    Exhausted {
        /// Credentials in the pool.
        total: usize,
        /// Credentials cooling down.
        cooling: usize,
        /// Credentials disabled.
        disabled: usize,
    },

    /// The transient retry budget for one request was spent.
    #[error("request failed after {attempts} transient attempts: {last_error}")]
    AttemptsExceeded {
        /// Transient failures observed.
        attempts: u32,
        /// Last provider error.
        last_error: String,
    },

    /// The request itself was rejected; retrying on another key cannot help.
    #[error("request rejected by provider: {message}")]
    Request {
        /// Provider message.
        message: String,
    },
}

/// Load-time configuration errors. These prevent startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Conditions in the knowledge base with no advice-tier mapping.
    #[error("conditions without an advice tier: {}", .conditions.join(", "))]
    UnmappedConditions {
        /// Unmapped condition ids.
        conditions: Vec<String>,
    },

    /// A knowledge-base row is unusable.
    #[error("invalid knowledge record {row}: {reason}")]
    InvalidRecord {
        /// 1-based row number.
        row: usize,
        /// What is wrong.
        reason: String,
    },

    /// The knowledge base has no symptom rows.
    #[error("knowledge base contains no symptoms")]
    EmptyKnowledgeBase,

    /// The knowledge file could not be parsed.
    #[error("failed to parse {source_name}: {message}")]
    Parse {
        /// File path or `<bundled>`.
        source_name: String,
        /// Parser message.
        message: String,
    },

    /// The knowledge file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Setting name.
        name: &'static str,
        /// Offending value.
        value: String,
    },

    /// A credential pool was built without credentials.
    #[error("credential pool needs at least one credential")]
    NoCredentials,
}

/// Session errors. `Malformed` indicates a programming error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session state violates the dialogue state machine.
    #[error("malformed session state: {reason}")]
    Malformed {
        /// Violated invariant.
        reason: String,
    },

    /// No session with the given id.
    #[error("session not found: {session_id}")]
    NotFound {
        /// Requested id.
        session_id: String,
    },
}

impl SessionError {
    /// Creates a [`SessionError::Malformed`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Embedding backend errors.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The backend failed.
    #[error("embedding backend error: {0}")]
    Backend(String),

    /// A vector has the wrong length.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Observed length.
        got: usize,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Bad command-line input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output serialization failed.
    #[error("output error: {0}")]
    OutputFormat(String),
}

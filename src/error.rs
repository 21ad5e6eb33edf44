//! Error types for the Nacelle sourcing pipeline.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=compilation, 5=remote, ...)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for sourcing operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    NodeNotFound,
    UnknownType,

    // Validation (exit 4)
    CompilationError,
    InvalidArgument,

    // Remote (exit 5)
    TransportError,
    MalformedPage,
    SingletonMissing,

    // Config (exit 6)
    ConfigError,

    // I/O (exit 7)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NodeNotFound => "NODE_NOT_FOUND",
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::CompilationError => "COMPILATION_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::MalformedPage => "MALFORMED_PAGE",
            Self::SingletonMissing => "SINGLETON_MISSING",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-7).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::NodeNotFound | Self::UnknownType => 3,
            Self::CompilationError | Self::InvalidArgument => 4,
            Self::TransportError | Self::MalformedPage | Self::SingletonMissing => 5,
            Self::ConfigError => 6,
            Self::IoError | Self::JsonError => 7,
        }
    }

    /// Whether re-running the same command may succeed.
    ///
    /// True for transport failures (network blips, rate limits) and
    /// database contention. Compilation and configuration problems
    /// need a change before a retry can help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError | Self::DatabaseError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while compiling, sourcing or storing nodes.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to compile {operation}: {message}")]
    Compilation { operation: String, message: String },

    /// Network failure, non-success status or GraphQL error payload.
    /// The message is surfaced verbatim.
    #[error("{0}")]
    Transport(String),

    #[error("Malformed page returned by {operation}: {reason}")]
    MalformedPage { operation: String, reason: String },

    #[error("No {remote_type} returned by the remote source; exactly one is required")]
    SingletonMissing { remote_type: String },

    #[error("Failed to source {remote_type} nodes: {cause}")]
    EntitySourcing {
        remote_type: String,
        cause: Box<Error>,
    },

    #[error("Problem sourcing data from {source_name}: {cause}")]
    Sourcing {
        source_name: String,
        cause: Box<Error>,
    },

    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    #[error("Node not found: {id} (did you mean: {}?)", similar.join(", "))]
    NodeNotFoundSimilar { id: String, similar: Vec<String> },

    #[error("Unknown entity type: {name}")]
    UnknownType {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an error with the entity type whose sourcing it aborted.
    #[must_use]
    pub fn for_entity(remote_type: &str, cause: Self) -> Self {
        Self::EntitySourcing {
            remote_type: remote_type.to_string(),
            cause: Box::new(cause),
        }
    }

    /// Wrap an error with the name of the remote source.
    #[must_use]
    pub fn sourcing(source_name: &str, cause: Self) -> Self {
        Self::Sourcing {
            source_name: source_name.to_string(),
            cause: Box::new(cause),
        }
    }

    /// The innermost error, unwrapping sourcing context layers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::EntitySourcing { cause, .. } | Self::Sourcing { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self.root_cause() {
            Self::Compilation { .. } => ErrorCode::CompilationError,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::MalformedPage { .. } => ErrorCode::MalformedPage,
            Self::SingletonMissing { .. } => ErrorCode::SingletonMissing,
            Self::NodeNotFound { .. } | Self::NodeNotFoundSimilar { .. } => ErrorCode::NodeNotFound,
            Self::UnknownType { .. } => ErrorCode::UnknownType,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::EntitySourcing { .. } | Self::Sourcing { .. } | Self::Other(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self.root_cause() {
            Self::Compilation { .. } => Some(
                "Check the fragment files in your fragments directory against the remote schema. \
                 Delete a fragment file to regenerate it from the schema."
                    .to_string(),
            ),

            Self::Config(msg) if msg.contains("space id") || msg.contains("access token") => Some(
                "Pass --space-id/--token, set NACELLE_SPACE_ID/NACELLE_GRAPHQL_TOKEN, \
                 or run `nsrc config set --space-id <id> --token <token>`"
                    .to_string(),
            ),

            Self::NodeNotFound { id } => Some(format!(
                "No node with ID '{id}'. Use `nsrc nodes list` to see sourced nodes."
            )),
            Self::NodeNotFoundSimilar { similar, .. } => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }

            Self::UnknownType { suggestion, .. } => Some(match suggestion {
                Some(s) => format!("Did you mean: {s}? Known types: Product, Collection, Space"),
                None => "Known types: Product, Collection, Space".to_string(),
            }),

            Self::SingletonMissing { .. } => Some(
                "The space could not be read. Verify the space id and token grant access to it."
                    .to_string(),
            ),

            Self::Transport(_) | Self::MalformedPage { .. } => {
                Some("Run again with -v to log every operation and its variables".to_string())
            }

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::InvalidArgument(_)
            | Self::EntitySourcing { .. }
            | Self::Sourcing { .. }
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

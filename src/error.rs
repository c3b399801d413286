//! Top-level error types for the guardian operator.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Remediation(#[from] RemediationError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable classification used by reconcilers to decide requeue vs. terminal
/// vs. status-surfacing handling (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    TransientIo,
    RateLimited,
    InvalidConfig,
    TemplateError,
    SecretResolution,
    RemoteRejected,
    Cancelled,
    Fatal,
}

impl Error {
    /// Classify this error for reconcile-loop dispatch.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            Error::Store(_) => ErrorKind::TransientIo,
            Error::Config(_) => ErrorKind::InvalidConfig,
            Error::Dispatch(DispatchError::RateLimited { .. }) => ErrorKind::RateLimited,
            Error::Dispatch(DispatchError::Template(_)) => ErrorKind::TemplateError,
            Error::Dispatch(DispatchError::SecretResolution(_)) => ErrorKind::SecretResolution,
            Error::Dispatch(DispatchError::RemoteRejected { .. }) => ErrorKind::RemoteRejected,
            Error::Dispatch(_) => ErrorKind::TransientIo,
            Error::Remediation(RemediationError::RateLimited) => ErrorKind::RateLimited,
            Error::Remediation(_) => ErrorKind::TransientIo,
            Error::Platform(PlatformError::NotFound(_)) => ErrorKind::NotFound,
            Error::Platform(PlatformError::Cancelled) => ErrorKind::Cancelled,
            Error::Platform(_) => ErrorKind::TransientIo,
            Error::Analyzer(_) => ErrorKind::TransientIo,
            Error::Sqlx(_) | Error::Io(_) => ErrorKind::TransientIo,
            Error::Other(_) => ErrorKind::Fatal,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence errors from the pluggable store (§4.1).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("query failed: {0}")]
    Query(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Analyzer errors (§4.3).
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("invalid cron expression '{0}': {1}")]
    InvalidSchedule(String, String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Alert dispatch errors (§4.4).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("secret resolution failed: {0}")]
    SecretResolution(String),

    #[error("channel '{channel}' rejected the alert: {status}")]
    RemoteRejected { channel: String, status: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Remediation errors (§4.5).
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    #[error("remediation disabled or blocked by maintenance window")]
    Declined(String),

    #[error("rate limited")]
    RateLimited,

    #[error("max retries ({0}) reached")]
    MaxRetriesReached(u32),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the external orchestrator platform API (§6, out of scope
/// beyond its contract).
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("platform API error: {0}")]
    Api(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

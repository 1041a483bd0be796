use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification used for control flow (failover, HTTP status mapping).
///
/// `code` on [`AppError`] stays free-form for operators; callers branch on `kind`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No usable provider, bad settings. Fatal at construction.
    Configuration,
    /// Provider unreachable or failed its liveness probe.
    ProviderUnavailable,
    /// Provider-specific quota signal (HTTP 429, exhausted resources).
    RateLimited,
    /// Caller passed mismatched chunk/vector counts.
    DimensionMismatch,
    /// Upstream returned a body we could not decode.
    Decode,
    /// Any other upstream failure.
    Provider,
    Storage,
    InvalidInput,
    NotFound,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::DimensionMismatch | ErrorKind::InvalidInput => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::ProviderUnavailable => 503,
            ErrorKind::Configuration
            | ErrorKind::Decode
            | ErrorKind::Provider
            | ErrorKind::Storage => 500,
        }
    }
}

/// Single structured error shape used across backend layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimited
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

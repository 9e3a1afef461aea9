//! Top-level error types for agentsudo
//!
//! This module provides a simplified, user-facing error type that flattens
//! the per-module errors into actionable categories.

use thiserror::Error;

use crate::approval::ApprovalError;
use crate::config::ConfigError;
use crate::guardrails::GuardrailViolation;
use crate::permission::PermissionDenied;
use crate::telemetry::TelemetryError;

/// Top-level error type for agentsudo operations
///
/// Categorized by how callers typically need to handle them:
///
/// - [`Error::Permission`] - The agent may not do this; start a session or grant the scope
/// - [`Error::Approval`] - The approval round-trip failed or timed out
/// - [`Error::Guardrail`] - Input or output broke a guardrail rule
/// - [`Error::Config`] - Fix configuration (missing API key, bad batch size)
/// - [`Error::Telemetry`] - The telemetry sink could not start or has stopped
#[derive(Debug, Error)]
pub enum Error {
    /// A guarded call or scoped model was refused
    #[error(transparent)]
    Permission(#[from] PermissionDenied),

    /// Approval request failed
    #[error("approval error: {0}")]
    Approval(String),

    /// Guardrail violation
    #[error("guardrail violation: {0}")]
    Guardrail(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Telemetry sink error
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

impl Error {
    /// Returns true if this is a permission denial
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Permission(_))
    }

    /// Returns true if this is an approval error
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approval(_))
    }

    /// Returns true if this is a guardrail violation
    pub fn is_guardrail(&self) -> bool {
        matches!(self, Self::Guardrail(_))
    }

    /// Returns true if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a telemetry error
    pub fn is_telemetry(&self) -> bool {
        matches!(self, Self::Telemetry(_))
    }

    /// The underlying denial, for matching on its kind
    pub fn permission_denied(&self) -> Option<&PermissionDenied> {
        match self {
            Self::Permission(denied) => Some(denied),
            _ => None,
        }
    }
}

impl From<ApprovalError> for Error {
    fn from(err: ApprovalError) -> Self {
        Self::Approval(err.to_string())
    }
}

impl From<GuardrailViolation> for Error {
    fn from(err: GuardrailViolation) -> Self {
        Self::Guardrail(err.reason)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<TelemetryError> for Error {
    fn from(err: TelemetryError) -> Self {
        match err {
            TelemetryError::Config(e) => e.into(),
            other => Self::Telemetry(other.to_string()),
        }
    }
}

/// Result type for agentsudo operations
pub type Result<T> = std::result::Result<T, Error>;

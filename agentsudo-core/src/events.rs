use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;

/// Outcome of one authorization decision.
///
/// Every terminal outcome of a guarded call (or a scoped model check)
/// maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Scope check passed; the operation ran.
    AccessGranted,
    /// Scope check failed under the block policy.
    AccessDenied,
    /// Scope check failed under the audit-log policy; the operation ran anyway.
    AuditViolation,
    /// Scope check failed and the approval callback said yes.
    CallbackApproved,
    /// Scope check failed and the approval callback said no.
    CallbackDenied,
    /// A scoped model passed its construction-time check.
    ModelAccessGranted,
    /// A scoped model failed its construction-time check.
    ModelAccessDenied,
}

impl DecisionKind {
    /// The action name used in audit records and telemetry payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessGranted => "access_granted",
            Self::AccessDenied => "access_denied",
            Self::AuditViolation => "audit_violation",
            Self::CallbackApproved => "callback_approved",
            Self::CallbackDenied => "callback_denied",
            Self::ModelAccessGranted => "model_access_granted",
            Self::ModelAccessDenied => "model_access_denied",
        }
    }

    /// Whether the guarded work was allowed to proceed.
    pub fn allowed(&self) -> bool {
        matches!(
            self,
            Self::AccessGranted
                | Self::AuditViolation
                | Self::CallbackApproved
                | Self::ModelAccessGranted
        )
    }

    /// Log level of the audit record for this outcome.
    pub fn level(&self) -> tracing::Level {
        match self {
            Self::AccessGranted | Self::ModelAccessGranted => tracing::Level::DEBUG,
            Self::CallbackApproved => tracing::Level::INFO,
            Self::AuditViolation => tracing::Level::WARN,
            Self::AccessDenied | Self::CallbackDenied | Self::ModelAccessDenied => {
                tracing::Level::ERROR
            }
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record of one authorization decision.
///
/// Emitted as a structured `tracing` event and forwarded to the
/// configured telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Identifier of the deciding agent
    pub agent_id: String,
    /// Name of the deciding agent
    pub agent_name: String,
    /// Scope the operation required
    pub required_scope: String,
    /// Guarded operation or scoped model name
    pub operation: String,
    /// Whether the work proceeded
    pub allowed: bool,
    /// Which outcome this was
    #[serde(rename = "action")]
    pub kind: DecisionKind,
}

impl DecisionEvent {
    /// Build an event for `agent`, timestamped now.
    pub fn new(agent: &Agent, required_scope: &str, operation: &str, kind: DecisionKind) -> Self {
        Self {
            timestamp: Utc::now(),
            agent_id: agent.id().to_string(),
            agent_name: agent.name().to_string(),
            required_scope: required_scope.to_string(),
            operation: operation.to_string(),
            allowed: kind.allowed(),
            kind,
        }
    }
}

/// Emit the audit record for a decision at its level.
pub(crate) fn log_decision(event: &DecisionEvent) {
    macro_rules! audit {
        ($level:expr) => {
            tracing::event!(
                target: "agentsudo::audit",
                $level,
                action = event.kind.as_str(),
                agent_id = %event.agent_id,
                agent_name = %event.agent_name,
                scope = %event.required_scope,
                operation = %event.operation,
                allowed = event.allowed,
                "{}",
                event.kind
            )
        };
    }

    match event.kind.level() {
        tracing::Level::DEBUG => audit!(tracing::Level::DEBUG),
        tracing::Level::INFO => audit!(tracing::Level::INFO),
        tracing::Level::WARN => audit!(tracing::Level::WARN),
        _ => audit!(tracing::Level::ERROR),
    }
}

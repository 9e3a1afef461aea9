//! Permission errors raised by guarded operations.

use thiserror::Error;

/// Why a guarded operation was refused.
///
/// All four kinds are fatal to the call that produced them. The
/// audit-log denial policy is the only path that turns a scope mismatch
/// into a non-error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionDenied {
    /// The operation ran outside any agent session.
    #[error("'{operation}' requires an active agent session. Start one with Agent::start_session()")]
    NoActiveSession {
        /// Name of the guarded operation or model.
        operation: String,
    },

    /// The current agent's session is past its expiry.
    #[error("Agent '{agent}' session expired. Start a new session.")]
    SessionExpired {
        /// Name of the agent whose session expired.
        agent: String,
    },

    /// The agent lacks the required scope and the policy blocks.
    #[error(
        "Agent '{agent}' missing required scope: '{scope}'{}. Agent has: {granted:?}.",
        target_suffix(.target)
    )]
    ScopeDenied {
        /// Name of the agent.
        agent: String,
        /// The scope that was required.
        scope: String,
        /// Everything the agent was granted, sorted.
        granted: Vec<String>,
        /// Scoped model name, when the check came from model validation.
        target: Option<String>,
    },

    /// The approval callback rejected the call.
    #[error("Action rejected by approval policy: {scope}")]
    CallbackRejected {
        /// The scope the callback was asked to approve.
        scope: String,
    },
}

fn target_suffix(target: &Option<String>) -> String {
    match target {
        Some(model) => format!(" for model '{}'", model),
        None => String::new(),
    }
}

impl PermissionDenied {
    /// Returns true if no session was active.
    pub fn is_no_session(&self) -> bool {
        matches!(self, Self::NoActiveSession { .. })
    }

    /// Returns true if the session had expired.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Returns true if the scope check failed under the block policy.
    pub fn is_scope_denied(&self) -> bool {
        matches!(self, Self::ScopeDenied { .. })
    }

    /// Returns true if an approval callback said no.
    pub fn is_callback_rejected(&self) -> bool {
        matches!(self, Self::CallbackRejected { .. })
    }

    /// The scope involved in the refusal, if there is one.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Self::ScopeDenied { scope, .. } | Self::CallbackRejected { scope } => Some(scope),
            Self::NoActiveSession { .. } | Self::SessionExpired { .. } => None,
        }
    }
}

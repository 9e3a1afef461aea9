//! The guarded-call decision engine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::error::PermissionDenied;
use crate::agent::{current, Agent};
use crate::events::{DecisionEvent, DecisionKind};
use crate::telemetry::{self, TelemetrySink};

/// Operation name used when a guard is not given one.
pub const DEFAULT_OPERATION: &str = "operation";

/// Approval function consulted by [`DenialPolicy::Callback`].
///
/// Receives the agent, the scope it is missing and the call context, and
/// returns whether the call may proceed. It runs synchronously on the
/// caller's thread and may block; any timeout is its own business.
pub type ApprovalCallback = Arc<dyn Fn(&Agent, &str, &CallContext) -> bool + Send + Sync>;

/// What happens when the current agent lacks the required scope.
///
/// Only the scope-mismatch case is governed by the policy. A missing or
/// expired session is always an error.
#[derive(Clone, Default)]
pub enum DenialPolicy {
    /// Refuse the call with [`PermissionDenied::ScopeDenied`] (default).
    #[default]
    Block,

    /// Record an `audit_violation` and run the call anyway.
    ///
    /// For rolling out enforcement without breaking live traffic.
    AuditLog,

    /// Ask an approval function; run the call only if it says yes.
    Callback(ApprovalCallback),
}

impl DenialPolicy {
    /// Wrap a closure as a [`DenialPolicy::Callback`].
    pub fn callback<F>(approve: F) -> Self
    where
        F: Fn(&Agent, &str, &CallContext) -> bool + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(approve))
    }
}

impl fmt::Debug for DenialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("Block"),
            Self::AuditLog => f.write_str("AuditLog"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// What an approval callback gets to see about the call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallContext {
    /// Name of the guarded operation
    pub operation: String,
    /// Arguments of the call, as supplied by the caller
    pub arguments: Value,
}

impl CallContext {
    pub fn new(operation: impl Into<String>, arguments: Value) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }
}

/// How a call that was allowed to proceed got through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The agent holds the required scope.
    Granted,
    /// The scope was missing but the policy is [`DenialPolicy::AuditLog`].
    AuditAllowed,
    /// The scope was missing and the approval callback said yes.
    CallbackApproved,
}

/// Wraps operations with a required scope and a denial policy.
///
/// A guard is configured once and then used for any number of calls. Each
/// call looks up the current agent, checks its session expiry and scopes,
/// and either runs the operation or returns [`PermissionDenied`]. Every
/// outcome is logged under the `agentsudo::audit` target and forwarded to
/// the telemetry sink.
///
/// # Example
///
/// ```rust
/// use agentsudo_core::{Agent, Guard};
///
/// let read_orders = Guard::new("read:orders").named("read_orders");
/// let agent = Agent::new("SupportBot", ["read:orders"]);
///
/// // No session: always refused
/// assert!(read_orders.invoke(|| 42).unwrap_err().is_no_session());
///
/// let _session = agent.enter_session();
/// assert_eq!(read_orders.invoke(|| 42).unwrap(), 42);
/// ```
#[derive(Clone)]
pub struct Guard {
    scope: String,
    operation: String,
    policy: DenialPolicy,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl Guard {
    /// Guard operations with `scope`, blocking on denial.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            operation: DEFAULT_OPERATION.to_string(),
            policy: DenialPolicy::default(),
            sink: None,
        }
    }

    /// Name the guarded operation for audit records and error messages.
    pub fn named(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Set the denial policy.
    pub fn on_deny(mut self, policy: DenialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Send decisions to `sink` instead of the installed one.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn policy(&self) -> &DenialPolicy {
        &self.policy
    }

    /// Decide whether a call may proceed, without running anything.
    ///
    /// `arguments` is passed to an approval callback as part of the
    /// [`CallContext`]; pass [`Value::Null`] when there is nothing to show.
    pub fn authorize(&self, arguments: Value) -> Result<Decision, PermissionDenied> {
        let agent = active_agent(&self.operation)?;
        self.decide(&agent, arguments)
    }

    /// Run `operation` if the current agent may.
    pub fn invoke<T>(&self, operation: impl FnOnce() -> T) -> Result<T, PermissionDenied> {
        self.invoke_with_args(Value::Null, operation)
    }

    /// Run `operation` if the current agent may, showing `arguments` to
    /// any approval callback.
    pub fn invoke_with_args<T>(
        &self,
        arguments: Value,
        operation: impl FnOnce() -> T,
    ) -> Result<T, PermissionDenied> {
        self.authorize(arguments)?;
        Ok(operation())
    }

    /// Await `future` if the current agent may.
    ///
    /// The check runs when the returned future is first polled, so it sees
    /// the session active at that point. The future is dropped unpolled on
    /// denial. An approval callback blocks the polling thread.
    pub async fn invoke_async<F: Future>(
        &self,
        arguments: Value,
        future: F,
    ) -> Result<F::Output, PermissionDenied> {
        self.authorize(arguments)?;
        Ok(future.await)
    }

    fn decide(&self, agent: &Agent, arguments: Value) -> Result<Decision, PermissionDenied> {
        if agent.has_scope(&self.scope) {
            self.emit(agent, DecisionKind::AccessGranted);
            agent.touch_session();
            return Ok(Decision::Granted);
        }

        match &self.policy {
            DenialPolicy::Block => {
                self.emit(agent, DecisionKind::AccessDenied);
                Err(PermissionDenied::ScopeDenied {
                    agent: agent.name().to_string(),
                    scope: self.scope.clone(),
                    granted: agent.scopes(),
                    target: None,
                })
            }
            DenialPolicy::AuditLog => {
                self.emit(agent, DecisionKind::AuditViolation);
                Ok(Decision::AuditAllowed)
            }
            DenialPolicy::Callback(approve) => {
                let context = CallContext::new(self.operation.clone(), arguments);
                if approve(agent, &self.scope, &context) {
                    self.emit(agent, DecisionKind::CallbackApproved);
                    agent.touch_session();
                    Ok(Decision::CallbackApproved)
                } else {
                    self.emit(agent, DecisionKind::CallbackDenied);
                    Err(PermissionDenied::CallbackRejected {
                        scope: self.scope.clone(),
                    })
                }
            }
        }
    }

    fn emit(&self, agent: &Agent, kind: DecisionKind) {
        let event = DecisionEvent::new(agent, &self.scope, &self.operation, kind);
        telemetry::emit(self.sink.as_ref(), event);
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("scope", &self.scope)
            .field("operation", &self.operation)
            .field("policy", &self.policy)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// The current agent, provided its session is still live.
pub(crate) fn active_agent(operation: &str) -> Result<Arc<Agent>, PermissionDenied> {
    let Some(agent) = current() else {
        tracing::warn!(
            target: "agentsudo::guard",
            operation,
            "blocked: no active agent session"
        );
        return Err(PermissionDenied::NoActiveSession {
            operation: operation.to_string(),
        });
    };

    if agent.is_session_expired() {
        tracing::warn!(
            target: "agentsudo::guard",
            operation,
            agent_name = %agent.name(),
            "blocked: session expired"
        );
        return Err(PermissionDenied::SessionExpired {
            agent: agent.name().to_string(),
        });
    }

    Ok(agent)
}

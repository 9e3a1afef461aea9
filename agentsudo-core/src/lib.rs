//! # AgentSudo
//!
//! Scope-based permission guards for function calls made on behalf of AI agents.
//!
//! An [`Agent`] carries a set of permission scopes such as `read:orders` or
//! `write:*`. Code runs "as" an agent inside a session, and every guarded
//! operation checks the current agent's scopes before it is allowed to run.
//!
//! ## Quick Start
//!
//! ```rust
//! use agentsudo_core::{Agent, Guard};
//!
//! let read_orders = Guard::new("read:orders").named("read_orders");
//! let issue_refund = Guard::new("write:refunds").named("issue_refund");
//!
//! let bot = Agent::new("SupportBot", ["read:orders"]);
//! let _session = bot.enter_session();
//!
//! assert_eq!(read_orders.invoke(|| "order #17").unwrap(), "order #17");
//!
//! let err = issue_refund.invoke(|| ()).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "Agent 'SupportBot' missing required scope: 'write:refunds'. Agent has: [\"read:orders\"]."
//! );
//! ```
//!
//! ## Sessions
//!
//! A session makes an agent the current agent for a dynamic extent and
//! gives it an expiry (one hour by default). Sessions nest, and the
//! previous agent is restored when the inner one ends, including on panic
//! or early return.
//!
//! - Synchronous code: [`Agent::enter_session`] returns a guard that ends
//!   the session when dropped.
//! - Async code: [`Agent::run_in_session`] runs a future as the agent. The
//!   binding follows the task across awaits and worker threads and is
//!   never seen by other tasks.
//!
//! ## Denial Policies
//!
//! What happens when the scope is missing is configured per guard with
//! [`DenialPolicy`]:
//!
//! - `Block` (default) - refuse with [`PermissionDenied::ScopeDenied`]
//! - `AuditLog` - record an `audit_violation` and run anyway
//! - `Callback` - ask an approval function (see [`approval`])
//!
//! A missing or expired session is always refused, whatever the policy.
//!
//! ## Audit Records
//!
//! Each decision is emitted as a `tracing` event with target
//! `agentsudo::audit` and forwarded to a [`TelemetrySink`]. Install a
//! subscriber to see them:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("agentsudo=debug")
//!     .init();
//! ```
//!
//! ## Feature Flags
//!
//! - `test-utils` - recording sink and mock approver in [`test_utils`]

pub mod agent;
pub mod approval;
pub mod config;
pub mod error;
pub mod events;
pub mod guardrails;
pub mod permission;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use agent::{
    current, scope, Agent, AgentBuilder, ExpiryPolicy, Session, SessionGuard, DEFAULT_ROLE,
    DEFAULT_SESSION_TTL,
};
pub use approval::{ApprovalBroker, ApprovalError, ApprovalNotifier, ApprovalRequest, TimeoutBehavior};
pub use config::{ConfigError, TelemetryConfig};
pub use error::{Error, Result};
pub use events::{DecisionEvent, DecisionKind};
pub use guardrails::{GuardrailViolation, Guardrails, InputCheck, ViolationPolicy};

// Permission system
pub use permission::{
    scope_matches, ApprovalCallback, CallContext, Decision, DenialPolicy, Guard, PermissionDenied,
    Scoped, ScopedModel,
};

pub use telemetry::{HttpTelemetrySink, TelemetryError, TelemetrySink};

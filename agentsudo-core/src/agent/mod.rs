//! Agent identity, granted scopes and session lifetime.
//!
//! An [`Agent`] is a trusted in-process principal. Guarded operations look
//! up the agent of the current session and check its scopes.

mod builder;
mod session;

pub use builder::AgentBuilder;
pub use session::{current, scope, Session, SessionGuard};

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::guardrails::Guardrails;
use crate::permission::scope_matches;

/// Default session time-to-live: one hour.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Default role label for new agents.
pub const DEFAULT_ROLE: &str = "worker";

/// How a session's expiry moves once the session has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Expiry is set to `start + ttl` and never refreshed.
    #[default]
    FixedAtStart,

    /// Every granted or approved guarded call pushes expiry to `now + ttl`.
    SlidingOnUse,
}

/// Sessions open on one agent and their shared expiry.
///
/// Overlapping sessions (nested, or concurrent requests for the same
/// agent) share one expiry, which is cleared when the last one ends.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    active: usize,
    expires_at: Option<DateTime<Utc>>,
}

/// A named principal with a set of granted permission scopes.
///
/// Agents are shared as `Arc<Agent>`. Scopes can be granted and revoked at
/// runtime; checks always read the live set.
///
/// # Example
///
/// ```rust
/// use agentsudo_core::Agent;
///
/// let agent = Agent::new("SupportBot", ["read:orders", "write:refunds"]);
/// assert!(agent.has_scope("read:orders"));
/// assert!(!agent.has_scope("delete:customer"));
///
/// let _session = agent.enter_session();
/// assert!(agent.session_expires_at().is_some());
/// ```
pub struct Agent {
    id: String,
    name: String,
    role: String,
    scopes: RwLock<HashSet<String>>,
    session_ttl: Duration,
    expiry_policy: ExpiryPolicy,
    session: Mutex<SessionState>,
    guardrails: Option<Guardrails>,
}

impl Agent {
    /// Create an agent with the default role and session TTL.
    pub fn new<I, S>(name: impl Into<String>, scopes: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(name).scopes(scopes).build()
    }

    /// Start configuring an agent.
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Process-unique identifier assigned at construction.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role label (defaults to `"worker"`).
    pub fn role(&self) -> &str {
        &self.role
    }

    /// How long a session lasts once started.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Expiry refresh policy for this agent's sessions.
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry_policy
    }

    /// Guardrails attached to this agent, if any.
    pub fn guardrails(&self) -> Option<&Guardrails> {
        self.guardrails.as_ref()
    }

    /// Check whether the agent's live scope set satisfies `required`.
    ///
    /// Granted scopes may be glob patterns (`write:*`).
    pub fn has_scope(&self, required: &str) -> bool {
        scope_matches(&self.scopes.read(), required)
    }

    /// Sorted snapshot of the granted scopes.
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.scopes.read().iter().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Grant an additional scope. Returns false if it was already granted.
    pub fn grant_scope(&self, scope: impl Into<String>) -> bool {
        self.scopes.write().insert(scope.into())
    }

    /// Revoke a scope. Returns false if it was not granted.
    ///
    /// Only the exact pattern string is removed; revoking `write:db` does
    /// not affect a `write:*` grant.
    pub fn revoke_scope(&self, scope: &str) -> bool {
        self.scopes.write().remove(scope)
    }

    /// When the active session expires, or `None` outside a session.
    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.lock().expires_at
    }

    /// Number of sessions currently open on this agent, on any thread.
    pub fn active_sessions(&self) -> usize {
        self.session.lock().active
    }

    /// True when a session is active and its expiry has passed.
    pub fn is_session_expired(&self) -> bool {
        matches!(self.session_expires_at(), Some(expires_at) if Utc::now() > expires_at)
    }

    /// Create a session bound to this agent.
    ///
    /// Nothing changes until the session is entered.
    pub fn start_session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    /// Start a session and enter it immediately.
    ///
    /// The returned guard ends the session when dropped.
    pub fn enter_session(self: &Arc<Self>) -> SessionGuard {
        self.start_session().enter()
    }

    /// Run a future with this agent as the current agent.
    ///
    /// The binding follows the future across awaits and worker threads and
    /// is invisible to other tasks.
    pub async fn run_in_session<F: Future>(self: &Arc<Self>, future: F) -> F::Output {
        scope(Arc::clone(self), future).await
    }

    /// Open a session: count it and set expiry to `now + ttl`.
    pub(crate) fn begin_session(&self) {
        let mut session = self.session.lock();
        session.active += 1;
        session.expires_at = expiry_from_now(self.session_ttl);
    }

    /// Close a session. The last one to close clears the expiry.
    pub(crate) fn end_session(&self) {
        let mut session = self.session.lock();
        session.active = session.active.saturating_sub(1);
        if session.active == 0 {
            session.expires_at = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn set_session_expiry(&self, expires_at: Option<DateTime<Utc>>) {
        self.session.lock().expires_at = expires_at;
    }

    /// Push expiry forward after a successful call, for sliding sessions.
    pub(crate) fn touch_session(&self) {
        if self.expiry_policy != ExpiryPolicy::SlidingOnUse {
            return;
        }
        let mut session = self.session.lock();
        if session.expires_at.is_some() {
            session.expires_at = expiry_from_now(self.session_ttl);
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("scopes", &self.scopes())
            .field("session_ttl", &self.session_ttl)
            .field("session_expires_at", &self.session_expires_at())
            .finish()
    }
}

/// `now + ttl`, or `None` if that instant is not representable.
pub(crate) fn expiry_from_now(ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
}

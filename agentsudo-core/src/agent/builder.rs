//! AgentBuilder for fluent agent construction

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::{Agent, ExpiryPolicy, SessionState, DEFAULT_ROLE, DEFAULT_SESSION_TTL};
use crate::guardrails::Guardrails;

/// Builder for creating an [`Agent`] with fluent configuration
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use agentsudo_core::{Agent, ExpiryPolicy};
///
/// let agent = Agent::builder("RefundBot")
///     .scopes(["read:orders", "write:refunds"])
///     .role("support")
///     .session_ttl(Duration::from_secs(300))
///     .expiry_policy(ExpiryPolicy::SlidingOnUse)
///     .build();
///
/// assert_eq!(agent.role(), "support");
/// ```
pub struct AgentBuilder {
    name: String,
    role: String,
    scopes: HashSet<String>,
    session_ttl: Duration,
    expiry_policy: ExpiryPolicy,
    guardrails: Option<Guardrails>,
}

impl AgentBuilder {
    /// Create a builder for an agent with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: DEFAULT_ROLE.to_string(),
            scopes: HashSet::new(),
            session_ttl: DEFAULT_SESSION_TTL,
            expiry_policy: ExpiryPolicy::default(),
            guardrails: None,
        }
    }

    /// Add granted scopes. Duplicates collapse.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Add a single granted scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Set the role label.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set how long sessions last. Default: one hour.
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the expiry refresh policy. Default: [`ExpiryPolicy::FixedAtStart`].
    pub fn expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.expiry_policy = policy;
        self
    }

    /// Attach input/output guardrails.
    pub fn guardrails(mut self, guardrails: Guardrails) -> Self {
        self.guardrails = Some(guardrails);
        self
    }

    /// Build the agent, assigning it a fresh identifier.
    pub fn build(self) -> Arc<Agent> {
        Arc::new(Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            role: self.role,
            scopes: RwLock::new(self.scopes),
            session_ttl: self.session_ttl,
            expiry_policy: self.expiry_policy,
            session: Mutex::new(SessionState::default()),
            guardrails: self.guardrails,
        })
    }
}

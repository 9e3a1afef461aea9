//! Human-in-the-loop approval for denied calls.
//!
//! An [`ApprovalBroker`] turns a scope denial into a question for a person.
//! It hands an [`ApprovalRequest`] to an [`ApprovalNotifier`] (a chat
//! message, a ticket, a dashboard entry) and then blocks the denied call
//! until someone answers through [`ApprovalBroker::resolve`] or the timeout
//! passes. The transport is not part of this crate; the notifier only has
//! to deliver the request id to whoever will answer.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use agentsudo_core::approval::{ApprovalBroker, ApprovalError, ApprovalRequest};
//! use agentsudo_core::{Agent, DenialPolicy, Guard};
//!
//! let broker = ApprovalBroker::new(|request: &ApprovalRequest| -> Result<(), ApprovalError> {
//!     println!("{} wants {} (id {})", request.agent_name, request.scope, request.id);
//!     Ok(())
//! })
//! .with_timeout(Duration::from_millis(50));
//!
//! let delete = Guard::new("delete:customer").on_deny(DenialPolicy::Callback(broker.callback()));
//!
//! let bot = Agent::new("SupportBot", ["read:customer"]);
//! let _session = bot.enter_session();
//!
//! // Nobody answers, so the request times out and is denied
//! assert!(delete.invoke(|| ()).unwrap_err().is_callback_rejected());
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::agent::Agent;
use crate::permission::{ApprovalCallback, CallContext};

/// How long a request waits for an answer by default: five minutes.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors from an approval request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    /// Nobody answered in time and the broker is set to report it.
    #[error("Approval request {id} timed out after {} seconds", .timeout.as_secs())]
    Timeout { id: String, timeout: Duration },

    /// The notifier could not deliver the request.
    #[error("approval transport failed: {0}")]
    Transport(String),
}

/// What an unanswered request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutBehavior {
    /// Treat silence as a denial (default).
    #[default]
    Deny,
    /// Return [`ApprovalError::Timeout`] from [`ApprovalBroker::request_approval`].
    Error,
}

/// A pending question for a human approver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalRequest {
    /// Short id the answer must quote
    pub id: String,
    pub agent_name: String,
    pub agent_id: String,
    /// Scope the agent is missing
    pub scope: String,
    /// Guarded operation waiting on the answer
    pub operation: String,
    /// Arguments of the waiting call
    pub arguments: serde_json::Value,
    /// How long the request stays open
    pub timeout: Duration,
}

/// Delivers approval requests to a human.
pub trait ApprovalNotifier: Send + Sync {
    fn notify(&self, request: &ApprovalRequest) -> Result<(), ApprovalError>;
}

impl<F> ApprovalNotifier for F
where
    F: Fn(&ApprovalRequest) -> Result<(), ApprovalError> + Send + Sync,
{
    fn notify(&self, request: &ApprovalRequest) -> Result<(), ApprovalError> {
        self(request)
    }
}

#[derive(Default)]
struct Pending {
    answers: Mutex<HashMap<String, Option<bool>>>,
    answered: Condvar,
}

/// Routes denied calls to a human and waits for the answer.
///
/// Cloning is cheap; clones share the same pending requests, so the clone
/// handed to a webhook handler can resolve requests raised elsewhere.
#[derive(Clone)]
pub struct ApprovalBroker {
    notifier: Arc<dyn ApprovalNotifier>,
    timeout: Duration,
    on_timeout: TimeoutBehavior,
    pending: Arc<Pending>,
}

impl ApprovalBroker {
    pub fn new(notifier: impl ApprovalNotifier + 'static) -> Self {
        Self {
            notifier: Arc::new(notifier),
            timeout: DEFAULT_APPROVAL_TIMEOUT,
            on_timeout: TimeoutBehavior::default(),
            pending: Arc::new(Pending::default()),
        }
    }

    /// How long each request waits for an answer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// What an unanswered request resolves to.
    pub fn on_timeout(mut self, behavior: TimeoutBehavior) -> Self {
        self.on_timeout = behavior;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask for approval and block until answered or timed out.
    pub fn request_approval(
        &self,
        agent: &Agent,
        scope: &str,
        context: &CallContext,
    ) -> Result<bool, ApprovalError> {
        let id = new_request_id();
        let request = ApprovalRequest {
            id: id.clone(),
            agent_name: agent.name().to_string(),
            agent_id: agent.id().to_string(),
            scope: scope.to_string(),
            operation: context.operation.clone(),
            arguments: context.arguments.clone(),
            timeout: self.timeout,
        };

        // Registered before notifying so an immediate answer is not lost.
        self.pending.answers.lock().insert(id.clone(), None);

        if let Err(e) = self.notifier.notify(&request) {
            self.pending.answers.lock().remove(&id);
            tracing::error!(approval_id = %id, error = %e, "approval request failed");
            return Err(e);
        }
        tracing::info!(
            approval_id = %id,
            agent_name = %request.agent_name,
            scope,
            operation = %request.operation,
            "approval requested"
        );

        if let Some(approved) = self.wait_for(&id) {
            return Ok(approved);
        }

        tracing::warn!(
            approval_id = %id,
            timeout_secs = self.timeout.as_secs(),
            "approval timed out"
        );
        match self.on_timeout {
            TimeoutBehavior::Deny => Ok(false),
            TimeoutBehavior::Error => Err(ApprovalError::Timeout {
                id,
                timeout: self.timeout,
            }),
        }
    }

    fn wait_for(&self, id: &str) -> Option<bool> {
        let deadline = Instant::now().checked_add(self.timeout);
        let mut answers = self.pending.answers.lock();

        loop {
            if let Some(Some(approved)) = answers.get(id) {
                let approved = *approved;
                answers.remove(id);
                return Some(approved);
            }

            let timed_out = match deadline {
                Some(deadline) => self
                    .pending
                    .answered
                    .wait_until(&mut answers, deadline)
                    .timed_out(),
                None => {
                    self.pending.answered.wait(&mut answers);
                    false
                }
            };

            if timed_out {
                // An answer may have landed right at the deadline.
                return answers.remove(id).flatten();
            }
        }
    }

    /// Answer a pending request. Returns false if the id is unknown or
    /// the request already expired.
    pub fn resolve(&self, id: &str, approved: bool) -> bool {
        let mut answers = self.pending.answers.lock();
        let Some(slot) = answers.get_mut(id) else {
            tracing::warn!(approval_id = %id, "approval not found (may have expired)");
            return false;
        };

        *slot = Some(approved);
        self.pending.answered.notify_all();
        tracing::info!(
            approval_id = %id,
            approved,
            "approval {}",
            if approved { "approved" } else { "denied" }
        );
        true
    }

    pub fn approve(&self, id: &str) -> bool {
        self.resolve(id, true)
    }

    pub fn deny(&self, id: &str) -> bool {
        self.resolve(id, false)
    }

    /// Ids of requests still waiting for an answer, sorted.
    pub fn pending(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .pending
            .answers
            .lock()
            .iter()
            .filter(|(_, answer)| answer.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// The broker as an approval callback.
    ///
    /// Transport failures and timeouts both count as a denial.
    pub fn callback(&self) -> ApprovalCallback {
        let broker = self.clone();
        Arc::new(move |agent: &Agent, scope: &str, context: &CallContext| {
            broker
                .request_approval(agent, scope, context)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "approval treated as denied");
                    false
                })
        })
    }
}

impl std::fmt::Debug for ApprovalBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalBroker")
            .field("timeout", &self.timeout)
            .field("on_timeout", &self.on_timeout)
            .field("pending", &self.pending().len())
            .finish()
    }
}

fn new_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

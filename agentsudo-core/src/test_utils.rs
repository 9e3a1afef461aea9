//! Test utilities for agentsudo-core.
//!
//! Recording stand-ins for the telemetry sink and the approval callback, so
//! tests can assert on decisions without a collector or a human approver.
//!
//! Enable with the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! agentsudo-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use agentsudo_core::events::DecisionKind;
//! use agentsudo_core::test_utils::MemorySink;
//! use agentsudo_core::{Agent, Guard};
//!
//! let sink = MemorySink::new();
//! let guard = Guard::new("read:db").with_sink(Arc::new(sink.clone()));
//!
//! let agent = Agent::new("Analyst", ["read:db"]);
//! let _session = agent.enter_session();
//! guard.invoke(|| "rows").unwrap();
//!
//! assert_eq!(sink.count(DecisionKind::AccessGranted), 1);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::agent::Agent;
use crate::events::{DecisionEvent, DecisionKind};
use crate::permission::{ApprovalCallback, CallContext};
use crate::telemetry::TelemetrySink;

/// Collects decision events in memory for verification in tests.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<DecisionEvent>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<DecisionEvent> {
        self.events.lock().clone()
    }

    /// Kinds of all recorded events, oldest first.
    pub fn kinds(&self) -> Vec<DecisionKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Count events of one kind.
    pub fn count(&self, kind: DecisionKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: &DecisionEvent) {
        self.events.lock().push(event.clone());
    }
}

/// One invocation seen by a [`MockApprover`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalCall {
    pub agent_name: String,
    pub scope: String,
    pub context: CallContext,
}

/// An approval callback with a fixed answer that remembers its calls.
///
/// ```rust
/// use agentsudo_core::test_utils::MockApprover;
/// use agentsudo_core::{Agent, DenialPolicy, Guard};
///
/// let approver = MockApprover::denying();
/// let guard = Guard::new("write:db").on_deny(DenialPolicy::Callback(approver.callback()));
///
/// let agent = Agent::new("Analyst", ["read:db"]);
/// let _session = agent.enter_session();
/// assert!(guard.invoke(|| ()).is_err());
/// assert_eq!(approver.call_count(), 1);
/// ```
#[derive(Clone)]
pub struct MockApprover {
    answer: bool,
    calls: Arc<Mutex<Vec<ApprovalCall>>>,
}

impl MockApprover {
    /// An approver that always says yes.
    pub fn approving() -> Self {
        Self::answering(true)
    }

    /// An approver that always says no.
    pub fn denying() -> Self {
        Self::answering(false)
    }

    fn answering(answer: bool) -> Self {
        Self {
            answer,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The approver as a callback for [`DenialPolicy::Callback`](crate::DenialPolicy::Callback).
    pub fn callback(&self) -> ApprovalCallback {
        let this = self.clone();
        Arc::new(move |agent: &Agent, scope: &str, context: &CallContext| {
            this.calls.lock().push(ApprovalCall {
                agent_name: agent.name().to_string(),
                scope: scope.to_string(),
                context: context.clone(),
            });
            this.answer
        })
    }

    /// Every call seen so far.
    pub fn calls(&self) -> Vec<ApprovalCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

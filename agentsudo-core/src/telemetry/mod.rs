//! Forwarding decision events to a telemetry sink.
//!
//! Every authorization decision is logged through `tracing` and then handed
//! to a [`TelemetrySink`]. Sinks are best-effort: they cannot fail the
//! decision and nothing they do reaches the caller of a guarded operation.
//!
//! A guard uses its own sink when one is configured and otherwise falls back
//! to the process-wide sink set with [`install`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use agentsudo_core::events::DecisionEvent;
//! use agentsudo_core::telemetry::{self, TelemetrySink};
//!
//! let sink: Arc<dyn TelemetrySink> = Arc::new(|event: &DecisionEvent| {
//!     println!("{} {} {}", event.agent_name, event.kind, event.required_scope);
//! });
//! telemetry::install(sink);
//! # telemetry::uninstall();
//! ```

mod http;

pub use http::{HttpTelemetrySink, TelemetryError};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{log_decision, DecisionEvent};

/// Receiver of decision events.
pub trait TelemetrySink: Send + Sync {
    /// Accept one event. Must not block for long. A panic is caught and
    /// logged, and the event is dropped.
    fn record(&self, event: &DecisionEvent);
}

/// Blanket implementation for closures
impl<F> TelemetrySink for F
where
    F: Fn(&DecisionEvent) + Send + Sync,
{
    fn record(&self, event: &DecisionEvent) {
        self(event)
    }
}

static INSTALLED: RwLock<Option<Arc<dyn TelemetrySink>>> = parking_lot::const_rwlock(None);

/// Set the process-wide sink, replacing any previous one.
pub fn install(sink: Arc<dyn TelemetrySink>) -> Option<Arc<dyn TelemetrySink>> {
    INSTALLED.write().replace(sink)
}

/// Remove the process-wide sink, returning it.
pub fn uninstall() -> Option<Arc<dyn TelemetrySink>> {
    INSTALLED.write().take()
}

/// The process-wide sink, if one is installed.
pub fn installed() -> Option<Arc<dyn TelemetrySink>> {
    INSTALLED.read().clone()
}

/// Log a decision and forward it to `sink` or the installed sink.
pub(crate) fn emit(sink: Option<&Arc<dyn TelemetrySink>>, event: DecisionEvent) {
    log_decision(&event);

    let target = match sink {
        Some(sink) => Some(Arc::clone(sink)),
        None => installed(),
    };
    if let Some(target) = target {
        if catch_unwind(AssertUnwindSafe(|| target.record(&event))).is_err() {
            tracing::debug!(
                target: "agentsudo::telemetry",
                action = event.kind.as_str(),
                operation = %event.operation,
                "telemetry sink panicked; event dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DecisionKind;
    use crate::test_utils::MemorySink;
    use crate::Agent;

    #[test]
    fn test_emit_prefers_explicit_sink() {
        let explicit = MemorySink::new();
        let sink: Arc<dyn TelemetrySink> = Arc::new(explicit.clone());
        let agent = Agent::new("Bot", ["read:db"]);

        emit(
            Some(&sink),
            DecisionEvent::new(&agent, "read:db", "explicit_sink_op", DecisionKind::AccessGranted),
        );

        let events = explicit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].operation, "explicit_sink_op");
    }

    #[test]
    fn test_install_and_uninstall() {
        let global = MemorySink::new();
        install(Arc::new(global.clone()));
        assert!(installed().is_some());

        let agent = Agent::new("Bot", ["read:db"]);
        emit(
            None,
            DecisionEvent::new(&agent, "read:db", "installed_sink_op", DecisionKind::AccessGranted),
        );

        uninstall();

        // Other tests may emit through the global sink concurrently
        assert!(global
            .events()
            .iter()
            .any(|e| e.operation == "installed_sink_op"));
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink: Arc<dyn TelemetrySink> =
            Arc::new(|_: &DecisionEvent| panic!("collector down"));
        let agent = Agent::new("Bot", ["read:db"]);

        emit(
            Some(&sink),
            DecisionEvent::new(&agent, "read:db", "panicking_sink_op", DecisionKind::AccessGranted),
        );
    }

    #[test]
    fn test_closure_sink() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let sink = move |_: &DecisionEvent| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        };

        let agent = Agent::new("Bot", Vec::<String>::new());
        sink.record(&DecisionEvent::new(&agent, "x", "y", DecisionKind::AccessDenied));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

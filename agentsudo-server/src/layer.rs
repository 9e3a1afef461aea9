//! Request middleware: agent sessions and per-route scope requirements.

use std::fmt;
use std::sync::Arc;

use agentsudo_core::{DenialPolicy, Guard};
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::json;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::ServerError;
use crate::extract::CurrentAgent;
use crate::registry::AgentLookup;

/// Header carrying the agent id unless configured otherwise.
pub const DEFAULT_AGENT_HEADER: &str = "X-Agent-ID";

/// What to do with a request that carries no agent header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingAgentPolicy {
    /// Answer 401 (default).
    #[default]
    Reject,
    /// Log a warning and handle the request without an agent.
    Log,
    /// Handle the request without an agent.
    Allow,
}

/// Runs each request inside a session for the agent named by a header.
///
/// Requests naming an unknown agent are always rejected with 401.
///
/// # Example
///
/// ```rust
/// use agentsudo_core::Agent;
/// use agentsudo_server::{AgentRegistry, AgentSessionLayer, MissingAgentPolicy};
/// use axum::{routing::get, Router};
///
/// let registry = AgentRegistry::new();
/// registry.register_as("reader-001", Agent::new("ReaderBot", ["read:weather"]));
///
/// let app: Router = AgentSessionLayer::new(registry)
///     .on_missing_agent(MissingAgentPolicy::Reject)
///     .apply(Router::new().route("/health", get(|| async { "ok" })));
/// ```
#[derive(Clone)]
pub struct AgentSessionLayer {
    header: String,
    lookup: Arc<dyn AgentLookup>,
    on_missing: MissingAgentPolicy,
}

impl AgentSessionLayer {
    /// Resolve agents through `lookup`, usually an
    /// [`AgentRegistry`](crate::AgentRegistry).
    pub fn new(lookup: impl AgentLookup + 'static) -> Self {
        Self {
            header: DEFAULT_AGENT_HEADER.to_string(),
            lookup: Arc::new(lookup),
            on_missing: MissingAgentPolicy::default(),
        }
    }

    /// Read the agent id from `header` instead of `X-Agent-ID`.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn on_missing_agent(mut self, policy: MissingAgentPolicy) -> Self {
        self.on_missing = policy;
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header
    }

    pub fn missing_agent_policy(&self) -> MissingAgentPolicy {
        self.on_missing
    }

    /// Wrap every route of `router` in the session middleware.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(
            Arc::new(self),
            session_middleware,
        ))
    }
}

impl fmt::Debug for AgentSessionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSessionLayer")
            .field("header", &self.header)
            .field("on_missing", &self.on_missing)
            .finish()
    }
}

async fn session_middleware(
    State(layer): State<Arc<AgentSessionLayer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let agent_id = match request.headers().get(&layer.header) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(id) if id.trim().is_empty() => None,
            Ok(id) => Some(id.trim().to_string()),
            Err(_) => {
                return ServerError::InvalidRequest(format!(
                    "{} header is not valid text",
                    layer.header
                ))
                .into_response()
            }
        },
    };

    let Some(agent_id) = agent_id else {
        match layer.on_missing {
            MissingAgentPolicy::Reject => {
                return ServerError::Unauthorized(format!(
                    "Missing required header: {}",
                    layer.header
                ))
                .into_response();
            }
            MissingAgentPolicy::Log => {
                tracing::warn!(
                    target: "agentsudo::server",
                    path = %request.uri().path(),
                    "request without agent header"
                );
            }
            MissingAgentPolicy::Allow => {}
        }
        return next.run(request).await;
    };

    let Some(agent) = layer.lookup.lookup(&agent_id) else {
        tracing::warn!(
            target: "agentsudo::server",
            agent_id = %agent_id,
            path = %request.uri().path(),
            "unknown agent"
        );
        return ServerError::Unauthorized(format!("Unknown agent: {agent_id}")).into_response();
    };

    request
        .extensions_mut()
        .insert(CurrentAgent(Arc::clone(&agent)));
    agentsudo_core::scope(agent, next.run(request)).await
}

/// Require `scope` for every route of `router`.
///
/// The check runs with the same denial policies as a [`Guard`]: no active
/// session answers 401, a blocked or rejected request answers 403, and the
/// audit-log policy lets the request through after recording the
/// violation. Approval callbacks see `{"endpoint", "method"}` as the call
/// arguments.
///
/// On a multi-threaded runtime an approval callback runs through
/// [`tokio::task::block_in_place`], so a broker waiting for an answer does
/// not stall other requests. On a current-thread runtime the callback
/// blocks the only thread: answers must then come from outside that
/// runtime, or the request waits out the broker timeout and is denied.
///
/// Apply [`AgentSessionLayer`] after this so the session wraps the check.
///
/// ```rust
/// use agentsudo_core::DenialPolicy;
/// use agentsudo_server::require_scope;
/// use axum::{routing::post, Router};
///
/// let refunds: Router = require_scope(
///     Router::new().route("/refunds", post(|| async { "processed" })),
///     "write:refunds",
///     DenialPolicy::Block,
/// );
/// ```
pub fn require_scope<S>(
    router: Router<S>,
    scope: impl Into<String>,
    policy: DenialPolicy,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    require_guard(router, Guard::new(scope).on_deny(policy))
}

/// [`require_scope`] with a preconfigured guard, for example one with its
/// own telemetry sink. The guard's operation name is replaced by the
/// request path.
pub fn require_guard<S>(router: Router<S>, guard: Guard) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(guard, scope_middleware))
}

async fn scope_middleware(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let endpoint = request.uri().path().to_string();
    let method = request.method().to_string();
    let arguments = json!({ "endpoint": endpoint, "method": method });

    let guard = guard.named(endpoint);
    let outcome = if blocks_for_approval(&guard) {
        // Stays on this thread, so the session frame is still visible.
        tokio::task::block_in_place(|| guard.authorize(arguments))
    } else {
        guard.authorize(arguments)
    };
    match outcome {
        Ok(_) => next.run(request).await,
        Err(denied) => ServerError::from(denied).into_response(),
    }
}

/// Approval callbacks may wait on a human; on a multi-threaded runtime the
/// worker is handed off first so other tasks keep running.
fn blocks_for_approval(guard: &Guard) -> bool {
    matches!(guard.policy(), DenialPolicy::Callback(_))
        && Handle::try_current()
            .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false)
}

#[cfg(test)]
#[path = "layer_tests.rs"]
mod tests;

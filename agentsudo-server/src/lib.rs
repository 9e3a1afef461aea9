//! axum integration for agentsudo.
//!
//! [`AgentSessionLayer`] reads an agent id from a request header, looks the
//! agent up and runs the rest of the request inside that agent's session,
//! so every [`Guard`](agentsudo_core::Guard) reached by the handler sees it.
//! [`require_scope`] adds a scope check in front of individual routes.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentsudo_core::{Agent, DenialPolicy};
//! use agentsudo_server::{require_scope, AgentRegistry, AgentSessionLayer, CurrentAgent};
//! use axum::{routing::{get, post}, Router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = AgentRegistry::new();
//! registry.register_as("reader-001", Agent::new("ReaderBot", ["read:weather"]));
//!
//! let refunds = require_scope(
//!     Router::new().route("/refunds", post(|agent: CurrentAgent| async move {
//!         format!("refund processed by {}", agent.name())
//!     })),
//!     "write:refunds",
//!     DenialPolicy::Block,
//! );
//!
//! let app = AgentSessionLayer::new(registry).apply(
//!     Router::new()
//!         .route("/health", get(|| async { "ok" }))
//!         .merge(refunds),
//! );
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod extract;
pub mod layer;
pub mod registry;

// Re-exports
pub use error::{ServerError, ServerResult};
pub use extract::{CurrentAgent, MaybeAgent};
pub use layer::{
    require_guard, require_scope, AgentSessionLayer, MissingAgentPolicy, DEFAULT_AGENT_HEADER,
};
pub use registry::{AgentLookup, AgentRegistry};

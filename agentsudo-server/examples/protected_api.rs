//! Protecting HTTP endpoints with agent scopes.
//!
//! Run with:
//! ```sh
//! cargo run -p agentsudo-server --example protected_api
//! ```
//!
//! Test with curl:
//! ```sh
//! # Without agent header (blocked)
//! curl http://localhost:3000/weather/tokyo
//!
//! # Reader: allowed for weather, blocked for refunds
//! curl -H "X-Agent-ID: reader-001" http://localhost:3000/weather/tokyo
//! curl -H "X-Agent-ID: reader-001" -X POST http://localhost:3000/refunds
//!
//! # Admin: allowed everywhere
//! curl -H "X-Agent-ID: admin-001" -X POST http://localhost:3000/refunds
//! ```

use agentsudo_core::{Agent, DenialPolicy};
use agentsudo_server::{require_scope, AgentRegistry, AgentSessionLayer, MaybeAgent};
use axum::{
    extract::Path,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

async fn weather(Path(city): Path<String>, MaybeAgent(agent): MaybeAgent) -> Json<Value> {
    Json(json!({
        "city": city,
        "weather": "Sunny",
        "temperature": 72,
        "agent": agent.map(|a| a.name().to_string()),
    }))
}

async fn refund(MaybeAgent(agent): MaybeAgent) -> Json<Value> {
    Json(json!({
        "status": "processed",
        "agent": agent.map(|a| a.name().to_string()),
    }))
}

async fn whoami(MaybeAgent(agent): MaybeAgent) -> Json<Value> {
    Json(match agent {
        Some(agent) => json!({
            "name": agent.name(),
            "id": agent.id(),
            "role": agent.role(),
            "scopes": agent.scopes(),
        }),
        None => json!({ "name": null }),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("agentsudo=info,tower_http=info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = AgentRegistry::new();
    registry.register_as(
        "reader-001",
        Agent::new("ReaderBot", ["read:weather", "read:data"]),
    );
    registry.register_as(
        "writer-001",
        Agent::new("WriterBot", ["read:*", "write:email"]),
    );
    registry.register_as("admin-001", Agent::new("AdminBot", ["read:*", "write:*"]));

    let weather_routes = require_scope(
        Router::new().route("/weather/:city", get(weather)),
        "read:weather",
        DenialPolicy::Block,
    );
    let refund_routes = require_scope(
        Router::new().route("/refunds", post(refund)),
        "write:refunds",
        DenialPolicy::Block,
    );

    let app = AgentSessionLayer::new(registry)
        .apply(
            Router::new()
                .route("/whoami", get(whoami))
                .merge(weather_routes)
                .merge(refund_routes),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    println!("Server running at http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}

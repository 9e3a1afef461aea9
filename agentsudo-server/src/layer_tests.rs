//! Tests for the session middleware.

use std::sync::Arc;

use agentsudo_core::Agent;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use tower::ServiceExt;

use crate::extract::{CurrentAgent, MaybeAgent};
use crate::layer::*;
use crate::registry::AgentRegistry;

async fn whoami(MaybeAgent(agent): MaybeAgent) -> String {
    agent.map(|a| a.name().to_string()).unwrap_or_default()
}

async fn ambient() -> String {
    agentsudo_core::current()
        .map(|a| a.name().to_string())
        .unwrap_or_default()
}

async fn strict(agent: CurrentAgent) -> String {
    agent.name().to_string()
}

fn registry() -> AgentRegistry {
    let registry = AgentRegistry::new();
    registry.register_as("reader-001", Agent::new("ReaderBot", ["read:weather"]));
    registry
}

fn app(layer: AgentSessionLayer) -> Router {
    layer.apply(
        Router::new()
            .route("/whoami", get(whoami))
            .route("/ambient", get(ambient))
            .route("/strict", get(strict)),
    )
}

fn request(uri: &str, agent_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(id) = agent_id {
        builder = builder.header(DEFAULT_AGENT_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

#[test]
fn test_defaults() {
    let layer = AgentSessionLayer::new(AgentRegistry::new());
    assert_eq!(layer.header_name(), "X-Agent-ID");
    assert_eq!(layer.missing_agent_policy(), MissingAgentPolicy::Reject);
}

#[tokio::test]
async fn test_missing_header_rejected() {
    let response = app(AgentSessionLayer::new(registry()))
        .oneshot(request("/whoami", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"], "Missing required header: X-Agent-ID");
}

#[tokio::test]
async fn test_missing_header_allowed() {
    for policy in [MissingAgentPolicy::Log, MissingAgentPolicy::Allow] {
        let layer = AgentSessionLayer::new(registry()).on_missing_agent(policy);
        let response = app(layer).oneshot(request("/whoami", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");
    }
}

#[tokio::test]
async fn test_unknown_agent_rejected_under_every_policy() {
    for policy in [
        MissingAgentPolicy::Reject,
        MissingAgentPolicy::Log,
        MissingAgentPolicy::Allow,
    ] {
        let layer = AgentSessionLayer::new(registry()).on_missing_agent(policy);
        let response = app(layer)
            .oneshot(request("/whoami", Some("ghost-7")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "Unknown agent: ghost-7");
    }
}

#[tokio::test]
async fn test_known_agent_in_extensions_and_session() {
    let router = app(AgentSessionLayer::new(registry()));

    let response = router
        .clone()
        .oneshot(request("/whoami", Some("reader-001")))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "ReaderBot");

    let response = router
        .oneshot(request("/ambient", Some("reader-001")))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "ReaderBot");
}

#[tokio::test]
async fn test_session_ends_with_request() {
    let registry = registry();
    let agent = registry.get("reader-001").unwrap();

    let response = app(AgentSessionLayer::new(registry))
        .oneshot(request("/ambient", Some("reader-001")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(agent.session_expires_at().is_none());
    assert!(agentsudo_core::current().is_none());
}

#[tokio::test]
async fn test_strict_extractor_rejects_without_agent() {
    let layer = AgentSessionLayer::new(registry()).on_missing_agent(MissingAgentPolicy::Allow);
    let response = app(layer).oneshot(request("/strict", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_custom_header() {
    let layer = AgentSessionLayer::new(registry()).header("X-Bot");
    let request = Request::builder()
        .uri("/whoami")
        .header("X-Bot", "reader-001")
        .body(Body::empty())
        .unwrap();

    let response = app(layer).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ReaderBot");
}

#[tokio::test]
async fn test_closure_lookup() {
    let admin = Agent::new("AdminBot", ["*"]);
    let layer = AgentSessionLayer::new(move |id: &str| -> Option<Arc<Agent>> {
        (id == "admin").then(|| Arc::clone(&admin))
    });

    let response = app(layer)
        .oneshot(request("/whoami", Some("admin")))
        .await
        .unwrap();

    assert_eq!(body_text(response).await, "AdminBot");
}

//! Integration tests for agentsudo-server.
//!
//! These tests verify the full header→session→scope check→handler flow.

use std::sync::Arc;
use std::time::Duration;

use agentsudo_core::test_utils::{MemorySink, MockApprover};
use agentsudo_core::{
    Agent, ApprovalBroker, ApprovalError, ApprovalRequest, DecisionKind, DenialPolicy, Guard,
    TelemetrySink,
};
use agentsudo_server::{
    require_guard, require_scope, AgentRegistry, AgentSessionLayer, CurrentAgent,
    MissingAgentPolicy,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceExt;

fn registry() -> AgentRegistry {
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
    registry
}

async fn weather(agent: CurrentAgent) -> String {
    format!("Sunny, served to {}", agent.name())
}

async fn refund(agent: CurrentAgent) -> String {
    format!("refund processed by {}", agent.name())
}

/// App with one guard per route, sending decisions to `sink`.
fn app(registry: AgentRegistry, policy: DenialPolicy, sink: &MemorySink) -> Router {
    let sink: Arc<dyn TelemetrySink> = Arc::new(sink.clone());
    let weather_routes = require_guard(
        Router::new().route("/weather/:city", get(weather)),
        Guard::new("read:weather").with_sink(sink.clone()),
    );
    let refund_routes = require_guard(
        Router::new().route("/refunds", post(refund)),
        Guard::new("write:refunds")
            .on_deny(policy)
            .with_sink(sink),
    );

    AgentSessionLayer::new(registry).apply(
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .merge(weather_routes)
            .merge(refund_routes),
    )
}

fn request(method: &str, uri: &str, agent_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = agent_id {
        builder = builder.header("X-Agent-ID", id);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

// ============================================================================
// Block policy
// ============================================================================

#[tokio::test]
async fn test_reader_can_read_weather() {
    let sink = MemorySink::new();
    let response = app(registry(), DenialPolicy::Block, &sink)
        .oneshot(request("GET", "/weather/tokyo", Some("reader-001")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "Sunny, served to ReaderBot");

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, DecisionKind::AccessGranted);
    assert_eq!(events[0].operation, "/weather/tokyo");
}

#[tokio::test]
async fn test_reader_blocked_from_refunds() {
    let sink = MemorySink::new();
    let response = app(registry(), DenialPolicy::Block, &sink)
        .oneshot(request("POST", "/refunds", Some("reader-001")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], 403);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("missing required scope: 'write:refunds'"));
    assert_eq!(sink.kinds(), vec![DecisionKind::AccessDenied]);
}

#[tokio::test]
async fn test_wildcard_admin_allowed() {
    let sink = MemorySink::new();
    let response = app(registry(), DenialPolicy::Block, &sink)
        .oneshot(request("POST", "/refunds", Some("admin-001")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "refund processed by AdminBot");
}

#[tokio::test]
async fn test_unguarded_route_needs_only_a_known_agent() {
    let sink = MemorySink::new();
    let router = app(registry(), DenialPolicy::Block, &sink);

    let ok = router
        .clone()
        .oneshot(request("GET", "/health", Some("writer-001")))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let missing = router
        .oneshot(request("GET", "/health", None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert!(sink.is_empty());
}

// ============================================================================
// No session
// ============================================================================

#[tokio::test]
async fn test_guarded_route_without_agent_is_unauthorized() {
    let router = AgentSessionLayer::new(registry())
        .on_missing_agent(MissingAgentPolicy::Allow)
        .apply(require_scope(
            Router::new().route("/data/:id", delete(|| async { "deleted" })),
            "delete:data",
            DenialPolicy::AuditLog,
        ));

    let response = router
        .oneshot(request("DELETE", "/data/42", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("requires an active agent session"));
}

// ============================================================================
// Audit log and callback policies
// ============================================================================

#[tokio::test]
async fn test_audit_policy_lets_request_through() {
    let sink = MemorySink::new();
    let response = app(registry(), DenialPolicy::AuditLog, &sink)
        .oneshot(request("POST", "/refunds", Some("writer-001")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "refund processed by WriterBot");

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, DecisionKind::AuditViolation);
    assert!(events[0].allowed);
}

#[tokio::test]
async fn test_callback_sees_endpoint_and_method() {
    let sink = MemorySink::new();
    let approver = MockApprover::approving();
    let response = app(
        registry(),
        DenialPolicy::Callback(approver.callback()),
        &sink,
    )
    .oneshot(request("POST", "/refunds", Some("reader-001")))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sink.kinds(), vec![DecisionKind::CallbackApproved]);

    let calls = approver.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].agent_name, "ReaderBot");
    assert_eq!(calls[0].scope, "write:refunds");
    assert_eq!(calls[0].context.operation, "/refunds");
    assert_eq!(
        calls[0].context.arguments,
        serde_json::json!({"endpoint": "/refunds", "method": "POST"})
    );
}

#[tokio::test]
async fn test_callback_rejection_is_forbidden() {
    let sink = MemorySink::new();
    let approver = MockApprover::denying();
    let response = app(
        registry(),
        DenialPolicy::Callback(approver.callback()),
        &sink,
    )
    .oneshot(request("POST", "/refunds", Some("reader-001")))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(
        body["error"],
        "Action rejected by approval policy: write:refunds"
    );
    assert_eq!(sink.kinds(), vec![DecisionKind::CallbackDenied]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_broker_answered_by_another_task() {
    let sink = MemorySink::new();
    let broker = ApprovalBroker::new(|_: &ApprovalRequest| -> Result<(), ApprovalError> { Ok(()) })
        .with_timeout(Duration::from_secs(10));

    let manager = broker.clone();
    let approver = tokio::spawn(async move {
        loop {
            if let Some(id) = manager.pending().first() {
                manager.approve(id);
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let router = app(registry(), DenialPolicy::Callback(broker.callback()), &sink);
    let started = std::time::Instant::now();
    let response = tokio::spawn(async move {
        router
            .oneshot(request("POST", "/refunds", Some("reader-001")))
            .await
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sink.kinds(), vec![DecisionKind::CallbackApproved]);
    approver.await.unwrap();
}

// ============================================================================
// Registry changes
// ============================================================================

#[tokio::test]
async fn test_removed_agent_becomes_unknown() {
    let registry = registry();
    let sink = MemorySink::new();
    let router = app(registry.clone(), DenialPolicy::Block, &sink);

    registry.remove("reader-001");

    let response = router
        .oneshot(request("GET", "/weather/oslo", Some("reader-001")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Unknown agent: reader-001");
}

#[tokio::test]
async fn test_live_grant_takes_effect_on_next_request() {
    let registry = registry();
    let sink = MemorySink::new();
    let router = app(registry.clone(), DenialPolicy::Block, &sink);

    let denied = router
        .clone()
        .oneshot(request("POST", "/refunds", Some("reader-001")))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    registry.get("reader-001").unwrap().grant_scope("write:refunds");

    let allowed = router
        .oneshot(request("POST", "/refunds", Some("reader-001")))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentsudo_core::{
    Agent, CallContext, Decision, DecisionKind, DenialPolicy, Guard, PermissionDenied,
};
use agentsudo_core::test_utils::MemorySink;
use common::{analyst, support_bot};
use serde_json::json;

// ===== End-to-end Scenarios =====

#[test]
fn test_analyst_cannot_write() {
    let sink = MemorySink::new();
    let write_database = Guard::new("write:db")
        .named("write_database")
        .with_sink(Arc::new(sink.clone()));

    let agent = analyst();
    let _session = agent.enter_session();

    let err = write_database.invoke(|| "written").unwrap_err();
    let message = err.to_string();

    assert!(matches!(err, PermissionDenied::ScopeDenied { .. }));
    assert!(message.contains("Analyst"));
    assert!(message.contains("write:db"));
    assert!(message.contains("[\"read:db\"]"));
    assert_eq!(sink.kinds(), vec![DecisionKind::AccessDenied]);
}

#[test]
fn test_analyst_can_read() {
    let read_database = Guard::new("read:db").named("read_database");
    let agent = analyst();
    let _session = agent.enter_session();

    let rows = read_database
        .invoke(|| vec![json!({"id": 1}), json!({"id": 2})])
        .unwrap();

    assert_eq!(rows, vec![json!({"id": 1}), json!({"id": 2})]);
}

#[test]
fn test_granted_scope_list_is_sorted() {
    let agent = Agent::new("Sorted", ["write:b", "read:a", "admin:c"]);
    let _session = agent.enter_session();

    let err = Guard::new("delete:d").invoke(|| ()).unwrap_err();
    match err {
        PermissionDenied::ScopeDenied { granted, target, .. } => {
            assert_eq!(granted, vec!["admin:c", "read:a", "write:b"]);
            assert!(target.is_none());
        }
        other => panic!("expected ScopeDenied, got {other:?}"),
    }
}

// ===== Session Checks Ignore Policy =====

#[test]
fn test_no_session_regardless_of_policy() {
    let approvals = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&approvals);

    let guards = [
        Guard::new("read:db"),
        Guard::new("read:db").on_deny(DenialPolicy::AuditLog),
        Guard::new("read:db").on_deny(DenialPolicy::callback(
            move |_: &Agent, _: &str, _: &CallContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            },
        )),
    ];

    for guard in &guards {
        let err = guard.invoke(|| ()).unwrap_err();
        assert!(err.is_no_session(), "{guard:?} allowed a call without a session");
    }
    assert_eq!(approvals.load(Ordering::SeqCst), 0);
}

#[test]
fn test_expired_session_even_with_scope() {
    let agent = Agent::builder("ShortLived")
        .scope("read:db")
        .session_ttl(Duration::from_millis(25))
        .build();
    let _session = agent.enter_session();

    assert!(Guard::new("read:db").invoke(|| ()).is_ok());
    std::thread::sleep(Duration::from_millis(75));

    let err = Guard::new("read:db").invoke(|| ()).unwrap_err();
    assert!(err.is_expired());
    assert!(agent.is_session_expired());
}

#[test]
fn test_new_session_after_expiry() {
    let agent = Agent::builder("ShortLived")
        .scope("read:db")
        .session_ttl(Duration::from_millis(25))
        .build();

    {
        let _session = agent.enter_session();
        std::thread::sleep(Duration::from_millis(75));
        assert!(Guard::new("read:db").invoke(|| ()).unwrap_err().is_expired());
    }

    let _fresh = agent.enter_session();
    assert!(Guard::new("read:db").invoke(|| ()).is_ok());
}

// ===== Denial Policies =====

#[test]
fn test_audit_log_emits_exactly_one_violation() {
    let sink = MemorySink::new();
    let delete_user = Guard::new("delete:users")
        .named("delete_user")
        .on_deny(DenialPolicy::AuditLog)
        .with_sink(Arc::new(sink.clone()));

    let agent = analyst();
    let _session = agent.enter_session();

    assert_eq!(delete_user.invoke(|| "deleted").unwrap(), "deleted");
    assert_eq!(sink.count(DecisionKind::AuditViolation), 1);
    assert_eq!(sink.events().len(), 1);

    let event = &sink.events()[0];
    assert_eq!(event.operation, "delete_user");
    assert_eq!(event.required_scope, "delete:users");
    assert!(event.allowed);
}

#[test]
fn test_callback_approves_small_refunds() {
    let sink = MemorySink::new();
    let refund = Guard::new("write:refunds")
        .named("issue_refund")
        .with_sink(Arc::new(sink.clone()))
        .on_deny(DenialPolicy::callback(
            |agent: &Agent, scope: &str, context: &CallContext| {
                assert_eq!(agent.name(), "Analyst");
                assert_eq!(scope, "write:refunds");
                assert_eq!(context.operation, "issue_refund");
                context.arguments["amount"].as_u64().is_some_and(|amount| amount <= 100)
            },
        ));

    let agent = analyst();
    let _session = agent.enter_session();
    let ran = AtomicUsize::new(0);

    let approved = refund
        .invoke_with_args(json!({"amount": 40}), || {
            ran.fetch_add(1, Ordering::SeqCst);
            "refunded"
        })
        .unwrap();
    assert_eq!(approved, "refunded");

    let err = refund
        .invoke_with_args(json!({"amount": 4000}), || {
            ran.fetch_add(1, Ordering::SeqCst);
            "refunded"
        })
        .unwrap_err();
    assert!(err.is_callback_rejected());
    assert_eq!(err.scope(), Some("write:refunds"));

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(
        sink.kinds(),
        vec![DecisionKind::CallbackApproved, DecisionKind::CallbackDenied]
    );
}

#[test]
fn test_authorize_reports_how_the_call_got_through() {
    let agent = support_bot();
    let _session = agent.enter_session();

    assert_eq!(
        Guard::new("read:orders").authorize(json!(null)).unwrap(),
        Decision::Granted
    );
    assert_eq!(
        Guard::new("delete:orders")
            .on_deny(DenialPolicy::AuditLog)
            .authorize(json!(null))
            .unwrap(),
        Decision::AuditAllowed
    );
    assert_eq!(
        Guard::new("delete:orders")
            .on_deny(DenialPolicy::callback(|_: &Agent, _: &str, _: &CallContext| true))
            .authorize(json!(null))
            .unwrap(),
        Decision::CallbackApproved
    );
}

// ===== Scope Changes and Wildcards =====

#[test]
fn test_scope_changes_apply_within_session() {
    let agent = support_bot();
    let _session = agent.enter_session();
    let delete = Guard::new("delete:customer");

    assert!(delete.invoke(|| ()).is_err());
    agent.grant_scope("delete:*");
    assert!(delete.invoke(|| ()).is_ok());
    agent.revoke_scope("delete:*");
    assert!(delete.invoke(|| ()).is_err());
}

#[test]
fn test_wildcard_grants() {
    let admin = Agent::new("Admin", ["*"]);
    let _session = admin.enter_session();

    for scope in ["read:db", "write:db", "delete:everything", "x"] {
        assert!(Guard::new(scope).invoke(|| ()).is_ok(), "{scope} denied");
    }
}

// ===== Concurrency =====

#[test]
fn test_threads_decide_with_their_own_agent() {
    let write = Guard::new("write:db");
    let barrier = Arc::new(std::sync::Barrier::new(2));

    let run = |agent: Arc<Agent>| {
        let write = write.clone();
        let barrier = Arc::clone(&barrier);
        std::thread::spawn(move || {
            let _session = agent.enter_session();
            barrier.wait();
            (0..20)
                .map(|_| write.invoke(|| ()).is_ok())
                .collect::<Vec<_>>()
        })
    };

    let writer = run(Agent::new("Writer", ["write:db"]));
    let reader = run(analyst());

    assert!(writer.join().unwrap().into_iter().all(|ok| ok));
    assert!(reader.join().unwrap().into_iter().all(|ok| !ok));
}

#[tokio::test]
async fn test_invoke_async() {
    let fetch = Guard::new("read:orders").named("fetch_order");
    let agent = support_bot();

    let order = agent
        .run_in_session(fetch.invoke_async(json!({"id": 17}), async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            "order #17"
        }))
        .await
        .unwrap();
    assert_eq!(order, "order #17");

    // Outside the session the same guard refuses
    let err = fetch.invoke_async(json!(null), async { "x" }).await.unwrap_err();
    assert!(err.is_no_session());
}

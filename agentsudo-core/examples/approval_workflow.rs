//! Approval Workflow Example
//!
//! Human-in-the-loop approval for high-risk actions. The support agent
//! lacks the dangerous scopes, so each denied call is posted to an
//! [`ApprovalBroker`] and waits while a simulated manager on another
//! thread answers.
//!
//! In production the notifier would post to a chat channel and the answer
//! would arrive through a webhook calling `broker.resolve(id, approved)`.
//!
//! Run with: cargo run --example approval_workflow

use std::sync::mpsc;
use std::time::Duration;

use agentsudo_core::approval::{ApprovalBroker, ApprovalError, ApprovalRequest};
use agentsudo_core::{Agent, CallContext, DenialPolicy, Guard};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("agentsudo=info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    // ===== Inline callback =====

    println!("--- Inline callback: refunds under $100 are auto-approved ---");
    let refund = Guard::new("refund:payments")
        .named("issue_refund")
        .on_deny(DenialPolicy::callback(
            |agent: &Agent, scope: &str, context: &CallContext| {
                let amount = context.arguments["amount"].as_f64().unwrap_or(f64::MAX);
                println!("  {} asks for {scope} (amount {amount})", agent.name());
                amount < 100.0
            },
        ));

    let support = Agent::new("SupportBot", ["read:orders", "read:customers"]);
    {
        let _session = support.enter_session();
        for amount in [25.0, 450.0] {
            match refund.invoke_with_args(json!({ "amount": amount }), || amount) {
                Ok(refunded) => println!("  refunded ${refunded}"),
                Err(e) => println!("  blocked: {e}"),
            }
        }
    }

    // ===== Broker with a remote approver =====

    println!("\n--- Broker: a manager answers each request ---");
    let (inbox, requests) = mpsc::channel::<(String, String)>();
    let broker = ApprovalBroker::new(move |request: &ApprovalRequest| -> Result<(), ApprovalError> {
        println!(
            "  [approvals] {} requests `{}` for {} ({})",
            request.agent_name, request.scope, request.operation, request.arguments
        );
        inbox
            .send((request.id.clone(), request.scope.clone()))
            .map_err(|e| ApprovalError::Transport(e.to_string()))
    })
    .with_timeout(Duration::from_secs(10));

    // The manager approves account deletions and refuses data exports.
    let manager = broker.clone();
    std::thread::spawn(move || {
        for (id, scope) in requests {
            std::thread::sleep(Duration::from_millis(200));
            let approved = scope == "delete:accounts";
            println!(
                "  [manager] {} request {id}",
                if approved { "approves" } else { "denies" }
            );
            manager.resolve(&id, approved);
        }
    });

    let delete_account = Guard::new("delete:accounts")
        .named("delete_account")
        .on_deny(DenialPolicy::Callback(broker.callback()));
    let export_data = Guard::new("export:customers")
        .named("export_customer_data")
        .on_deny(DenialPolicy::Callback(broker.callback()));

    let _session = support.enter_session();

    match delete_account.invoke_with_args(json!({ "account_id": "acct_42" }), || "acct_42") {
        Ok(id) => println!("  deleted {id}"),
        Err(e) => println!("  blocked: {e}"),
    }
    match export_data.invoke_with_args(json!({ "format": "csv" }), || "customers.csv") {
        Ok(file) => println!("  exported {file}"),
        Err(e) => println!("  blocked: {e}"),
    }

    Ok(())
}

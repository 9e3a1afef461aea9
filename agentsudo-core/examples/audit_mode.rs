//! Audit Mode Example
//!
//! Rolling out enforcement without breaking production traffic: guards on
//! the audit-log policy record violations but let the call through. A
//! closure sink tallies what would have been blocked.
//!
//! Run with: cargo run --example audit_mode

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agentsudo_core::telemetry::{self, TelemetrySink};
use agentsudo_core::{Agent, DecisionEvent, DecisionKind, DenialPolicy, Guard};

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("agentsudo=warn"))?;
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let violations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&violations);
    let sink: Arc<dyn TelemetrySink> = Arc::new(move |event: &DecisionEvent| {
        if event.kind == DecisionKind::AuditViolation {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });
    telemetry::install(sink);

    let export = Guard::new("export:customers")
        .named("export_customers")
        .on_deny(DenialPolicy::AuditLog);
    let purge = Guard::new("delete:logs")
        .named("purge_logs")
        .on_deny(DenialPolicy::AuditLog);

    let intern = Agent::new("InternBot", ["read:customers"]);
    let _session = intern.enter_session();

    for batch in 1..=3 {
        let rows = export.invoke(|| batch * 100)?;
        println!("exported {rows} rows");
    }
    purge.invoke(|| println!("purged logs"))?;

    println!(
        "\n{} calls would have been blocked under enforcement",
        violations.load(Ordering::Relaxed)
    );

    telemetry::uninstall();
    Ok(())
}

//! Cloud Telemetry Example
//!
//! Ships every permission decision to a hosted collector in batches.
//!
//! ```bash
//! export AGENTSUDO_API_KEY=as_your_key
//! # optional: export AGENTSUDO_ENDPOINT=http://localhost:8000
//! cargo run --example cloud_telemetry
//! ```
//!
//! Collector failures are logged and never change a decision, so the
//! example runs the same with the collector down.

use std::sync::Arc;

use agentsudo_core::telemetry;
use agentsudo_core::{Agent, DenialPolicy, Guard, HttpTelemetrySink, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("agentsudo=debug"))?;
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let config = TelemetryConfig::from_env()?;
    println!("sending events to {}", config.events_url());

    let sink = Arc::new(HttpTelemetrySink::spawn(config)?);
    telemetry::install(sink.clone());

    let read = Guard::new("read:reports").named("load_report");
    let publish = Guard::new("write:reports")
        .named("publish_report")
        .on_deny(DenialPolicy::AuditLog);
    let wipe = Guard::new("delete:reports").named("wipe_reports");

    let analyst = Agent::builder("ReportingAnalyst")
        .scopes(["read:reports"])
        .build();

    analyst
        .run_in_session(async {
            let report = read.invoke(|| "q3-summary")?;
            println!("loaded {report}");

            publish.invoke(|| println!("published {report} (audit mode)"))?;

            if let Err(e) = wipe.invoke(|| ()) {
                println!("blocked: {e}");
            }
            Ok::<_, agentsudo_core::PermissionDenied>(())
        })
        .await?;

    // Deliver whatever is still buffered before exiting.
    telemetry::uninstall();
    sink.shutdown().await?;
    Ok(())
}

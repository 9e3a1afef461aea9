//! Batched delivery of decision events to a hosted collector.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::TelemetrySink;
use crate::config::{ConfigError, TelemetryConfig};
use crate::events::DecisionEvent;

const SDK_USER_AGENT: &str = concat!("agentsudo-sdk/", env!("CARGO_PKG_VERSION"));

/// Errors from the HTTP telemetry sink.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("telemetry sink must be started inside a tokio runtime")]
    NoRuntime,

    #[error("telemetry worker has stopped")]
    Closed,
}

enum Command {
    Event(DecisionEvent),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// A [`TelemetrySink`] that ships events to `{endpoint}/api/events`.
///
/// `record` never blocks: events go onto a channel drained by a background
/// task, which POSTs them as a JSON array once `batch_size` events are
/// queued or `flush_interval` has passed. Delivery failures are logged at
/// debug level and the batch is dropped.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use agentsudo_core::telemetry::{self, HttpTelemetrySink};
/// use agentsudo_core::TelemetryConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = Arc::new(HttpTelemetrySink::spawn(TelemetryConfig::from_env()?)?);
/// telemetry::install(sink.clone());
///
/// // ... guarded work ...
///
/// sink.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpTelemetrySink {
    tx: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HttpTelemetrySink {
    /// Validate `config` and start the delivery task on the current runtime.
    pub fn spawn(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TelemetryError::NoRuntime)?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            client,
            url: config.events_url(),
            api_key: config.api_key().to_string(),
            batch_size: config.batch_size(),
            batch: Vec::with_capacity(config.batch_size()),
        };
        let handle = runtime.spawn(worker.run(rx, config.flush_interval()));

        tracing::info!(endpoint = %config.endpoint(), "telemetry enabled");

        Ok(Self {
            tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Send everything queued so far and wait for the attempt to finish.
    pub async fn flush(&self) -> Result<(), TelemetryError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack))
            .map_err(|_| TelemetryError::Closed)?;
        done.await.map_err(|_| TelemetryError::Closed)
    }

    /// Send everything queued and stop the worker.
    ///
    /// Events recorded afterwards are discarded.
    pub async fn shutdown(&self) -> Result<(), TelemetryError> {
        let (ack, done) = oneshot::channel();
        let sent = self.tx.send(Command::Shutdown(ack)).is_ok();
        if sent {
            let _ = done.await;
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("telemetry disabled");
        Ok(())
    }
}

impl TelemetrySink for HttpTelemetrySink {
    fn record(&self, event: &DecisionEvent) {
        if self.tx.send(Command::Event(event.clone())).is_err() {
            tracing::debug!("telemetry worker stopped; event dropped");
        }
    }
}

impl std::fmt::Debug for HttpTelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTelemetrySink")
            .field("running", &!self.tx.is_closed())
            .finish()
    }
}

struct Worker {
    client: reqwest::Client,
    url: String,
    api_key: String,
    batch_size: usize,
    batch: Vec<DecisionEvent>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>, flush_interval: Duration) {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Event(event)) => {
                        self.batch.push(event);
                        if self.batch.len() >= self.batch_size {
                            self.send().await;
                            ticker.reset();
                        }
                    }
                    Some(Command::Flush(ack)) => {
                        self.send().await;
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.send().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.send().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.send().await,
            }
        }
    }

    async fn send(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.batch);

        let result = self
            .client
            .post(&self.url)
            .header("X-API-Key", &self.api_key)
            .json(&batch)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(count = batch.len(), "telemetry batch sent");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "telemetry batch rejected");
            }
            Err(e) => {
                tracing::debug!(error = %e, count = batch.len(), "telemetry batch dropped");
            }
        }
    }
}

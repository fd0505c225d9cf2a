//! Brunata to InfluxDB2 Forwarder
//!
//! Signs in to the Brunata metering portal, polls the latest consumption
//! values on a fixed interval and forwards them to InfluxDB2. Without an
//! InfluxDB configuration the values are only logged.
//!
//! # Features
//!
//! - Automatic restart of the polling task if it panics
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Backoff through a circuit breaker when the provider keeps failing
//! - Last-known values are kept across failed cycles

mod brunata;
mod circuit_breaker;
mod clock;
mod config;
mod coordinator;
mod error;
mod influxdb;
mod model;


use crate::brunata::{AuthSession, ConsumptionFetcher, HttpGateway, ReqwestGateway};
use crate::circuit_breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::config::{BrunataConfig, CollectorConfig, InfluxConfig};
use crate::coordinator::{CoordinatorOptions, PollingCoordinator};
use crate::error::{ConfigError, RefreshCause};
use crate::model::{ConsumptionSnapshot, SnapshotSink};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal::ctrl_c;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tokio::time::{self, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_app_config().context("Failed to load AppConfig")?;
    tracing_subscriber::fmt()
        .with_max_level(app_config.log_level())
        .init();

    let brunata_config = config::load_brunata_config().context("Failed to load BrunataConfig")?;
    let collector_config =
        config::load_collector_config().context("Failed to load CollectorConfig")?;
    let circuit_breaker_config =
        config::load_circuit_breaker_config().context("Failed to load CircuitBreakerConfig")?;
    let influx_config = config::load_influx_config().context("Failed to load InfluxConfig")?;

    let http_client = ReqwestGateway::shared_client(brunata_config.request_timeout())
        .context("Failed to build HTTP client")?;
    let gateway: Arc<dyn HttpGateway> = Arc::new(ReqwestGateway::new(http_client));
    let coordinator = Arc::new(build_coordinator(
        &brunata_config,
        &collector_config,
        gateway,
        Arc::new(SystemClock),
    )?);
    let sink = build_sink(influx_config);

    if !coordinator.validate_credentials().await {
        anyhow::bail!(
            "Could not sign in to Brunata as {}; check BRUNATA_USERNAME and BRUNATA_PASSWORD",
            brunata_config.username
        );
    }

    let state = Arc::new(Mutex::new(PollState::new(CircuitBreaker::new(
        "brunata",
        circuit_breaker_config,
    ))));
    let interval = collector_config.interval();
    let create_poll_task = || -> tokio::task::JoinHandle<()> {
        tokio::spawn(poll_loop(
            Arc::clone(&coordinator),
            Arc::clone(&sink),
            Arc::clone(&state),
            interval,
        ))
    };
    let mut poll_task = create_poll_task();

    let mut sig_term =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    tracing::info!("Running... Press Ctrl-C or send SIGTERM to terminate.");
    loop {
        tokio::select! {
            _ = sig_term.recv() => {
                tracing::info!("Received SIGTERM. Exiting...");
                break;
            }
            _ = ctrl_c() => {
                tracing::info!("Received SIGINT. Exiting...");
                break;
            }
            result = &mut poll_task => {
                if !handle_task_result("poll", result) {
                    anyhow::bail!("Polling stopped because Brunata rejected the credentials");
                }
                poll_task = create_poll_task();
            }
        }
    }
    Ok(())
}

fn build_coordinator(
    brunata: &BrunataConfig,
    collector: &CollectorConfig,
    gateway: Arc<dyn HttpGateway>,
    clock: Arc<dyn Clock>,
) -> Result<PollingCoordinator, ConfigError> {
    let endpoints = brunata.endpoints()?;
    let auth = AuthSession::new(
        Arc::clone(&gateway),
        endpoints.clone(),
        brunata.credentials(),
        Arc::clone(&clock),
    );
    let fetcher = ConsumptionFetcher::new(gateway, endpoints, clock);
    let options = CoordinatorOptions {
        mapping: brunata.metric_mapping()?,
        tie_break: brunata.tie_break()?,
        cycle_timeout: collector.cycle_timeout(),
    };
    Ok(PollingCoordinator::new(auth, fetcher, options))
}

fn build_sink(influx_config: Option<InfluxConfig>) -> Arc<dyn SnapshotSink> {
    match influx_config {
        Some(config) => {
            tracing::info!(url = %config.url, bucket = %config.bucket, "Forwarding to InfluxDB");
            Arc::new(influxdb::InfluxSink::new(config))
        }
        None => {
            tracing::info!("INFLUXDB_URL is not set, values are only logged");
            Arc::new(influxdb::LogSink)
        }
    }
}

/// State that outlives a restarted polling task.
struct PollState {
    breaker: CircuitBreaker,
    last_snapshot: Option<ConsumptionSnapshot>,
}

impl PollState {
    fn new(breaker: CircuitBreaker) -> Self {
        Self {
            breaker,
            last_snapshot: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    Published,
    Skipped,
    Failed,
    Stop,
}

/// Polls until the credentials are rejected.
async fn poll_loop(
    coordinator: Arc<PollingCoordinator>,
    sink: Arc<dyn SnapshotSink>,
    state: Arc<Mutex<PollState>>,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let mut state = state.lock().await;
        if poll_once(&coordinator, sink.as_ref(), &mut state).await == PollOutcome::Stop {
            return;
        }
    }
}

/// Runs one gated refresh and publishes the result.
async fn poll_once(
    coordinator: &PollingCoordinator,
    sink: &dyn SnapshotSink,
    state: &mut PollState,
) -> PollOutcome {
    if !state.breaker.allows(Instant::now()) {
        tracing::debug!("Circuit open, skipping tick");
        return PollOutcome::Skipped;
    }

    match coordinator.refresh().await {
        Ok(snapshot) => {
            state.breaker.record_success();
            if let Err(e) = sink.publish(&snapshot, chrono::Local::now()).await {
                tracing::error!(error = %e, "Failed to publish snapshot");
            }
            state.last_snapshot = Some(snapshot);
            PollOutcome::Published
        }
        Err(failure) if failure.is_invalid_credentials() => {
            tracing::error!(error = %failure, "Credentials rejected, polling stopped");
            PollOutcome::Stop
        }
        Err(failure) => {
            if !matches!(failure.cause, RefreshCause::InProgress) {
                state.breaker.record_failure(Instant::now());
            }
            if let Some(last) = &state.last_snapshot {
                tracing::info!(snapshot = %last, "Keeping last known values");
            }
            PollOutcome::Failed
        }
    }
}

/// Logs how the polling task ended. Returns false when it stopped on
/// purpose and must not be restarted.
fn handle_task_result(task_name: &str, result: Result<(), JoinError>) -> bool {
    match result {
        Ok(_) => {
            tracing::debug!("Task {} completed.", task_name);
            false
        }
        Err(e) => {
            tracing::error!("Task {} failed: {:?}", task_name, e);
            true
        }
    }
}

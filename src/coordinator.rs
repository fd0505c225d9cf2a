//! One refresh cycle: authenticate, fetch, reduce.
//!
//! The host calls [`PollingCoordinator::refresh`] on its own schedule. A
//! cycle either yields a complete snapshot or a single [`RefreshFailed`]
//! carrying the original cause.

use crate::brunata::{AuthSession, AuthState, ConsumptionFetcher};
use crate::error::{FetchError, RefreshCause, RefreshFailed};
use crate::model::{Category, ConsumptionSnapshot, Granularity, MetricMapping, TieBreak};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(120);

/// How a cycle's dataset is reduced and how long a cycle may take.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub mapping: MetricMapping,
    pub tie_break: TieBreak,
    pub cycle_timeout: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            mapping: MetricMapping::default(),
            tie_break: TieBreak::default(),
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }
}

struct Provider {
    auth: AuthSession,
    fetcher: ConsumptionFetcher,
}

pub struct PollingCoordinator {
    provider: Mutex<Provider>,
    options: CoordinatorOptions,
}

impl PollingCoordinator {
    pub fn new(auth: AuthSession, fetcher: ConsumptionFetcher, options: CoordinatorOptions) -> Self {
        Self {
            provider: Mutex::new(Provider { auth, fetcher }),
            options,
        }
    }

    /// Runs one cycle. A call made while another is running is rejected
    /// with [`RefreshCause::InProgress`] instead of waiting.
    pub async fn refresh(&self) -> Result<ConsumptionSnapshot, RefreshFailed> {
        let mut provider = self
            .provider
            .try_lock()
            .map_err(|_| RefreshFailed::new(RefreshCause::InProgress))?;

        let timeout = self.options.cycle_timeout;
        let started = Instant::now();
        tracing::info!("Refresh started");
        let result = tokio::time::timeout(timeout, self.run_cycle(&mut provider)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(snapshot)) => {
                tracing::info!(elapsed_ms, snapshot = %snapshot, "Refresh succeeded");
                Ok(snapshot)
            }
            Ok(Err(cause)) => {
                if matches!(cause, RefreshCause::Fetch(FetchError::Unauthorized { .. })) {
                    provider.auth.invalidate();
                }
                let failure = RefreshFailed::new(cause);
                tracing::warn!(elapsed_ms, error = %failure, "Refresh failed");
                Err(failure)
            }
            Err(_) => {
                // the abandoned handshake may have left partial state
                provider.auth.invalidate();
                let failure = RefreshFailed::new(RefreshCause::Timeout(timeout));
                tracing::error!(error = %failure, "Refresh timed out");
                Err(failure)
            }
        }
    }

    /// Onboarding check, run under the same guard as refresh cycles.
    pub async fn validate_credentials(&self) -> bool {
        self.provider.lock().await.auth.validate_credentials().await
    }

    pub async fn auth_state(&self) -> AuthState {
        self.provider.lock().await.auth.state()
    }

    async fn run_cycle(&self, provider: &mut Provider) -> Result<ConsumptionSnapshot, RefreshCause> {
        provider.fetcher.reset();
        let token = provider.auth.ensure_authenticated().await?;

        provider.fetcher.fetch_meter_catalog(&token).await?;
        for category in Category::ALL {
            provider
                .fetcher
                .fetch_consumption(category, Granularity::Day, &token)
                .await?;
        }

        Ok(ConsumptionSnapshot::from_dataset(
            provider.fetcher.consumption_dataset(),
            &self.options.mapping,
            &self.options.tie_break,
        ))
    }
}

//! Backoff for the polling loop when the provider keeps failing.
//!
//! The poller owns its breaker outright, so the breaker is plain mutable
//! state. Time is passed in, which keeps the tests free of sleeps.

use serde_derive::Deserialize;
use std::time::{Duration, Instant};

fn default_failure_threshold() -> u32 {
    3
}

fn default_recovery_timeout_sec() -> u64 {
    3600
}

fn default_half_open_success_threshold() -> u32 {
    1
}

/// Loaded from `CIRCUIT_BREAKER_*`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed cycles before ticks are skipped
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long ticks are skipped before a trial cycle
    #[serde(default = "default_recovery_timeout_sec")]
    pub recovery_timeout_sec: u64,
    /// Successful trial cycles needed to resume normal polling
    #[serde(default = "default_half_open_success_threshold")]
    pub half_open_success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_sec)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_sec: default_recovery_timeout_sec(),
            half_open_success_threshold: default_half_open_success_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed { failure_count: u32 },
    Open { retry_at: Instant },
    HalfOpen { success_count: u32 },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: CircuitState,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: CircuitState::Closed { failure_count: 0 },
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether a cycle may run at `now`. Moves Open to HalfOpen once the
    /// recovery timeout has passed.
    pub fn allows(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed { .. } | CircuitState::HalfOpen { .. } => true,
            CircuitState::Open { retry_at } if now >= retry_at => {
                tracing::info!(circuit_breaker = %self.name, "Trying a cycle after backoff");
                self.state = CircuitState::HalfOpen { success_count: 0 };
                true
            }
            CircuitState::Open { .. } => false,
        }
    }

    pub fn record_success(&mut self) {
        self.state = match self.state {
            CircuitState::HalfOpen { success_count }
                if success_count + 1 < self.config.half_open_success_threshold =>
            {
                CircuitState::HalfOpen {
                    success_count: success_count + 1,
                }
            }
            CircuitState::HalfOpen { .. } => {
                tracing::info!(circuit_breaker = %self.name, "Provider recovered");
                CircuitState::Closed { failure_count: 0 }
            }
            _ => CircuitState::Closed { failure_count: 0 },
        };
    }

    pub fn record_failure(&mut self, now: Instant) {
        let retry_at = now + self.config.recovery_timeout();
        self.state = match self.state {
            CircuitState::Closed { failure_count }
                if failure_count + 1 < self.config.failure_threshold =>
            {
                CircuitState::Closed {
                    failure_count: failure_count + 1,
                }
            }
            CircuitState::Closed { failure_count } => {
                tracing::warn!(
                    circuit_breaker = %self.name,
                    failure_count = failure_count + 1,
                    retry_in_sec = self.config.recovery_timeout_sec,
                    "Backing off after repeated failures"
                );
                CircuitState::Open { retry_at }
            }
            CircuitState::HalfOpen { .. } => {
                tracing::warn!(circuit_breaker = %self.name, "Trial cycle failed");
                CircuitState::Open { retry_at }
            }
            open @ CircuitState::Open { .. } => open,
        };
    }
}

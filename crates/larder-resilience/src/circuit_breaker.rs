//! Keyed circuit breakers.
//!
//! One breaker per dependency key (`"ai"`, `"http-client"`, ...). A breaker
//! moves through three states:
//!
//! ```text
//!   Closed ──(failures reach threshold)──▶ Open
//!     ▲                                     │
//!     │                          (cool-down elapses)
//!     │                                     ▼
//!     └──────(probe succeeds)─────────── HalfOpen ──(probe fails)──▶ Open
//! ```
//!
//! While `Open`, calls fail with [`CircuitError::Open`] without running. In
//! `HalfOpen` exactly one probe runs; concurrent callers are rejected as if the
//! breaker were open. A probe that is dropped before finishing counts as a
//! failure.

use crate::error::CircuitError;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Failures that trip the breaker.
    pub failure_threshold: u32,
    /// Trailing window in which failures are counted. `None` counts
    /// consecutive failures instead; any success resets the count.
    pub failure_window: Option<Duration>,
    /// Optional failure ratio (0.0–1.0) that also trips the breaker once
    /// `minimum_calls` outcomes are in the window. Requires `failure_window`.
    pub failure_rate: Option<f64>,
    /// Calls needed in the window before `failure_rate` applies.
    pub minimum_calls: u32,
    /// How long the breaker stays open before admitting a probe.
    pub open_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Some(Duration::from_secs(60)),
            failure_rate: None,
            minimum_calls: 10,
            open_duration: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// Trip after `threshold` consecutive failures.
    pub fn consecutive(threshold: u32, open_duration: Duration) -> Self {
        Self {
            failure_threshold: threshold,
            failure_window: None,
            failure_rate: None,
            minimum_calls: 0,
            open_duration,
        }
    }

    /// Trip after `threshold` failures within `window`.
    pub fn windowed(threshold: u32, window: Duration, open_duration: Duration) -> Self {
        Self {
            failure_threshold: threshold,
            failure_window: Some(window),
            failure_rate: None,
            minimum_calls: 0,
            open_duration,
        }
    }

    /// Also trip when the failure ratio reaches `rate` over at least
    /// `minimum_calls` calls.
    pub fn with_failure_rate(mut self, rate: f64, minimum_calls: u32) -> Self {
        self.failure_rate = Some(rate.clamp(0.0, 1.0));
        self.minimum_calls = minimum_calls;
        self
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected.
    Open,
    /// One probe call is admitted.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
enum State {
    Closed {
        consecutive: u32,
        outcomes: VecDeque<(Instant, bool)>,
    },
    Open {
        until: Instant,
    },
    /// The single probe is in flight.
    HalfOpen,
}

impl State {
    fn closed() -> Self {
        Self::Closed {
            consecutive: 0,
            outcomes: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ticket {
    Normal,
    Probe,
}

#[derive(Debug)]
struct Breaker {
    key: String,
    config: BreakerConfig,
    state: Mutex<State>,
}

impl Breaker {
    fn new(key: &str, config: BreakerConfig) -> Self {
        Self {
            key: key.to_string(),
            config,
            state: Mutex::new(State::closed()),
        }
    }

    fn snapshot(&self) -> CircuitState {
        match *self.state.lock() {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { until } if Instant::now() >= until => CircuitState::HalfOpen,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen => CircuitState::HalfOpen,
        }
    }

    fn try_acquire(&self) -> Result<Ticket, Duration> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { .. } => Ok(Ticket::Normal),
            State::Open { until } => {
                let now = Instant::now();
                if now >= *until {
                    log::info!("circuit '{}' half-open, admitting probe", self.key);
                    *state = State::HalfOpen;
                    Ok(Ticket::Probe)
                } else {
                    Err(until.saturating_duration_since(now))
                }
            }
            State::HalfOpen => Err(self.config.open_duration),
        }
    }

    fn on_success(&self, ticket: Ticket) {
        let mut state = self.state.lock();
        match (&mut *state, ticket) {
            (State::HalfOpen, Ticket::Probe) => {
                log::info!("circuit '{}' closed after successful probe", self.key);
                *state = State::closed();
            }
            (
                State::Closed {
                    consecutive,
                    outcomes,
                },
                Ticket::Normal,
            ) => {
                *consecutive = 0;
                // Successes only matter to the failure ratio.
                if let (Some(window), Some(_)) =
                    (self.config.failure_window, self.config.failure_rate)
                {
                    let now = Instant::now();
                    outcomes.push_back((now, true));
                    prune(outcomes, now, window);
                }
            }
            // Stragglers admitted before a trip do not move the state.
            _ => {}
        }
    }

    fn on_failure(&self, ticket: Ticket) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let trip = match (&mut *state, ticket) {
            (State::HalfOpen, Ticket::Probe) => true,
            (
                State::Closed {
                    consecutive,
                    outcomes,
                },
                Ticket::Normal,
            ) => {
                *consecutive += 1;
                match self.config.failure_window {
                    None => *consecutive >= self.config.failure_threshold,
                    Some(window) => {
                        outcomes.push_back((now, false));
                        prune(outcomes, now, window);
                        self.should_trip(outcomes)
                    }
                }
            }
            _ => false,
        };

        if trip {
            log::warn!(
                "circuit '{}' opened for {:?}",
                self.key,
                self.config.open_duration
            );
            *state = State::Open {
                until: now + self.config.open_duration,
            };
        }
    }

    #[cfg(test)]
    fn recorded_outcomes(&self) -> usize {
        match &*self.state.lock() {
            State::Closed { outcomes, .. } => outcomes.len(),
            _ => 0,
        }
    }

    fn should_trip(&self, outcomes: &VecDeque<(Instant, bool)>) -> bool {
        let calls = outcomes.len() as u32;
        let failures = outcomes.iter().filter(|(_, ok)| !ok).count() as u32;
        if failures >= self.config.failure_threshold {
            return true;
        }
        match self.config.failure_rate {
            Some(rate) if calls > 0 && calls >= self.config.minimum_calls => {
                f64::from(failures) / f64::from(calls) >= rate
            }
            _ => false,
        }
    }
}

fn prune(outcomes: &mut VecDeque<(Instant, bool)>, now: Instant, window: Duration) {
    while let Some((at, _)) = outcomes.front() {
        if now.saturating_duration_since(*at) >= window {
            outcomes.pop_front();
        } else {
            break;
        }
    }
}

/// Releases a half-open probe that never reported an outcome.
struct ProbeGuard<'a> {
    breaker: &'a Breaker,
    ticket: Ticket,
    settled: bool,
}

impl ProbeGuard<'_> {
    fn settle(mut self, ok: bool) {
        self.settled = true;
        if ok {
            self.breaker.on_success(self.ticket);
        } else {
            self.breaker.on_failure(self.ticket);
        }
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.settled && self.ticket == Ticket::Probe {
            log::debug!("circuit '{}' probe dropped before completion", self.breaker.key);
            self.breaker.on_failure(Ticket::Probe);
        }
    }
}

/// A set of circuit breakers keyed by dependency name.
///
/// Breakers are created lazily on first use with the default config or a
/// per-key override. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    default_config: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    breakers: RwLock<HashMap<String, Arc<Breaker>>>,
}

impl CircuitBreakers {
    /// Create a breaker set whose breakers use `config`.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            default_config: config,
            overrides: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Use `config` for the breaker named `key`.
    pub fn with_override(mut self, key: impl Into<String>, config: BreakerConfig) -> Self {
        self.overrides.insert(key.into(), config);
        self
    }

    fn breaker(&self, key: &str) -> Arc<Breaker> {
        if let Some(breaker) = self.breakers.read().get(key) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        let breaker = breakers.entry(key.to_string()).or_insert_with(|| {
            let config = self
                .overrides
                .get(key)
                .cloned()
                .unwrap_or_else(|| self.default_config.clone());
            Arc::new(Breaker::new(key, config))
        });
        Arc::clone(breaker)
    }

    /// Run `operation` through the breaker for `key`.
    ///
    /// Returns [`CircuitError::Open`] without calling `operation` when the
    /// breaker rejects the call, or [`CircuitError::Inner`] when the operation
    /// itself fails. No lock is held while `operation` runs.
    pub async fn call<F, Fut, T, E>(&self, key: &str, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = self.breaker(key);
        let ticket = breaker
            .try_acquire()
            .map_err(|retry_after| CircuitError::Open {
                key: key.to_string(),
                retry_after,
            })?;

        let guard = ProbeGuard {
            breaker: &breaker,
            ticket,
            settled: false,
        };
        let result = operation().await;
        guard.settle(result.is_ok());

        result.map_err(CircuitError::Inner)
    }

    /// Current state of the breaker for `key`. Unknown keys are closed.
    pub fn state(&self, key: &str) -> CircuitState {
        match self.breakers.read().get(key) {
            Some(breaker) => breaker.snapshot(),
            None => CircuitState::Closed,
        }
    }

    /// Force the breaker for `key` back to closed.
    pub fn reset(&self, key: &str) {
        if let Some(breaker) = self.breakers.read().get(key) {
            log::info!("circuit '{key}' reset");
            *breaker.state.lock() = State::closed();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

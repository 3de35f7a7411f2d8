//! Circuit breaker for hosted narrative providers
//!
//! [`GuardedProvider`] puts a deadline on every call and counts transport
//! failures, including calls that overrun the deadline. Once `trip_after`
//! consecutive failures pile up the circuit opens and further calls are
//! refused with [`LlmError::NotAvailable`] until `cooldown` has passed. The
//! first call after the cooldown decides whether the circuit closes again.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::{LlmError, LlmProvider, LlmRequest, LlmResponse};

/// Where the breaker currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls go through
    Closed,
    /// Calls are refused until the cooldown ends
    Open,
    /// Cooldown over; the next outcomes decide
    HalfOpen,
}

/// Breaker tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    pub trip_after: u32,
    /// Successes needed while half-open to close it again
    pub close_after: u32,
    /// How long an open circuit refuses calls
    pub cooldown: Duration,
    /// Deadline for a single call. Overruns count as failures.
    pub call_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            trip_after: 3,
            close_after: 1,
            cooldown: Duration::from_secs(30),
            call_timeout: Duration::from_secs(8),
        }
    }
}

impl BreakerConfig {
    /// Replace the per-call deadline
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

/// Counters since the breaker was built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerStats {
    /// Calls asked of the breaker, refused ones included
    pub requests: u64,
    /// Calls that counted against the circuit
    pub failures: u64,
    /// Failures that were deadline overruns
    pub timeouts: u64,
    /// Times the circuit opened
    pub opens: u64,
}

/// Transition bookkeeping, kept free of I/O
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    streak: u32,
    recoveries: u32,
    opened_at: Option<Instant>,
}

impl Circuit {
    fn closed() -> Self {
        Self { state: CircuitState::Closed, streak: 0, recoveries: 0, opened_at: None }
    }

    /// May a call go out now? Moves Open to HalfOpen once cooled down.
    fn admit(&mut self, now: Instant, cooldown: Duration) -> bool {
        if self.state != CircuitState::Open {
            return true;
        }
        let cooled = self.opened_at.is_some_and(|at| now.duration_since(at) >= cooldown);
        if cooled {
            self.state = CircuitState::HalfOpen;
            self.recoveries = 0;
        }
        cooled
    }

    /// Returns true if this success closed the circuit
    fn succeed(&mut self, close_after: u32) -> bool {
        self.streak = 0;
        if self.state != CircuitState::HalfOpen {
            return false;
        }
        self.recoveries += 1;
        if self.recoveries < close_after {
            return false;
        }
        self.state = CircuitState::Closed;
        self.opened_at = None;
        true
    }

    /// Returns true if this failure opened the circuit
    fn fail(&mut self, now: Instant, trip_after: u32) -> bool {
        self.streak = self.streak.saturating_add(1);
        let trips = match self.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => self.streak >= trip_after,
            CircuitState::Open => false,
        };
        if trips {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
        }
        trips
    }
}

/// A provider behind a deadline and a circuit breaker
#[derive(Debug)]
pub struct GuardedProvider<P: LlmProvider> {
    inner: P,
    label: String,
    config: BreakerConfig,
    circuit: Mutex<Circuit>,
    requests: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    opens: AtomicU64,
}

impl<P: LlmProvider> GuardedProvider<P> {
    /// Guard `inner` with `config`
    pub fn new(inner: P, config: BreakerConfig) -> Self {
        let label = format!("breaker({})", inner.name());
        Self {
            inner,
            label,
            config,
            circuit: Mutex::new(Circuit::closed()),
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            opens: AtomicU64::new(0),
        }
    }

    /// Guard `inner` with the default tuning
    pub fn wrap(inner: P) -> Self {
        Self::new(inner, BreakerConfig::default())
    }

    /// Wrapped provider
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Current tuning
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current circuit state
    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit.lock().await.state
    }

    /// Counter snapshot
    pub fn stats(&self) -> BreakerStats {
        BreakerStats {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
        }
    }

    async fn admit(&self) -> Result<(), LlmError> {
        let mut circuit = self.circuit.lock().await;
        let was_open = circuit.state == CircuitState::Open;
        if !circuit.admit(Instant::now(), self.config.cooldown) {
            return Err(LlmError::NotAvailable);
        }
        if was_open {
            tracing::info!(provider = %self.label, "Circuit half-open");
        }
        Ok(())
    }

    async fn settle(&self, outcome: &Result<LlmResponse, LlmError>) {
        let mut circuit = self.circuit.lock().await;
        match outcome {
            Ok(_) => {
                if circuit.succeed(self.config.close_after) {
                    tracing::info!(provider = %self.label, "Circuit closed");
                }
            }
            Err(e) if e.trips_breaker() => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                if matches!(e, LlmError::Timeout(_)) {
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                }
                if circuit.fail(Instant::now(), self.config.trip_after) {
                    self.opens.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        provider = %self.label,
                        streak = circuit.streak,
                        error = %e,
                        "Circuit opened"
                    );
                }
            }
            Err(_) => {}
        }
    }
}

#[async_trait]
impl<P: LlmProvider + 'static> LlmProvider for GuardedProvider<P> {
    fn name(&self) -> &str {
        &self.label
    }

    async fn is_available(&self) -> bool {
        self.circuit_state().await != CircuitState::Open && self.inner.is_available().await
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.admit().await?;

        let deadline = self.config.call_timeout;
        let outcome = match tokio::time::timeout(deadline, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(deadline.as_millis() as u64)),
        };

        self.settle(&outcome).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    fn tuned(trip_after: u32, cooldown: Duration) -> BreakerConfig {
        BreakerConfig { trip_after, cooldown, ..BreakerConfig::default() }
    }

    #[test]
    fn test_circuit_transitions() {
        let start = Instant::now();
        let cooldown = Duration::from_secs(10);
        let mut circuit = Circuit::closed();

        assert!(!circuit.fail(start, 2));
        assert!(circuit.fail(start, 2));
        assert_eq!(circuit.state, CircuitState::Open);

        assert!(!circuit.admit(start + Duration::from_secs(5), cooldown));
        assert!(circuit.admit(start + cooldown, cooldown));
        assert_eq!(circuit.state, CircuitState::HalfOpen);

        assert!(circuit.succeed(1));
        assert_eq!(circuit.state, CircuitState::Closed);
    }

    #[test]
    fn test_success_resets_the_streak() {
        let now = Instant::now();
        let mut circuit = Circuit::closed();

        circuit.fail(now, 2);
        circuit.succeed(1);
        assert!(!circuit.fail(now, 2));
        assert_eq!(circuit.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_guarded_provider_passes_through() {
        let guarded = GuardedProvider::wrap(MockProvider::constant("ok"));

        assert_eq!(guarded.ask("test").await.unwrap(), "ok");
        assert_eq!(guarded.circuit_state().await, CircuitState::Closed);
        assert_eq!(guarded.name(), "breaker(mock)");
        assert_eq!(guarded.stats(), BreakerStats { requests: 1, ..BreakerStats::default() });
    }

    #[tokio::test]
    async fn test_open_circuit_refuses_without_calling_through() {
        let guarded =
            GuardedProvider::new(MockProvider::failing(), tuned(2, Duration::from_secs(60)));

        assert!(guarded.ask("a").await.is_err());
        assert!(guarded.ask("b").await.is_err());
        assert_eq!(guarded.circuit_state().await, CircuitState::Open);

        assert!(matches!(guarded.ask("c").await, Err(LlmError::NotAvailable)));
        assert_eq!(guarded.inner().calls(), 2);
        let stats = guarded.stats();
        assert_eq!((stats.requests, stats.failures, stats.opens), (3, 2, 1));
    }

    #[tokio::test]
    async fn test_overrunning_calls_open_the_circuit() {
        let slow = MockProvider::constant("too late").with_latency(Duration::from_millis(300));
        let config =
            tuned(2, Duration::from_secs(60)).with_call_timeout(Duration::from_millis(20));
        let guarded = GuardedProvider::new(slow, config);

        assert!(matches!(guarded.ask("a").await, Err(LlmError::Timeout(20))));
        assert_eq!(guarded.circuit_state().await, CircuitState::Closed);
        assert!(matches!(guarded.ask("b").await, Err(LlmError::Timeout(20))));
        assert_eq!(guarded.circuit_state().await, CircuitState::Open);

        assert!(matches!(guarded.ask("c").await, Err(LlmError::NotAvailable)));
        assert_eq!(guarded.inner().calls(), 2);
        assert_eq!(
            guarded.stats(),
            BreakerStats { requests: 3, failures: 2, timeouts: 2, opens: 1 }
        );
    }

    #[tokio::test]
    async fn test_failed_recovery_reopens() {
        let guarded =
            GuardedProvider::new(MockProvider::failing(), tuned(1, Duration::from_millis(20)));

        assert!(guarded.ask("a").await.is_err());
        assert_eq!(guarded.circuit_state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(guarded.ask("b").await.is_err());
        assert_eq!(guarded.inner().calls(), 2);
        assert_eq!(guarded.circuit_state().await, CircuitState::Open);
        assert_eq!(guarded.stats().opens, 2);
    }
}

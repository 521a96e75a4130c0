//! Credential pool with randomized selection, cooldown and retry.
//!
//! The pool owns one [`LlmProvider`] per API key. Each request picks a
//! random active credential that has not been tried yet for that request:
//!
//! - transient failures put the credential into an exponential cooldown and
//!   the request moves on, up to `max_attempts` transient failures;
//! - authentication failures disable the credential for the process
//!   lifetime without spending a transient attempt;
//! - fatal failures are returned immediately.
//!
//! When no credential is active at selection time the request fails fast
//! with [`PoolError::Exhausted`]. Health lives behind one
//! `std::sync::Mutex` per credential and no lock is held across an await.
//! A failure is only recorded if the credential's epoch still matches the
//! one observed at selection, so concurrent requests that hit the same
//! rate limit penalize the credential once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::completion::CompletionService;
use super::message::{CompletionRequest, CompletionResponse};
use super::provider::LlmProvider;
use crate::error::{AgentError, ConfigError, FailureKind, PoolError};

/// Default transient failures allowed per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default first cooldown.
pub const DEFAULT_COOLDOWN_BASE: Duration = Duration::from_secs(2);
/// Default cooldown ceiling.
pub const DEFAULT_COOLDOWN_MAX: Duration = Duration::from_secs(300);
/// Default per-attempt timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry and cooldown settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Transient failures allowed per request.
    pub max_attempts: u32,
    /// Cooldown after the first consecutive failure.
    pub cooldown_base: Duration,
    /// Cooldown ceiling.
    pub cooldown_max: Duration,
    /// Bound on one provider call.
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown_base: DEFAULT_COOLDOWN_BASE,
            cooldown_max: DEFAULT_COOLDOWN_MAX,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Cooldown for a credential with `consecutive_failures` prior failures.
    #[must_use]
    pub fn cooldown(&self, consecutive_failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(consecutive_failures);
        self.cooldown_base
            .saturating_mul(factor)
            .min(self.cooldown_max)
    }
}

/// Health status of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// Selectable.
    Active,
    /// Excluded until its cooldown elapses.
    CoolingDown,
    /// Rejected by the provider. Never selected again.
    Disabled,
}

impl CredentialStatus {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::CoolingDown => "cooling_down",
            Self::Disabled => "disabled",
        }
    }
}

/// Point-in-time view of one credential.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSnapshot {
    /// Redacted key label.
    pub label: String,
    /// Current status.
    pub status: CredentialStatus,
    /// Transient failures since the last success.
    pub consecutive_failures: u32,
    /// Seconds until the credential is selectable again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_secs: Option<f64>,
}

#[derive(Debug)]
struct CredentialHealth {
    status: CredentialStatus,
    cooldown_until: Option<Instant>,
    consecutive_failures: u32,
    epoch: u64,
}

impl CredentialHealth {
    const fn new() -> Self {
        Self {
            status: CredentialStatus::Active,
            cooldown_until: None,
            consecutive_failures: 0,
            epoch: 0,
        }
    }

    /// Returns an elapsed cooldown to active. Returns `true` on recovery.
    fn refresh(&mut self, now: Instant) -> bool {
        if self.status == CredentialStatus::CoolingDown
            && self.cooldown_until.is_some_and(|until| until <= now)
        {
            self.status = CredentialStatus::Active;
            self.cooldown_until = None;
            return true;
        }
        false
    }
}

struct PoolMember {
    label: String,
    provider: Arc<dyn LlmProvider>,
    health: Mutex<CredentialHealth>,
}

impl PoolMember {
    fn health(&self) -> std::sync::MutexGuard<'_, CredentialHealth> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Selection {
    Picked { index: usize, epoch: u64 },
    NoneActive,
    AllTried,
}

/// Redacts an API key to `sk-…abcd`.
#[must_use]
pub fn redact_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "…".to_string();
    }
    let prefix: String = chars.iter().take(3).collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}…{suffix}")
}

/// Pool of interchangeable credentials for one provider.
pub struct CredentialPool {
    members: Vec<PoolMember>,
    config: PoolConfig,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl CredentialPool {
    /// Creates a pool from `(label, provider)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoCredentials`] if `members` is empty.
    pub fn new(
        members: Vec<(String, Arc<dyn LlmProvider>)>,
        config: PoolConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, ConfigError> {
        if members.is_empty() {
            return Err(ConfigError::NoCredentials);
        }
        let members = members
            .into_iter()
            .map(|(label, provider)| PoolMember {
                label,
                provider,
                health: Mutex::new(CredentialHealth::new()),
            })
            .collect();
        Ok(Self {
            members,
            config,
            rng: Mutex::new(rng),
        })
    }

    /// Number of credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; a pool has at least one credential.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Pool settings.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Current health of every credential.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CredentialSnapshot> {
        let now = Instant::now();
        self.members
            .iter()
            .map(|m| {
                let mut h = m.health();
                h.refresh(now);
                CredentialSnapshot {
                    label: m.label.clone(),
                    status: h.status,
                    consecutive_failures: h.consecutive_failures,
                    cooldown_remaining_secs: h
                        .cooldown_until
                        .map(|until| until.saturating_duration_since(now).as_secs_f64()),
                }
            })
            .collect()
    }

    fn counts(&self) -> (usize, usize, usize) {
        let now = Instant::now();
        let (mut active, mut cooling, mut disabled) = (0, 0, 0);
        for m in &self.members {
            let mut h = m.health();
            h.refresh(now);
            match h.status {
                CredentialStatus::Active => active += 1,
                CredentialStatus::CoolingDown => cooling += 1,
                CredentialStatus::Disabled => disabled += 1,
            }
        }
        (active, cooling, disabled)
    }

    fn exhausted(&self, cooling: usize, disabled: usize) -> PoolError {
        PoolError::Exhausted {
            total: self.members.len(),
            cooling,
            disabled,
        }
    }

    fn select(&self, tried: &[bool]) -> Selection {
        let now = Instant::now();
        let mut any_active = false;
        let mut candidates: Vec<(usize, u64)> = Vec::new();
        for (index, m) in self.members.iter().enumerate() {
            let mut h = m.health();
            if h.refresh(now) {
                info!(credential = %m.label, "credential cooldown elapsed, active again");
            }
            if h.status == CredentialStatus::Active {
                any_active = true;
                if !tried[index] {
                    candidates.push((index, h.epoch));
                }
            }
        }
        if !any_active {
            return Selection::NoneActive;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        candidates
            .choose(&mut **rng)
            .map_or(Selection::AllTried, |&(index, epoch)| Selection::Picked {
                index,
                epoch,
            })
    }

    fn record_success(&self, index: usize, epoch: u64) {
        let mut h = self.members[index].health();
        if h.epoch == epoch && h.status == CredentialStatus::Active {
            h.consecutive_failures = 0;
        }
    }

    fn record_transient(&self, index: usize, epoch: u64) {
        let member = &self.members[index];
        let mut h = member.health();
        if h.epoch != epoch || h.status != CredentialStatus::Active {
            debug!(credential = %member.label, "failure already recorded by another request");
            return;
        }
        let cooldown = self.config.cooldown(h.consecutive_failures);
        h.status = CredentialStatus::CoolingDown;
        h.cooldown_until = Some(Instant::now() + cooldown);
        h.consecutive_failures = h.consecutive_failures.saturating_add(1);
        h.epoch += 1;
        warn!(
            credential = %member.label,
            cooldown_secs = cooldown.as_secs_f64(),
            consecutive_failures = h.consecutive_failures,
            "credential cooling down"
        );
    }

    fn record_auth_failure(&self, index: usize) {
        let member = &self.members[index];
        let mut h = member.health();
        h.status = CredentialStatus::Disabled;
        h.cooldown_until = None;
        h.epoch += 1;
        warn!(credential = %member.label, "credential rejected, disabled");
    }

    /// Executes `request` on a randomly selected active credential,
    /// retrying on others after transient and authentication failures.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Exhausted`] if no credential is active at selection time.
    /// - [`PoolError::AttemptsExceeded`] once `max_attempts` transient
    ///   failures have been seen while some credential is still active.
    /// - [`PoolError::Request`] on a fatal failure.
    pub async fn execute(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, PoolError> {
        let mut tried = vec![false; self.members.len()];
        let mut transient_failures = 0u32;
        let mut last_error = String::new();

        loop {
            let (index, epoch) = match self.select(&tried) {
                Selection::Picked { index, epoch } => (index, epoch),
                Selection::NoneActive => {
                    let (_, cooling, disabled) = self.counts();
                    warn!(cooling, disabled, "credential pool exhausted");
                    return Err(self.exhausted(cooling, disabled));
                }
                Selection::AllTried => {
                    return Err(PoolError::AttemptsExceeded {
                        attempts: transient_failures,
                        last_error,
                    });
                }
            };
            tried[index] = true;
            let member = &self.members[index];
            debug!(
                credential = %member.label,
                attempt = transient_failures + 1,
                model = %request.model,
                "dispatching completion"
            );

            let timeout = self.config.request_timeout;
            let outcome = match tokio::time::timeout(timeout, member.provider.chat(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout { after: timeout }),
            };

            match outcome {
                Ok(response) => {
                    self.record_success(index, epoch);
                    debug!(credential = %member.label, "completion succeeded");
                    return Ok(response);
                }
                Err(err) => match err.failure_kind() {
                    FailureKind::Transient => {
                        self.record_transient(index, epoch);
                        transient_failures += 1;
                        last_error = err.to_string();
                        if transient_failures >= self.config.max_attempts {
                            let (active, cooling, disabled) = self.counts();
                            if active == 0 {
                                return Err(self.exhausted(cooling, disabled));
                            }
                            return Err(PoolError::AttemptsExceeded {
                                attempts: transient_failures,
                                last_error,
                            });
                        }
                    }
                    FailureKind::Authentication => {
                        self.record_auth_failure(index);
                        last_error = err.to_string();
                    }
                    FailureKind::Fatal => {
                        warn!(credential = %member.label, error = %err, "request rejected");
                        return Err(PoolError::Request {
                            message: err.to_string(),
                        });
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field(
                "credentials",
                &self.members.iter().map(|m| &m.label).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionService for CredentialPool {
    fn name(&self) -> &'static str {
        "credential-pool"
    }

    async fn execute(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, PoolError> {
        Self::execute(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::user_message;
    use rand::rngs::mock::StepRng;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted outcomes; answers "ok" once the script runs out.
    struct Scripted {
        script: Mutex<VecDeque<Result<String, AgentError>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(script: Vec<Result<String, AgentError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                delay: None,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Self::slow_scripted(delay, Vec::new())
        }

        fn slow_scripted(delay: Duration, script: Vec<Result<String, AgentError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let next = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            next.unwrap_or_else(|| Ok("ok".to_string()))
                .map(CompletionResponse::text)
        }
    }

    fn rate_limited() -> Result<String, AgentError> {
        Err(AgentError::Provider {
            kind: FailureKind::Transient,
            message: "rate limited".to_string(),
            status: Some(429),
        })
    }

    fn unauthorized() -> Result<String, AgentError> {
        Err(AgentError::Provider {
            kind: FailureKind::Authentication,
            message: "invalid api key".to_string(),
            status: Some(401),
        })
    }

    fn bad_request() -> Result<String, AgentError> {
        Err(AgentError::Provider {
            kind: FailureKind::Fatal,
            message: "bad request".to_string(),
            status: Some(400),
        })
    }

    fn pool(providers: &[Arc<Scripted>], config: PoolConfig) -> CredentialPool {
        // StepRng(0, 0) always picks the first candidate.
        pool_with_rng(providers, config, Box::new(StepRng::new(0, 0)))
    }

    fn pool_with_rng(
        providers: &[Arc<Scripted>],
        config: PoolConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> CredentialPool {
        let members = providers
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let provider: Arc<dyn LlmProvider> = p.clone();
                (format!("key-{i}"), provider)
            })
            .collect();
        CredentialPool::new(members, config, rng).unwrap_or_else(|_| unreachable!())
    }

    /// Providers that answer with their own name, `n` times each.
    fn named(count: usize, n: usize) -> Vec<Arc<Scripted>> {
        (0..count)
            .map(|i| Scripted::new((0..n).map(|_| Ok(format!("key-{i}"))).collect()))
            .collect()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".to_string(),
            messages: vec![user_message("hi")],
            temperature: None,
            max_tokens: None,
        }
    }

    fn statuses(pool: &CredentialPool) -> Vec<CredentialStatus> {
        pool.snapshot().iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_empty_pool_rejected() {
        let result = CredentialPool::new(Vec::new(), PoolConfig::default(), Box::new(StepRng::new(0, 0)));
        assert!(matches!(result, Err(ConfigError::NoCredentials)));
    }

    #[test]
    fn test_cooldown_is_exponential_and_capped() {
        let config = PoolConfig::default();
        assert_eq!(config.cooldown(0), Duration::from_secs(2));
        assert_eq!(config.cooldown(1), Duration::from_secs(4));
        assert_eq!(config.cooldown(3), Duration::from_secs(16));
        assert_eq!(config.cooldown(20), Duration::from_secs(300));
        assert_eq!(config.cooldown(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_redact_key() {
        assert_eq!(redact_key("sk-proj-abcdefgh1234"), "sk-…1234");
        assert_eq!(redact_key("short"), "…");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_credential_cools_down_and_recovers() {
        let first = Scripted::new(vec![rate_limited(), rate_limited()]);
        let second = Scripted::new(Vec::new());
        let third = Scripted::new(Vec::new());
        let pool = pool(
            &[first.clone(), second.clone(), third.clone()],
            PoolConfig::default(),
        );

        // First failure: 2s cooldown, request served by the next credential.
        let r = pool.execute(&request()).await;
        assert_eq!(r.map(|r| r.content).ok().as_deref(), Some("ok"));
        assert_eq!((first.calls(), second.calls()), (1, 1));
        assert_eq!(
            statuses(&pool),
            vec![
                CredentialStatus::CoolingDown,
                CredentialStatus::Active,
                CredentialStatus::Active
            ]
        );

        // Still cooling: never selected.
        assert!(pool.execute(&request()).await.is_ok());
        assert_eq!((first.calls(), second.calls()), (1, 2));

        // Cooldown elapsed: selectable again, fails again, 4s cooldown.
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(pool.execute(&request()).await.is_ok());
        assert_eq!((first.calls(), second.calls()), (2, 3));
        assert_eq!(pool.snapshot()[0].consecutive_failures, 2);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(pool.execute(&request()).await.is_ok());
        assert_eq!(first.calls(), 2);

        // Recovers and succeeds; failure count resets.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(pool.execute(&request()).await.is_ok());
        assert_eq!(first.calls(), 3);
        assert_eq!(pool.snapshot()[0].consecutive_failures, 0);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_credentials_exhaust_without_retry() {
        let a = Scripted::new(vec![unauthorized()]);
        let b = Scripted::new(vec![unauthorized()]);
        let pool = pool(&[a.clone(), b.clone()], PoolConfig::default());

        // Discovery: both keys are rejected within one request.
        let first = pool.execute(&request()).await;
        assert!(matches!(
            first,
            Err(PoolError::Exhausted { total: 2, cooling: 0, disabled: 2 })
        ));
        assert_eq!((a.calls(), b.calls()), (1, 1));

        // Both disabled: fail fast, no provider call.
        let second = pool.execute(&request()).await;
        assert!(matches!(second, Err(PoolError::Exhausted { .. })));
        assert_eq!((a.calls(), b.calls()), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_does_not_spend_transient_attempt() {
        let a = Scripted::new(vec![unauthorized()]);
        let b = Scripted::new(vec![rate_limited()]);
        let c = Scripted::new(Vec::new());
        let config = PoolConfig {
            max_attempts: 1,
            ..PoolConfig::default()
        };
        let pool = pool(&[a.clone(), b.clone(), c.clone()], config);

        let r = pool.execute(&request()).await;
        assert!(matches!(r, Err(PoolError::AttemptsExceeded { attempts: 1, .. })));
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
        assert_eq!(
            statuses(&pool),
            vec![
                CredentialStatus::Disabled,
                CredentialStatus::CoolingDown,
                CredentialStatus::Active
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_cooling_is_exhausted() {
        let a = Scripted::new(vec![rate_limited()]);
        let b = Scripted::new(vec![rate_limited()]);
        let pool = pool(&[a.clone(), b.clone()], PoolConfig::default());

        let r = pool.execute(&request()).await;
        assert!(matches!(
            r,
            Err(PoolError::Exhausted { total: 2, cooling: 2, disabled: 0 })
        ));

        let r = pool.execute(&request()).await;
        assert!(matches!(r, Err(PoolError::Exhausted { .. })));
        assert_eq!((a.calls(), b.calls()), (1, 1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(pool.execute(&request()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_returns_immediately() {
        let a = Scripted::new(vec![bad_request()]);
        let b = Scripted::new(Vec::new());
        let pool = pool(&[a.clone(), b.clone()], PoolConfig::default());

        let r = pool.execute(&request()).await;
        assert!(matches!(r, Err(PoolError::Request { .. })));
        assert_eq!((a.calls(), b.calls()), (1, 0));
        assert_eq!(statuses(&pool), vec![CredentialStatus::Active; 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let slow = Scripted::slow(Duration::from_secs(60));
        let fast = Scripted::new(Vec::new());
        let pool = pool(&[slow.clone(), fast.clone()], PoolConfig::default());

        let r = pool.execute(&request()).await;
        assert!(r.is_ok());
        assert_eq!((slow.calls(), fast.calls()), (1, 1));
        assert_eq!(pool.snapshot()[0].status, CredentialStatus::CoolingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_not_double_counted() {
        let a = Scripted::new(Vec::new());
        let pool = pool(&[a], PoolConfig::default());

        // Two requests observed epoch 0; only the first failure counts.
        pool.record_transient(0, 0);
        pool.record_transient(0, 0);
        let snap = pool.snapshot();
        assert_eq!(snap[0].consecutive_failures, 1);
        assert_eq!(snap[0].cooldown_remaining_secs, Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_on_one_key_penalize_once() {
        let a = Scripted::slow_scripted(Duration::from_secs(1), vec![rate_limited(), rate_limited()]);
        let b = Scripted::new(Vec::new());
        let pool = pool(&[a.clone(), b.clone()], PoolConfig::default());

        // Both requests pick `a` at epoch 0 before either failure lands.
        let (req1, req2) = (request(), request());
        let (r1, r2) = tokio::join!(pool.execute(&req1), pool.execute(&req2));
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        assert_eq!((a.calls(), b.calls()), (2, 2));

        let snap = pool.snapshot();
        assert_eq!(snap[0].status, CredentialStatus::CoolingDown);
        assert_eq!(snap[0].consecutive_failures, 1);
        assert_eq!(snap[0].cooldown_remaining_secs, Some(2.0));
        assert_eq!(snap[1].status, CredentialStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_selection_spreads_and_reproduces() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use std::collections::BTreeSet;

        async fn served_by(seed: u64) -> Vec<String> {
            let providers = named(3, 30);
            let pool = pool_with_rng(
                &providers,
                PoolConfig::default(),
                Box::new(StdRng::seed_from_u64(seed)),
            );
            let mut order = Vec::new();
            for _ in 0..30 {
                let response = pool.execute(&request()).await.unwrap();
                order.push(response.content);
            }
            order
        }

        let first = served_by(42).await;
        let second = served_by(42).await;
        assert_eq!(first, second);

        let distinct: BTreeSet<&str> = first.iter().map(String::as_str).collect();
        assert!(distinct.len() > 1, "all requests went to {distinct:?}");
    }
}

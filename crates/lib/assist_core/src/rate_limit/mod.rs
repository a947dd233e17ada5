//! Fixed-window rate limiting with three independent policies.
//!
//! | Policy    | Default window | Default limit | Applies to                         |
//! |-----------|----------------|---------------|------------------------------------|
//! | `general` | 15 min         | 100           | every route except health checks   |
//! | `auth`    | 15 min         | 5             | login and token refresh            |
//! | `strict`  | 15 min         | 20            | sensitive mutating endpoints       |
//!
//! Counters are keyed by `"<policy>:<client>"`, so each policy keeps its own
//! state for the same client.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::store::StoreResult;
use store::CounterStore;

/// Default window shared by all policies: 15 minutes.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Paths the general policy never counts.
const HEALTH_PATHS: &[&str] = &["/health", "/api/health"];

/// Rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    General,
    Auth,
    Strict,
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::General => "general",
            Policy::Auth => "auth",
            Policy::Strict => "strict",
        }
    }

    /// Whether a response with this status is given back to the client's budget.
    /// Only the auth policy refunds successful requests, so only failed
    /// credential attempts count.
    pub fn refunds(&self, status: u16) -> bool {
        matches!(self, Policy::Auth) && status < 400
    }

    /// Whether `path` is outside this policy's scope.
    pub fn exempts(&self, path: &str) -> bool {
        matches!(self, Policy::General) && HEALTH_PATHS.contains(&path)
    }
}

/// Window and ceiling for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLimits {
    pub window: Duration,
    pub limit: u64,
}

/// Limits for all three policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub general: PolicyLimits,
    pub auth: PolicyLimits,
    pub strict: PolicyLimits,
}

impl RateLimitSettings {
    pub fn limits(&self, policy: Policy) -> PolicyLimits {
        match policy {
            Policy::General => self.general,
            Policy::Auth => self.auth,
            Policy::Strict => self.strict,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            general: PolicyLimits {
                window: DEFAULT_WINDOW,
                limit: 100,
            },
            auth: PolicyLimits {
                window: DEFAULT_WINDOW,
                limit: 5,
            },
            strict: PolicyLimits {
                window: DEFAULT_WINDOW,
                limit: 20,
            },
        }
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub resets_in: Duration,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    fn key(policy: Policy, client: &str) -> String {
        format!("{}:{client}", policy.name())
    }

    /// Count a request from `client` under `policy` and decide whether it may
    /// proceed. Rejected requests still count toward the window.
    pub async fn check(&self, policy: Policy, client: &str) -> StoreResult<Decision> {
        let limits = self.settings.limits(policy);
        let window = self
            .store
            .increment(&Self::key(policy, client), limits.window)
            .await?;
        let allowed = window.count <= limits.limit;
        if !allowed {
            debug!(
                policy = policy.name(),
                client,
                count = window.count,
                limit = limits.limit,
                "rate limit exceeded"
            );
        }
        Ok(Decision {
            allowed,
            limit: limits.limit,
            remaining: limits.limit.saturating_sub(window.count),
            resets_in: window.resets_in,
        })
    }

    /// Give back a request previously counted by [`RateLimiter::check`].
    pub async fn refund(&self, policy: Policy, client: &str) -> StoreResult<()> {
        self.store.decrement(&Self::key(policy, client)).await
    }

    /// Drop elapsed windows from the counter store.
    pub async fn prune(&self) -> StoreResult<usize> {
        self.store.prune().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryCounterStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryCounterStore::new()),
            RateLimitSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn auth_policy_allows_five_then_rejects() {
        let limiter = limiter();
        for attempt in 1..=5 {
            let decision = limiter.check(Policy::Auth, "10.0.0.1").await.unwrap();
            assert!(decision.allowed, "attempt {attempt} should pass");
            assert_eq!(decision.remaining, 5 - attempt);
        }
        let sixth = limiter.check(Policy::Auth, "10.0.0.1").await.unwrap();
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);

        tokio::time::advance(DEFAULT_WINDOW).await;
        assert!(limiter.check(Policy::Auth, "10.0.0.1").await.unwrap().allowed);
        assert!(limiter.check(Policy::Auth, "10.0.0.1").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn refunded_requests_do_not_count() {
        let limiter = limiter();
        for _ in 0..10 {
            assert!(limiter.check(Policy::Auth, "c").await.unwrap().allowed);
            limiter.refund(Policy::Auth, "c").await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn policies_keep_separate_state() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.check(Policy::Auth, "c").await.unwrap();
        }
        assert!(!limiter.check(Policy::Auth, "c").await.unwrap().allowed);
        assert!(limiter.check(Policy::Strict, "c").await.unwrap().allowed);
        assert!(limiter.check(Policy::General, "c").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn clients_keep_separate_state() {
        let limiter = limiter();
        for _ in 0..6 {
            limiter.check(Policy::Auth, "a").await.unwrap();
        }
        assert!(limiter.check(Policy::Auth, "b").await.unwrap().allowed);
    }

    #[test]
    fn policy_rules() {
        assert!(Policy::General.exempts("/health"));
        assert!(Policy::General.exempts("/api/health"));
        assert!(!Policy::General.exempts("/api/beneficiaries"));
        assert!(!Policy::Strict.exempts("/health"));
        assert!(Policy::Auth.refunds(200));
        assert!(!Policy::Auth.refunds(401));
        assert!(!Policy::Strict.refunds(200));
    }
}

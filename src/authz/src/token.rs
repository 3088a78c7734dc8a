//! Bearer token cache
//!
//! Generates a signed token through a delegate and hands the same token to
//! every caller until it goes stale. Refreshes are single-flight: while one is
//! running, every caller awaits that same future.
//!
//! # Example
//!
//! ```rust
//! use entitlements_authz::TokenCache;
//! use entitlements_core::EntitlementsError;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), EntitlementsError> {
//! let cache = TokenCache::builder(|| async { Ok::<_, EntitlementsError>("signed.jwt".to_string()) })
//!     .refresh_interval(Some(Duration::from_secs(300)))
//!     .anonymous_support(true)
//!     .anonymous_context("acme")
//!     .build();
//!
//! let token = cache.get_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::backoff::BackoffRunner;
use entitlements_core::{EntitlementsError, Result, Token, TokenGenerator};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Refresh interval used by impersonation token providers
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

const TOKEN_LABEL: &str = "Read JWT token";

type SharedToken = Shared<BoxFuture<'static, Result<Token>>>;

/// When a cached token must be regenerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// No caching; every call regenerates unless a generation is in flight
    EveryCall,

    /// Cache forever; regenerate only after a failed generation
    Forever,

    /// Regenerate once the token is older than the interval plus jitter
    Interval(Duration),
}

impl From<Option<Duration>> for RefreshPolicy {
    fn from(interval: Option<Duration>) -> Self {
        match interval {
            None => RefreshPolicy::EveryCall,
            Some(d) if d.is_zero() => RefreshPolicy::Forever,
            Some(d) => RefreshPolicy::Interval(d),
        }
    }
}

#[derive(Default)]
struct TokenState {
    pending: Option<SharedToken>,
    issued_at: Option<Instant>,
    refreshing: bool,
    /// Bumped per refresh so a superseded refresh cannot overwrite state
    generation: u64,
    disposed: bool,
}

struct TokenCacheInner {
    generator: Arc<dyn TokenGenerator>,
    policy: RefreshPolicy,
    jitter: Duration,
    anonymous_support: bool,
    anonymous_context: Option<String>,
    backoff: BackoffRunner,
    state: Mutex<TokenState>,
}

impl TokenCacheInner {
    fn anonymous_token(&self) -> Option<Token> {
        if !self.anonymous_support {
            return None;
        }
        self.anonymous_context
            .as_ref()
            .map(|context| format!("anonymous-{}", context))
    }

    fn is_stale(&self, state: &TokenState, now: Instant) -> bool {
        if state.pending.is_none() {
            return true;
        }

        match self.policy {
            RefreshPolicy::EveryCall => true,
            RefreshPolicy::Forever => false,
            RefreshPolicy::Interval(interval) => match state.issued_at {
                Some(issued_at) => now > issued_at + interval + self.jitter,
                None => true,
            },
        }
    }

    fn complete(&self, generation: u64, result: &Result<Token>) {
        let mut state = self.state.lock();
        if state.generation != generation || state.disposed {
            return;
        }

        state.refreshing = false;
        match result {
            Ok(_) => {
                state.issued_at = Some(Instant::now());
            }
            Err(_) => {
                state.pending = None;
                state.issued_at = None;
            }
        }
    }
}

/// Caches a generated token and refreshes it on schedule
pub struct TokenCache {
    inner: Arc<TokenCacheInner>,
}

impl TokenCache {
    /// Create a cache; `None` disables caching, zero caches forever
    pub fn new(generator: impl TokenGenerator + 'static, refresh_interval: Option<Duration>) -> Self {
        Self::builder(generator).refresh_interval(refresh_interval).build()
    }

    /// Alternative to [`TokenCache::new`]
    pub fn from_token_generator(
        generator: impl TokenGenerator + 'static,
        refresh_interval: Option<Duration>,
    ) -> Self {
        Self::new(generator, refresh_interval)
    }

    pub fn builder(generator: impl TokenGenerator + 'static) -> TokenCacheBuilder {
        TokenCacheBuilder {
            generator: Arc::new(generator),
            refresh_interval: None,
            anonymous_support: false,
            anonymous_context: None,
            backoff: BackoffRunner::default(),
        }
    }

    /// Current token, refreshing first if it is stale
    pub async fn get_token(&self) -> Result<Token> {
        let pending = self.current_or_refresh()?;
        pending.await
    }

    fn current_or_refresh(&self) -> Result<SharedToken> {
        let mut state = self.inner.state.lock();

        if state.disposed {
            return Err(EntitlementsError::Disposed);
        }

        if state.refreshing {
            if let Some(pending) = &state.pending {
                debug!("Token refresh already in flight");
                return Ok(pending.clone());
            }
        }

        if !self.inner.is_stale(&state, Instant::now()) {
            if let Some(pending) = &state.pending {
                return Ok(pending.clone());
            }
        }

        state.generation += 1;
        state.refreshing = true;

        let refresh = Refresh {
            generator: self.inner.generator.clone(),
            backoff: self.inner.backoff,
            anonymous: self.inner.anonymous_token(),
            cache: Arc::downgrade(&self.inner),
            generation: state.generation,
        };
        let pending = refresh.run().boxed().shared();
        state.pending = Some(pending.clone());

        Ok(pending)
    }

    /// Random offset added to the refresh threshold
    pub fn jitter(&self) -> Duration {
        self.inner.jitter
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.inner.policy
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().refreshing
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Drop the cached token; later calls fail with `Disposed`
    ///
    /// Callers already awaiting a refresh still receive its result.
    pub fn dispose(&self) {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return;
        }

        state.disposed = true;
        state.pending = None;
        state.issued_at = None;
        state.refreshing = false;

        debug!("Token cache disposed");
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("policy", &self.inner.policy)
            .field("jitter", &self.inner.jitter)
            .field("anonymous_support", &self.inner.anonymous_support)
            .finish_non_exhaustive()
    }
}

/// One token generation, shared by every caller that finds the token stale
///
/// Refers back to the cache weakly: the cache owns this future while it is
/// pending.
struct Refresh {
    generator: Arc<dyn TokenGenerator>,
    backoff: BackoffRunner,
    anonymous: Option<Token>,
    cache: Weak<TokenCacheInner>,
    generation: u64,
}

impl Refresh {
    async fn run(self) -> Result<Token> {
        let generation = self.generation;
        info!(generation, "Refreshing token");

        let generator = self.generator;
        let result = self.backoff.run(TOKEN_LABEL, || generator.generate()).await;

        let result = match result {
            Err(e) if e.is_identity_failure() => match self.anonymous {
                Some(token) => {
                    warn!(error = %e, "Token generation rejected, falling back to anonymous identity");
                    Ok(token)
                }
                None => Err(e),
            },
            other => other,
        };

        if let Err(e) = &result {
            warn!(error = %e, "Token refresh failed, cache cleared");
        }

        if let Some(cache) = self.cache.upgrade() {
            cache.complete(generation, &result);
        }
        result
    }
}

/// Builder for [`TokenCache`]
pub struct TokenCacheBuilder {
    generator: Arc<dyn TokenGenerator>,
    refresh_interval: Option<Duration>,
    anonymous_support: bool,
    anonymous_context: Option<String>,
    backoff: BackoffRunner,
}

impl TokenCacheBuilder {
    pub fn refresh_interval(mut self, refresh_interval: Option<Duration>) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn anonymous_support(mut self, enabled: bool) -> Self {
        self.anonymous_support = enabled;
        self
    }

    pub fn anonymous_context(mut self, context: impl Into<String>) -> Self {
        self.anonymous_context = Some(context.into());
        self
    }

    pub fn backoff(mut self, backoff: BackoffRunner) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn build(self) -> TokenCache {
        let policy = RefreshPolicy::from(self.refresh_interval);

        let jitter = match policy {
            RefreshPolicy::Interval(interval) => {
                let max_ms = (interval.as_millis() / 10) as u64;
                Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
            }
            _ => Duration::ZERO,
        };

        TokenCache {
            inner: Arc::new(TokenCacheInner {
                generator: self.generator,
                policy,
                jitter,
                anonymous_support: self.anonymous_support,
                anonymous_context: self.anonymous_context,
                backoff: self.backoff,
                state: Mutex::new(TokenState::default()),
            }),
        }
    }
}

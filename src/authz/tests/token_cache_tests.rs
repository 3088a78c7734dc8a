//! Token cache behaviour: single-flight refresh, staleness, fallback

use entitlements_authz::{BackoffRunner, RefreshPolicy, TokenCache};
use entitlements_core::EntitlementsError;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Generator that counts calls and fails the first `failures` of them
fn counting_generator(
    calls: Arc<AtomicUsize>,
    failures: usize,
    error: EntitlementsError,
) -> impl Fn() -> futures::future::BoxFuture<'static, entitlements_core::Result<String>> + Send + Sync + 'static {
    use futures::FutureExt;

    move || {
        let calls = calls.clone();
        let error = error.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            if n <= failures {
                Err(error)
            } else {
                Ok(format!("token-{}", n))
            }
        }
        .boxed()
    }
}

// ============================================================================
// SINGLE-FLIGHT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_generation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(TokenCache::new(
        counting_generator(calls.clone(), 0, EntitlementsError::transport("unused")),
        Some(Duration::from_secs(300)),
    ));

    let tokens = join_all((0..10).map(|_| {
        let cache = cache.clone();
        async move { cache.get_token().await }
    }))
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for token in tokens {
        assert_eq!(token.unwrap(), "token-1");
    }
    assert!(!cache.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn test_uncached_policy_still_single_flight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(TokenCache::new(
        counting_generator(calls.clone(), 0, EntitlementsError::transport("unused")),
        None,
    ));
    assert_eq!(cache.policy(), RefreshPolicy::EveryCall);

    let (a, b) = tokio::join!(cache.get_token(), cache.get_token());
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Sequential calls regenerate
    assert_eq!(cache.get_token().await.unwrap(), "token-2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// STALENESS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_interval_refresh_timing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::new(
        counting_generator(calls.clone(), 0, EntitlementsError::transport("unused")),
        Some(Duration::from_millis(1000)),
    );
    assert!(cache.jitter() <= Duration::from_millis(100));

    assert_eq!(cache.get_token().await.unwrap(), "token-1");

    tokio::time::advance(Duration::from_millis(500)).await;
    assert_eq!(cache.get_token().await.unwrap(), "token-1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(700)).await;
    assert_eq!(cache.get_token().await.unwrap(), "token-2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_caches_forever() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::new(
        counting_generator(calls.clone(), 0, EntitlementsError::transport("unused")),
        Some(Duration::ZERO),
    );
    assert_eq!(cache.policy(), RefreshPolicy::Forever);

    cache.get_token().await.unwrap();
    tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
    assert_eq!(cache.get_token().await.unwrap(), "token-1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// FAILURE AND FALLBACK
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_identity_failure_falls_back_to_anonymous() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::builder(counting_generator(
        calls.clone(),
        usize::MAX,
        EntitlementsError::identity("user rejected"),
    ))
    .refresh_interval(Some(Duration::from_secs(300)))
    .anonymous_support(true)
    .anonymous_context("acme")
    .build();

    assert_eq!(cache.get_token().await.unwrap(), "anonymous-acme");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // The anonymous token is cached like any other
    assert_eq!(cache.get_token().await.unwrap(), "anonymous-acme");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_identity_failure_skips_anonymous() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::builder(counting_generator(
        calls.clone(),
        usize::MAX,
        EntitlementsError::transport("connection reset"),
    ))
    .anonymous_support(true)
    .anonymous_context("acme")
    .build();

    let err = cache.get_token().await.unwrap_err();
    assert!(matches!(err, EntitlementsError::RetriesExhausted { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_without_fallback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::new(
        counting_generator(calls.clone(), usize::MAX, EntitlementsError::identity("user rejected")),
        Some(Duration::from_secs(300)),
    );

    match cache.get_token().await.unwrap_err() {
        EntitlementsError::RetriesExhausted { label, attempts, last_error } => {
            assert_eq!(label, "Read JWT token");
            assert_eq!(attempts, 3);
            assert!(last_error.is_identity_failure());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_clears_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::builder(counting_generator(calls.clone(), 1, EntitlementsError::transport("timeout")))
        .refresh_interval(Some(Duration::from_secs(300)))
        .backoff(BackoffRunner::new(Duration::from_millis(10), 1))
        .build();

    assert!(cache.get_token().await.is_err());
    assert!(!cache.is_refreshing());

    // Next call starts a fresh generation instead of replaying the failure
    assert_eq!(cache.get_token().await.unwrap(), "token-2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_rejects_later_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::new(
        counting_generator(calls.clone(), 0, EntitlementsError::transport("unused")),
        Some(Duration::from_secs(300)),
    );

    cache.get_token().await.unwrap();
    cache.dispose();
    cache.dispose();

    assert_eq!(cache.get_token().await.unwrap_err(), EntitlementsError::Disposed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_refresh_released_with_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator_calls = calls.clone();
    let cache = TokenCache::new(
        move || {
            let calls = generator_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, EntitlementsError>("late".to_string())
            }
        },
        Some(Duration::from_secs(300)),
    );

    assert!(tokio::time::timeout(Duration::from_millis(10), cache.get_token()).await.is_err());
    assert!(cache.is_refreshing());
    assert!(Arc::strong_count(&calls) > 1);

    drop(cache);
    assert_eq!(Arc::strong_count(&calls), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_generator_error_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TokenCache::new(
        counting_generator(calls.clone(), usize::MAX, EntitlementsError::configuration("no signing key")),
        Some(Duration::from_secs(300)),
    );
    let start = tokio::time::Instant::now();

    assert!(matches!(
        cache.get_token().await.unwrap_err(),
        EntitlementsError::Configuration(_)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // No backoff sleep after the generator's own latency
    assert!(start.elapsed() < Duration::from_millis(100));
}

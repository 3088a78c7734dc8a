//! Shared fixtures for gateway and engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use entitlements_authz::{EntitlementsSnapshot, TokenCache};
use entitlements_core::{
    AuthorizationPayload, AuthorizationRequestDetail, AuthorizationResponseDetail, AuthorizationResult,
    EntitlementsError, EntitlementsTransport, Operation, Permission, RequestUser, Restriction, Result, Role,
    ServiceMetadata, User, UserEntitlements,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const EXPORT: &str = "watchlist.exports.csv";
pub const REALTIME: &str = "quotes.realtime";
pub const ALERTS: &str = "alerts.create";
pub const UNRESTRICTED: &str = "charts.view";

pub fn export_op() -> Operation {
    Operation::new(EXPORT, "watchlist").with_restriction(Restriction::count_limited(100))
}

pub fn catalog() -> Vec<Operation> {
    vec![
        export_op(),
        Operation::new(REALTIME, "quotes").with_restriction(Restriction::RateLimited),
        Operation::new(ALERTS, "alerts"),
        Operation::new(UNRESTRICTED, "charts"),
    ]
}

/// User "00000000" with one role granting the standard catalog
pub fn entitlements() -> UserEntitlements {
    UserEntitlements::new(User::new("00000000", "TGAM")).with_role(
        Role::new("premium", "TGAM")
            .with_permission(Permission::new(export_op()).with_restriction(Restriction::count_limited(100)))
            .with_permission(
                Permission::new(Operation::new(REALTIME, "quotes")).with_restriction(Restriction::RateLimited),
            )
            .with_permission(Permission::new(Operation::new(UNRESTRICTED, "charts"))),
    )
}

pub fn snapshot() -> EntitlementsSnapshot {
    EntitlementsSnapshot::new(entitlements(), catalog())
}

pub fn static_tokens() -> Arc<TokenCache> {
    Arc::new(TokenCache::new(
        || async { Ok::<_, EntitlementsError>("signed.jwt".to_string()) },
        Some(Duration::ZERO),
    ))
}

/// In-memory entitlements service that records what it was asked
pub struct MockTransport {
    pub user: Mutex<UserEntitlements>,
    pub operations: Vec<Operation>,
    pub remote_authorized: AtomicBool,
    pub fail_read_user: AtomicBool,
    pub read_user_calls: AtomicUsize,
    pub read_operations_calls: AtomicUsize,
    pub authorize_calls: AtomicUsize,
    pub tokens_seen: Mutex<Vec<String>>,
    pub products_seen: Mutex<Vec<String>>,
    pub payloads: Mutex<Vec<AuthorizationPayload>>,
    pub latency: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            user: Mutex::new(entitlements()),
            operations: catalog(),
            remote_authorized: AtomicBool::new(true),
            fail_read_user: AtomicBool::new(false),
            read_user_calls: AtomicUsize::new(0),
            read_operations_calls: AtomicUsize::new(0),
            authorize_calls: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
            products_seen: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn read_user_calls(&self) -> usize {
        self.read_user_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl EntitlementsTransport for MockTransport {
    async fn read_user(&self, token: &str) -> Result<UserEntitlements> {
        self.read_user_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().push(token.to_string());
        self.pause().await;

        if self.fail_read_user.load(Ordering::SeqCst) {
            return Err(EntitlementsError::transport("service unavailable"));
        }
        Ok(self.user.lock().clone())
    }

    async fn read_operations(&self, product: &str) -> Result<Vec<Operation>> {
        self.read_operations_calls.fetch_add(1, Ordering::SeqCst);
        self.products_seen.lock().push(product.to_string());

        Ok(self
            .operations
            .iter()
            .filter(|o| product == "*" || o.product == product)
            .cloned()
            .collect())
    }

    async fn authorize(&self, token: &str, payload: &AuthorizationPayload) -> Result<AuthorizationResult> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().push(token.to_string());
        self.payloads.lock().push(payload.clone());

        let user = self.user.lock().clone();
        let operation = self
            .operations
            .iter()
            .find(|o| o.id == payload.operation)
            .cloned()
            .unwrap_or_else(|| Operation::new(payload.operation.clone(), "unknown"));

        Ok(AuthorizationResult {
            request: AuthorizationRequestDetail {
                user: RequestUser::from(&user),
                operation,
                data: payload.data.clone(),
            },
            response: AuthorizationResponseDetail {
                authorized: Some(self.remote_authorized.load(Ordering::SeqCst)),
                advice: Vec::new(),
            },
        })
    }

    async fn read_service_metadata(&self) -> Result<ServiceMetadata> {
        Ok(ServiceMetadata {
            semver: "2.4.1".to_string(),
            environment: "test".to_string(),
        })
    }
}

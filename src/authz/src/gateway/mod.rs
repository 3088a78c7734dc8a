//! Entitlements gateway
//!
//! Orchestrates the token cache, the snapshot cache and the decision strategy,
//! and falls back to the remote authority when a decision is deferred.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──connect──→ Connecting ──ok──→ Started ──dispose──→ Disposed
//!       ↑                        │
//!       └─────────failed─────────┘
//! ```
//!
//! Concurrent `connect` calls share one in-flight connect.

pub mod config;
pub mod observer;

pub use config::{GatewayConfig, Protocol};
pub use observer::{observer, AuthorizationObserver};

use crate::engine::DecisionStrategy;
use crate::snapshot::{EntitlementsSnapshot, SnapshotCache};
use crate::token::TokenCache;
use entitlements_core::{
    AuthorizationPayload, AuthorizationRequestDetail, AuthorizationResponseDetail,
    EntitlementsError, EntitlementsTransport, Operation, Result, ServiceMetadata, Token, UserEntitlements,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use observer::ObserverSlot;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Product filter meaning "every product"
pub const ALL_PRODUCTS: &str = "*";

type SharedConnect = Shared<BoxFuture<'static, Result<()>>>;

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Uninitialized,
    Connecting,
    Started,
    Disposed,
}

enum Lifecycle {
    Uninitialized,
    Connecting { attempt: u64, pending: SharedConnect },
    Started { token_cache: Arc<TokenCache> },
    Disposed,
}

struct GatewayInner {
    config: GatewayConfig,
    transport: Arc<dyn EntitlementsTransport>,
    strategy: Arc<dyn DecisionStrategy>,
    snapshots: SnapshotCache,
    observer: ObserverSlot,
    lifecycle: Arc<Mutex<Lifecycle>>,
    connect_attempts: Mutex<u64>,
}

impl GatewayInner {
    fn require_started(&self) -> Result<Arc<TokenCache>> {
        match &*self.lifecycle.lock() {
            Lifecycle::Started { token_cache } => Ok(token_cache.clone()),
            Lifecycle::Disposed => Err(EntitlementsError::Disposed),
            _ => Err(EntitlementsError::NotStarted),
        }
    }

    async fn snapshot(&self, token_cache: &Arc<TokenCache>) -> Result<Arc<EntitlementsSnapshot>> {
        load_snapshot(&self.snapshots, &self.transport, token_cache).await
    }
}

/// Cached snapshot, or a fresh one built from concurrent user and catalog reads
async fn load_snapshot(
    snapshots: &SnapshotCache,
    transport: &Arc<dyn EntitlementsTransport>,
    token_cache: &Arc<TokenCache>,
) -> Result<Arc<EntitlementsSnapshot>> {
    let transport = transport.clone();
    let token_cache = token_cache.clone();

    snapshots
        .get_or_refresh(move || async move {
            let token = bearer_token(&token_cache).await?;
            let (user, operations) = futures::try_join!(
                transport.read_user(&token),
                transport.read_operations(ALL_PRODUCTS),
            )?;
            Ok(EntitlementsSnapshot::new(user, operations))
        })
        .await
}

/// One connect attempt, shared by every concurrent `connect` caller
///
/// The lifecycle is held weakly: the lifecycle owns this task while it is
/// pending, and an abandoned connect must not keep the gateway alive.
struct ConnectTask {
    lifecycle: Weak<Mutex<Lifecycle>>,
    snapshots: SnapshotCache,
    transport: Arc<dyn EntitlementsTransport>,
    token_cache: Arc<TokenCache>,
    eager: bool,
    attempt: u64,
    environment: String,
}

impl ConnectTask {
    async fn run(self) -> Result<()> {
        let loaded = if self.eager {
            load_snapshot(&self.snapshots, &self.transport, &self.token_cache)
                .await
                .map(|_| ())
        } else {
            Ok(())
        };

        let Some(handle) = self.lifecycle.upgrade() else {
            return Err(EntitlementsError::Disposed);
        };

        let mut lifecycle = handle.lock();
        match &*lifecycle {
            Lifecycle::Connecting { attempt, .. } if *attempt == self.attempt => {}
            Lifecycle::Disposed => return Err(EntitlementsError::Disposed),
            _ => return loaded,
        }

        match loaded {
            Ok(()) => {
                *lifecycle = Lifecycle::Started {
                    token_cache: self.token_cache,
                };
                info!(environment = %self.environment, "Entitlements gateway started");
                Ok(())
            }
            Err(e) => {
                *lifecycle = Lifecycle::Uninitialized;
                warn!(error = %e, "Entitlements gateway failed to start");
                Err(e)
            }
        }
    }
}

/// Token for an authenticated call; any failure is an identity failure
async fn bearer_token(token_cache: &TokenCache) -> Result<Token> {
    token_cache.get_token().await.map_err(|e| match e {
        EntitlementsError::IdentityFailure(_) => e,
        other => EntitlementsError::identity(format!("unable to obtain token: {}", other)),
    })
}

/// Client entry point to the entitlements service
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EntitlementsGateway {
    inner: Arc<GatewayInner>,
}

impl EntitlementsGateway {
    /// Create an unconnected gateway; the strategy comes from `config`
    pub fn new(config: GatewayConfig, transport: Arc<dyn EntitlementsTransport>) -> Self {
        let strategy = config.strategy.build();
        Self::with_strategy(config, transport, strategy)
    }

    pub fn with_strategy(
        config: GatewayConfig,
        transport: Arc<dyn EntitlementsTransport>,
        strategy: Arc<dyn DecisionStrategy>,
    ) -> Self {
        let snapshots = SnapshotCache::new(config.snapshot_refresh_interval);

        Self {
            inner: Arc::new(GatewayInner {
                config,
                transport,
                strategy,
                snapshots,
                observer: ObserverSlot::default(),
                lifecycle: Arc::new(Mutex::new(Lifecycle::Uninitialized)),
                connect_attempts: Mutex::new(0),
            }),
        }
    }

    /// Create, connect and (optionally) bind an observer in one step
    pub async fn start(
        config: GatewayConfig,
        transport: Arc<dyn EntitlementsTransport>,
        token_cache: Arc<TokenCache>,
        observer: Option<AuthorizationObserver>,
        eager: bool,
    ) -> Result<Self> {
        config.validate()?;

        let gateway = Self::new(config, transport);
        if let Err(e) = gateway.connect(token_cache, eager).await {
            gateway.dispose();
            return Err(e);
        }

        if let Some(observer) = observer {
            gateway.inner.observer.bind(observer)?;
        }

        Ok(gateway)
    }

    pub async fn for_development(
        transport: Arc<dyn EntitlementsTransport>,
        token_cache: Arc<TokenCache>,
        observer: Option<AuthorizationObserver>,
        eager: bool,
    ) -> Result<Self> {
        Self::start(GatewayConfig::development(), transport, token_cache, observer, eager).await
    }

    pub async fn for_staging(
        transport: Arc<dyn EntitlementsTransport>,
        token_cache: Arc<TokenCache>,
        observer: Option<AuthorizationObserver>,
        eager: bool,
    ) -> Result<Self> {
        Self::start(GatewayConfig::staging(), transport, token_cache, observer, eager).await
    }

    pub async fn for_production(
        transport: Arc<dyn EntitlementsTransport>,
        token_cache: Arc<TokenCache>,
        observer: Option<AuthorizationObserver>,
        eager: bool,
    ) -> Result<Self> {
        Self::start(GatewayConfig::production(), transport, token_cache, observer, eager).await
    }

    pub async fn for_admin(
        transport: Arc<dyn EntitlementsTransport>,
        token_cache: Arc<TokenCache>,
        observer: Option<AuthorizationObserver>,
        eager: bool,
    ) -> Result<Self> {
        Self::start(GatewayConfig::admin(), transport, token_cache, observer, eager).await
    }

    /// Environment description (e.g. development, production)
    pub fn environment(&self) -> &str {
        &self.inner.config.environment
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn state(&self) -> GatewayState {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Uninitialized => GatewayState::Uninitialized,
            Lifecycle::Connecting { .. } => GatewayState::Connecting,
            Lifecycle::Started { .. } => GatewayState::Started,
            Lifecycle::Disposed => GatewayState::Disposed,
        }
    }

    /// Connect using `token_cache` for every authenticated call
    ///
    /// With `eager`, the entitlements snapshot is fetched before the connect
    /// completes. A failed connect leaves the gateway `Uninitialized`.
    pub async fn connect(&self, token_cache: Arc<TokenCache>, eager: bool) -> Result<()> {
        let pending = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match &*lifecycle {
                Lifecycle::Disposed => return Err(EntitlementsError::Disposed),
                Lifecycle::Started { .. } => return Ok(()),
                Lifecycle::Connecting { pending, .. } => pending.clone(),
                Lifecycle::Uninitialized => {
                    let attempt = {
                        let mut attempts = self.inner.connect_attempts.lock();
                        *attempts += 1;
                        *attempts
                    };

                    debug!(attempt, eager, "Connecting entitlements gateway");

                    let task = ConnectTask {
                        lifecycle: Arc::downgrade(&self.inner.lifecycle),
                        snapshots: self.inner.snapshots.clone(),
                        transport: self.inner.transport.clone(),
                        token_cache,
                        eager,
                        attempt,
                        environment: self.inner.config.environment.clone(),
                    };
                    let pending = task.run().boxed().shared();

                    *lifecycle = Lifecycle::Connecting {
                        attempt,
                        pending: pending.clone(),
                    };
                    pending
                }
            }
        };

        pending.await
    }

    /// Decide whether the current user may perform `operation`
    ///
    /// Settled locally when the strategy can; otherwise the remote authority
    /// decides. The observer sees the request/response pair either way.
    pub async fn authorize(&self, operation: &str, data: Option<Value>) -> Result<bool> {
        let token_cache = self.inner.require_started()?;

        if operation.is_empty() {
            return Err(EntitlementsError::invalid("operation must not be empty"));
        }
        let strategy = &self.inner.strategy;

        let snapshot = if strategy.requires_snapshot() {
            Some(self.inner.snapshot(&token_cache).await?)
        } else {
            None
        };

        let decision = strategy.decide(snapshot.as_deref(), operation, data.as_ref());

        let local = match &snapshot {
            Some(snapshot) => decision.into_result(snapshot, operation, data.as_ref()),
            None => None,
        };

        let result = match local {
            Some(result) => {
                debug!(operation, strategy = strategy.name(), "Authorization resolved locally");
                result
            }
            None => {
                debug!(operation, strategy = strategy.name(), "Authorization deferred to remote");
                let token = bearer_token(&token_cache).await?;
                let payload = AuthorizationPayload::new(operation, data);
                self.inner.transport.authorize(&token, &payload).await?
            }
        };

        self.inner.observer.notify(&result);

        Ok(result.response.is_authorized())
    }

    /// Bind the authorization observer; only one may ever be bound
    pub fn register_authorization_observer<F>(&self, observer: F) -> Result<()>
    where
        F: Fn(&AuthorizationRequestDetail, &AuthorizationResponseDetail) + Send + Sync + 'static,
    {
        if self.state() == GatewayState::Disposed {
            return Err(EntitlementsError::Disposed);
        }
        self.inner.observer.bind(Arc::new(observer))
    }

    pub fn has_observer(&self) -> bool {
        self.inner.observer.is_bound()
    }

    /// Read the current user's roles and permissions
    pub async fn read_user(&self) -> Result<UserEntitlements> {
        let token_cache = self.inner.require_started()?;
        let token = bearer_token(&token_cache).await?;
        self.inner.transport.read_user(&token).await
    }

    /// Read the operation catalog; `None` means every product
    pub async fn read_operations(&self, product: Option<&str>) -> Result<Vec<Operation>> {
        self.inner.require_started()?;
        self.inner
            .transport
            .read_operations(product.unwrap_or(ALL_PRODUCTS))
            .await
    }

    /// Read the remote service's version and environment
    pub async fn read_service_metadata(&self) -> Result<ServiceMetadata> {
        self.inner.require_started()?;
        self.inner.transport.read_service_metadata().await
    }

    /// Cached snapshot, if one has been fetched
    pub fn snapshot(&self) -> Option<Arc<EntitlementsSnapshot>> {
        self.inner.snapshots.current()
    }

    /// Drop the cached snapshot so the next authorization refetches it
    pub fn invalidate_snapshot(&self) {
        self.inner.snapshots.invalidate();
        debug!("Entitlements snapshot invalidated");
    }

    /// Release the snapshot and reject every later call
    ///
    /// The token cache is not disposed; it belongs to the caller.
    pub fn dispose(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Disposed) {
            return;
        }

        *lifecycle = Lifecycle::Disposed;
        self.inner.snapshots.clear();

        info!(environment = %self.inner.config.environment, "Entitlements gateway disposed");
    }
}

impl std::fmt::Debug for EntitlementsGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementsGateway")
            .field("environment", &self.inner.config.environment)
            .field("strategy", &self.inner.strategy.name())
            .field("state", &self.state())
            .finish()
    }
}

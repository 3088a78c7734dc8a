//! Cached user entitlements and operation catalog
//!
//! An [`EntitlementsSnapshot`] is immutable once built. [`SnapshotCache`]
//! replaces it wholesale when it goes stale, with at most one fetch in flight.

use chrono::{DateTime, Utc};
use entitlements_core::types::{AuthorizationRequestDetail, RequestUser};
use entitlements_core::{Operation, Permission, Result, Role, User, UserEntitlements};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Snapshot refresh interval used by the gateway
pub const DEFAULT_SNAPSHOT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Immutable view of a user's roles and the operation catalog
#[derive(Debug, Clone)]
pub struct EntitlementsSnapshot {
    user: User,
    roles: Vec<Role>,
    operations: Vec<Operation>,
    fetched_at: Instant,
    fetched_at_utc: DateTime<Utc>,
}

impl EntitlementsSnapshot {
    /// Build a snapshot stamped with the current time
    pub fn new(entitlements: UserEntitlements, operations: Vec<Operation>) -> Self {
        Self {
            user: entitlements.user,
            roles: entitlements.roles,
            operations,
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// Wall-clock fetch time, for diagnostics
    pub fn fetched_at_utc(&self) -> DateTime<Utc> {
        self.fetched_at_utc
    }

    pub fn is_stale(&self, refresh_interval: Duration, now: Instant) -> bool {
        now > self.fetched_at + refresh_interval
    }

    pub fn find_operation(&self, operation_id: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.id == operation_id)
    }

    /// Permissions granting `operation_id`, in role order then permission order
    pub fn permissions_for<'a>(&'a self, operation_id: &'a str) -> impl Iterator<Item = &'a Permission> + 'a {
        self.roles
            .iter()
            .flat_map(|role| role.permissions.iter())
            .filter(move |permission| permission.operation.id == operation_id)
    }

    pub fn request_user(&self) -> RequestUser {
        RequestUser {
            user: self.user.id.clone(),
            context: self.user.context.clone(),
            roles: self.roles.iter().map(|r| r.id.clone()).collect(),
        }
    }

    /// Request detail for a locally decided operation; `None` when the
    /// operation is not in the catalog
    pub fn request_detail(&self, operation_id: &str, data: Option<&Value>) -> Option<AuthorizationRequestDetail> {
        let operation = self.find_operation(operation_id)?;

        Some(AuthorizationRequestDetail {
            user: self.request_user(),
            operation: operation.clone(),
            data: data.cloned(),
        })
    }
}

type SharedSnapshot = Shared<BoxFuture<'static, Result<Arc<EntitlementsSnapshot>>>>;

#[derive(Default)]
struct SnapshotState {
    current: Option<Arc<EntitlementsSnapshot>>,
    pending: Option<SharedSnapshot>,
    generation: u64,
}

/// Single-flight cache for the entitlements snapshot
///
/// Clones share the cached snapshot and any in-flight fetch.
#[derive(Clone)]
pub struct SnapshotCache {
    refresh_interval: Duration,
    state: Arc<Mutex<SnapshotState>>,
}

impl SnapshotCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            state: Arc::new(Mutex::new(SnapshotState::default())),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Cached snapshot, or the result of `fetch` when missing or stale
    ///
    /// `fetch` is only invoked when no fetch is already in flight; concurrent
    /// callers share the in-flight one.
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<Arc<EntitlementsSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EntitlementsSnapshot>> + Send + 'static,
    {
        let pending = {
            let mut state = self.state.lock();

            if let Some(current) = &state.current {
                if !current.is_stale(self.refresh_interval, Instant::now()) {
                    return Ok(current.clone());
                }
                debug!("Entitlements snapshot is stale");
            }

            if let Some(pending) = state.pending.clone() {
                pending
            } else {
                state.generation += 1;
                let generation = state.generation;
                // Weak: the state owns this future while it is pending
                let shared_state = Arc::downgrade(&self.state);
                let fetching = fetch();

                let pending = async move {
                    let result = fetching.await.map(Arc::new);
                    if let Some(state) = shared_state.upgrade() {
                        complete(&state, generation, &result);
                    }
                    result
                }
                .boxed()
                .shared();

                state.pending = Some(pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Cached snapshot without triggering a fetch
    pub fn current(&self) -> Option<Arc<EntitlementsSnapshot>> {
        self.state.lock().current.clone()
    }

    /// Force the next call to fetch
    pub fn invalidate(&self) {
        self.state.lock().current = None;
    }

    /// Drop the snapshot and detach any in-flight fetch
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.current = None;
        state.pending = None;
        state.generation += 1;
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_REFRESH_INTERVAL)
    }
}

fn complete(state: &Mutex<SnapshotState>, generation: u64, result: &Result<Arc<EntitlementsSnapshot>>) {
    let mut state = state.lock();
    if state.generation != generation {
        return;
    }

    state.pending = None;
    match result {
        Ok(snapshot) => {
            info!(
                user = %snapshot.user().id,
                roles = snapshot.roles().len(),
                operations = snapshot.operations().len(),
                "Entitlements snapshot refreshed"
            );
            state.current = Some(snapshot.clone());
        }
        Err(e) => {
            warn!(error = %e, "Entitlements snapshot fetch failed");
            state.current = None;
        }
    }
}

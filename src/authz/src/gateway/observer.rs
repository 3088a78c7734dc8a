//! Authorization observer slot

use entitlements_core::{AuthorizationRequestDetail, AuthorizationResponseDetail, AuthorizationResult};
use entitlements_core::{EntitlementsError, Result};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Callback notified after every authorization, local or remote
pub type AuthorizationObserver =
    Arc<dyn Fn(&AuthorizationRequestDetail, &AuthorizationResponseDetail) + Send + Sync>;

/// Wrap a closure as an [`AuthorizationObserver`]
pub fn observer<F>(f: F) -> AuthorizationObserver
where
    F: Fn(&AuthorizationRequestDetail, &AuthorizationResponseDetail) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Holds at most one observer, ever
#[derive(Default)]
pub(crate) struct ObserverSlot {
    observer: RwLock<Option<AuthorizationObserver>>,
}

impl ObserverSlot {
    pub(crate) fn bind(&self, observer: AuthorizationObserver) -> Result<()> {
        let mut slot = self.observer.write();
        if slot.is_some() {
            return Err(EntitlementsError::ObserverAlreadyBound);
        }
        *slot = Some(observer);
        Ok(())
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.observer.read().is_some()
    }

    /// Notify the observer; a panicking observer is logged and ignored
    pub(crate) fn notify(&self, result: &AuthorizationResult) {
        let Some(observer) = self.observer.read().clone() else {
            return;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| observer(&result.request, &result.response)));
        if outcome.is_err() {
            warn!(
                operation = %result.request.operation.id,
                "Authorization observer panicked"
            );
        }
    }
}

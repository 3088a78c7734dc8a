//! Local authorization decision engine
//!
//! Evaluates a cached [`EntitlementsSnapshot`] against a requested operation
//! without any I/O. Anything the cached data cannot settle comes back as
//! [`Decision::Deferred`] for the remote authority.
//!
//! # Restriction precedence
//!
//! ```text
//! operation not in catalog        → Deferred
//! no permission grants it         → Denied
//! every permission rate-limited   → Deferred
//! every permission count-limited  → highest ceiling vs data.count
//! anything else                   → Authorized
//! ```

pub mod decision;
pub mod strategy;

pub use decision::Decision;
pub use strategy::{DecisionStrategy, LocalFirstStrategy, RemoteOnlyStrategy, StrategyKind};

use crate::snapshot::EntitlementsSnapshot;
use entitlements_core::{Advice, Permission, Restriction, RestrictionUsage};
use serde_json::{Number, Value};
use tracing::debug;

/// Decide `operation_id` for the snapshot's user
///
/// `data` carries usage for count-limited operations (`{"count": n}`).
pub fn decide(snapshot: &EntitlementsSnapshot, operation_id: &str, data: Option<&Value>) -> Decision {
    if snapshot.find_operation(operation_id).is_none() {
        debug!(operation = operation_id, "Operation not in cached catalog, deferring");
        return Decision::Deferred;
    }

    let permissions: Vec<&Permission> = snapshot.permissions_for(operation_id).collect();

    if permissions.is_empty() {
        debug!(operation = operation_id, "No permission grants operation");
        return Decision::denied();
    }

    if permissions.iter().all(|p| p.is_rate_limited_only()) {
        debug!(operation = operation_id, "Rate-limited permissions only, deferring");
        return Decision::Deferred;
    }

    if permissions.iter().all(|p| p.is_count_limited_only()) {
        return decide_count_limited(&permissions, data);
    }

    // Mixed restriction kinds, or an unrestricted permission: grant.
    Decision::authorized()
}

fn decide_count_limited(permissions: &[&Permission], data: Option<&Value>) -> Decision {
    // Highest ceiling wins; the first one encountered on ties.
    let ceiling = permissions
        .iter()
        .flat_map(|p| p.restrictions.iter())
        .filter(|r| r.is_count_limited())
        .fold(None::<&Restriction>, |best, r| match best {
            Some(b) if ceiling_value(b) >= ceiling_value(r) => Some(b),
            _ => Some(r),
        });

    let Some(restriction) = ceiling else {
        return Decision::Deferred;
    };

    let requested = requested_count(data);
    let authorized = match (&requested, restriction.count()) {
        (Some(actual), Some(count)) => within_ceiling(count, actual),
        _ => false,
    };

    let advice = Advice {
        restriction: restriction.clone(),
        restricted: !authorized,
        additional: requested.map(|actual| RestrictionUsage { actual }),
    };

    debug!(ceiling = ?ceiling_value(restriction), authorized, "Count-limited decision");

    if authorized {
        Decision::Authorized { advice: vec![advice] }
    } else {
        Decision::Denied { advice: vec![advice] }
    }
}

fn requested_count(data: Option<&Value>) -> Option<Number> {
    match data?.get("count")? {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    }
}

/// Ceiling as a float for ordering; a missing ceiling sorts lowest
fn ceiling_value(restriction: &Restriction) -> Option<f64> {
    restriction.count().and_then(Number::as_f64)
}

fn within_ceiling(count: &Number, actual: &Number) -> bool {
    if let (Some(count), Some(actual)) = (count.as_u64(), actual.as_u64()) {
        return count >= actual;
    }

    // Negative or fractional values on either side
    match (count.as_f64(), actual.as_f64()) {
        (Some(count), Some(actual)) => count >= actual,
        _ => false,
    }
}

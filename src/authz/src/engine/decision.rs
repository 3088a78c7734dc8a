//! Local authorization decisions

use crate::snapshot::EntitlementsSnapshot;
use entitlements_core::{Advice, AuthorizationResponseDetail, AuthorizationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of evaluating a snapshot against an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Access granted by the cached entitlements
    Authorized { advice: Vec<Advice> },

    /// Access refused by the cached entitlements
    Denied { advice: Vec<Advice> },

    /// Cached data cannot settle it; ask the remote authority
    Deferred,
}

impl Decision {
    pub fn authorized() -> Self {
        Decision::Authorized { advice: Vec::new() }
    }

    pub fn denied() -> Self {
        Decision::Denied { advice: Vec::new() }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Decision::Authorized { .. })
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Decision::Deferred)
    }

    pub fn advice(&self) -> &[Advice] {
        match self {
            Decision::Authorized { advice } | Decision::Denied { advice } => advice,
            Decision::Deferred => &[],
        }
    }

    /// Response the remote service would have produced; `None` when deferred
    pub fn into_response(self) -> Option<AuthorizationResponseDetail> {
        match self {
            Decision::Authorized { advice } => Some(AuthorizationResponseDetail {
                authorized: Some(true),
                advice,
            }),
            Decision::Denied { advice } => Some(AuthorizationResponseDetail {
                authorized: Some(false),
                advice,
            }),
            Decision::Deferred => None,
        }
    }

    /// Request/response pair for a locally settled decision
    pub fn into_result(
        self,
        snapshot: &EntitlementsSnapshot,
        operation_id: &str,
        data: Option<&Value>,
    ) -> Option<AuthorizationResult> {
        let request = snapshot.request_detail(operation_id, data)?;
        let response = self.into_response()?;

        Some(AuthorizationResult { request, response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitlements_core::Restriction;

    #[test]
    fn test_deferred_has_no_response() {
        assert!(Decision::Deferred.into_response().is_none());
        assert!(Decision::Deferred.advice().is_empty());
    }

    #[test]
    fn test_denied_response() {
        let decision = Decision::Denied {
            advice: vec![Advice {
                restriction: Restriction::count_limited(100),
                restricted: true,
                additional: None,
            }],
        };

        assert!(!decision.is_authorized());
        assert_eq!(decision.advice().len(), 1);

        let response = decision.into_response().unwrap();
        assert_eq!(response.authorized, Some(false));
        assert!(response.advice[0].restricted);
    }
}

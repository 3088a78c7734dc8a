//! Decision strategies selected by configuration
//!
//! `LocalFirst` settles what it can from the cached snapshot and defers the
//! rest. `RemoteOnly` sends every request to the remote authority.

use super::decision::Decision;
use crate::snapshot::EntitlementsSnapshot;
use entitlements_core::EntitlementsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

/// How the gateway reaches a decision
pub trait DecisionStrategy: Debug + Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Whether `decide` needs a snapshot to do anything useful
    fn requires_snapshot(&self) -> bool;

    /// Decide without I/O
    fn decide(&self, snapshot: Option<&EntitlementsSnapshot>, operation_id: &str, data: Option<&Value>) -> Decision;
}

/// Evaluate the cached snapshot, defer what it cannot settle
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFirstStrategy;

impl DecisionStrategy for LocalFirstStrategy {
    fn name(&self) -> &'static str {
        "local-first"
    }

    fn requires_snapshot(&self) -> bool {
        true
    }

    fn decide(&self, snapshot: Option<&EntitlementsSnapshot>, operation_id: &str, data: Option<&Value>) -> Decision {
        match snapshot {
            Some(snapshot) => super::decide(snapshot, operation_id, data),
            None => Decision::Deferred,
        }
    }
}

/// Always defer to the remote authority
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteOnlyStrategy;

impl DecisionStrategy for RemoteOnlyStrategy {
    fn name(&self) -> &'static str {
        "remote-only"
    }

    fn requires_snapshot(&self) -> bool {
        false
    }

    fn decide(&self, _snapshot: Option<&EntitlementsSnapshot>, _operation_id: &str, _data: Option<&Value>) -> Decision {
        Decision::Deferred
    }
}

/// Configurable strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    LocalFirst,
    RemoteOnly,
}

impl StrategyKind {
    pub fn build(self) -> Arc<dyn DecisionStrategy> {
        match self {
            StrategyKind::LocalFirst => Arc::new(LocalFirstStrategy),
            StrategyKind::RemoteOnly => Arc::new(RemoteOnlyStrategy),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = EntitlementsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local-first" | "local" => Ok(StrategyKind::LocalFirst),
            "remote-only" | "remote" => Ok(StrategyKind::RemoteOnly),
            other => Err(EntitlementsError::configuration(format!(
                "unknown decision strategy '{}'",
                other
            ))),
        }
    }
}

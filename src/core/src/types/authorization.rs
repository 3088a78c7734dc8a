//! Authorization request/response detail, as exchanged with the remote
//! service and handed to the authorization observer

use super::catalog::{Operation, Restriction, UserEntitlements};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a remote authorization call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    pub operation: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AuthorizationPayload {
    pub fn new(operation: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            operation: operation.into(),
            data,
        }
    }
}

/// User section of an authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUser {
    pub user: String,
    pub context: String,

    /// Role identifiers only
    #[serde(default)]
    pub roles: Vec<String>,
}

impl From<&UserEntitlements> for RequestUser {
    fn from(entitlements: &UserEntitlements) -> Self {
        Self {
            user: entitlements.user.id.clone(),
            context: entitlements.user.context.clone(),
            roles: entitlements.roles.iter().map(|r| r.id.clone()).collect(),
        }
    }
}

/// What was asked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequestDetail {
    pub user: RequestUser,
    pub operation: Operation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Measured usage reported alongside count advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionUsage {
    pub actual: serde_json::Number,
}

/// Which restriction applied and whether it blocked access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub restriction: Restriction,
    pub restricted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<RestrictionUsage>,
}

/// What was answered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponseDetail {
    /// Absent in some remote responses; absent means not authorized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,

    #[serde(default)]
    pub advice: Vec<Advice>,
}

impl AuthorizationResponseDetail {
    pub fn is_authorized(&self) -> bool {
        self.authorized.unwrap_or(false)
    }
}

/// Request/response pair produced either locally or by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub request: AuthorizationRequestDetail,
    pub response: AuthorizationResponseDetail,
}

/// Information about the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub semver: String,
    pub environment: String,
}

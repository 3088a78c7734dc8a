//! Remote entitlements service calls

use crate::error::Result;
use crate::types::{AuthorizationPayload, AuthorizationResult, Operation, ServiceMetadata, UserEntitlements};
use async_trait::async_trait;

/// Remote calls the gateway depends on
///
/// Calls that take a `token` must send it as the bearer credential; the
/// catalog and metadata reads are unauthenticated.
#[async_trait]
pub trait EntitlementsTransport: Send + Sync {
    /// Read the current user's roles and permissions
    async fn read_user(&self, token: &str) -> Result<UserEntitlements>;

    /// Read the operation catalog for a product (`"*"` for all products)
    async fn read_operations(&self, product: &str) -> Result<Vec<Operation>>;

    /// Ask the remote authority for a decision
    async fn authorize(&self, token: &str, payload: &AuthorizationPayload) -> Result<AuthorizationResult>;

    /// Read the remote service's version and environment
    async fn read_service_metadata(&self) -> Result<ServiceMetadata>;
}

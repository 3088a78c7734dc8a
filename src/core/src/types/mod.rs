//! Shared types for the entitlements client

pub mod catalog;
pub mod authorization;

// Re-export commonly used types
pub use catalog::{Operation, Permission, Restriction, Role, User, UserEntitlements};
pub use authorization::{
    Advice, AuthorizationPayload, AuthorizationRequestDetail, AuthorizationResponseDetail,
    AuthorizationResult, RequestUser, RestrictionUsage, ServiceMetadata,
};

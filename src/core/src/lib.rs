//! # Entitlements Core
//!
//! Shared types, collaborator traits, and error handling for the entitlements
//! client. The authorization crate builds on these; transports implement the
//! traits.

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{EntitlementsError, Result};
pub use types::{
    Advice, AuthorizationPayload, AuthorizationRequestDetail, AuthorizationResponseDetail,
    AuthorizationResult, Operation, Permission, RequestUser, Restriction, RestrictionUsage, Role,
    ServiceMetadata, User, UserEntitlements,
};
pub use traits::{EntitlementsTransport, TokenGenerator};

/// Opaque bearer credential
pub type Token = String;

/// Operation identifier (e.g. "watchlist.exports.csv")
pub type OperationId = String;

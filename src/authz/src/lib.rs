//! # Entitlements Client
//!
//! Client-side authorization against a remote entitlements service.
//!
//! ## Features
//!
//! - **Token caching** with single-flight refresh, jitter and anonymous fallback
//! - **Retry with exponential backoff** for token generation
//! - **Local decisions** from a cached snapshot of the user's roles and the operation catalog
//! - **Remote fallback** when the cached data cannot settle a decision
//! - **Authorization observer** for audit hooks
//!
//! ## Example
//!
//! ```rust,no_run
//! use entitlements_authz::{EntitlementsGateway, GatewayConfig, TokenCache};
//! use entitlements_core::{EntitlementsError, EntitlementsTransport};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(transport: Arc<dyn EntitlementsTransport>) -> Result<(), EntitlementsError> {
//! let tokens = Arc::new(TokenCache::new(
//!     || async { Ok::<_, EntitlementsError>("signed.jwt".to_string()) },
//!     Some(Duration::from_secs(300)),
//! ));
//!
//! let gateway = EntitlementsGateway::start(GatewayConfig::production(), transport, tokens, None, true).await?;
//!
//! if gateway.authorize("watchlist.exports.csv", Some(json!({ "count": 50 }))).await? {
//!     println!("Export granted");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod engine;
pub mod gateway;
pub mod snapshot;
pub mod token;

// Re-export commonly used types
pub use backoff::BackoffRunner;
pub use engine::{decide, Decision, DecisionStrategy, LocalFirstStrategy, RemoteOnlyStrategy, StrategyKind};
pub use gateway::{observer, AuthorizationObserver, EntitlementsGateway, GatewayConfig, GatewayState, Protocol};
pub use snapshot::{EntitlementsSnapshot, SnapshotCache, DEFAULT_SNAPSHOT_REFRESH_INTERVAL};
pub use token::{RefreshPolicy, TokenCache, TokenCacheBuilder, DEFAULT_REFRESH_INTERVAL};

pub use entitlements_core::{EntitlementsError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Raw token generation

use crate::error::Result;
use crate::Token;
use async_trait::async_trait;
use std::future::Future;

/// Produces a raw signed credential
///
/// Implemented for any `Fn() -> impl Future<Output = Result<Token>>`, so a
/// closure around an impersonation endpoint is enough.
#[async_trait]
pub trait TokenGenerator: Send + Sync {
    async fn generate(&self) -> Result<Token>;
}

#[async_trait]
impl<F, Fut> TokenGenerator for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Token>> + Send + 'static,
{
    async fn generate(&self) -> Result<Token> {
        (self)().await
    }
}

//! Collaborator traits implemented outside the core
//!
//! The HTTP layer (endpoint construction, bearer header injection, response
//! decoding) lives behind these traits.

pub mod transport;
pub mod token;

// Re-export commonly used traits
pub use transport::EntitlementsTransport;
pub use token::TokenGenerator;

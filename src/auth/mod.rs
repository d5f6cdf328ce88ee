//! Authentication module
//!
//! The Visma.net API uses an OAuth2 client-credentials grant with the
//! tenant id carried in the token request body. The `Authenticator` caches
//! the access token for the lifetime of a run and refreshes it on expiry.
//!
//! The authenticator is constructed and injected explicitly; nothing here
//! is process-wide.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{CachedToken, OAuthConfig};

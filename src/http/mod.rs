//! HTTP transport module
//!
//! The transport collaborator the extraction engine calls into: a reqwest
//! client with retry, backoff, token-bucket rate limiting, and bearer auth.
//!
//! The engine only sees the narrow [`Transport`] trait: path + query
//! parameters in, decoded JSON body out. Responses are decoded with
//! serde_json's arbitrary-precision numbers so monetary fields never pass
//! through floating point.

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, Transport};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;

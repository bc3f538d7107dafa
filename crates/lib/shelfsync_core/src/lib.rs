//! # shelfsync_core
//!
//! Caching layer in front of the marketplace content API.
//!
//! Two independent caches live here: a per-account product catalog cache
//! with a short TTL ([`products::ProductCache`]) and a global subject
//! characteristics cache with a long TTL
//! ([`characteristics::CharacteristicsCache`]). Both refresh through the
//! [`upstream::UpstreamClient`] seam under a [`retry::RetryPolicy`], and both
//! persist through the traits in [`store`]. [`service::CacheService`] wraps
//! them in the uniform [`envelope::Envelope`] consumed by outer layers.

pub mod characteristics;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod migrate;
pub mod models;
pub mod products;
pub mod retry;
pub mod service;
pub mod store;
pub mod sync;
pub mod ttl;
pub mod upstream;
pub mod uuid;

pub use config::CacheConfig;
pub use envelope::Envelope;
pub use error::CacheError;
pub use service::CacheService;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}

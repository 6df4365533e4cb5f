// src/lib.rs
//! Socket-intents interposition shim
//!
//! A process-local interposition layer for the socket API. Built as a
//! `cdylib` and loaded via `LD_PRELOAD`, it transparently overrides
//! `socket`, `bind`, `connect`, `setsockopt`, `getsockopt`, `getaddrinfo`,
//! and `close`, tracks every socket the process opens in a per-socket
//! context, and redirects intent-bearing calls to an external
//! access-management policy service. It implements no network policy itself
//! and gives no quality-of-service guarantees.
//!
//! # Architecture
//!
//! - **interception**: symbol resolution, reentrancy guards, the socket
//!   context registry, resolver sessions, and the exported call hooks
//! - **policy**: the policy-service contract the hooks delegate to
//! - **observability**: lazy tracing setup for a preloaded library
//! - **utils**: configuration and error types

// Public module exports
pub mod interception;
pub mod observability;
pub mod policy;
pub mod utils;

// Re-export commonly used types
pub use interception::registry::{Registry, SocketContext};
pub use interception::resolver::SessionId;
pub use policy::{install as install_policy, PassthroughPolicy, PolicyService};
pub use utils::config::ShimConfig;
pub use utils::errors::{Result, ShimError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

// src/interception/mod.rs
//! Socket call interposition layer
//!
//! Transparent interception of the socket-creation and configuration calls:
//!
//! - **Symbol Resolver**: `dlsym(RTLD_NEXT)` lookup of the original
//!   implementations, cached per call site
//! - **Reentrancy Guard**: thread-local per-call flags that break recursion
//!   when our own delegation re-enters an interposed symbol
//! - **Registry**: concurrent descriptor → context mapping
//! - **Resolver Sessions**: explicit context binding for `getaddrinfo`,
//!   which has no descriptor of its own
//! - **Hooks**: the exported `extern "C"` call definitions (Linux)
//!
//! # Architecture
//!
//! ```text
//! Application (unmodified)
//!     │
//!     ├─ socket()         → hook → original, then register context
//!     ├─ bind()           → hook → original
//!     ├─ connect()        → hook → context? policy service : original
//!     ├─ set/getsockopt() → hook → context? policy service : original
//!     ├─ getaddrinfo()    → hook → active session? policy service : original
//!     └─ close()          → hook → remove context, then original
//! ```

pub mod guard;
#[cfg(target_os = "linux")]
pub mod hooks;
pub mod registry;
pub mod resolver;
pub mod symbols;

// Re-export commonly used types
pub use guard::{Hook, HookGuard};
pub use registry::{Registry, SocketContext};
pub use resolver::{ResolverSessions, SessionId};

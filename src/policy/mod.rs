// src/policy/mod.rs
//! Policy service contract
//!
//! The shim core decides *whether* a call is delegated; the policy service
//! decides *what* an intent-bearing call means for the socket. Everything
//! behind this trait (intent interpretation, option translation, address
//! selection, the transport to an external access manager) is outside the
//! core.
//!
//! Entry points mirror the calls they back and return the same result
//! convention; an implementation is free to invoke the original call itself
//! (the per-call reentrancy guard held by the hook routes such nested calls
//! straight through). The provided defaults forward to the originals, so an
//! empty impl behaves exactly like an uninstrumented process.

use crate::interception::registry::SocketContext;
use crate::interception::symbols::{self, set_errno};
use crate::utils::errors::Result;
use libc::{addrinfo, c_char, c_int, c_void, sockaddr, socklen_t};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use tracing::info;

/// External access-management collaborator
pub trait PolicyService: Send + Sync {
    /// Produce the opaque per-socket payload stored in a fresh context.
    ///
    /// Failure degrades the socket to unmanaged; it does not fail the
    /// intercepted `socket` call.
    fn init_context(&self) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(()))
    }

    /// Connect-time entry point for a managed descriptor.
    ///
    /// # Safety
    /// `addr` must be valid for `addrlen` bytes, per the `connect(2)`
    /// contract the caller is relaying.
    unsafe fn connect(
        &self,
        _context: &SocketContext,
        fd: c_int,
        addr: *const sockaddr,
        addrlen: socklen_t,
    ) -> c_int {
        match symbols::connect_fn() {
            Ok(original) => original(fd, addr, addrlen),
            Err(err) => {
                set_errno(err.errno());
                -1
            }
        }
    }

    /// Option-setting entry point for a managed descriptor.
    ///
    /// # Safety
    /// `optval` must be valid for `optlen` bytes, per `setsockopt(2)`.
    unsafe fn setsockopt(
        &self,
        _context: &SocketContext,
        fd: c_int,
        level: c_int,
        optname: c_int,
        optval: *const c_void,
        optlen: socklen_t,
    ) -> c_int {
        match symbols::setsockopt_fn() {
            Ok(original) => original(fd, level, optname, optval, optlen),
            Err(err) => {
                set_errno(err.errno());
                -1
            }
        }
    }

    /// Option-reading entry point for a managed descriptor.
    ///
    /// # Safety
    /// `optval`/`optlen` must satisfy the `getsockopt(2)` contract.
    unsafe fn getsockopt(
        &self,
        _context: &SocketContext,
        fd: c_int,
        level: c_int,
        optname: c_int,
        optval: *mut c_void,
        optlen: *mut socklen_t,
    ) -> c_int {
        match symbols::getsockopt_fn() {
            Ok(original) => original(fd, level, optname, optval, optlen),
            Err(err) => {
                set_errno(err.errno());
                -1
            }
        }
    }

    /// Address-resolution entry point for a context bound via a resolver
    /// session. Returns a `getaddrinfo(3)`-style code.
    ///
    /// # Safety
    /// Pointer arguments must satisfy the `getaddrinfo(3)` contract.
    unsafe fn getaddrinfo(
        &self,
        _context: &SocketContext,
        node: *const c_char,
        service: *const c_char,
        hints: *const addrinfo,
        res: *mut *mut addrinfo,
    ) -> c_int {
        match symbols::getaddrinfo_fn() {
            Ok(original) => original(node, service, hints, res),
            Err(err) => {
                set_errno(err.errno());
                libc::EAI_SYSTEM
            }
        }
    }

    /// Final teardown decision for a context leaving the registry.
    ///
    /// Returns the remaining usage count; zero means fully released. The
    /// registry leaks (never frees) a context reported as still in use.
    fn release_context(&self, context: &SocketContext) -> u32 {
        context.release()
    }

    /// Side-effect-free diagnostic line for table dumps
    fn describe_context(&self, context: &SocketContext) -> String {
        format!("ctx#{}", context.serial())
    }
}

/// Default policy: every entry point forwards to the original call
pub struct PassthroughPolicy;

impl PolicyService for PassthroughPolicy {}

static POLICY: Lazy<RwLock<Arc<dyn PolicyService>>> = Lazy::new(|| {
    let default: Arc<dyn PolicyService> = Arc::new(PassthroughPolicy);
    RwLock::new(default)
});

/// Install a policy service for the whole process, returning the previous one
pub fn install(policy: Arc<dyn PolicyService>) -> Arc<dyn PolicyService> {
    info!("installing policy service");
    std::mem::replace(&mut *POLICY.write(), policy)
}

/// The currently installed policy service
pub fn current() -> Arc<dyn PolicyService> {
    Arc::clone(&POLICY.read())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::registry::Registry;

    #[test]
    fn test_default_init_context() {
        let state = PassthroughPolicy.init_context().unwrap();
        assert!(state.downcast_ref::<()>().is_some());
    }

    #[test]
    fn test_default_release_decrements_usage() {
        let registry = Registry::new();
        let context = registry.create_and_register(3, &PassthroughPolicy).unwrap();
        context.retain();
        assert_eq!(PassthroughPolicy.release_context(&context), 1);
        assert_eq!(PassthroughPolicy.release_context(&context), 0);
    }

    #[test]
    fn test_describe_names_serial() {
        let registry = Registry::new();
        let context = registry.create_and_register(3, &PassthroughPolicy).unwrap();
        let line = PassthroughPolicy.describe_context(&context);
        assert!(line.contains(&context.serial().to_string()));
    }

    #[test]
    fn test_install_returns_previous() {
        // Restore the default afterwards so other tests see passthrough
        // behavior regardless of ordering.
        let previous = install(Arc::new(PassthroughPolicy));
        install(previous);
    }
}

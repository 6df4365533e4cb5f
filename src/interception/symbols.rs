// src/interception/symbols.rs
//! Symbol resolution for intercepted calls
//!
//! Locates the implementation that would have been invoked absent
//! interposition by asking the dynamic linker for the next occurrence of the
//! symbol after our own (`dlsym(RTLD_NEXT, ..)`). Each resolved address is
//! cached in a per-call-site atomic slot, so the linker is consulted at most
//! once per process per call name.
//!
//! `dlsym` may legitimately return NULL, so failure detection follows the
//! `dlerror` discipline: clear the diagnostic, resolve, then re-read it. A
//! set diagnostic (or a NULL address for a function symbol) means there is no
//! next-in-chain implementation; callers must treat that as unrecoverable for
//! the affected call.

use crate::utils::errors::{Result, ShimError};
use libc::{addrinfo, c_char, c_int, c_void, sockaddr, socklen_t};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, error};

pub type SocketFn = unsafe extern "C" fn(c_int, c_int, c_int) -> c_int;
pub type BindFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;
pub type ConnectFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;
pub type SetsockoptFn =
    unsafe extern "C" fn(c_int, c_int, c_int, *const c_void, socklen_t) -> c_int;
pub type GetsockoptFn =
    unsafe extern "C" fn(c_int, c_int, c_int, *mut c_void, *mut socklen_t) -> c_int;
pub type GetaddrinfoFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const addrinfo,
    *mut *mut addrinfo,
) -> c_int;
pub type CloseFn = unsafe extern "C" fn(c_int) -> c_int;

/// Set the calling thread's errno
#[cfg(target_os = "linux")]
pub fn set_errno(value: c_int) {
    unsafe { *libc::__errno_location() = value }
}

#[cfg(target_os = "macos")]
pub fn set_errno(value: c_int) {
    unsafe { *libc::__error() = value }
}

/// Read the calling thread's errno
#[cfg(target_os = "linux")]
pub fn last_errno() -> c_int {
    unsafe { *libc::__errno_location() }
}

#[cfg(target_os = "macos")]
pub fn last_errno() -> c_int {
    unsafe { *libc::__error() }
}

/// Resolve the next-in-chain implementation of `name`.
///
/// `name` must be NUL-terminated. Returns `None` when the linker reports an
/// error or hands back a NULL address.
fn lookup_next(name: &'static str) -> Option<NonNull<c_void>> {
    debug_assert!(name.ends_with('\0'));

    unsafe {
        // Clear any stale diagnostic before resolving
        libc::dlerror();
        let addr = libc::dlsym(libc::RTLD_NEXT, name.as_ptr() as *const c_char);
        let diag = libc::dlerror();

        if !diag.is_null() {
            let message = std::ffi::CStr::from_ptr(diag).to_string_lossy();
            error!(symbol = %name.trim_end_matches('\0'), %message, "symbol resolution failed");
            return None;
        }

        NonNull::new(addr)
    }
}

macro_rules! resolved_fn {
    ($(#[$meta:meta])* $fname:ident, $symbol:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fname() -> Result<$ty> {
            static SLOT: AtomicUsize = AtomicUsize::new(0);
            static TRIED: AtomicBool = AtomicBool::new(false);

            if !TRIED.load(Ordering::Acquire) {
                if let Some(addr) = lookup_next(concat!(stringify!($symbol), "\0")) {
                    SLOT.store(addr.as_ptr() as usize, Ordering::Release);
                    debug!(symbol = stringify!($symbol), "resolved original implementation");
                }
                TRIED.store(true, Ordering::Release);
            }

            let addr = SLOT.load(Ordering::Acquire);
            if addr != 0 {
                // Slot only ever holds an address resolved for this exact
                // function type.
                Ok(unsafe { std::mem::transmute::<usize, $ty>(addr) })
            } else {
                Err(ShimError::SymbolNotFound(stringify!($symbol)))
            }
        }
    };
}

resolved_fn!(
    /// Original `socket(2)`
    socket_fn, socket, SocketFn
);
resolved_fn!(
    /// Original `bind(2)`
    bind_fn, bind, BindFn
);
resolved_fn!(
    /// Original `connect(2)`
    connect_fn, connect, ConnectFn
);
resolved_fn!(
    /// Original `setsockopt(2)`
    setsockopt_fn, setsockopt, SetsockoptFn
);
resolved_fn!(
    /// Original `getsockopt(2)`
    getsockopt_fn, getsockopt, GetsockoptFn
);
resolved_fn!(
    /// Original `getaddrinfo(3)`
    getaddrinfo_fn, getaddrinfo, GetaddrinfoFn
);
resolved_fn!(
    /// Original `close(2)`
    close_fn, close, CloseFn
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_standard_symbols() {
        // All seven interposed names exist in libc, so resolution from a test
        // binary must succeed.
        assert!(socket_fn().is_ok());
        assert!(bind_fn().is_ok());
        assert!(connect_fn().is_ok());
        assert!(setsockopt_fn().is_ok());
        assert!(getsockopt_fn().is_ok());
        assert!(getaddrinfo_fn().is_ok());
        assert!(close_fn().is_ok());
    }

    #[test]
    fn test_resolution_is_cached() {
        let first = socket_fn().unwrap();
        let second = socket_fn().unwrap();
        assert_eq!(first as usize, second as usize);
    }

    #[test]
    fn test_unknown_symbol_reports_not_found() {
        assert!(lookup_next("intents_shim_no_such_symbol\0").is_none());
    }
}

// src/interception/hooks.rs
//! Intercepted call definitions
//!
//! `#[no_mangle] extern "C"` definitions of the seven interposed calls. When
//! the crate is built as a `cdylib` and listed in `LD_PRELOAD`, the dynamic
//! linker resolves these ahead of libc, so every socket call in the host
//! process lands here first.
//!
//! Every handler follows one shape:
//!
//! 1. resolve the original implementation; on failure report the call's
//!    standard error immediately
//! 2. if this thread is already inside this handler, delegate directly to
//!    the original
//! 3. otherwise consult the registry and either pass through or delegate to
//!    the policy service entry point
//! 4. the guard clears itself on every exit path (RAII)
//!
//! Handlers return exactly the error convention of the call they replace;
//! internal failures map onto the nearest standard error code and are
//! otherwise reported only via diagnostics.

use crate::interception::guard::{Hook, HookGuard};
use crate::interception::registry;
use crate::interception::resolver;
use crate::interception::symbols::{self, set_errno};
use crate::observability;
use crate::policy::{self, PolicyService};
use crate::utils::config::config;
use libc::{addrinfo, c_char, c_int, c_void, sockaddr, socklen_t};
use tracing::{debug, trace, warn};

fn intercepting() -> bool {
    config().intercept
}

/// Dump the socket table when `INTENTS_TRACE_TABLE` is set
fn trace_table(policy: &dyn PolicyService) {
    if config().trace_table {
        trace!("{}", registry::global().describe(policy));
    }
}

/// Intercept `socket(2)` — create the socket, then register a context.
///
/// The new descriptor is returned to the caller regardless of registration
/// outcome; a failed context initialization only degrades the descriptor to
/// unmanaged.
#[no_mangle]
pub unsafe extern "C" fn socket(domain: c_int, ty: c_int, protocol: c_int) -> c_int {
    let original = match symbols::socket_fn() {
        Ok(f) => f,
        Err(err) => {
            set_errno(err.errno());
            return -1;
        }
    };
    let _guard = match HookGuard::enter(Hook::Socket) {
        Some(g) => g,
        None => return original(domain, ty, protocol),
    };
    observability::init_tracing();
    trace!(domain, ty, protocol, "socket");

    let fd = original(domain, ty, protocol);
    if fd < 0 || !intercepting() {
        return fd;
    }

    let policy = policy::current();
    match registry::global().create_and_register(fd, policy.as_ref()) {
        Ok(context) => {
            debug!(fd, serial = context.serial(), "socket registered");
            trace_table(policy.as_ref());
        }
        Err(err) => {
            warn!(fd, %err, "context initialization failed; descriptor left unmanaged");
        }
    }

    fd
}

/// Intercept `bind(2)` — intents are not bind-time concerns, so this always
/// delegates to the original implementation.
#[no_mangle]
pub unsafe extern "C" fn bind(fd: c_int, addr: *const sockaddr, addrlen: socklen_t) -> c_int {
    let original = match symbols::bind_fn() {
        Ok(f) => f,
        Err(err) => {
            set_errno(err.errno());
            return -1;
        }
    };
    let _guard = match HookGuard::enter(Hook::Bind) {
        Some(g) => g,
        None => return original(fd, addr, addrlen),
    };
    observability::init_tracing();
    trace!(fd, "bind");

    original(fd, addr, addrlen)
}

/// Intercept `connect(2)` — delegate managed descriptors to the policy
/// service, pass the rest through.
#[no_mangle]
pub unsafe extern "C" fn connect(fd: c_int, addr: *const sockaddr, addrlen: socklen_t) -> c_int {
    let original = match symbols::connect_fn() {
        Ok(f) => f,
        Err(err) => {
            set_errno(err.errno());
            return -1;
        }
    };
    let _guard = match HookGuard::enter(Hook::Connect) {
        Some(g) => g,
        None => return original(fd, addr, addrlen),
    };
    observability::init_tracing();
    trace!(fd, "connect");

    if !intercepting() {
        return original(fd, addr, addrlen);
    }

    match registry::global().lookup(fd) {
        Some(context) => {
            debug!(fd, serial = context.serial(), "delegating connect to policy service");
            policy::current().connect(&context, fd, addr, addrlen)
        }
        None => original(fd, addr, addrlen),
    }
}

/// Intercept `setsockopt(2)` — intent-bearing options on managed descriptors
/// go to the policy service.
#[no_mangle]
pub unsafe extern "C" fn setsockopt(
    fd: c_int,
    level: c_int,
    optname: c_int,
    optval: *const c_void,
    optlen: socklen_t,
) -> c_int {
    let original = match symbols::setsockopt_fn() {
        Ok(f) => f,
        Err(err) => {
            set_errno(err.errno());
            return -1;
        }
    };
    let _guard = match HookGuard::enter(Hook::Setsockopt) {
        Some(g) => g,
        None => return original(fd, level, optname, optval, optlen),
    };
    observability::init_tracing();
    trace!(fd, level, optname, "setsockopt");

    if !intercepting() {
        return original(fd, level, optname, optval, optlen);
    }

    match registry::global().lookup(fd) {
        Some(context) => {
            debug!(fd, serial = context.serial(), "delegating setsockopt to policy service");
            policy::current().setsockopt(&context, fd, level, optname, optval, optlen)
        }
        None => original(fd, level, optname, optval, optlen),
    }
}

/// Intercept `getsockopt(2)`
#[no_mangle]
pub unsafe extern "C" fn getsockopt(
    fd: c_int,
    level: c_int,
    optname: c_int,
    optval: *mut c_void,
    optlen: *mut socklen_t,
) -> c_int {
    let original = match symbols::getsockopt_fn() {
        Ok(f) => f,
        Err(err) => {
            set_errno(err.errno());
            return -1;
        }
    };
    let _guard = match HookGuard::enter(Hook::Getsockopt) {
        Some(g) => g,
        None => return original(fd, level, optname, optval, optlen),
    };
    observability::init_tracing();
    trace!(fd, level, optname, "getsockopt");

    if !intercepting() {
        return original(fd, level, optname, optval, optlen);
    }

    match registry::global().lookup(fd) {
        Some(context) => {
            debug!(fd, serial = context.serial(), "delegating getsockopt to policy service");
            policy::current().getsockopt(&context, fd, level, optname, optval, optlen)
        }
        None => original(fd, level, optname, optval, optlen),
    }
}

/// Intercept `getaddrinfo(3)` — routed through the policy service only when
/// the calling thread has an active resolution session (see
/// [`crate::interception::resolver`]); otherwise passed through.
#[no_mangle]
pub unsafe extern "C" fn getaddrinfo(
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    res: *mut *mut addrinfo,
) -> c_int {
    let original = match symbols::getaddrinfo_fn() {
        Ok(f) => f,
        Err(err) => {
            set_errno(err.errno());
            return libc::EAI_SYSTEM;
        }
    };
    let _guard = match HookGuard::enter(Hook::Getaddrinfo) {
        Some(g) => g,
        None => return original(node, service, hints, res),
    };
    observability::init_tracing();
    trace!("getaddrinfo");

    if !intercepting() {
        return original(node, service, hints, res);
    }

    match resolver::current_context() {
        Some(context) => {
            debug!(
                fd = context.fd(),
                serial = context.serial(),
                "delegating getaddrinfo to policy service"
            );
            policy::current().getaddrinfo(&context, node, service, hints, res)
        }
        None => original(node, service, hints, res),
    }
}

/// Intercept `close(2)` — remove and destroy the registry entry first
/// (always attempted; a miss means the descriptor was never managed), then
/// call the original close. The removal outcome never influences whether the
/// original close runs or what it returns.
#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    let original = match symbols::close_fn() {
        Ok(f) => f,
        Err(err) => {
            set_errno(err.errno());
            return -1;
        }
    };
    let _guard = match HookGuard::enter(Hook::Close) {
        Some(g) => g,
        None => return original(fd),
    };
    observability::init_tracing();
    trace!(fd, "close");

    let policy = policy::current();
    if registry::global().remove_and_destroy(fd, policy.as_ref()) {
        debug!(fd, "socket context removed");
        trace_table(policy.as_ref());
    }

    original(fd)
}

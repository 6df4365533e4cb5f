// src/interception/guard.rs
//! Per-call reentrancy guard
//!
//! Delegating to the policy service (or to the original implementation)
//! eventually re-enters the very symbols this library interposes. The guard
//! breaks those loops: while a thread is inside the handler for a call name,
//! a nested call to the same name on that thread routes straight to the
//! resolved original with no registry or policy involvement.
//!
//! The flags are thread-local, one bit per call name. A process-global flag
//! would let one thread's in-progress call suppress interception for another
//! thread's legitimate call, so the per-thread scoping is a correctness
//! requirement, not an optimization. Distinct call names never block each
//! other either way.

use std::cell::Cell;

/// Intercepted call names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Socket,
    Bind,
    Connect,
    Setsockopt,
    Getsockopt,
    Getaddrinfo,
    Close,
}

impl Hook {
    fn mask(self) -> u8 {
        1 << (self as u8)
    }

    /// Call name, for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Hook::Socket => "socket",
            Hook::Bind => "bind",
            Hook::Connect => "connect",
            Hook::Setsockopt => "setsockopt",
            Hook::Getsockopt => "getsockopt",
            Hook::Getaddrinfo => "getaddrinfo",
            Hook::Close => "close",
        }
    }
}

thread_local! {
    static ACTIVE: Cell<u8> = const { Cell::new(0) };
}

/// RAII guard for one intercepted call on the current thread.
///
/// Dropping the guard clears the flag, so every exit path of a handler
/// (success, pass-through, error, early return) releases it.
pub struct HookGuard {
    hook: Hook,
}

impl HookGuard {
    /// Try to enter the handler for `hook`.
    ///
    /// Returns `None` when this thread is already inside that handler; the
    /// caller must then delegate directly to the original implementation.
    /// Thread-local storage can be gone during thread teardown (close calls
    /// from TLS destructors); that also reads as `None`, so such calls pass
    /// through rather than abort.
    pub fn enter(hook: Hook) -> Option<Self> {
        ACTIVE
            .try_with(|flags| {
                let current = flags.get();
                if current & hook.mask() != 0 {
                    None
                } else {
                    flags.set(current | hook.mask());
                    Some(HookGuard { hook })
                }
            })
            .ok()
            .flatten()
    }

    /// Whether this thread is currently inside the handler for `hook`
    #[cfg(test)]
    fn is_active(hook: Hook) -> bool {
        ACTIVE
            .try_with(|flags| flags.get() & hook.mask() != 0)
            .unwrap_or(false)
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|flags| flags.set(flags.get() & !self.hook.mask()));
    }
}

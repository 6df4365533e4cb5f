// src/interception/registry.rs
//! Socket context registry
//!
//! Concurrent mapping from live socket descriptors to their per-socket
//! contexts. Entries are created exactly once, at successful socket creation,
//! and removed exactly once, at close. A descriptor value appears here if and
//! only if it was created through the intercepted path and has not yet been
//! closed through it; a lookup miss is the normal pass-through case for
//! inherited or pre-existing descriptors, never an error.
//!
//! The map is shared by arbitrarily many intercepted calls running on
//! different threads. `dashmap` gives per-shard locking, so a lookup racing a
//! removal of the same descriptor observes either the pre- or post-removal
//! state and never a partially destroyed context.

use crate::policy::PolicyService;
use crate::utils::errors::{Result, ShimError};
use dashmap::DashMap;
use libc::c_int;
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-socket context
///
/// Holds whatever state the policy service needs across the socket's
/// lifetime. The core never mutates the payload in place; the policy service
/// brings its own interior mutability. The usage counter reflects outstanding
/// references held by the policy service and starts at 1 for the registry's
/// own reference.
pub struct SocketContext {
    fd: c_int,
    serial: u64,
    usage: AtomicU32,
    state: Box<dyn Any + Send + Sync>,
}

impl SocketContext {
    fn new(fd: c_int, serial: u64, state: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            fd,
            serial,
            usage: AtomicU32::new(1),
            state,
        }
    }

    /// Descriptor this context was registered under
    pub fn fd(&self) -> c_int {
        self.fd
    }

    /// Process-unique creation serial; distinguishes contexts across
    /// descriptor reuse
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Current usage count
    pub fn usage(&self) -> u32 {
        self.usage.load(Ordering::SeqCst)
    }

    /// Record an additional policy-service reference; returns the new count
    pub fn retain(&self) -> u32 {
        self.usage.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop one reference; returns the remaining count, saturating at zero
    pub fn release(&self) -> u32 {
        match self
            .usage
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    /// Opaque policy-owned payload
    pub fn state(&self) -> &(dyn Any + Send + Sync) {
        self.state.as_ref()
    }

    /// Downcast the payload to the policy service's concrete state type
    pub fn state_as<T: 'static>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }
}

impl fmt::Debug for SocketContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketContext")
            .field("fd", &self.fd)
            .field("serial", &self.serial)
            .field("usage", &self.usage())
            .finish()
    }
}

/// Descriptor → context registry
pub struct Registry {
    entries: DashMap<c_int, Arc<SocketContext>>,
    next_serial: AtomicU64,
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// Process-wide registry, lazily created on first use and never torn down
pub fn global() -> &'static Registry {
    &GLOBAL
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_serial: AtomicU64::new(1),
        }
    }

    /// Allocate and register a fresh context for a newly created descriptor.
    ///
    /// Invoked only after the original creation call returned a valid
    /// descriptor. Asks the policy service to initialize the opaque payload;
    /// if that fails, no entry is inserted and the descriptor stays
    /// unmanaged — the caller logs the failure and still hands the descriptor
    /// to the application.
    ///
    /// If the OS reused a descriptor value whose previous entry was never
    /// removed, the stale entry is evicted and destroyed under the same rule
    /// as close — before the new context is initialized, so a failed
    /// initialization still leaves the reused descriptor unmanaged rather
    /// than resolving to the old socket's context.
    pub fn create_and_register(
        &self,
        fd: c_int,
        policy: &dyn PolicyService,
    ) -> Result<Arc<SocketContext>> {
        if let Some((_, stale)) = self.entries.remove(&fd) {
            warn!(
                fd,
                stale_serial = stale.serial(),
                "descriptor reused before close handler ran; evicting stale entry"
            );
            destroy(stale, policy);
        }

        let state = policy
            .init_context()
            .map_err(|e| ShimError::ContextInit(e.to_string()))?;

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let context = Arc::new(SocketContext::new(fd, serial, state));

        // Only the creation handler inserts for a live descriptor, so this
        // slot is free; if something did race us in, it goes through the
        // same destruction rule.
        if let Some(stale) = self.entries.insert(fd, Arc::clone(&context)) {
            destroy(stale, policy);
        }

        debug!(fd, serial, "registered socket context");
        Ok(context)
    }

    /// Read-only lookup. `None` is an expected, common outcome and must
    /// trigger pass-through behavior in every handler.
    pub fn lookup(&self, fd: c_int) -> Option<Arc<SocketContext>> {
        self.entries.get(&fd).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the entry for `fd`, if present, and attempt to destroy its
    /// context. Returns whether an entry was present. Removal of an
    /// unmanaged descriptor is a no-op, not an error.
    pub fn remove_and_destroy(&self, fd: c_int, policy: &dyn PolicyService) -> bool {
        match self.entries.remove(&fd) {
            Some((_, context)) => {
                trace!(fd, serial = context.serial(), "removing socket context");
                destroy(context, policy);
                true
            }
            None => {
                trace!(fd, "close on unmanaged descriptor");
                false
            }
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human-readable table dump, in descriptor order
    pub fn describe(&self, policy: &dyn PolicyService) -> String {
        let mut rows: Vec<(c_int, String)> = self
            .entries
            .iter()
            .map(|entry| {
                let context = entry.value();
                (
                    *entry.key(),
                    format!(
                        "  fd {} serial {} usage {} {}",
                        context.fd(),
                        context.serial(),
                        context.usage(),
                        policy.describe_context(context)
                    ),
                )
            })
            .collect();
        rows.sort_by_key(|(fd, _)| *fd);

        let mut out = String::from("socket table:\n");
        for (_, row) in rows {
            out.push_str(&row);
            out.push('\n');
        }
        out
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the destruction rule to a context removed from the registry.
///
/// The policy service decides the final teardown via `release_context`. A
/// nonzero remaining usage count means the policy still references the
/// context; freeing it would dangle those references, so the context is
/// leaked instead and the leak is reported.
fn destroy(context: Arc<SocketContext>, policy: &dyn PolicyService) {
    let fd = context.fd();
    let serial = context.serial();
    let remaining = policy.release_context(&context);

    if remaining > 0 {
        warn!(
            fd,
            serial, remaining, "context still referenced by policy service; leaking it"
        );
        std::mem::forget(context);
    } else {
        debug!(fd, serial, "context released");
    }
}

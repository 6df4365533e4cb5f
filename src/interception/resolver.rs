// src/interception/resolver.rs
//! Resolution sessions for `getaddrinfo` delegation
//!
//! `getaddrinfo` carries no socket descriptor, so there is nothing to key a
//! registry lookup on. Instead of forcing it through the descriptor-keyed
//! registry with a placeholder key, the binding is explicit: a caller opens a
//! *resolution session* against a managed descriptor, activates it on the
//! thread about to resolve, and closes it when done. A thread with no active
//! session resolves through the original implementation.
//!
//! The session API is exported as C entry points so instrumented programs
//! can drive it without linking against the Rust crate:
//!
//! ```c
//! uint64_t s = intents_resolver_open(sockfd);
//! intents_resolver_activate(s);
//! getaddrinfo(node, service, &hints, &res);   /* routed via the policy */
//! intents_resolver_close(s);
//! ```

use crate::interception::registry::{self, SocketContext};
use dashmap::DashMap;
use libc::c_int;
use once_cell::sync::Lazy;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Session handle; 0 is never issued and means "no session"
pub type SessionId = u64;

/// Open resolution sessions, keyed by handle
pub struct ResolverSessions {
    sessions: DashMap<SessionId, Arc<SocketContext>>,
    next_id: AtomicU64,
}

static GLOBAL: Lazy<ResolverSessions> = Lazy::new(ResolverSessions::new);

thread_local! {
    static ACTIVE: Cell<SessionId> = const { Cell::new(0) };
}

/// Process-wide session table
pub fn global() -> &'static ResolverSessions {
    &GLOBAL
}

impl ResolverSessions {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a session holding a reference to `context`
    pub fn open(&self, context: Arc<SocketContext>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, fd = context.fd(), "opened resolution session");
        self.sessions.insert(id, context);
        id
    }

    /// Whether `id` names an open session
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Context bound to `id`, if the session is still open
    pub fn get(&self, id: SessionId) -> Option<Arc<SocketContext>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Close a session, dropping its context reference. Returns whether the
    /// session existed. Threads still pointing at a closed session fall back
    /// to pass-through on their next resolution.
    pub fn close(&self, id: SessionId) -> bool {
        let existed = self.sessions.remove(&id).is_some();
        if existed {
            debug!(session = id, "closed resolution session");
        }
        existed
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are open
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for ResolverSessions {
    fn default() -> Self {
        Self::new()
    }
}

/// Make `id` the calling thread's active session
pub fn activate(id: SessionId) {
    let _ = ACTIVE.try_with(|active| active.set(id));
}

/// Clear the calling thread's active session
pub fn deactivate() {
    let _ = ACTIVE.try_with(|active| active.set(0));
}

/// The calling thread's active session, if any. Reads as `None` during
/// thread teardown, which degrades to pass-through.
pub fn active() -> Option<SessionId> {
    let id = ACTIVE.try_with(|active| active.get()).unwrap_or(0);
    (id != 0).then_some(id)
}

/// Context the calling thread's next resolution should be delegated with.
/// `None` (no active session, or the session has been closed) means
/// pass-through.
pub fn current_context() -> Option<Arc<SocketContext>> {
    let id = active()?;
    let context = global().get(id);
    if context.is_none() {
        trace!(session = id, "active session no longer open; passing through");
    }
    context
}

/// Open a resolution session bound to the context of a managed socket.
/// Returns 0 when the descriptor is unmanaged.
#[no_mangle]
pub extern "C" fn intents_resolver_open(sockfd: c_int) -> u64 {
    match registry::global().lookup(sockfd) {
        Some(context) => global().open(context),
        None => {
            trace!(fd = sockfd, "resolver session refused for unmanaged descriptor");
            0
        }
    }
}

/// Activate a session on the calling thread. Returns 0 on success, -1 when
/// the session is unknown.
#[no_mangle]
pub extern "C" fn intents_resolver_activate(session: u64) -> c_int {
    if session != 0 && global().contains(session) {
        activate(session);
        0
    } else {
        -1
    }
}

/// Clear the calling thread's active session
#[no_mangle]
pub extern "C" fn intents_resolver_deactivate() {
    deactivate();
}

/// Close a session. Also clears it from the calling thread if active there.
/// Returns 0 on success, -1 when the session is unknown.
#[no_mangle]
pub extern "C" fn intents_resolver_close(session: u64) -> c_int {
    if active() == Some(session) {
        deactivate();
    }
    if global().close(session) {
        0
    } else {
        -1
    }
}

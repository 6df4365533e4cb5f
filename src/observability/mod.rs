// src/observability/mod.rs
//! Tracing setup for the shim
//!
//! A preload library cannot rely on the host process to initialize logging,
//! so the subscriber is installed lazily from the first intercepted call.
//! Output goes to stderr; the filter comes from `INTENTS_LOG` and defaults
//! to silence so an uninstrumented process stays quiet.

use crate::utils::config::config;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global tracing subscriber, once per process.
///
/// Safe to call from every hook entry; all calls after the first are no-ops.
/// Installation failure (another subscriber already set by the host process)
/// is ignored rather than reported, since the shim must never disturb the
/// application it is loaded into.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = match &config().log_filter {
            Some(directive) => EnvFilter::new(directive.clone()),
            None => EnvFilter::new("off"),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}

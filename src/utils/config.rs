// src/utils/config.rs
//! Environment-driven shim configuration
//!
//! A preload library has no command surface, so all knobs are environment
//! variables read once on first use:
//!
//! - `INTENTS_INTERCEPT` — enable/disable context tracking (default: on).
//!   When off, every hook passes straight through to the original call.
//! - `INTENTS_LOG` — tracing filter directive (e.g. `intents_shim=debug`)
//! - `INTENTS_TRACE_TABLE` — dump the socket table after registry changes

use once_cell::sync::Lazy;

/// Shim configuration snapshot
#[derive(Debug, Clone)]
pub struct ShimConfig {
    /// Enable context tracking and policy delegation
    pub intercept: bool,

    /// Tracing filter directive, if any
    pub log_filter: Option<String>,

    /// Log the socket table after every registry mutation
    pub trace_table: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            intercept: true,
            log_filter: None,
            trace_table: false,
        }
    }
}

impl ShimConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self {
            intercept: flag(std::env::var("INTENTS_INTERCEPT").ok().as_deref(), true),
            log_filter: std::env::var("INTENTS_LOG").ok().filter(|v| !v.is_empty()),
            trace_table: flag(std::env::var("INTENTS_TRACE_TABLE").ok().as_deref(), false),
        }
    }
}

/// Parse an env flag, falling back to `default` when unset or unrecognized
fn flag(value: Option<&str>, default: bool) -> bool {
    match value {
        Some("1") | Some("true") | Some("on") | Some("yes") => true,
        Some("0") | Some("false") | Some("off") | Some("no") => false,
        _ => default,
    }
}

static CONFIG: Lazy<ShimConfig> = Lazy::new(ShimConfig::from_env);

/// Process-wide configuration, read from the environment on first access
pub fn config() -> &'static ShimConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = ShimConfig::default();
        assert!(config.intercept);
        assert!(config.log_filter.is_none());
        assert!(!config.trace_table);
    }

    #[test]
    fn test_flag_parsing() {
        assert!(flag(Some("1"), false));
        assert!(flag(Some("on"), false));
        assert!(!flag(Some("0"), true));
        assert!(!flag(Some("off"), true));
        assert!(flag(None, true));
        assert!(!flag(None, false));
        // Unrecognized values keep the default
        assert!(flag(Some("maybe"), true));
    }
}

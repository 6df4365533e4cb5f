// src/utils/mod.rs
//! Common utilities and helpers

pub mod config;
pub mod errors;

pub use config::{config, ShimConfig};
pub use errors::{Result, ShimError};

//! Monitor Configuration Module
//!
//! Thresholds, reference location and server settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `DWDM_CONFIG` environment variable (path to TOML file)
//! 2. `dwdm_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(MonitorConfig::load());
//!
//! let swing = config::get().thresholds.flapping.swing_db;
//! ```

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;

use std::sync::OnceLock;

/// Global monitor configuration, initialized once at startup.
static MONITOR_CONFIG: OnceLock<MonitorConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: MonitorConfig) {
    if MONITOR_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Panics if `init()` has not been called; a missing config is a startup bug.
pub fn get() -> &'static MonitorConfig {
    MONITOR_CONFIG
        .get()
        .expect("config::get() called before config::init()")
}

//! Guardian Configuration Module
//!
//! Deployment configuration loaded from TOML, covering sensor profiles,
//! preprocessing policy, and every safety threshold.
//!
//! ## Loading Order
//!
//! 1. `SIMBA_CONFIG` environment variable (path to TOML file)
//! 2. `guardian.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Unknown keys in a file are reported with a suggested spelling
//! ([`validation`]) but never reject it.
//!
//! The loaded value is passed explicitly to the components that need it:
//!
//! ```ignore
//! let config = GuardianConfig::load();
//! let engine = FusionEngine::new(config.sensors.clone(), config.preprocess.clone());
//! let monitor = SafetyMonitor::new(config.safety.clone(), Arc::new(EmergencyController::new()));
//! ```

mod guardian_config;
pub mod defaults;
pub mod validation;

pub use guardian_config::*;

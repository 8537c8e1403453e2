//! Plant Configuration Module
//!
//! Per-plant configuration loaded from TOML files. Every detection threshold,
//! alert cadence and polling interval is an operator-tunable value.
//!
//! ## Loading Order
//!
//! 1. Explicit path (`--config` CLI flag)
//! 2. `PLANTWATCH_CONFIG` environment variable (path to TOML file)
//! 3. `plantwatch.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded [`PlantConfig`] is passed by `Arc` to the components that need
//! it; there is no process-global config.

mod plant_config;
pub mod defaults;
pub mod validation;

pub use plant_config::*;

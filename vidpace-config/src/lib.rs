//! Shared configuration library for vidpace.
//!
//! Centralizes defaults, TOML/env loading and validation so the page agent,
//! control surface, coordinator and `vidpacectl` all agree on key bindings,
//! display intervals and the current schema version.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoadError, ConfigLoader};
pub use models::{ConfigSource, FileConfig, KeyBindings, VidpaceConfig};

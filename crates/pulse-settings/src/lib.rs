//! # pulse-settings
//!
//! Configuration for crm-pulse, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PulseSettings::default()`]
//! 2. **User file**: `~/.pulse/settings.json` or `--config` (deep-merged)
//! 3. **Environment variables**: `PULSE_*` overrides
//!
//! The CRM access token is deliberately not part of the settings file; the
//! binary reads it from `PULSE_ACCESS_TOKEN`.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

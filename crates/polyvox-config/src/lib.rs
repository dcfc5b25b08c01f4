//! Settings for the polyvox synth.
//!
//! [`SynthSettings`] mirrors the engine's construction parameters in a
//! serde/TOML form with the documented defaults and ranges.
//!
//! # Example
//!
//! ```rust,no_run
//! use polyvox_config::{SynthSettings, paths};
//!
//! let path = paths::default_settings_path();
//! let settings = if path.exists() {
//!     SynthSettings::load(&path).unwrap()
//! } else {
//!     SynthSettings::default()
//! };
//! settings.validate().unwrap();
//! settings.save(&path).unwrap();
//! ```

mod error;
mod settings;

/// Platform-specific settings locations.
pub mod paths;

/// Range checks for settings.
pub mod validation;

pub use error::ConfigError;
pub use settings::{ChorusSettings, ChorusShape, ReverbSettings, SynthSettings};
pub use validation::{ValidationError, ValidationResult};

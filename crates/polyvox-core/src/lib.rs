//! Polyvox Core - DSP primitives shared by the voice and effect crates
//!
//! This crate provides the building blocks for the polyvox mixer, designed for
//! real-time audio processing with zero allocation in the audio path.
//!
//! # Core Abstractions
//!
//! ## Send Effects
//!
//! - [`SendEffect`] - Object-safe trait for effects fed from a mono send buffer
//! - [`FxMode`] - Whether effect output is mixed into or replaces its target
//!
//! ## Filters
//!
//! - [`Biquad`] - Second-order IIR filter with RBJ cookbook coefficients
//! - [`CombFilter`] - Comb filter with damping for reverb algorithms
//! - [`AllpassFilter`] - Schroeder allpass for diffusion
//!
//! ## Delay Lines
//!
//! - [`DelayLine`] - Fixed-length circular delay with integer taps
//!
//! ## Utilities
//!
//! - Level conversions: [`db_to_linear`], [`linear_to_db`], [`cb_to_amp`]
//! - Pitch conversions: [`cents_to_ratio`], [`ct_to_hz`]
//! - [`flush_denormal`] for feedback paths
//!
//! # Block Size
//!
//! Everything downstream of this crate processes audio in blocks of
//! [`BLOCK_SIZE`] frames.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! polyvox-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod allpass;
pub mod biquad;
pub mod comb;
pub mod delay;
pub mod fx;
pub mod math;

pub use allpass::AllpassFilter;
pub use biquad::{Biquad, lowpass_coefficients};
pub use comb::CombFilter;
pub use delay::DelayLine;
pub use fx::{FxMode, SendEffect};
pub use math::{
    cb_to_amp, cents_to_ratio, ct_to_hz, db_to_linear, flush_denormal, linear_to_db, lerp,
};

/// Number of frames in one processing block.
///
/// Voices render exactly one block per call, envelopes and LFOs advance once
/// per block, and effects are run in chunks of this size.
pub const BLOCK_SIZE: usize = 64;

//! Polyvox Effects - send effects for the polyvox mixer
//!
//! Both effects implement [`polyvox_core::SendEffect`]: they read a mono send
//! buffer and either mix their stereo output into the main buffers or
//! replace a destination with it.
//!
//! - [`Reverb`] - Freeverb-style stereo reverb
//! - [`Chorus`] - Up to 99-voice modulated chorus
//!
//! ## Example
//!
//! ```rust
//! use polyvox_core::{FxMode, SendEffect};
//! use polyvox_effects::{Chorus, Reverb};
//!
//! let mut reverb = Reverb::new(44100.0);
//! let mut chorus = Chorus::new(44100.0);
//!
//! let send = [0.0f32; 64];
//! let mut left = [0.0f32; 64];
//! let mut right = [0.0f32; 64];
//! reverb.process(FxMode::Mix, &send, &mut left, &mut right);
//! chorus.process(FxMode::Mix, &send, &mut left, &mut right);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod chorus;
pub mod reverb;

pub use chorus::{Chorus, ChorusParamSet, ChorusParams, ChorusWaveform, MAX_CHORUS_VOICES};
pub use reverb::{Reverb, ReverbParamSet, ReverbParams};

//! Mathematical utility functions for DSP.
//!
//! Level and pitch conversions used by the voice and effect code. All
//! functions are allocation-free and suitable for `no_std`.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//! - [`cb_to_amp`] - Attenuation in centibels to linear amplitude
//!
//! # Pitch Conversions
//!
//! - [`cents_to_ratio`] - Relative cents to a frequency ratio
//! - [`ct_to_hz`] - Absolute cents (6900 = A440) to Hz

use libm::{expf, exp2f, logf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use polyvox_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// Inputs at or below `1e-10` are treated as `1e-10` (-200 dB).
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Convert an attenuation in centibels to a linear amplitude.
///
/// 0 cB is unity gain, 200 cB is -20 dB. Negative attenuation is treated as
/// zero, and anything past 1440 cB (-144 dB) is silence.
///
/// # Example
/// ```rust
/// use polyvox_core::cb_to_amp;
///
/// assert_eq!(cb_to_amp(0.0), 1.0);
/// assert!((cb_to_amp(200.0) - 0.1).abs() < 1e-6);
/// ```
#[inline]
pub fn cb_to_amp(cb: f32) -> f32 {
    if cb <= 0.0 {
        1.0
    } else if cb >= 1440.0 {
        0.0
    } else {
        db_to_linear(-cb / 10.0)
    }
}

/// Convert a relative pitch offset in cents to a frequency ratio.
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    exp2f(cents / 1200.0)
}

/// Convert absolute cents to Hz.
///
/// Absolute cents count from MIDI key 0 (8.176 Hz), so key `k` sits at
/// `k * 100` cents and 6900 is A440.
///
/// # Example
/// ```rust
/// use polyvox_core::ct_to_hz;
///
/// assert!((ct_to_hz(6900.0) - 440.0).abs() < 0.01);
/// ```
#[inline]
pub fn ct_to_hz(cents: f32) -> f32 {
    440.0 * exp2f((cents - 6900.0) / 1200.0)
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Flush denormal (subnormal) floats to zero.
///
/// Values below 1e-20 are replaced with zero, leaving margin before the
/// IEEE 754 subnormal range. Use in feedback loops (comb filters, allpass
/// chains) where signal decays indefinitely toward zero.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

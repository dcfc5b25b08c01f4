//! Per-voice resonant lowpass.

use polyvox_core::{Biquad, ct_to_hz, db_to_linear, lowpass_coefficients};

/// Cutoff at or above which (with zero resonance) the filter is bypassed.
pub const FILTER_BYPASS_CENTS: f32 = 13500.0;

/// Highest accepted resonance, dB.
pub const MAX_Q_DB: f32 = 96.0;

/// Resonance offset that makes 0 dB a flat (Butterworth) response.
const Q_FLAT_OFFSET_DB: f32 = 3.01;

/// Lowest cutoff, Hz.
const MIN_CUTOFF_HZ: f32 = 5.0;

/// Highest cutoff as a fraction of the sample rate.
const MAX_CUTOFF_RATIO: f32 = 0.45;

/// Resonant lowpass driven by absolute-cent cutoff and resonance in dB.
///
/// Coefficients are recomputed only when the effective cutoff, resonance, or
/// sample rate change. With the cutoff at [`FILTER_BYPASS_CENTS`] or above and
/// no resonance, samples pass through untouched.
#[derive(Clone, Debug)]
pub struct ResonantFilter {
    biquad: Biquad,
    cutoff_cents: f32,
    q_db: f32,
    sample_rate: f32,
    last_fc_hz: f32,
    last_q_lin: f32,
    bypass: bool,
}

impl ResonantFilter {
    /// Create an open (bypassed) filter.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            biquad: Biquad::new(),
            cutoff_cents: FILTER_BYPASS_CENTS,
            q_db: 0.0,
            sample_rate,
            last_fc_hz: -1.0,
            last_q_lin: -1.0,
            bypass: true,
        }
    }

    /// Set the base cutoff in absolute cents.
    pub fn set_cutoff(&mut self, cents: f32) {
        self.cutoff_cents = cents;
    }

    /// Base cutoff in absolute cents.
    pub fn cutoff(&self) -> f32 {
        self.cutoff_cents
    }

    /// Set resonance in dB, clamped to `0..=96`.
    pub fn set_q_db(&mut self, q_db: f32) {
        self.q_db = q_db.clamp(0.0, MAX_Q_DB);
    }

    /// Resonance in dB.
    pub fn q_db(&self) -> f32 {
        self.q_db
    }

    /// Change the output rate. Forces a coefficient update.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.last_fc_hz = -1.0;
    }

    /// Clear filter history.
    pub fn reset(&mut self) {
        self.biquad.clear();
    }

    /// `true` when the last [`update`](Self::update) chose pass-through.
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Recompute coefficients for this block.
    ///
    /// `mod_cents` is added to the base cutoff (envelope and LFO modulation).
    pub fn update(&mut self, mod_cents: f32) {
        let cents = self.cutoff_cents + mod_cents;
        if cents >= FILTER_BYPASS_CENTS && self.q_db == 0.0 {
            if !self.bypass {
                self.bypass = true;
                self.biquad.clear();
            }
            return;
        }
        self.bypass = false;

        let fc = ct_to_hz(cents).clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_RATIO * self.sample_rate);
        let q = db_to_linear(self.q_db - Q_FLAT_OFFSET_DB).max(0.001);
        if fc == self.last_fc_hz && q == self.last_q_lin {
            return;
        }
        self.last_fc_hz = fc;
        self.last_q_lin = q;

        // Peak height tracks q_db above a flat response, so scale the
        // passband back down by 1/sqrt(q)
        let gain = 1.0 / libm::sqrtf(q);
        let (b0, b1, b2, a0, a1, a2) = lowpass_coefficients(fc, q, self.sample_rate);
        self.biquad
            .set_coefficients(b0 * gain, b1 * gain, b2 * gain, a0, a1, a2);
    }

    /// Filter `buf` in place.
    pub fn process(&mut self, buf: &mut [f32]) {
        if self.bypass {
            return;
        }
        for s in buf.iter_mut() {
            *s = self.biquad.process(*s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypass_when_open() {
        let mut f = ResonantFilter::new(44100.0);
        f.update(0.0);
        assert!(f.is_bypassed());
        let mut buf = [0.3, -0.2, 0.9];
        f.process(&mut buf);
        assert_eq!(buf, [0.3, -0.2, 0.9]);
    }

    #[test]
    fn test_resonance_disables_bypass() {
        let mut f = ResonantFilter::new(44100.0);
        f.set_q_db(6.0);
        f.update(0.0);
        assert!(!f.is_bypassed());
    }

    #[test]
    fn test_low_cutoff_attenuates() {
        let mut f = ResonantFilter::new(44100.0);
        f.set_cutoff(6900.0); // 440 Hz
        f.update(0.0);
        assert!(!f.is_bypassed());
        let mut buf: Vec<f32> = (0..4410).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        f.process(&mut buf);
        let tail = buf[4000..].iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(tail < 0.01, "Nyquist should be attenuated, got {}", tail);
    }

    #[test]
    fn test_modulation_can_open_filter() {
        let mut f = ResonantFilter::new(44100.0);
        f.set_cutoff(6900.0);
        f.update(FILTER_BYPASS_CENTS);
        assert!(f.is_bypassed());
    }
}

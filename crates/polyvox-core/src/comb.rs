//! Comb filter for reverb algorithms.
//!
//! A feedback comb with a one-pole lowpass in the loop, the basic resonator
//! of a Freeverb tank.

use crate::DelayLine;
use crate::flush_denormal;

/// Comb filter with feedback and damping.
///
/// The feedback path includes a one-pole lowpass for high-frequency
/// damping, simulating absorption in a real room.
///
/// # Example
///
/// ```rust
/// use polyvox_core::CombFilter;
///
/// let mut comb = CombFilter::new(1000);
/// comb.set_feedback(0.84);
/// comb.set_damp(0.2);
///
/// let output = comb.process(1.0);
/// ```
#[derive(Debug, Clone)]
pub struct CombFilter {
    delay: DelayLine,
    feedback: f32,
    damp1: f32,
    damp2: f32,
    filterstore: f32,
}

impl CombFilter {
    /// Create a new comb filter with the given delay size in samples.
    pub fn new(delay_samples: usize) -> Self {
        Self {
            delay: DelayLine::new(delay_samples),
            feedback: 0.5,
            damp1: 0.0,
            damp2: 1.0,
            filterstore: 0.0,
        }
    }

    /// Set the feedback amount, clamped to 0.0..=0.99.
    #[inline]
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    /// Get the current feedback value.
    #[inline]
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set the damping amount (0.0 bright to 1.0 dark).
    #[inline]
    pub fn set_damp(&mut self, damp: f32) {
        self.damp1 = damp.clamp(0.0, 1.0);
        self.damp2 = 1.0 - self.damp1;
    }

    /// Get the current damping value.
    #[inline]
    pub fn damp(&self) -> f32 {
        self.damp1
    }

    /// Process one sample; returns the delayed output.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.delay.peek();

        // filterstore = output * (1 - damp) + filterstore * damp
        self.filterstore = flush_denormal(output * self.damp2 + self.filterstore * self.damp1);

        self.delay.push(input + self.filterstore * self.feedback);
        output
    }

    /// Clear the comb filter state.
    pub fn clear(&mut self) {
        self.delay.clear();
        self.filterstore = 0.0;
    }

    /// Delay length in samples.
    pub fn len(&self) -> usize {
        self.delay.len()
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        self.delay.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comb_basic() {
        let mut comb = CombFilter::new(100);
        comb.set_feedback(0.5);
        comb.set_damp(0.2);

        let first = comb.process(1.0);
        assert_eq!(first, 0.0);

        for _ in 0..99 {
            comb.process(0.0);
        }

        let echo = comb.process(0.0);
        assert!(echo.abs() > 0.1, "Should have echo, got {}", echo);
    }

    #[test]
    fn test_comb_echoes_decay() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.8);
        comb.set_damp(0.0);
        comb.process(1.0);

        let mut peaks = [0.0f32; 5];
        for peak in &mut peaks {
            for _ in 0..10 {
                *peak = peak.max(comb.process(0.0).abs());
            }
        }
        for pair in peaks.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-6, "echoes should decay: {:?}", peaks);
        }
    }

    #[test]
    fn test_comb_clear() {
        let mut comb = CombFilter::new(10);
        for _ in 0..20 {
            comb.process(1.0);
        }
        comb.clear();
        for _ in 0..20 {
            assert!(comb.process(0.0).abs() < 1e-10, "Should be silent after clear");
        }
    }

    #[test]
    fn test_comb_damping_darkens() {
        let mut bright = CombFilter::new(20);
        bright.set_feedback(0.8);
        bright.set_damp(0.0);

        let mut dark = CombFilter::new(20);
        dark.set_feedback(0.8);
        dark.set_damp(0.8);

        bright.process(1.0);
        dark.process(1.0);

        let mut bright_sum = 0.0f32;
        let mut dark_sum = 0.0f32;
        for _ in 0..200 {
            bright_sum += bright.process(0.0).abs();
            dark_sum += dark.process(0.0).abs();
        }
        assert!(dark_sum < bright_sum);
    }

    #[test]
    fn test_feedback_clamped() {
        let mut comb = CombFilter::new(4);
        comb.set_feedback(1.5);
        assert_eq!(comb.feedback(), 0.99);
        comb.set_feedback(-1.0);
        assert_eq!(comb.feedback(), 0.0);
    }
}

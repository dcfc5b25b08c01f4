//! Allpass filter for reverb diffusion.
//!
//! A Schroeder allpass that smears transients without colouring the
//! magnitude response.

use crate::DelayLine;
use crate::flush_denormal;

/// Schroeder allpass filter.
///
/// # Example
///
/// ```rust
/// use polyvox_core::AllpassFilter;
///
/// let mut allpass = AllpassFilter::new(556);
/// allpass.set_feedback(0.5);
///
/// let output = allpass.process(1.0);
/// ```
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    delay: DelayLine,
    feedback: f32,
}

impl AllpassFilter {
    /// Create a new allpass filter with the given delay size in samples.
    pub fn new(delay_samples: usize) -> Self {
        Self {
            delay: DelayLine::new(delay_samples),
            feedback: 0.5,
        }
    }

    /// Set the feedback coefficient, clamped to ±0.99.
    #[inline]
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-0.99, 0.99);
    }

    /// Get the current feedback value.
    #[inline]
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Process one sample.
    ///
    /// output = -input + delayed
    /// delay_input = input + delayed * feedback
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.delay.peek();
        let output = -input + delayed;
        self.delay
            .push(flush_denormal(input + delayed * self.feedback));
        output
    }

    /// Clear the allpass filter state.
    pub fn clear(&mut self) {
        self.delay.clear();
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
    fn test_allpass_finite() {
        let mut allpass = AllpassFilter::new(100);
        for _ in 0..200 {
            assert!(allpass.process(0.5).is_finite());
        }
    }

    #[test]
    fn test_allpass_impulse() {
        let mut allpass = AllpassFilter::new(4);
        allpass.set_feedback(0.5);
        // Direct path is inverted
        assert_eq!(allpass.process(1.0), -1.0);
        for _ in 0..3 {
            assert_eq!(allpass.process(0.0), 0.0);
        }
        // First delayed tap carries the input
        assert_eq!(allpass.process(0.0), 1.0);
    }

    #[test]
    fn test_allpass_clear() {
        let mut allpass = AllpassFilter::new(10);
        for _ in 0..50 {
            allpass.process(1.0);
        }
        allpass.clear();
        assert_eq!(allpass.process(0.0), 0.0);
    }
}

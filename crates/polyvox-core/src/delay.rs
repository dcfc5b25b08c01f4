//! Fixed-length delay line.
//!
//! Circular buffer with a single integer read tap at the full delay length,
//! which is all the Freeverb comb and allpass stages need.

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

/// Circular delay line (heap-allocated, never reallocates).
///
/// # Example
///
/// ```rust
/// use polyvox_core::DelayLine;
///
/// let mut delay = DelayLine::new(3);
/// assert_eq!(delay.tick(1.0), 0.0);
/// assert_eq!(delay.tick(0.0), 0.0);
/// assert_eq!(delay.tick(0.0), 0.0);
/// assert_eq!(delay.tick(0.0), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    pos: usize,
}

impl DelayLine {
    /// Creates a delay line of `len` samples.
    ///
    /// # Panics
    ///
    /// Panics if `len` is 0.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "Delay size must be > 0");
        Self {
            buffer: vec![0.0; len],
            pos: 0,
        }
    }

    /// Returns the sample written `len` ticks ago without advancing.
    #[inline]
    pub fn peek(&self) -> f32 {
        self.buffer[self.pos]
    }

    /// Replaces the oldest sample with `input` and advances the write head.
    #[inline]
    pub fn push(&mut self, input: f32) {
        self.buffer[self.pos] = input;
        self.pos += 1;
        if self.pos == self.buffer.len() {
            self.pos = 0;
        }
    }

    /// Reads the delayed sample, then writes `input`.
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        let out = self.peek();
        self.push(input);
        out
    }

    /// Zeroes the buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }

    /// Delay length in samples.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Always `false`; a delay line holds at least one sample.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

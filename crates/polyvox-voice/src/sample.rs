//! Shared, read-only sample data.

use std::f32::consts::TAU;
use std::sync::Arc;

/// A mono sample plus its playback metadata.
///
/// Samples are built on the control thread and shared with voices through
/// `Arc<Sample>`; the render thread only ever reads them. Keep a clone of the
/// `Arc` on the control side (e.g. in a sample bank) so the last reference is
/// never dropped on the audio thread.
#[derive(Debug, Clone)]
pub struct Sample {
    name: String,
    data: Vec<f32>,
    sample_rate: f32,
    root_key: f32,
    loop_start: usize,
    loop_end: usize,
}

impl Sample {
    /// Create a sample from raw data.
    ///
    /// The loop defaults to the whole sample.
    pub fn new(name: impl Into<String>, data: Vec<f32>, sample_rate: f32, root_key: f32) -> Self {
        let len = data.len();
        Self {
            name: name.into(),
            data,
            sample_rate,
            root_key,
            loop_start: 0,
            loop_end: len,
        }
    }

    /// Set the loop region, clamped to the data.
    pub fn with_loop(mut self, start: usize, end: usize) -> Self {
        let len = self.data.len();
        self.loop_end = end.min(len);
        self.loop_start = start.min(self.loop_end);
        self
    }

    /// A single-cycle waveform repeated to `cycles` periods, looped whole.
    ///
    /// The root key is derived from the period so the sample plays back in
    /// tune. Useful for tests and for the CLI when no WAV file is given.
    pub fn single_cycle(
        name: impl Into<String>,
        sample_rate: f32,
        period: usize,
        cycles: usize,
        shape: impl Fn(f32) -> f32,
    ) -> Self {
        let period = period.max(2);
        let data: Vec<f32> = (0..period * cycles.max(1))
            .map(|i| shape((i % period) as f32 / period as f32))
            .collect();
        let freq = sample_rate / period as f32;
        let root_key = 69.0 + 12.0 * libm::log2f(freq / 440.0);
        Self::new(name, data, sample_rate, root_key)
    }

    /// A looped sine wave with the given period in samples.
    pub fn sine(sample_rate: f32, period: usize) -> Self {
        Self::single_cycle("sine", sample_rate, period, 16, |t| libm::sinf(t * TAU))
    }

    /// Wrap in an `Arc` for sharing with voices.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Sample name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample frames.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the sample holds no frames.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rate the sample was recorded at.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// MIDI key (fractional) at which the sample plays at its recorded pitch.
    pub fn root_key(&self) -> f32 {
        self.root_key
    }

    /// Default loop start frame.
    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    /// Default loop end frame (exclusive).
    pub fn loop_end(&self) -> usize {
        self.loop_end
    }
}

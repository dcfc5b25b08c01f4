//! Send-effect trait and routing mode.
//!
//! A send effect reads a mono send buffer (the sum of every voice's send
//! level for that effect) and produces a stereo result. The result either
//! replaces the content of its targets or is added on top of it.
//!
//! ## Design Decisions
//!
//! - **Mono in, stereo out**: voices write a single send signal per effect.
//! - **Object-safe**: the mixer stores effects behind concrete types, but
//!   tests and tools can use `dyn SendEffect`.
//! - **No allocations** in `process_mix`/`process_replace`. Sample-rate
//!   changes may reallocate and are not real-time safe.

/// How a send effect's output reaches its destination buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FxMode {
    /// Add the effect output to the destination (main dry buffers).
    #[default]
    Mix,
    /// Overwrite the destination with the effect output.
    Replace,
}

/// Effect processor fed from a mono send buffer.
///
/// # Example
///
/// ```rust
/// use polyvox_core::{FxMode, SendEffect};
///
/// struct Thru;
///
/// impl SendEffect for Thru {
///     fn process_mix(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) {
///         for ((x, l), r) in input.iter().zip(left.iter_mut()).zip(right.iter_mut()) {
///             *l += x;
///             *r += x;
///         }
///     }
///
///     fn process_replace(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) {
///         left.copy_from_slice(input);
///         right.copy_from_slice(input);
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {}
///     fn reset(&mut self) {}
/// }
///
/// let mut fx = Thru;
/// let input = [0.5; 4];
/// let (mut l, mut r) = ([1.0; 4], [1.0; 4]);
/// fx.process(FxMode::Mix, &input, &mut l, &mut r);
/// assert_eq!(l, [1.5; 4]);
/// ```
pub trait SendEffect {
    /// Process `input` and add the result into `left`/`right`.
    ///
    /// All three slices have the same length.
    fn process_mix(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]);

    /// Process `input` and overwrite `left`/`right` with the result.
    fn process_replace(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]);

    /// Reconfigure for a new sample rate. Not real-time safe.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Clear all internal state (delay memory, filter history).
    fn reset(&mut self);

    /// Dispatch to [`process_mix`](Self::process_mix) or
    /// [`process_replace`](Self::process_replace).
    #[inline]
    fn process(&mut self, mode: FxMode, input: &[f32], left: &mut [f32], right: &mut [f32]) {
        match mode {
            FxMode::Mix => self.process_mix(input, left, right),
            FxMode::Replace => self.process_replace(input, left, right),
        }
    }
}

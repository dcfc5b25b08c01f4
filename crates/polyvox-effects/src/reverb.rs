//! Freeverb-style stereo send reverb.
//!
//! Eight parallel comb filters feed four series allpasses, once per output
//! channel. The right channel's delays are offset by a fixed stereo spread so
//! the two tanks decorrelate.

use polyvox_core::{AllpassFilter, CombFilter, SendEffect};

/// Freeverb comb filter delay times (at 44.1kHz reference).
const COMB_TUNINGS_44K: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Freeverb allpass filter delay times (at 44.1kHz reference).
const ALLPASS_TUNINGS_44K: [usize; 4] = [556, 441, 341, 225];

/// Extra delay added to every right-channel stage.
const STEREO_SPREAD: usize = 23;

/// Reference sample rate for tuning constants.
const REFERENCE_RATE: f32 = 44100.0;

const FIXED_GAIN: f32 = 0.015;
const SCALE_WET: f32 = 3.0;
const SCALE_DAMP: f32 = 1.0;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;
const ALLPASS_FEEDBACK: f32 = 0.5;

/// Scale delay times from reference rate to target rate.
fn scale_to_rate(samples: usize, target_rate: f32) -> usize {
    ((samples as f32 * target_rate / REFERENCE_RATE).round() as usize).max(1)
}

/// Selects which [`ReverbParams`] fields an update touches.
///
/// ```rust
/// use polyvox_effects::ReverbParamSet;
///
/// let set = ReverbParamSet::ROOMSIZE.union(ReverbParamSet::LEVEL);
/// assert!(set.contains(ReverbParamSet::LEVEL));
/// assert!(!set.contains(ReverbParamSet::WIDTH));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverbParamSet(u8);

impl ReverbParamSet {
    /// No fields.
    pub const NONE: Self = Self(0);
    /// `roomsize`.
    pub const ROOMSIZE: Self = Self(1 << 0);
    /// `damping`.
    pub const DAMPING: Self = Self(1 << 1);
    /// `width`.
    pub const WIDTH: Self = Self(1 << 2);
    /// `level`.
    pub const LEVEL: Self = Self(1 << 3);
    /// Every field.
    pub const ALL: Self = Self(0b1111);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for ReverbParamSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// Reverb parameters.
///
/// | Field | Range | Default |
/// |-------|-------|---------|
/// | `roomsize` | 0.0–1.0 | 0.2 |
/// | `damping` | 0.0–1.0 | 0.0 |
/// | `width` | 0.0–100.0 | 0.5 |
/// | `level` | 0.0–1.0 | 0.9 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Room size; sets comb feedback.
    pub roomsize: f32,
    /// High-frequency absorption in the comb loops.
    pub damping: f32,
    /// Stereo width of the wet signal.
    pub width: f32,
    /// Output level of the wet signal.
    pub level: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            roomsize: 0.2,
            damping: 0.0,
            width: 0.5,
            level: 0.9,
        }
    }
}

impl ReverbParams {
    /// Returns a copy with every field clamped to its legal range.
    pub fn clamped(self) -> Self {
        Self {
            roomsize: self.roomsize.clamp(0.0, 1.0),
            damping: self.damping.clamp(0.0, 1.0),
            width: self.width.clamp(0.0, 100.0),
            level: self.level.clamp(0.0, 1.0),
        }
    }
}

/// Freeverb send reverb.
///
/// Consumes the mono reverb send and writes a stereo result.
///
/// # Example
///
/// ```rust
/// use polyvox_core::SendEffect;
/// use polyvox_effects::{Reverb, ReverbParamSet, ReverbParams};
///
/// let mut reverb = Reverb::new(48000.0);
/// reverb.set_params(
///     ReverbParamSet::ROOMSIZE,
///     &ReverbParams { roomsize: 0.8, ..ReverbParams::default() },
/// );
///
/// let send = [0.0f32; 64];
/// let (mut left, mut right) = ([0.0f32; 64], [0.0f32; 64]);
/// reverb.process_mix(&send, &mut left, &mut right);
/// ```
#[derive(Debug, Clone)]
pub struct Reverb {
    combs_l: [CombFilter; 8],
    combs_r: [CombFilter; 8],
    allpasses_l: [AllpassFilter; 4],
    allpasses_r: [AllpassFilter; 4],
    params: ReverbParams,
    wet1: f32,
    wet2: f32,
    sample_rate: f32,
}

impl Reverb {
    /// Create a reverb with default parameters.
    pub fn new(sample_rate: f32) -> Self {
        let mut reverb = Self {
            combs_l: build_combs(sample_rate, 0),
            combs_r: build_combs(sample_rate, STEREO_SPREAD),
            allpasses_l: build_allpasses(sample_rate, 0),
            allpasses_r: build_allpasses(sample_rate, STEREO_SPREAD),
            params: ReverbParams::default(),
            wet1: 0.0,
            wet2: 0.0,
            sample_rate,
        };
        reverb.update();
        reverb
    }

    /// Update the fields of `params` selected by `set`.
    pub fn set_params(&mut self, set: ReverbParamSet, params: &ReverbParams) {
        let p = params.clamped();
        if set.contains(ReverbParamSet::ROOMSIZE) {
            self.params.roomsize = p.roomsize;
        }
        if set.contains(ReverbParamSet::DAMPING) {
            self.params.damping = p.damping;
        }
        if set.contains(ReverbParamSet::WIDTH) {
            self.params.width = p.width;
        }
        if set.contains(ReverbParamSet::LEVEL) {
            self.params.level = p.level;
        }
        self.update();
    }

    /// Current parameters.
    pub fn params(&self) -> ReverbParams {
        self.params
    }

    /// Current sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn update(&mut self) {
        let wet = (self.params.level * SCALE_WET) / (1.0 + self.params.width * SCALE_WET);
        self.wet1 = wet * (self.params.width / 2.0 + 0.5);
        self.wet2 = wet * ((1.0 - self.params.width) / 2.0);

        let feedback = self.params.roomsize * SCALE_ROOM + OFFSET_ROOM;
        let damp = self.params.damping * SCALE_DAMP;
        for comb in self.combs_l.iter_mut().chain(self.combs_r.iter_mut()) {
            comb.set_feedback(feedback);
            comb.set_damp(damp);
        }
    }

    /// Runs one input sample through both tanks.
    #[inline]
    fn tick(&mut self, x: f32) -> (f32, f32) {
        let input = 2.0 * x * FIXED_GAIN;

        let mut out_l = 0.0f32;
        let mut out_r = 0.0f32;
        for comb in &mut self.combs_l {
            out_l += comb.process(input);
        }
        for comb in &mut self.combs_r {
            out_r += comb.process(input);
        }
        for ap in &mut self.allpasses_l {
            out_l = ap.process(out_l);
        }
        for ap in &mut self.allpasses_r {
            out_r = ap.process(out_r);
        }

        (
            out_l * self.wet1 + out_r * self.wet2,
            out_r * self.wet1 + out_l * self.wet2,
        )
    }
}

fn build_combs(sample_rate: f32, spread: usize) -> [CombFilter; 8] {
    core::array::from_fn(|i| CombFilter::new(scale_to_rate(COMB_TUNINGS_44K[i] + spread, sample_rate)))
}

fn build_allpasses(sample_rate: f32, spread: usize) -> [AllpassFilter; 4] {
    core::array::from_fn(|i| {
        let mut ap = AllpassFilter::new(scale_to_rate(ALLPASS_TUNINGS_44K[i] + spread, sample_rate));
        ap.set_feedback(ALLPASS_FEEDBACK);
        ap
    })
}

impl SendEffect for Reverb {
    fn process_mix(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(input.len(), left.len());
        debug_assert_eq!(input.len(), right.len());
        for ((x, l), r) in input.iter().zip(left.iter_mut()).zip(right.iter_mut()) {
            let (wl, wr) = self.tick(*x);
            *l += wl;
            *r += wr;
        }
    }

    fn process_replace(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(input.len(), left.len());
        debug_assert_eq!(input.len(), right.len());
        for i in 0..input.len() {
            let (wl, wr) = self.tick(input[i]);
            left[i] = wl;
            right[i] = wr;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.combs_l = build_combs(sample_rate, 0);
        self.combs_r = build_combs(sample_rate, STEREO_SPREAD);
        self.allpasses_l = build_allpasses(sample_rate, 0);
        self.allpasses_r = build_allpasses(sample_rate, STEREO_SPREAD);
        self.update();
    }

    fn reset(&mut self) {
        for comb in self.combs_l.iter_mut().chain(self.combs_r.iter_mut()) {
            comb.clear();
        }
        for ap in self.allpasses_l.iter_mut().chain(self.allpasses_r.iter_mut()) {
            ap.clear();
        }
    }
}

//! Multi-voice modulated chorus.
//!
//! Up to [`MAX_CHORUS_VOICES`] taps read a shared circular buffer. Each tap's
//! delay follows a precomputed modulation table (sine or triangle, one full
//! modulation period long), offset in phase from its neighbours. Fractional
//! delays are read with a 5-point windowed-sinc interpolator at 128
//! sub-sample positions.

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec::Vec;
use core::f64::consts::PI;
use libm::{cos, sin};
use polyvox_core::SendEffect;

/// Maximum number of chorus taps.
pub const MAX_CHORUS_VOICES: usize = 99;

/// Delay buffer length; a power of two so indices wrap with a mask.
const MAX_SAMPLES: usize = 2048;
const MAX_SAMPLES_MASK: usize = MAX_SAMPLES - 1;

const INTERP_SUBSAMPLES: usize = 128;
const INTERP_SAMPLES: usize = 5;

/// Keeps read positions positive: taps read up to `MAX_SAMPLES` behind.
const READ_OFFSET: usize = 3 * MAX_SAMPLES * INTERP_SUBSAMPLES;

const MIN_SPEED_HZ: f32 = 0.29;
const MAX_SPEED_HZ: f32 = 5.0;
const MAX_DEPTH_MS: f32 = 256.0;
const MAX_LEVEL: f32 = 10.0;

/// Modulation waveform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChorusWaveform {
    /// Sinusoidal sweep.
    #[default]
    Sine,
    /// Linear up/down sweep.
    Triangle,
}

/// Selects which [`ChorusParams`] fields an update touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChorusParamSet(u8);

impl ChorusParamSet {
    /// No fields.
    pub const NONE: Self = Self(0);
    /// `nr`.
    pub const NR: Self = Self(1 << 0);
    /// `level`.
    pub const LEVEL: Self = Self(1 << 1);
    /// `speed`.
    pub const SPEED: Self = Self(1 << 2);
    /// `depth_ms`.
    pub const DEPTH: Self = Self(1 << 3);
    /// `waveform`.
    pub const WAVEFORM: Self = Self(1 << 4);
    /// Every field.
    pub const ALL: Self = Self(0b1_1111);

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

impl Default for ChorusParamSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// Chorus parameters.
///
/// | Field | Range | Default |
/// |-------|-------|---------|
/// | `nr` | 0–99 | 3 |
/// | `level` | 0.0–10.0 | 2.0 |
/// | `speed` | 0.29–5.0 Hz | 0.3 |
/// | `depth_ms` | 0.0–256.0 ms | 8.0 |
/// | `waveform` | sine/triangle | sine |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusParams {
    /// Number of delay taps.
    pub nr: usize,
    /// Output level.
    pub level: f32,
    /// Modulation speed in Hz.
    pub speed: f32,
    /// Modulation depth in milliseconds.
    pub depth_ms: f32,
    /// Modulation waveform.
    pub waveform: ChorusWaveform,
}

impl Default for ChorusParams {
    fn default() -> Self {
        Self {
            nr: 3,
            level: 2.0,
            speed: 0.3,
            depth_ms: 8.0,
            waveform: ChorusWaveform::Sine,
        }
    }
}

impl ChorusParams {
    /// Returns a copy with every field clamped to its legal range.
    pub fn clamped(self) -> Self {
        Self {
            nr: self.nr.min(MAX_CHORUS_VOICES),
            level: self.level.clamp(0.0, MAX_LEVEL),
            speed: self.speed.clamp(MIN_SPEED_HZ, MAX_SPEED_HZ),
            depth_ms: self.depth_ms.clamp(0.0, MAX_DEPTH_MS),
            waveform: self.waveform,
        }
    }
}

/// Multi-voice chorus send effect.
///
/// The output is mono and written identically to both channels.
///
/// Modulation tables are rebuilt whenever `speed`, `depth_ms`, `nr`,
/// `waveform` or the sample rate change; a level-only update just rescales
/// the output. The table storage is reserved for
/// the slowest legal speed, so a rebuild never reallocates, but it is
/// O(period) work.
///
/// # Example
///
/// ```rust
/// use polyvox_core::SendEffect;
/// use polyvox_effects::{Chorus, ChorusParamSet, ChorusParams};
///
/// let mut chorus = Chorus::new(44100.0);
/// chorus.set_params(ChorusParamSet::NR, &ChorusParams { nr: 5, ..ChorusParams::default() });
///
/// let send = [0.1f32; 64];
/// let (mut left, mut right) = ([0.0f32; 64], [0.0f32; 64]);
/// chorus.process_replace(&send, &mut left, &mut right);
/// assert_eq!(left, right);
/// ```
#[derive(Debug, Clone)]
pub struct Chorus {
    params: ChorusParams,
    buffer: Vec<f32>,
    counter: usize,
    lookup: Vec<usize>,
    phase: [usize; MAX_CHORUS_VOICES],
    sinc: [[f32; INTERP_SUBSAMPLES]; INTERP_SAMPLES],
    gain: f32,
    sample_rate: f32,
}

impl Chorus {
    /// Create a chorus with default parameters.
    pub fn new(sample_rate: f32) -> Self {
        let mut chorus = Self {
            params: ChorusParams::default(),
            buffer: alloc::vec![0.0; MAX_SAMPLES],
            counter: 0,
            lookup: Vec::with_capacity(max_period(sample_rate)),
            phase: [0; MAX_CHORUS_VOICES],
            sinc: sinc_table(),
            gain: 0.0,
            sample_rate,
        };
        chorus.update();
        chorus
    }

    /// Update the fields of `params` selected by `set`.
    pub fn set_params(&mut self, set: ChorusParamSet, params: &ChorusParams) {
        let p = params.clamped();
        if set.contains(ChorusParamSet::NR) {
            self.params.nr = p.nr;
        }
        if set.contains(ChorusParamSet::LEVEL) {
            self.params.level = p.level;
        }
        if set.contains(ChorusParamSet::SPEED) {
            self.params.speed = p.speed;
        }
        if set.contains(ChorusParamSet::DEPTH) {
            self.params.depth_ms = p.depth_ms;
        }
        if set.contains(ChorusParamSet::WAVEFORM) {
            self.params.waveform = p.waveform;
        }

        let modulation = ChorusParamSet::NR
            .union(ChorusParamSet::SPEED)
            .union(ChorusParamSet::DEPTH)
            .union(ChorusParamSet::WAVEFORM);
        if set.0 & modulation.0 != 0 {
            self.update();
        } else {
            self.update_gain();
        }
    }

    /// Current parameters.
    pub fn params(&self) -> ChorusParams {
        self.params
    }

    /// Length of the modulation table in samples (one modulation period).
    pub fn modulation_period(&self) -> usize {
        self.lookup.len()
    }

    fn update(&mut self) {
        let period = ((self.sample_rate / self.params.speed) as usize).clamp(1, self.lookup.capacity().max(1));

        let mut depth = (self.params.depth_ms / 1000.0 * self.sample_rate) as usize;
        if depth >= MAX_SAMPLES - INTERP_SAMPLES {
            depth = MAX_SAMPLES - INTERP_SAMPLES - 1;
        }

        self.lookup.clear();
        match self.params.waveform {
            ChorusWaveform::Sine => {
                self.lookup.extend((0..period).map(|i| {
                    let val = sin(i as f64 / period as f64 * 2.0 * PI);
                    ((1.0 + val) * depth as f64 / 2.0 * INTERP_SUBSAMPLES as f64) as usize
                }));
            }
            ChorusWaveform::Triangle => {
                self.lookup.extend((0..period).map(|i| {
                    let half = period as f64 / 2.0;
                    let pos = i as f64;
                    let ramp = if pos < half { pos / half } else { (period as f64 - pos) / half };
                    (ramp * depth as f64 * INTERP_SUBSAMPLES as f64) as usize
                }));
            }
        }

        for (i, phase) in self.phase.iter_mut().take(self.params.nr).enumerate() {
            *phase = period * i / self.params.nr.max(1);
        }

        self.update_gain();
    }

    fn update_gain(&mut self) {
        self.gain = if self.params.nr == 0 {
            0.0
        } else {
            self.params.level / self.params.nr as f32
        };
    }

    /// Produces one output sample for input `x`.
    #[inline]
    fn tick(&mut self, x: f32) -> f32 {
        self.buffer[self.counter] = x;

        let period = self.lookup.len();
        let mut out = 0.0f32;
        for phase in self.phase.iter_mut().take(self.params.nr) {
            let pos = INTERP_SUBSAMPLES * self.counter + READ_OFFSET - self.lookup[*phase];
            let mut sample_pos = pos / INTERP_SUBSAMPLES;
            let sub = pos % INTERP_SUBSAMPLES;
            for row in &self.sinc {
                out += self.buffer[sample_pos & MAX_SAMPLES_MASK] * row[sub];
                sample_pos = sample_pos.wrapping_sub(1);
            }
            *phase += 1;
            if *phase >= period {
                *phase = 0;
            }
        }

        self.counter = (self.counter + 1) & MAX_SAMPLES_MASK;
        out * self.gain
    }
}

/// Table capacity needed for the slowest legal modulation speed.
fn max_period(sample_rate: f32) -> usize {
    (sample_rate / MIN_SPEED_HZ) as usize + 1
}

/// Hamming-windowed sinc, `INTERP_SAMPLES` taps at each sub-sample offset.
fn sinc_table() -> [[f32; INTERP_SUBSAMPLES]; INTERP_SAMPLES] {
    core::array::from_fn(|i| {
        core::array::from_fn(|ii| {
            let shifted = i as f64 - INTERP_SAMPLES as f64 / 2.0 + ii as f64 / INTERP_SUBSAMPLES as f64;
            if shifted.abs() < 1e-6 {
                1.0
            } else {
                let sinc = sin(shifted * PI) / (PI * shifted);
                let window = 0.5 * (1.0 + cos(2.0 * PI * shifted / INTERP_SAMPLES as f64));
                (sinc * window) as f32
            }
        })
    })
}

impl SendEffect for Chorus {
    fn process_mix(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(input.len(), left.len());
        debug_assert_eq!(input.len(), right.len());
        for ((x, l), r) in input.iter().zip(left.iter_mut()).zip(right.iter_mut()) {
            let out = self.tick(*x);
            *l += out;
            *r += out;
        }
    }

    fn process_replace(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(input.len(), left.len());
        debug_assert_eq!(input.len(), right.len());
        for i in 0..input.len() {
            let out = self.tick(input[i]);
            left[i] = out;
            right[i] = out;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.lookup = Vec::with_capacity(max_period(sample_rate));
        self.reset();
        self.update();
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modulation_period_follows_speed() {
        let mut chorus = Chorus::new(44100.0);
        chorus.set_params(
            ChorusParamSet::SPEED,
            &ChorusParams {
                speed: 1.0,
                ..ChorusParams::default()
            },
        );
        assert_eq!(chorus.modulation_period(), 44100);

        chorus.set_params(
            ChorusParamSet::SPEED,
            &ChorusParams {
                speed: 100.0,
                ..ChorusParams::default()
            },
        );
        assert_eq!(chorus.params().speed, 5.0);
        assert_eq!(chorus.modulation_period(), 8820);
    }

    #[test]
    fn test_sinc_table_center_tap() {
        let table = sinc_table();
        // Tap 2 at sub-sample 0 sits exactly on the sample
        assert_eq!(table[2][0], 1.0);
        assert!(table[0][0].abs() < 1e-6);
        assert!(table[4][0].abs() < 1e-6);
    }

    #[test]
    fn test_zero_voices_is_silent() {
        let mut chorus = Chorus::new(44100.0);
        chorus.set_params(
            ChorusParamSet::NR,
            &ChorusParams {
                nr: 0,
                ..ChorusParams::default()
            },
        );
        let input = [1.0f32; 256];
        let mut l = [0.0f32; 256];
        let mut r = [0.0f32; 256];
        chorus.process_replace(&input, &mut l, &mut r);
        assert!(l.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_output_delayed_and_finite() {
        let mut chorus = Chorus::new(44100.0);
        let mut input = vec![0.0f32; 4096];
        input[0] = 1.0;
        let mut l = vec![0.0f32; 4096];
        let mut r = vec![0.0f32; 4096];
        chorus.process_replace(&input, &mut l, &mut r);

        assert!(l.iter().all(|x| x.is_finite()));
        let energy: f32 = l.iter().map(|x| x * x).sum();
        assert!(energy > 0.0, "impulse should come back out");
        assert_eq!(l, r);
    }

    #[test]
    fn test_mix_adds_to_existing() {
        let input = [0.3f32; 512];

        let mut a = Chorus::new(48000.0);
        let mut l_rep = [0.0f32; 512];
        let mut r_rep = [0.0f32; 512];
        a.process_replace(&input, &mut l_rep, &mut r_rep);

        let mut b = Chorus::new(48000.0);
        let mut l_mix = [1.0f32; 512];
        let mut r_mix = [1.0f32; 512];
        b.process_mix(&input, &mut l_mix, &mut r_mix);

        for i in 0..512 {
            assert!((l_mix[i] - (l_rep[i] + 1.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_level_update_keeps_modulation() {
        let mut chorus = Chorus::new(44100.0);
        let input = [0.2f32; 1000];
        let mut l = [0.0f32; 1000];
        let mut r = [0.0f32; 1000];
        chorus.process_replace(&input, &mut l, &mut r);

        let phases = chorus.phase;
        let table_ptr = chorus.lookup.as_ptr();
        let table = chorus.lookup.clone();
        assert_eq!(phases[0], 1000);

        chorus.set_params(
            ChorusParamSet::LEVEL,
            &ChorusParams {
                level: 5.0,
                ..ChorusParams::default()
            },
        );
        assert_eq!(chorus.phase, phases);
        assert_eq!(chorus.lookup.as_ptr(), table_ptr);
        assert_eq!(chorus.lookup, table);
        assert_eq!(chorus.params().level, 5.0);
        assert!((chorus.gain - 5.0 / 3.0).abs() < 1e-6);

        // A modulation change restarts the taps
        chorus.set_params(
            ChorusParamSet::SPEED,
            &ChorusParams {
                speed: 1.0,
                ..ChorusParams::default()
            },
        );
        assert_eq!(chorus.phase[0], 0);
    }

    #[test]
    fn test_nr_clamped() {
        let mut chorus = Chorus::new(44100.0);
        chorus.set_params(
            ChorusParamSet::ALL,
            &ChorusParams {
                nr: 500,
                ..ChorusParams::default()
            },
        );
        assert_eq!(chorus.params().nr, MAX_CHORUS_VOICES);
    }

    #[test]
    fn test_triangle_table_bounds() {
        let mut chorus = Chorus::new(44100.0);
        chorus.set_params(
            ChorusParamSet::WAVEFORM.union(ChorusParamSet::DEPTH),
            &ChorusParams {
                waveform: ChorusWaveform::Triangle,
                depth_ms: 10.0,
                ..ChorusParams::default()
            },
        );
        // 10 ms at 44.1 kHz is 441 samples
        let depth_sub = 442 * INTERP_SUBSAMPLES;
        assert!(chorus.lookup.iter().all(|&v| v <= depth_sub));
        assert_eq!(chorus.lookup[0], 0);
    }
}

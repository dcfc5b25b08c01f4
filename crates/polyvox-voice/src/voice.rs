//! The sample-playback voice.
//!
//! A [`Voice`] renders one [`BLOCK_SIZE`] block per call to
//! [`write`](Voice::write). Everything that changes over time (envelopes,
//! LFOs, filter coefficients) advances once per block; pitch and amplitude
//! are held for the block, with amplitude ramped linearly from the previous
//! block's value to avoid zipper noise.
//!
//! ## Signal Flow
//!
//! ```text
//! sample ─► interpolate(phase) ─► × amp ramp ─► lowpass ─► block
//!              ▲                     ▲             ▲
//!        pitch + modlfo        volenv, atten,   fc + modlfo
//!        + viblfo + modenv     modlfo→vol       + modenv
//! ```

use core::fmt;
use std::sync::Arc;

use polyvox_core::{BLOCK_SIZE, cb_to_amp, ct_to_hz};

use crate::envelope::{EnvSection, Envelope};
use crate::filter::ResonantFilter;
use crate::interp::Interpolation;
use crate::lfo::BlockLfo;
use crate::op::{EnvKind, VoiceOp};
use crate::routing::OutputMappings;
use crate::sample::Sample;

/// Amplitude below which a releasing voice is considered silent.
pub const NOISE_FLOOR: f32 = 0.00003;

/// Lowest accepted synthesis gain.
pub const MIN_SYNTH_GAIN: f32 = 1e-7;

/// Largest attenuation in centibels; anything above is silence.
pub const MAX_ATTENUATION: f32 = 1440.0;

/// Identity of a voice, unique among the voices a mixer holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(pub u32);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// What happens when playback reaches the loop end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    /// Play once through to the end.
    #[default]
    Unlooped,
    /// Loop forever.
    Looped,
    /// Loop until note-off, then play out to the end.
    LoopUntilRelease,
}

/// Result of rendering one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockWrite {
    /// All [`BLOCK_SIZE`] samples written; the voice keeps playing.
    Full,
    /// Nothing audible this block (envelope delay). The block is zeroed.
    Silent,
    /// The voice finished after writing this many samples. The rest of the
    /// block is zeroed.
    Ended(usize),
}

/// One sample-playback voice.
///
/// Build it on the control thread, hand it to the mixer, and change it
/// afterwards only through [`VoiceOp`]s.
///
/// # Example
///
/// ```rust
/// use polyvox_voice::{BlockWrite, Envelope, LoopMode, Sample, Voice, VoiceId};
///
/// let sample = Sample::sine(44100.0, 100).into_shared();
/// let mut voice = Voice::new(VoiceId(1), sample, 44100.0)
///     .with_loop_mode(LoopMode::Looped)
///     .with_envelope(Envelope::one_shot(2));
///
/// let mut block = [0.0f32; 64];
/// assert_eq!(voice.write(&mut block), BlockWrite::Full);
/// assert_eq!(voice.write(&mut block), BlockWrite::Ended(64));
/// assert!(voice.is_finished());
/// ```
#[derive(Clone, Debug)]
pub struct Voice {
    id: VoiceId,
    sample: Arc<Sample>,
    interp: Interpolation,

    start: usize,
    end: usize,
    loop_start: usize,
    loop_end: usize,
    loop_mode: LoopMode,
    phase: f64,

    output_rate: f32,
    root_pitch_hz: f32,
    pitch: f32,

    attenuation: f32,
    min_attenuation: f32,
    synth_gain: f32,
    amp: f32,

    volenv: Envelope,
    modenv: Envelope,
    modenv_to_pitch: f32,
    modenv_to_fc: f32,

    modlfo: BlockLfo,
    modlfo_to_pitch: f32,
    modlfo_to_vol: f32,
    modlfo_to_fc: f32,

    viblfo: BlockLfo,
    viblfo_to_pitch: f32,

    filter: ResonantFilter,
    mappings: OutputMappings,
}

impl Voice {
    /// New voice playing `sample` at its recorded pitch.
    ///
    /// Defaults: unlooped, sustained volume envelope, no attenuation, unity
    /// gain, filter open, slots 0/1 routed to buffers 0/1 at unity.
    pub fn new(id: VoiceId, sample: Arc<Sample>, output_rate: f32) -> Self {
        let mut mappings = OutputMappings::new();
        mappings.set(0, 0, 1.0);
        mappings.set(1, 1, 1.0);

        let pitch = sample.root_key() * 100.0;
        let mut voice = Self {
            id,
            interp: Interpolation::default(),
            start: 0,
            end: sample.len(),
            loop_start: sample.loop_start(),
            loop_end: sample.loop_end(),
            loop_mode: LoopMode::Unlooped,
            phase: 0.0,
            output_rate,
            root_pitch_hz: 0.0,
            pitch,
            attenuation: 0.0,
            min_attenuation: 0.0,
            synth_gain: 1.0,
            amp: 0.0,
            volenv: Envelope::sustained(),
            modenv: Envelope::sustained(),
            modenv_to_pitch: 0.0,
            modenv_to_fc: 0.0,
            modlfo: BlockLfo::new(),
            modlfo_to_pitch: 0.0,
            modlfo_to_vol: 0.0,
            modlfo_to_fc: 0.0,
            viblfo: BlockLfo::new(),
            viblfo_to_pitch: 0.0,
            filter: ResonantFilter::new(output_rate),
            mappings,
            sample,
        };
        voice.update_root_pitch();
        voice
    }

    /// Set the MIDI key (fractional) to play.
    pub fn with_key(mut self, key: f32) -> Self {
        self.pitch = key * 100.0;
        self
    }

    /// Set the volume envelope.
    pub fn with_envelope(mut self, env: Envelope) -> Self {
        self.volenv = env;
        self
    }

    /// Set the modulation envelope.
    pub fn with_mod_envelope(mut self, env: Envelope) -> Self {
        self.modenv = env;
        self
    }

    /// Set the loop mode.
    pub fn with_loop_mode(mut self, mode: LoopMode) -> Self {
        self.loop_mode = mode;
        self
    }

    /// Set the output routes.
    pub fn with_mappings(mut self, mappings: OutputMappings) -> Self {
        self.mappings = mappings;
        self
    }

    /// Set the interpolation method.
    pub fn with_interpolation(mut self, interp: Interpolation) -> Self {
        self.interp = interp;
        self
    }

    /// Set the attenuation in centibels.
    pub fn with_attenuation(mut self, cb: f32) -> Self {
        self.attenuation = cb.clamp(0.0, MAX_ATTENUATION);
        self
    }

    /// Set the linear synthesis gain.
    pub fn with_synth_gain(mut self, gain: f32) -> Self {
        self.synth_gain = gain.max(MIN_SYNTH_GAIN);
        self
    }

    /// Set the filter cutoff (absolute cents) and resonance (dB).
    pub fn with_filter(mut self, cutoff_cents: f32, q_db: f32) -> Self {
        self.filter.set_cutoff(cutoff_cents);
        self.filter.set_q_db(q_db);
        self
    }

    /// Voice identity.
    pub fn id(&self) -> VoiceId {
        self.id
    }

    /// Reassign the identity. Only valid before the voice is submitted.
    pub fn set_id(&mut self, id: VoiceId) {
        self.id = id;
    }

    /// The sample being played.
    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }

    /// Base pitch, absolute cents.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Output routes.
    pub fn mappings(&self) -> &OutputMappings {
        &self.mappings
    }

    /// Volume envelope.
    pub fn volenv(&self) -> &Envelope {
        &self.volenv
    }

    /// Modulation envelope.
    pub fn modenv(&self) -> &Envelope {
        &self.modenv
    }

    /// Playback position in frames.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Loop mode.
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Amplitude reached at the end of the last block.
    pub fn amp(&self) -> f32 {
        self.amp
    }

    /// Frequency at which the sample plays back unshifted.
    pub fn root_pitch_hz(&self) -> f32 {
        self.root_pitch_hz
    }

    /// Output rate.
    pub fn output_rate(&self) -> f32 {
        self.output_rate
    }

    /// `true` once the volume envelope has finished. Such a voice may be
    /// evicted by the mixer.
    pub fn is_finished(&self) -> bool {
        self.volenv.is_finished()
    }

    /// `true` while the volume envelope is releasing.
    pub fn is_releasing(&self) -> bool {
        self.volenv.section() == EnvSection::Release
    }

    /// Apply one parameter change.
    pub fn apply(&mut self, op: VoiceOp) {
        match op {
            VoiceOp::SetPitch(cents) => self.pitch = cents,
            VoiceOp::SetAttenuation(cb) => self.attenuation = cb.clamp(0.0, MAX_ATTENUATION),
            VoiceOp::SetMinAttenuation(cb) => {
                self.min_attenuation = cb.clamp(0.0, MAX_ATTENUATION);
            }
            VoiceOp::SetSynthGain(gain) => self.synth_gain = gain.max(MIN_SYNTH_GAIN),
            VoiceOp::SetOutputRate(rate) => {
                self.output_rate = rate;
                self.filter.set_sample_rate(rate);
                self.update_root_pitch();
            }
            VoiceOp::SetRootPitchHz(hz) => self.root_pitch_hz = hz,
            VoiceOp::SetFilterCutoff(cents) => self.filter.set_cutoff(cents),
            VoiceOp::SetFilterQ(q_db) => self.filter.set_q_db(q_db),
            VoiceOp::SetModLfoToPitch(c) => self.modlfo_to_pitch = c,
            VoiceOp::SetModLfoToVol(cb) => self.modlfo_to_vol = cb,
            VoiceOp::SetModLfoToFc(c) => self.modlfo_to_fc = c,
            VoiceOp::SetModLfoDelay(blocks) => self.modlfo.set_delay(blocks),
            VoiceOp::SetModLfoIncr(inc) => self.modlfo.set_increment(inc),
            VoiceOp::SetVibLfoDelay(blocks) => self.viblfo.set_delay(blocks),
            VoiceOp::SetVibLfoIncr(inc) => self.viblfo.set_increment(inc),
            VoiceOp::SetVibLfoToPitch(c) => self.viblfo_to_pitch = c,
            VoiceOp::SetModEnvToPitch(c) => self.modenv_to_pitch = c,
            VoiceOp::SetModEnvToFc(c) => self.modenv_to_fc = c,
            VoiceOp::SetStart(frame) => {
                self.start = frame.min(self.end);
                if self.phase < self.start as f64 {
                    self.phase = self.start as f64;
                }
            }
            VoiceOp::SetEnd(frame) => {
                self.end = frame.clamp(self.start, self.sample.len());
                self.loop_end = self.loop_end.min(self.end);
                self.loop_start = self.loop_start.min(self.loop_end);
            }
            VoiceOp::SetLoopStart(frame) => self.loop_start = frame.min(self.loop_end),
            VoiceOp::SetLoopEnd(frame) => {
                self.loop_end = frame.clamp(self.loop_start, self.end);
            }
            VoiceOp::SetLoopMode(mode) => self.loop_mode = mode,
            VoiceOp::SetInterpolation(interp) => self.interp = interp,
            VoiceOp::SetMapping { slot, buffer } => {
                self.mappings.set_buffer(slot, buffer);
            }
            VoiceOp::SetAmp { slot, amp } => {
                self.mappings.set_amp(slot, amp);
            }
            VoiceOp::NoteOff => {
                self.volenv.release();
                self.modenv.release();
            }
            VoiceOp::Off => self.volenv.finish(),
            VoiceOp::Reset => self.reset(),
            VoiceOp::SetSample(sample) => {
                self.start = 0;
                self.end = sample.len();
                self.loop_start = sample.loop_start();
                self.loop_end = sample.loop_end();
                self.phase = 0.0;
                self.sample = sample;
                self.update_root_pitch();
            }
            VoiceOp::SetEnvelope {
                env,
                section,
                segment,
            } => match env {
                EnvKind::Vol => self.volenv.set_segment(section, segment),
                EnvKind::Mod => self.modenv.set_segment(section, segment),
            },
        }
    }

    /// Rewind playback, envelopes, LFOs and filter history.
    pub fn reset(&mut self) {
        self.phase = self.start as f64;
        self.amp = 0.0;
        self.volenv.reset();
        self.modenv.reset();
        self.modlfo.reset();
        self.viblfo.reset();
        self.filter.reset();
    }

    /// Render one block into `block`.
    ///
    /// Never writes past `BLOCK_SIZE`; on [`BlockWrite::Silent`] and
    /// [`BlockWrite::Ended`] the unwritten tail is zeroed. Once this returns
    /// `Ended`, the volume envelope is finished and further calls return
    /// `Ended(0)`.
    pub fn write(&mut self, block: &mut [f32; BLOCK_SIZE]) -> BlockWrite {
        if self.volenv.is_finished() || self.sample.is_empty() || self.end <= self.start {
            block.fill(0.0);
            self.volenv.finish();
            return BlockWrite::Ended(0);
        }

        let env = self.volenv.tick();
        let modenv = self.modenv.tick();
        let modlfo = self.modlfo.tick();
        let viblfo = self.viblfo.tick();

        if self.volenv.section() == EnvSection::Delay {
            block.fill(0.0);
            self.amp = 0.0;
            return BlockWrite::Silent;
        }

        let pitch = self.pitch
            + modlfo * self.modlfo_to_pitch
            + viblfo * self.viblfo_to_pitch
            + modenv * self.modenv_to_pitch;
        let incr = if self.root_pitch_hz > 0.0 {
            f64::from(ct_to_hz(pitch)) / f64::from(self.root_pitch_hz)
        } else {
            0.0
        };

        self.filter
            .update(modlfo * self.modlfo_to_fc + modenv * self.modenv_to_fc);

        let target = env * cb_to_amp(self.attenuation - modlfo * self.modlfo_to_vol) * self.synth_gain;
        let n = self.fill(block, incr, target);
        self.filter.process(&mut block[..n]);

        if n < BLOCK_SIZE {
            block[n..].fill(0.0);
            self.volenv.finish();
            return BlockWrite::Ended(n);
        }
        if self.volenv.is_finished() {
            return BlockWrite::Ended(BLOCK_SIZE);
        }
        if self.is_releasing() {
            let amp_max = cb_to_amp(self.min_attenuation) * self.volenv.value() * self.synth_gain;
            if amp_max < NOISE_FLOOR {
                self.volenv.finish();
                return BlockWrite::Ended(BLOCK_SIZE);
            }
        }
        BlockWrite::Full
    }

    /// Interpolate up to one block from the sample, ramping amplitude to
    /// `target`. Returns the number of samples written.
    fn fill(&mut self, block: &mut [f32; BLOCK_SIZE], incr: f64, target: f32) -> usize {
        let looping = self.loop_active();
        let loop_start = self.loop_start as f64;
        let loop_end = self.loop_end as f64;
        let loop_len = loop_end - loop_start;
        let end = self.end as f64;

        let start_amp = self.amp;
        let step = (target - start_amp) / BLOCK_SIZE as f32;
        let data = self.sample.data();

        let mut written = 0;
        for (i, out) in block.iter_mut().enumerate() {
            if !looping && self.phase >= end {
                break;
            }

            let idx = self.phase as usize;
            let frac = (self.phase - idx as f64) as f32;
            let idx = idx as i64;
            let y0 = self.frame(data, idx - 1, looping);
            let y1 = self.frame(data, idx, looping);
            let y2 = self.frame(data, idx + 1, looping);
            let y3 = self.frame(data, idx + 2, looping);

            let amp = start_amp + step * (i + 1) as f32;
            *out = self.interp.apply(y0, y1, y2, y3, frac) * amp;
            written = i + 1;

            self.phase += incr;
            if looping && self.phase >= loop_end {
                self.phase = loop_start + (self.phase - loop_start) % loop_len;
            }
        }

        self.amp = if written == BLOCK_SIZE {
            target
        } else {
            start_amp + step * written as f32
        };
        written
    }

    /// Sample value at `idx`, wrapping past the loop end when looping and
    /// clamping to the playable region otherwise.
    #[inline]
    fn frame(&self, data: &[f32], idx: i64, looping: bool) -> f32 {
        let start = self.start as i64;
        let end = self.end as i64;
        let idx = if looping {
            let (ls, le) = (self.loop_start as i64, self.loop_end as i64);
            if idx >= le {
                ls + (idx - le) % (le - ls)
            } else {
                idx.max(start)
            }
        } else {
            idx.clamp(start, end - 1)
        };
        usize::try_from(idx)
            .ok()
            .and_then(|i| data.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    fn loop_active(&self) -> bool {
        let valid = self.loop_end > self.loop_start && self.loop_end <= self.end;
        valid
            && match self.loop_mode {
                LoopMode::Unlooped => false,
                LoopMode::Looped => true,
                LoopMode::LoopUntilRelease => self.volenv.section() < EnvSection::Release,
            }
    }

    fn update_root_pitch(&mut self) {
        let rate = self.sample.sample_rate();
        let ratio = if rate > 0.0 { self.output_rate / rate } else { 1.0 };
        self.root_pitch_hz = ct_to_hz(self.sample.root_key() * 100.0) * ratio;
    }
}

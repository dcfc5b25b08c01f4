//! Per-voice parameter changes.
//!
//! A [`VoiceOp`] is the only way to change a voice after it has been handed
//! to the mixer. The engine wraps it in a command together with the target
//! [`VoiceId`](crate::VoiceId) and applies it on the render thread through
//! [`Voice::apply`](crate::Voice::apply).

use std::sync::Arc;

use crate::envelope::{EnvSection, EnvSegment};
use crate::interp::Interpolation;
use crate::sample::Sample;
use crate::voice::LoopMode;

/// Which of the two envelopes an op targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvKind {
    /// Volume envelope; drives amplitude and voice lifetime.
    Vol,
    /// Modulation envelope; drives pitch and filter cutoff.
    Mod,
}

/// One parameter change for a voice.
///
/// Pitch, cutoff and LFO/envelope depths are in cents; attenuations in
/// centibels; LFO delays in blocks.
#[derive(Clone, Debug)]
pub enum VoiceOp {
    /// Base pitch in absolute cents (6900 = A4).
    SetPitch(f32),
    /// Attenuation, centibels.
    SetAttenuation(f32),
    /// Lowest attenuation the voice can reach with modulation, centibels.
    SetMinAttenuation(f32),
    /// Linear gain applied after the envelope. Floored at `1e-7`.
    SetSynthGain(f32),
    /// Rate of the mixer output.
    SetOutputRate(f32),
    /// Frequency at which the sample plays at its recorded pitch, Hz.
    SetRootPitchHz(f32),
    /// Base filter cutoff, absolute cents.
    SetFilterCutoff(f32),
    /// Filter resonance, dB.
    SetFilterQ(f32),
    /// Mod LFO depth to pitch, cents.
    SetModLfoToPitch(f32),
    /// Mod LFO depth to volume, centibels.
    SetModLfoToVol(f32),
    /// Mod LFO depth to filter cutoff, cents.
    SetModLfoToFc(f32),
    /// Mod LFO delay, blocks.
    SetModLfoDelay(u32),
    /// Mod LFO increment per block.
    SetModLfoIncr(f32),
    /// Vibrato LFO delay, blocks.
    SetVibLfoDelay(u32),
    /// Vibrato LFO increment per block.
    SetVibLfoIncr(f32),
    /// Vibrato LFO depth to pitch, cents.
    SetVibLfoToPitch(f32),
    /// Mod envelope depth to pitch, cents.
    SetModEnvToPitch(f32),
    /// Mod envelope depth to filter cutoff, cents.
    SetModEnvToFc(f32),
    /// First playable frame.
    SetStart(usize),
    /// End of the playable region (exclusive).
    SetEnd(usize),
    /// Loop start frame.
    SetLoopStart(usize),
    /// Loop end frame (exclusive).
    SetLoopEnd(usize),
    /// Looping behaviour.
    SetLoopMode(LoopMode),
    /// Interpolation method.
    SetInterpolation(Interpolation),
    /// Point an output slot at a flat buffer index.
    SetMapping {
        /// Mapping slot, `0..MAX_MAPPINGS`.
        slot: usize,
        /// Flat buffer index.
        buffer: usize,
    },
    /// Change an output slot's gain.
    SetAmp {
        /// Mapping slot.
        slot: usize,
        /// Linear gain.
        amp: f32,
    },
    /// Enter release on both envelopes.
    NoteOff,
    /// Finish immediately; the voice is reported on the next render.
    Off,
    /// Rewind to the start of the sample and both envelopes.
    Reset,
    /// Swap the sample. Resets the loop region to the sample's own.
    SetSample(Arc<Sample>),
    /// Replace one envelope section.
    SetEnvelope {
        /// Target envelope.
        env: EnvKind,
        /// Section to replace.
        section: EnvSection,
        /// New parameters.
        segment: EnvSegment,
    },
}

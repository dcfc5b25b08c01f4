//! Commands sent from the control thread to the render thread.
//!
//! A [`Command`] either targets one voice by id ([`VoiceOp`]) or the mixer
//! itself ([`MixerOp`]). Commands are plain values: they are moved through
//! the ring, matched once on the render thread, and dropped.

use polyvox_effects::{ChorusParamSet, ChorusParams, ReverbParamSet, ReverbParams};
use polyvox_voice::{Voice, VoiceId, VoiceOp};

/// Mixer-level operations.
#[derive(Debug)]
pub enum MixerOp {
    /// Take ownership of a fully configured voice.
    AddVoice(Box<Voice>),
    /// Change the voice limit. Not real-time safe.
    SetPolyphony(usize),
    /// Change the output rate of effects and active voices. Not real-time
    /// safe.
    SetSampleRate(f32),
    /// Change the number of worker threads. Not real-time safe.
    SetThreads(usize),
    /// Enable or disable the reverb send.
    SetReverbEnabled(bool),
    /// Enable or disable the chorus send.
    SetChorusEnabled(bool),
    /// `true` mixes effect output into the main buffers; `false` replaces
    /// the send buffers with it.
    SetMixFx(bool),
    /// Update selected reverb parameters.
    SetReverbParams {
        /// Fields to change.
        set: ReverbParamSet,
        /// New values; fields outside `set` are ignored.
        params: ReverbParams,
    },
    /// Update selected chorus parameters. Changing anything but the level
    /// regenerates the modulation table.
    SetChorusParams {
        /// Fields to change.
        set: ChorusParamSet,
        /// New values; fields outside `set` are ignored.
        params: ChorusParams,
    },
    /// Clear both effects' internal state.
    ResetFx,
    /// Clear the reverb's internal state.
    ResetReverb,
    /// Clear the chorus's internal state.
    ResetChorus,
}

/// One queued command.
#[derive(Debug)]
pub enum Command {
    /// Change a voice. Ignored if no active voice has this id.
    Voice {
        /// Target voice.
        id: VoiceId,
        /// Change to apply.
        op: VoiceOp,
    },
    /// Change the mixer.
    Mixer(MixerOp),
}

impl Command {
    /// Shorthand for [`Command::Voice`].
    pub fn voice(id: VoiceId, op: VoiceOp) -> Self {
        Command::Voice { id, op }
    }

    /// Shorthand for [`MixerOp::AddVoice`].
    pub fn add_voice(voice: Voice) -> Self {
        Command::Mixer(MixerOp::AddVoice(Box::new(voice)))
    }
}

impl From<MixerOp> for Command {
    fn from(op: MixerOp) -> Self {
        Command::Mixer(op)
    }
}

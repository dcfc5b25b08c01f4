//! The voice mixer.
//!
//! [`Mixer`] owns every active voice, the output [`BufferSet`], both send
//! effects and the optional [`WorkerPool`]. One [`render`](Mixer::render)
//! call produces up to `max_blocks` blocks:
//!
//! 1. clamp the block count to the buffer capacity
//! 2. zero the used span of every buffer
//! 3. render voices, on the calling thread alone or with workers
//! 4. run enabled send effects over the rendered frames
//! 5. compact finished voices out of the active list and report them
//!
//! Finished voices are never dropped on the render thread. They wait in an
//! internal list until [`take_finished`](Mixer::take_finished) hands them
//! back.

use polyvox_config::SynthSettings;
use polyvox_core::{BLOCK_SIZE, FxMode, SendEffect};
use polyvox_effects::{
    Chorus, ChorusParamSet, ChorusParams, ChorusWaveform, Reverb, ReverbParamSet, ReverbParams,
};
use polyvox_voice::{Voice, VoiceId, VoiceOp};

use crate::buffers::{BufferSet, CHORUS_SEND, REVERB_SEND, SendRoutes};
use crate::command::{Command, MixerOp};
use crate::error::{EngineError, Result};
use crate::queue::CommandSink;
use crate::workers::{SlotResults, WorkerPool};
use crate::{DEFAULT_MAX_BLOCKS, VOICES_PER_THREAD};

/// Called once for every voice that leaves the active list.
pub type FinishedCallback = Box<dyn FnMut(&Voice) + Send>;

/// Construction parameters for a [`Mixer`].
#[derive(Debug, Clone, PartialEq)]
pub struct MixerConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f32,
    /// Maximum simultaneous voices.
    pub polyphony: usize,
    /// Number of stereo dry groups.
    pub audio_groups: usize,
    /// Buffer capacity in blocks.
    pub max_blocks: usize,
    /// Worker threads besides the render thread.
    pub threads: usize,
    /// Reverb send enabled.
    pub reverb_enabled: bool,
    /// Chorus send enabled.
    pub chorus_enabled: bool,
    /// Mix effect output into the dry buffers (`false` = replace mode).
    pub mix_fx: bool,
    /// Initial reverb parameters.
    pub reverb: ReverbParams,
    /// Initial chorus parameters.
    pub chorus: ChorusParams,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            polyphony: 256,
            audio_groups: 1,
            max_blocks: DEFAULT_MAX_BLOCKS,
            threads: 0,
            reverb_enabled: true,
            chorus_enabled: true,
            mix_fx: true,
            reverb: ReverbParams::default(),
            chorus: ChorusParams::default(),
        }
    }
}

impl From<&SynthSettings> for MixerConfig {
    fn from(s: &SynthSettings) -> Self {
        Self {
            sample_rate: s.sample_rate,
            polyphony: s.polyphony,
            audio_groups: s.audio_groups,
            max_blocks: s.max_blocks,
            threads: s.worker_threads(),
            reverb_enabled: s.reverb.active,
            chorus_enabled: s.chorus.active,
            mix_fx: s.mix_fx,
            reverb: ReverbParams {
                roomsize: s.reverb.roomsize,
                damping: s.reverb.damping,
                width: s.reverb.width,
                level: s.reverb.level,
            },
            chorus: ChorusParams {
                nr: s.chorus.nr,
                level: s.chorus.level,
                speed: s.chorus.speed,
                depth_ms: s.chorus.depth_ms,
                waveform: match s.chorus.waveform {
                    polyvox_config::ChorusShape::Sine => ChorusWaveform::Sine,
                    polyvox_config::ChorusShape::Triangle => ChorusWaveform::Triangle,
                },
            },
        }
    }
}

fn check_sample_rate(rate: f32) -> Result<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidSampleRate(rate))
    }
}

/// Polyphonic voice mixer.
///
/// # Example
///
/// ```rust
/// use polyvox_engine::{Mixer, MixerConfig};
/// use polyvox_voice::{Envelope, LoopMode, Sample, Voice, VoiceId};
///
/// let config = MixerConfig { sample_rate: 48000.0, ..MixerConfig::default() };
/// let mut mixer = Mixer::new(config, None).unwrap();
///
/// let sample = Sample::sine(48000.0, 120).into_shared();
/// let voice = Voice::new(VoiceId(1), sample, 48000.0)
///     .with_loop_mode(LoopMode::Looped)
///     .with_envelope(Envelope::one_shot(2));
/// mixer.add_voice(Box::new(voice)).unwrap();
///
/// assert_eq!(mixer.render(4), 4);
/// let mut done = Vec::new();
/// mixer.take_finished(|v| done.push(v.id()));
/// assert_eq!(done, vec![VoiceId(1)]);
/// ```
pub struct Mixer {
    voices: Vec<Box<Voice>>,
    polyphony: usize,
    buffers: BufferSet,
    reverb: Reverb,
    chorus: Chorus,
    reverb_enabled: bool,
    chorus_enabled: bool,
    fx_mode: FxMode,
    sample_rate: f32,
    current_blocks: usize,
    finished_flags: Vec<bool>,
    slots: Vec<Option<Box<Voice>>>,
    finished: Vec<Box<Voice>>,
    evicted: Vec<Box<Voice>>,
    returned: Vec<Box<Voice>>,
    on_finished: Option<FinishedCallback>,
    pool: Option<WorkerPool>,
}

impl Mixer {
    /// Build a mixer, starting `config.threads` render workers.
    pub fn new(config: MixerConfig, on_finished: Option<FinishedCallback>) -> Result<Self> {
        check_sample_rate(config.sample_rate)?;
        if config.polyphony == 0 {
            return Err(EngineError::ZeroPolyphony);
        }

        let polyphony = config.polyphony;
        let buffers = BufferSet::new(config.audio_groups, config.max_blocks);

        let mut reverb = Reverb::new(config.sample_rate);
        reverb.set_params(ReverbParamSet::ALL, &config.reverb);
        let mut chorus = Chorus::new(config.sample_rate);
        chorus.set_params(ChorusParamSet::ALL, &config.chorus);

        let pool = if config.threads > 0 {
            Some(WorkerPool::new(config.threads, &buffers, polyphony)?)
        } else {
            None
        };

        tracing::info!(
            sample_rate = config.sample_rate,
            polyphony,
            groups = buffers.groups(),
            max_blocks = buffers.max_blocks(),
            threads = config.threads,
            "mixer created"
        );

        Ok(Self {
            voices: Vec::with_capacity(polyphony),
            polyphony,
            buffers,
            reverb,
            chorus,
            reverb_enabled: config.reverb_enabled,
            chorus_enabled: config.chorus_enabled,
            fx_mode: if config.mix_fx {
                FxMode::Mix
            } else {
                FxMode::Replace
            },
            sample_rate: config.sample_rate,
            current_blocks: 0,
            finished_flags: vec![false; polyphony],
            slots: (0..polyphony).map(|_| None).collect(),
            finished: Vec::with_capacity(polyphony),
            evicted: Vec::with_capacity(polyphony),
            returned: Vec::with_capacity(polyphony.saturating_mul(2)),
            on_finished,
            pool,
        })
    }

    /// Install or replace the finished-voice callback.
    pub fn set_finished_callback(&mut self, callback: Option<FinishedCallback>) {
        self.on_finished = callback;
    }

    /// Execute one command, logging any failure.
    pub fn execute(&mut self, cmd: Command) {
        if let Err(e) = self.try_execute(cmd) {
            match e {
                EngineError::DuplicateVoice(_) | EngineError::PolyphonyExceeded { .. } => {
                    tracing::error!(error = %e, "voice rejected");
                }
                _ => tracing::warn!(error = %e, "mixer command failed"),
            }
        }
    }

    /// Execute one command.
    pub fn try_execute(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::Voice { id, op } => {
                self.apply_to_voice(id, op);
                Ok(())
            }
            Command::Mixer(op) => match op {
                MixerOp::AddVoice(voice) => self.add_voice(voice),
                MixerOp::SetPolyphony(n) => self.set_polyphony(n),
                MixerOp::SetSampleRate(rate) => self.set_sample_rate(rate),
                MixerOp::SetThreads(n) => self.set_threads(n),
                MixerOp::SetReverbEnabled(on) => {
                    self.set_reverb_enabled(on);
                    Ok(())
                }
                MixerOp::SetChorusEnabled(on) => {
                    self.set_chorus_enabled(on);
                    Ok(())
                }
                MixerOp::SetMixFx(mix) => {
                    self.set_mix_fx(mix);
                    Ok(())
                }
                MixerOp::SetReverbParams { set, params } => {
                    self.set_reverb_params(set, &params);
                    Ok(())
                }
                MixerOp::SetChorusParams { set, params } => {
                    self.set_chorus_params(set, &params);
                    Ok(())
                }
                MixerOp::ResetFx => {
                    self.reset_fx();
                    Ok(())
                }
                MixerOp::ResetReverb => {
                    self.reset_reverb();
                    Ok(())
                }
                MixerOp::ResetChorus => {
                    self.reset_chorus();
                    Ok(())
                }
            },
        }
    }

    fn apply_to_voice(&mut self, id: VoiceId, op: VoiceOp) {
        match self.voices.iter_mut().find(|v| v.id() == id) {
            Some(voice) => voice.apply(op),
            None => tracing::trace!(voice = %id, ?op, "command for inactive voice ignored"),
        }
    }

    /// Take ownership of `voice` and start rendering it.
    ///
    /// At full polyphony the first voice (in active-list order) whose volume
    /// envelope has finished is evicted to make room; it is reported as
    /// finished on the next render. A rejected voice is handed back through
    /// [`take_finished`](Self::take_finished) without invoking the callback.
    pub fn add_voice(&mut self, voice: Box<Voice>) -> Result<()> {
        let id = voice.id();
        if self.voices.iter().any(|v| v.id() == id) {
            self.returned.push(voice);
            return Err(EngineError::DuplicateVoice(id));
        }

        if self.voices.len() < self.polyphony {
            self.voices.push(voice);
            return Ok(());
        }

        if let Some(slot) = self.voices.iter().position(|v| v.is_finished()) {
            let old = std::mem::replace(&mut self.voices[slot], voice);
            tracing::debug!(evicted = %old.id(), voice = %id, slot, "evicted finished voice");
            self.evicted.push(old);
            return Ok(());
        }

        self.returned.push(voice);
        Err(EngineError::PolyphonyExceeded {
            polyphony: self.polyphony,
        })
    }

    /// Change the voice limit. Not real-time safe.
    ///
    /// Fails if `n` is zero or below the number of active voices; the limit
    /// is then unchanged.
    pub fn set_polyphony(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(EngineError::ZeroPolyphony);
        }
        if self.voices.len() > n {
            return Err(EngineError::PolyphonyBelowActive {
                requested: n,
                active: self.voices.len(),
            });
        }
        if n == self.polyphony {
            return Ok(());
        }

        if let Some(pool) = &self.pool {
            let rebuilt = WorkerPool::new(pool.threads(), &self.buffers, n)?;
            self.pool = Some(rebuilt);
        }

        self.finished_flags.resize(n, false);
        self.slots.resize_with(n, || None);
        for list in [&mut self.voices, &mut self.finished, &mut self.evicted] {
            list.reserve(n.saturating_sub(list.len()));
        }
        // Rejected voices share this list, so it holds up to twice polyphony
        let returned = n.saturating_mul(2);
        self.returned.reserve(returned.saturating_sub(self.returned.len()));
        tracing::info!(from = self.polyphony, to = n, "polyphony changed");
        self.polyphony = n;
        Ok(())
    }

    /// Change the number of worker threads. Not real-time safe.
    ///
    /// Zero stops and joins every worker. If a new worker cannot be started
    /// the previous pool keeps running and the error is returned.
    pub fn set_threads(&mut self, n: usize) -> Result<()> {
        if n == self.threads() {
            return Ok(());
        }
        if n == 0 {
            if let Some(mut pool) = self.pool.take() {
                pool.shutdown();
            }
            return Ok(());
        }
        let pool = WorkerPool::new(n, &self.buffers, self.polyphony)?;
        self.pool = Some(pool);
        Ok(())
    }

    /// Change the output sample rate of effects and active voices. Not
    /// real-time safe.
    pub fn set_sample_rate(&mut self, rate: f32) -> Result<()> {
        check_sample_rate(rate)?;
        self.reverb.set_sample_rate(rate);
        self.chorus.set_sample_rate(rate);
        for voice in &mut self.voices {
            voice.apply(VoiceOp::SetOutputRate(rate));
        }
        tracing::info!(from = self.sample_rate, to = rate, "sample rate changed");
        self.sample_rate = rate;
        Ok(())
    }

    /// Enable or disable the reverb send.
    pub fn set_reverb_enabled(&mut self, on: bool) {
        self.reverb_enabled = on;
    }

    /// Enable or disable the chorus send.
    pub fn set_chorus_enabled(&mut self, on: bool) {
        self.chorus_enabled = on;
    }

    /// Select mix (`true`) or replace (`false`) effect output.
    pub fn set_mix_fx(&mut self, mix: bool) {
        self.fx_mode = if mix { FxMode::Mix } else { FxMode::Replace };
    }

    /// Update the reverb fields named in `set`.
    pub fn set_reverb_params(&mut self, set: ReverbParamSet, params: &ReverbParams) {
        self.reverb.set_params(set, params);
    }

    /// Update the chorus fields named in `set`.
    pub fn set_chorus_params(&mut self, set: ChorusParamSet, params: &ChorusParams) {
        self.chorus.set_params(set, params);
    }

    /// Clear both effects.
    pub fn reset_fx(&mut self) {
        self.reset_reverb();
        self.reset_chorus();
    }

    /// Clear the reverb's delay lines.
    pub fn reset_reverb(&mut self) {
        self.reverb.reset();
    }

    /// Clear the chorus's delay line and modulation phase.
    pub fn reset_chorus(&mut self) {
        self.chorus.reset();
    }

    /// Render up to `blocks` blocks. Returns the number actually rendered
    /// (`blocks` clamped to the buffer capacity).
    pub fn render(&mut self, blocks: usize) -> usize {
        let blocks = blocks.min(self.buffers.max_blocks());
        self.current_blocks = blocks;
        self.buffers.zero(blocks);
        let routes = SendRoutes::new(self.reverb_enabled, self.chorus_enabled);

        if blocks > 0 {
            self.render_voices(routes, blocks);
            self.render_fx(blocks);
        }

        self.collect_finished();
        blocks
    }

    fn render_voices(&mut self, routes: SendRoutes, blocks: usize) {
        let active = self.voices.len();
        let extra = self
            .pool
            .as_ref()
            .map_or(0, |p| (active / VOICES_PER_THREAD).min(p.threads()));

        match self.pool.as_mut() {
            Some(pool) if extra > 0 => {
                pool.render(
                    &mut self.buffers,
                    &mut self.voices,
                    SlotResults {
                        voices: &mut self.slots,
                        finished: &mut self.finished_flags,
                    },
                    routes,
                    blocks,
                    extra,
                );
                // Restore slot order
                for slot in &mut self.slots[..active] {
                    if let Some(voice) = slot.take() {
                        self.voices.push(voice);
                    }
                }
                if self.voices.len() != active {
                    tracing::error!(
                        expected = active,
                        returned = self.voices.len(),
                        "voices lost during parallel render"
                    );
                }
            }
            _ => {
                for (slot, voice) in self.voices.iter_mut().enumerate() {
                    self.finished_flags[slot] = self.buffers.render_voice(voice, routes, blocks);
                }
            }
        }
    }

    fn render_fx(&mut self, blocks: usize) {
        let frames = blocks * BLOCK_SIZE;
        if self.reverb_enabled {
            self.buffers
                .process_send(REVERB_SEND, &mut self.reverb, self.fx_mode, frames);
        }
        if self.chorus_enabled {
            self.buffers
                .process_send(CHORUS_SEND, &mut self.chorus, self.fx_mode, frames);
        }
    }

    fn collect_finished(&mut self) {
        // Descending order: swap_remove only moves voices not yet visited
        for slot in (0..self.voices.len()).rev() {
            if self.finished_flags[slot] {
                self.finished_flags[slot] = false;
                self.finished.push(self.voices.swap_remove(slot));
            }
        }
        self.finished.reverse();

        for voice in self.evicted.drain(..).chain(self.finished.drain(..)) {
            if let Some(callback) = self.on_finished.as_mut() {
                callback(&voice);
            }
            self.returned.push(voice);
        }
    }

    /// Hand every finished, evicted or rejected voice to `f`, oldest first.
    pub fn take_finished(&mut self, mut f: impl FnMut(Box<Voice>)) {
        for voice in self.returned.drain(..) {
            f(voice);
        }
    }

    /// Number of voices waiting in [`take_finished`](Self::take_finished).
    pub fn finished_pending(&self) -> usize {
        self.returned.len()
    }

    /// Number of active voices.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Voice limit.
    pub fn polyphony(&self) -> usize {
        self.polyphony
    }

    /// Active voices in slot order.
    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().map(AsRef::as_ref)
    }

    /// Output buffers of the last render.
    pub fn buffers(&self) -> &BufferSet {
        &self.buffers
    }

    /// Blocks produced by the last render.
    pub fn current_blocks(&self) -> usize {
        self.current_blocks
    }

    /// Running worker threads.
    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::threads)
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Reverb send enabled.
    pub fn reverb_enabled(&self) -> bool {
        self.reverb_enabled
    }

    /// Chorus send enabled.
    pub fn chorus_enabled(&self) -> bool {
        self.chorus_enabled
    }

    /// Current effect output mode.
    pub fn fx_mode(&self) -> FxMode {
        self.fx_mode
    }

    /// Current reverb parameters.
    pub fn reverb_params(&self) -> ReverbParams {
        self.reverb.params()
    }

    /// Current chorus parameters.
    pub fn chorus_params(&self) -> ChorusParams {
        self.chorus.params()
    }
}

impl CommandSink for Mixer {
    fn push(&mut self, cmd: Command) -> Result<()> {
        self.try_execute(cmd)
    }

    fn flush(&mut self) {}
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("active", &self.voices.len())
            .field("polyphony", &self.polyphony)
            .field("sample_rate", &self.sample_rate)
            .field("fx_mode", &self.fx_mode)
            .field("reverb_enabled", &self.reverb_enabled)
            .field("chorus_enabled", &self.chorus_enabled)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyvox_voice::{Envelope, LoopMode, Sample};

    const SR: f32 = 48000.0;

    fn mixer(polyphony: usize) -> Mixer {
        Mixer::new(
            MixerConfig {
                sample_rate: SR,
                polyphony,
                max_blocks: 8,
                ..MixerConfig::default()
            },
            None,
        )
        .unwrap()
    }

    fn voice(id: u32, blocks: u32) -> Box<Voice> {
        let sample = Sample::sine(SR, 120).into_shared();
        Box::new(
            Voice::new(VoiceId(id), sample, SR)
                .with_loop_mode(LoopMode::Looped)
                .with_envelope(Envelope::one_shot(blocks)),
        )
    }

    #[test]
    fn test_rejects_bad_config() {
        let bad_rate = MixerConfig {
            sample_rate: 0.0,
            ..MixerConfig::default()
        };
        assert_eq!(
            Mixer::new(bad_rate, None).unwrap_err(),
            EngineError::InvalidSampleRate(0.0)
        );
        let zero = MixerConfig {
            polyphony: 0,
            ..MixerConfig::default()
        };
        assert_eq!(Mixer::new(zero, None).unwrap_err(), EngineError::ZeroPolyphony);
    }

    #[test]
    fn test_duplicate_voice_rejected() {
        let mut m = mixer(4);
        m.add_voice(voice(1, 4)).unwrap();
        assert_eq!(
            m.add_voice(voice(1, 4)),
            Err(EngineError::DuplicateVoice(VoiceId(1)))
        );
        assert_eq!(m.active_count(), 1);
        assert_eq!(m.finished_pending(), 1);
    }

    #[test]
    fn test_full_without_finished_voice() {
        let mut m = mixer(2);
        m.add_voice(voice(1, 4)).unwrap();
        m.add_voice(voice(2, 4)).unwrap();
        assert_eq!(
            m.add_voice(voice(3, 4)),
            Err(EngineError::PolyphonyExceeded { polyphony: 2 })
        );
        assert_eq!(m.active_count(), 2);
    }

    #[test]
    fn test_evicts_first_finished_voice() {
        let mut m = mixer(3);
        m.add_voice(voice(1, 4)).unwrap();
        m.add_voice(voice(2, 4)).unwrap();
        m.add_voice(voice(3, 4)).unwrap();
        m.try_execute(Command::voice(VoiceId(3), VoiceOp::Off)).unwrap();
        m.try_execute(Command::voice(VoiceId(2), VoiceOp::Off)).unwrap();

        m.add_voice(voice(4, 4)).unwrap();
        let ids: Vec<_> = m.voices().map(Voice::id).collect();
        assert_eq!(ids, vec![VoiceId(1), VoiceId(4), VoiceId(3)]);
    }

    #[test]
    fn test_set_polyphony_bounds() {
        let mut m = mixer(4);
        m.add_voice(voice(1, 4)).unwrap();
        m.add_voice(voice(2, 4)).unwrap();
        assert_eq!(m.set_polyphony(0), Err(EngineError::ZeroPolyphony));
        assert_eq!(
            m.set_polyphony(1),
            Err(EngineError::PolyphonyBelowActive {
                requested: 1,
                active: 2
            })
        );
        assert_eq!(m.polyphony(), 4);
        m.set_polyphony(2).unwrap();
        assert_eq!(m.polyphony(), 2);
        m.set_polyphony(16).unwrap();
        assert_eq!(m.polyphony(), 16);
    }

    #[test]
    fn test_render_clamps_to_capacity() {
        let mut m = mixer(4);
        assert_eq!(m.render(100), 8);
        assert_eq!(m.render(0), 0);
        assert_eq!(m.current_blocks(), 0);
    }

    #[test]
    fn test_unknown_voice_command_ignored() {
        let mut m = mixer(4);
        m.add_voice(voice(1, 4)).unwrap();
        m.try_execute(Command::voice(VoiceId(9), VoiceOp::Off)).unwrap();
        m.render(1);
        assert_eq!(m.active_count(), 1);
    }

    #[test]
    fn test_mixer_setters() {
        let mut m = mixer(4);
        m.try_execute(MixerOp::SetMixFx(false).into()).unwrap();
        assert_eq!(m.fx_mode(), FxMode::Replace);
        m.try_execute(MixerOp::SetReverbEnabled(false).into()).unwrap();
        assert!(!m.reverb_enabled());
        m.try_execute(
            MixerOp::SetReverbParams {
                set: ReverbParamSet::ROOMSIZE,
                params: ReverbParams {
                    roomsize: 0.7,
                    ..ReverbParams::default()
                },
            }
            .into(),
        )
        .unwrap();
        assert_eq!(m.reverb_params().roomsize, 0.7);
        assert_eq!(
            m.try_execute(MixerOp::SetSampleRate(-1.0).into()),
            Err(EngineError::InvalidSampleRate(-1.0))
        );
        m.try_execute(MixerOp::SetSampleRate(96000.0).into()).unwrap();
        assert_eq!(m.sample_rate(), 96000.0);
    }

    #[test]
    fn test_threads_start_and_stop() {
        let mut m = mixer(16);
        m.set_threads(2).unwrap();
        assert_eq!(m.threads(), 2);
        m.set_threads(0).unwrap();
        assert_eq!(m.threads(), 0);
    }
}

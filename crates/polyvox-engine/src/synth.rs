//! Synth front end.
//!
//! [`Synth::new`] splits the engine into a [`SynthHandle`] for the control
//! thread and a [`Renderer`] for the audio thread. They share nothing but
//! two rings: commands flow to the renderer, finished voices flow back.
//!
//! [`Synth::direct`] collapses both halves into one handle that applies
//! commands immediately, for offline rendering or single-threaded hosts.

use std::collections::{HashSet, VecDeque};

use polyvox_config::SynthSettings;
use polyvox_core::{BLOCK_SIZE, FxMode};
use polyvox_effects::{ChorusParamSet, ChorusParams, ReverbParamSet, ReverbParams};
use polyvox_voice::{Voice, VoiceId, VoiceOp};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::buffers::{CHORUS_SEND, REVERB_SEND};
use crate::command::{Command, MixerOp};
use crate::error::{EngineError, Result};
use crate::mixer::{Mixer, MixerConfig};
use crate::queue::{CommandConsumer, CommandProducer, CommandSink, DropWarner, command_queue};

/// A [`CommandSink`] that can also hand finished voices back to the control
/// side.
pub trait SynthSink: CommandSink {
    /// Pass every returned voice to `f`.
    fn drain_finished(&mut self, f: &mut dyn FnMut(Box<Voice>));

    /// Most voices that may be submitted and not yet collected.
    fn voice_capacity(&self) -> usize;
}

/// Constructors for the two synth modes.
#[derive(Debug)]
pub struct Synth;

impl Synth {
    /// Build a threadsafe synth: a control handle plus an audio-thread
    /// renderer.
    ///
    /// Settings are validated first.
    pub fn new(settings: &SynthSettings) -> Result<(SynthHandle, Renderer)> {
        settings.validate()?;
        let mixer = Mixer::new(MixerConfig::from(settings), None)?;

        let (producer, consumer) = command_queue(settings.queue_capacity());
        let return_capacity = settings.polyphony.saturating_mul(2).max(1);
        let (returns_tx, returns_rx) = RingBuffer::new(return_capacity);

        tracing::info!(
            queue = settings.queue_capacity(),
            returns = return_capacity,
            "threadsafe synth created"
        );

        let handle = SynthHandle::with_sink(
            QueuedSink {
                producer,
                returns: returns_rx,
                capacity: return_capacity,
            },
            settings.sample_rate,
        );
        let renderer = Renderer {
            consumer,
            mixer,
            returns: returns_tx,
            pending: VecDeque::with_capacity(return_capacity),
            output: OutputCursor::new(settings.gain),
            backpressure: DropWarner::new("finished-voice queue full, holding voices"),
        };
        Ok((handle, renderer))
    }

    /// Build a single-threaded synth whose commands take effect
    /// immediately.
    pub fn direct(settings: &SynthSettings) -> Result<SynthHandle<DirectSink>> {
        settings.validate()?;
        let mixer = Mixer::new(MixerConfig::from(settings), None)?;
        tracing::info!("direct synth created");
        Ok(SynthHandle::with_sink(
            DirectSink {
                mixer,
                output: OutputCursor::new(settings.gain),
            },
            settings.sample_rate,
        ))
    }
}

/// Control-thread side of a threadsafe synth.
pub struct QueuedSink {
    producer: CommandProducer,
    returns: Consumer<Box<Voice>>,
    capacity: usize,
}

impl QueuedSink {
    /// The command producer.
    pub fn producer(&self) -> &CommandProducer {
        &self.producer
    }
}

impl CommandSink for QueuedSink {
    fn push(&mut self, cmd: Command) -> Result<()> {
        self.producer.push(cmd)
    }

    fn flush(&mut self) {
        self.producer.flush();
    }
}

impl SynthSink for QueuedSink {
    fn drain_finished(&mut self, f: &mut dyn FnMut(Box<Voice>)) {
        while let Ok(voice) = self.returns.pop() {
            f(voice);
        }
    }

    fn voice_capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for QueuedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedSink")
            .field("producer", &self.producer)
            .field("returns", &self.returns.slots())
            .finish()
    }
}

/// A mixer driven directly by the control thread.
#[derive(Debug)]
pub struct DirectSink {
    mixer: Mixer,
    output: OutputCursor,
}

impl CommandSink for DirectSink {
    fn push(&mut self, cmd: Command) -> Result<()> {
        self.mixer.try_execute(cmd)
    }

    fn flush(&mut self) {}
}

impl SynthSink for DirectSink {
    fn drain_finished(&mut self, f: &mut dyn FnMut(Box<Voice>)) {
        self.mixer.take_finished(f);
    }

    fn voice_capacity(&self) -> usize {
        self.mixer.polyphony().saturating_mul(2)
    }
}

/// Control-thread handle.
///
/// Allocates voice ids, turns calls into commands, and tracks which voices
/// have been submitted but not yet handed back.
///
/// ```rust
/// use polyvox_config::SynthSettings;
/// use polyvox_engine::Synth;
/// use polyvox_voice::{Envelope, LoopMode, Sample, Voice, VoiceId};
///
/// let settings = SynthSettings { sample_rate: 48000.0, ..SynthSettings::default() };
/// let mut synth = Synth::direct(&settings).unwrap();
///
/// let sample = Sample::sine(48000.0, 120).into_shared();
/// let voice = Voice::new(VoiceId(0), sample, 48000.0)
///     .with_loop_mode(LoopMode::Looped)
///     .with_envelope(Envelope::one_shot(3));
/// let id = synth.start_voice(voice).unwrap();
///
/// let (mut left, mut right) = (vec![0.0; 256], vec![0.0; 256]);
/// synth.write_stereo(&mut left, &mut right);
///
/// let done = synth.collect_finished();
/// assert_eq!(done[0].id(), id);
/// assert_eq!(synth.active_voices().count(), 0);
/// ```
pub struct SynthHandle<S: SynthSink = QueuedSink> {
    sink: S,
    next_id: u32,
    active: HashSet<VoiceId>,
    sample_rate: f32,
}

impl<S: SynthSink> SynthHandle<S> {
    fn with_sink(sink: S, sample_rate: f32) -> Self {
        Self {
            sink,
            next_id: 1,
            active: HashSet::new(),
            sample_rate,
        }
    }

    fn allocate_id(&mut self) -> VoiceId {
        loop {
            let id = VoiceId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.active.contains(&id) {
                return id;
            }
        }
    }

    fn send(&mut self, cmd: impl Into<Command>) -> Result<()> {
        self.sink.push(cmd.into())
    }

    /// Output sample rate voices should be built for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Assign a fresh id to `voice` and submit it.
    ///
    /// The voice stays in [`active_voices`](Self::active_voices) until it
    /// comes back through [`collect_finished`](Self::collect_finished).
    /// Fails with [`EngineError::TooManyVoices`] once twice the polyphony
    /// (as configured at creation for a threadsafe synth) is outstanding,
    /// so the return path never has to grow.
    pub fn start_voice(&mut self, mut voice: Voice) -> Result<VoiceId> {
        let limit = self.sink.voice_capacity();
        if self.active.len() >= limit {
            return Err(EngineError::TooManyVoices { limit });
        }
        let id = self.allocate_id();
        voice.set_id(id);
        let result = self.sink.push(Command::add_voice(voice));
        // A voice the mixer rejects still comes back through the return path
        if !matches!(result, Err(EngineError::QueueFull)) {
            self.active.insert(id);
        }
        result.map(|()| id)
    }

    /// Move a voice into its release section.
    pub fn note_off(&mut self, id: VoiceId) -> Result<()> {
        self.update(id, VoiceOp::NoteOff)
    }

    /// Stop a voice at the next block.
    pub fn voice_off(&mut self, id: VoiceId) -> Result<()> {
        self.update(id, VoiceOp::Off)
    }

    /// Apply `op` to a running voice.
    pub fn update(&mut self, id: VoiceId, op: VoiceOp) -> Result<()> {
        self.sink.push(Command::voice(id, op))
    }

    /// Change the voice limit.
    pub fn set_polyphony(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(EngineError::ZeroPolyphony);
        }
        self.send(MixerOp::SetPolyphony(n))
    }

    /// Change the output sample rate.
    pub fn set_sample_rate(&mut self, rate: f32) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::InvalidSampleRate(rate));
        }
        self.send(MixerOp::SetSampleRate(rate))?;
        self.sample_rate = rate;
        Ok(())
    }

    /// Change the number of worker threads.
    pub fn set_threads(&mut self, n: usize) -> Result<()> {
        self.send(MixerOp::SetThreads(n))
    }

    /// Enable or disable the reverb send.
    pub fn set_reverb_enabled(&mut self, on: bool) -> Result<()> {
        self.send(MixerOp::SetReverbEnabled(on))
    }

    /// Enable or disable the chorus send.
    pub fn set_chorus_enabled(&mut self, on: bool) -> Result<()> {
        self.send(MixerOp::SetChorusEnabled(on))
    }

    /// Select mix (`true`) or replace (`false`) effect output.
    pub fn set_mix_fx(&mut self, mix: bool) -> Result<()> {
        self.send(MixerOp::SetMixFx(mix))
    }

    /// Update the reverb fields named in `set`.
    pub fn set_reverb_params(&mut self, set: ReverbParamSet, params: ReverbParams) -> Result<()> {
        self.send(MixerOp::SetReverbParams { set, params })
    }

    /// Update the chorus fields named in `set`.
    pub fn set_chorus_params(&mut self, set: ChorusParamSet, params: ChorusParams) -> Result<()> {
        self.send(MixerOp::SetChorusParams { set, params })
    }

    /// Clear both effects.
    pub fn reset_fx(&mut self) -> Result<()> {
        self.send(MixerOp::ResetFx)
    }

    /// Clear the reverb.
    pub fn reset_reverb(&mut self) -> Result<()> {
        self.send(MixerOp::ResetReverb)
    }

    /// Clear the chorus.
    pub fn reset_chorus(&mut self) -> Result<()> {
        self.send(MixerOp::ResetChorus)
    }

    /// Publish every command pushed since the last flush.
    pub fn flush(&mut self) {
        self.sink.flush();
    }

    /// Take back every voice the mixer has finished with.
    pub fn collect_finished(&mut self) -> Vec<Box<Voice>> {
        let mut out = Vec::new();
        let active = &mut self.active;
        self.sink.drain_finished(&mut |voice| {
            active.remove(&voice.id());
            out.push(voice);
        });
        out
    }

    /// Ids submitted and not yet returned.
    pub fn active_voices(&self) -> impl Iterator<Item = VoiceId> + '_ {
        self.active.iter().copied()
    }

    /// `true` if `id` was submitted and has not been returned.
    pub fn is_active(&self, id: VoiceId) -> bool {
        self.active.contains(&id)
    }

    /// The underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl SynthHandle<DirectSink> {
    /// Render up to `blocks` blocks. Output not yet read by
    /// [`write_stereo`](Self::write_stereo) is discarded.
    pub fn render(&mut self, blocks: usize) -> usize {
        let n = self.sink.mixer.render(blocks);
        self.sink.output.reset(n);
        n
    }

    /// Fill `left` and `right` with the next frames of output, rendering
    /// as needed.
    pub fn write_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let DirectSink { mixer, output } = &mut self.sink;
        output.write(mixer, left, right, |m, blocks| m.render(blocks));
    }

    /// Set the output gain.
    pub fn set_gain(&mut self, gain: f32) {
        self.sink.output.gain = gain;
    }

    /// The mixer.
    pub fn mixer(&self) -> &Mixer {
        &self.sink.mixer
    }
}

impl<S: SynthSink + std::fmt::Debug> std::fmt::Debug for SynthHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthHandle")
            .field("sink", &self.sink)
            .field("active", &self.active.len())
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

/// Audio-thread side of a threadsafe synth.
///
/// Owns the mixer. Never blocks and never drops a voice.
pub struct Renderer {
    consumer: CommandConsumer,
    mixer: Mixer,
    returns: Producer<Box<Voice>>,
    pending: VecDeque<Box<Voice>>,
    output: OutputCursor,
    backpressure: DropWarner,
}

impl Renderer {
    /// Dispatch queued commands, then render up to `blocks` blocks and send
    /// finished voices back. Returns the number of blocks rendered.
    ///
    /// Output not yet read by [`write_stereo`](Self::write_stereo) is
    /// discarded.
    pub fn render(&mut self, blocks: usize) -> usize {
        let n = render_and_return(
            &mut self.consumer,
            &mut self.mixer,
            &mut self.returns,
            &mut self.pending,
            &mut self.backpressure,
            blocks,
        );
        self.output.reset(n);
        n
    }

    /// Fill `left` and `right` with the next frames of output, rendering
    /// as needed. Any number of frames may be requested.
    pub fn write_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let Self {
            consumer,
            mixer,
            returns,
            pending,
            output,
            backpressure,
        } = self;
        output.write(mixer, left, right, |m, blocks| {
            render_and_return(consumer, m, returns, pending, backpressure, blocks)
        });
    }

    /// Fill an interleaved stereo buffer.
    ///
    /// `scratch` should hold `out.len()` samples; frames it cannot cover are
    /// written as silence.
    pub fn write_interleaved(&mut self, out: &mut [f32], scratch: &mut [f32]) {
        let frames = (out.len() / 2).min(scratch.len() / 2);
        let (left, right) = scratch[..frames * 2].split_at_mut(frames);
        self.write_stereo(left, right);
        let (written, rest) = out.split_at_mut(frames * 2);
        for (i, frame) in written.chunks_exact_mut(2).enumerate() {
            frame[0] = left[i];
            frame[1] = right[i];
        }
        rest.fill(0.0);
    }

    /// Set the output gain.
    pub fn set_gain(&mut self, gain: f32) {
        self.output.gain = gain;
    }

    /// Output gain.
    pub fn gain(&self) -> f32 {
        self.output.gain
    }

    /// Finished voices waiting for room in the return ring.
    pub fn pending_returns(&self) -> usize {
        self.pending.len()
    }

    /// The mixer.
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("mixer", &self.mixer)
            .field("pending", &self.pending.len())
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

fn render_and_return(
    consumer: &mut CommandConsumer,
    mixer: &mut Mixer,
    returns: &mut Producer<Box<Voice>>,
    pending: &mut VecDeque<Box<Voice>>,
    backpressure: &mut DropWarner,
    blocks: usize,
) -> usize {
    consumer.dispatch_all(mixer);
    let n = mixer.render(blocks);

    while let Some(voice) = pending.pop_front() {
        if let Err(PushError::Full(voice)) = returns.push(voice) {
            pending.push_front(voice);
            break;
        }
    }
    mixer.take_finished(|voice| {
        if !pending.is_empty() {
            pending.push_back(voice);
            return;
        }
        if let Err(PushError::Full(voice)) = returns.push(voice) {
            backpressure.record();
            pending.push_back(voice);
        }
    });
    n
}

/// Read position inside the last rendered span.
#[derive(Debug)]
struct OutputCursor {
    pos: usize,
    len: usize,
    gain: f32,
}

impl OutputCursor {
    fn new(gain: f32) -> Self {
        Self {
            pos: 0,
            len: 0,
            gain,
        }
    }

    fn reset(&mut self, blocks: usize) {
        self.pos = 0;
        self.len = blocks * BLOCK_SIZE;
    }

    fn write(
        &mut self,
        mixer: &mut Mixer,
        left: &mut [f32],
        right: &mut [f32],
        mut render: impl FnMut(&mut Mixer, usize) -> usize,
    ) {
        let frames = left.len().min(right.len());
        let mut written = 0;
        while written < frames {
            if self.pos >= self.len {
                let blocks = (frames - written).div_ceil(BLOCK_SIZE).max(1);
                let n = render(mixer, blocks);
                self.reset(n);
                if n == 0 {
                    left[written..frames].fill(0.0);
                    right[written..frames].fill(0.0);
                    return;
                }
            }
            let count = (self.len - self.pos).min(frames - written);
            mixdown(
                mixer,
                self.pos,
                self.gain,
                &mut left[written..written + count],
                &mut right[written..written + count],
            );
            self.pos += count;
            written += count;
        }
    }
}

/// Sum every dry group (plus effect returns in replace mode) starting at
/// frame `start`, scaled by `gain`.
fn mixdown(mixer: &Mixer, start: usize, gain: f32, left: &mut [f32], right: &mut [f32]) {
    let buffers = mixer.buffers();
    let end = start + left.len();

    left.fill(0.0);
    right.fill(0.0);
    for g in 0..buffers.groups() {
        add_scaled(left, &buffers.left(g)[start..end], gain);
        add_scaled(right, &buffers.right(g)[start..end], gain);
    }

    if mixer.fx_mode() == FxMode::Replace {
        for (send, on) in [
            (REVERB_SEND, mixer.reverb_enabled()),
            (CHORUS_SEND, mixer.chorus_enabled()),
        ] {
            if on {
                let (fx_left, fx_right) = buffers.fx_return(send);
                add_scaled(left, &fx_left[start..end], gain);
                add_scaled(right, &fx_right[start..end], gain);
            }
        }
    }
}

fn add_scaled(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s * gain;
    }
}

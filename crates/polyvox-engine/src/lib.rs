//! Polyvox Engine - real-time polyphonic voice mixer
//!
//! The engine renders many sample-playback voices block by block into stereo
//! dry groups and two mono effect sends, runs the send effects, and hands
//! finished voices back to the control thread.
//!
//! # Components
//!
//! - [`Command`] / [`MixerOp`] - changes sent to the render thread
//! - [`command_queue`] - lock-free SPSC ring with batched publishing
//! - [`BufferSet`] - dry group and effect send buffers
//! - [`Mixer`] - voice list, polyphony, effects, finished-voice reporting
//! - [`WorkerPool`] - optional render threads
//! - [`Synth`] - control handle plus audio-thread renderer
//!
//! # Threading
//!
//! ```text
//!  SynthHandle ──commands──► Renderer ──► Mixer ──► WorkerPool (optional)
//!       ▲                       │
//!       └───finished voices─────┘
//! ```
//!
//! The control thread never touches the mixer in threadsafe mode. Everything
//! the render thread does after construction is allocation-free except for
//! the configuration commands documented as not real-time safe.
//!
//! # Example
//!
//! ```rust
//! use polyvox_config::SynthSettings;
//! use polyvox_engine::Synth;
//! use polyvox_voice::{LoopMode, Sample, Voice, VoiceId};
//!
//! let settings = SynthSettings::default();
//! let (mut handle, mut renderer) = Synth::new(&settings).unwrap();
//!
//! let sample = Sample::sine(settings.sample_rate, 100).into_shared();
//! let voice = Voice::new(VoiceId(0), sample, settings.sample_rate)
//!     .with_key(60.0)
//!     .with_loop_mode(LoopMode::Looped);
//! let id = handle.start_voice(voice).unwrap();
//! handle.flush();
//!
//! let (mut left, mut right) = (vec![0.0f32; 512], vec![0.0f32; 512]);
//! renderer.write_stereo(&mut left, &mut right);
//!
//! handle.note_off(id).unwrap();
//! handle.flush();
//! ```

pub mod buffers;
pub mod command;
pub mod error;
pub mod mixer;
pub mod queue;
pub mod synth;
pub mod workers;

pub use buffers::{BufferSet, CHORUS_SEND, REVERB_SEND, SEND_COUNT, SendRoutes};
pub use command::{Command, MixerOp};
pub use error::{EngineError, Result};
pub use mixer::{FinishedCallback, Mixer, MixerConfig};
pub use queue::{CommandConsumer, CommandProducer, CommandSink, command_queue};
pub use synth::{DirectSink, QueuedSink, Renderer, Synth, SynthHandle, SynthSink};
pub use workers::{WorkerPool, WorkerStatus};

pub use polyvox_core::BLOCK_SIZE;

/// One worker thread is woken per this many active voices.
pub const VOICES_PER_THREAD: usize = 8;

/// Default buffer capacity in blocks.
pub const DEFAULT_MAX_BLOCKS: usize = 64;

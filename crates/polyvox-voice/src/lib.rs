//! Polyvox Voice - sample-playback voices for the polyvox mixer
//!
//! A [`Voice`] plays one [`Sample`] and renders it one block at a time into
//! a scratch buffer. The mixer then spreads that block over the voice's
//! [`OutputMappings`].
//!
//! ## Per-voice DSP
//!
//! - [`Envelope`] - seven-section block-rate envelope (volume and modulation)
//! - [`BlockLfo`] - triangle LFO with start delay (modulation and vibrato)
//! - [`ResonantFilter`] - biquad lowpass driven in absolute cents
//! - [`Interpolation`] - none, linear, or 4-point cubic sample reads
//!
//! ## Lifecycle
//!
//! Voices are built and configured on the control thread, moved to the
//! render thread inside a command, changed only via [`VoiceOp`], and handed
//! back once [`Voice::write`] reports [`BlockWrite::Ended`].
//!
//! ## Example
//!
//! ```rust
//! use polyvox_voice::{BlockWrite, LoopMode, Sample, Voice, VoiceId, VoiceOp};
//!
//! let sample = Sample::sine(44100.0, 100).into_shared();
//! let mut voice = Voice::new(VoiceId(7), sample, 44100.0)
//!     .with_key(60.0)
//!     .with_loop_mode(LoopMode::Looped);
//!
//! let mut block = [0.0f32; 64];
//! assert_eq!(voice.write(&mut block), BlockWrite::Full);
//!
//! voice.apply(VoiceOp::Off);
//! assert_eq!(voice.write(&mut block), BlockWrite::Ended(0));
//! ```

pub mod envelope;
pub mod filter;
pub mod interp;
pub mod lfo;
pub mod op;
pub mod routing;
pub mod sample;
pub mod voice;

pub use envelope::{EnvSection, EnvSegment, Envelope};
pub use filter::ResonantFilter;
pub use interp::Interpolation;
pub use lfo::BlockLfo;
pub use op::{EnvKind, VoiceOp};
pub use routing::{MAX_MAPPINGS, OutputMapping, OutputMappings};
pub use sample::Sample;
pub use voice::{BlockWrite, LoopMode, NOISE_FLOOR, Voice, VoiceId};

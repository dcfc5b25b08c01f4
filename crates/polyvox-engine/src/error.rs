//! Engine error types.

use polyvox_voice::VoiceId;
use thiserror::Error;

/// Errors reported by the mixer, the command queue, and the front end.
///
/// Only the queue-full and voice errors can arise on the render thread; they
/// are logged there and never propagated out of a render call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The command ring has no free slot; the command was dropped.
    #[error("command queue full")]
    QueueFull,

    /// Polyphony reached and no active voice has finished.
    #[error("polyphony of {polyphony} voices exceeded and no voice can be evicted")]
    PolyphonyExceeded {
        /// Configured polyphony.
        polyphony: usize,
    },

    /// Too many voices submitted and not yet collected.
    #[error("{limit} voices already in flight; collect finished voices first")]
    TooManyVoices {
        /// Most voices that may be outstanding at once.
        limit: usize,
    },

    /// A voice with this id is already active.
    #[error("{0} is already active")]
    DuplicateVoice(VoiceId),

    /// Polyphony cannot drop below the number of active voices.
    #[error("cannot set polyphony to {requested}: {active} voices active")]
    PolyphonyBelowActive {
        /// Requested polyphony.
        requested: usize,
        /// Voices currently active.
        active: usize,
    },

    /// Polyphony must be at least one.
    #[error("polyphony must be at least 1")]
    ZeroPolyphony,

    /// Sample rate not positive and finite.
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(f32),

    /// A render worker thread could not be started.
    #[error("failed to spawn render worker: {0}")]
    ThreadSpawn(String),

    /// Settings failed validation.
    #[error(transparent)]
    Settings(#[from] polyvox_config::ValidationError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

//! Audio I/O for polyvox.
//!
//! This crate provides:
//!
//! - **WAV file I/O**: [`read_wav`] loads sample data for voices,
//!   [`write_wav_stereo`] saves offline renders
//! - **Real-time playback**: [`OutputStream`] drives a render callback from
//!   the sound card
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use polyvox_io::{read_wav, write_wav_stereo, WavSpec};
//!
//! let (mono, spec) = read_wav("piano_c4.wav")?;
//! // ... build a Sample from `mono`, render ...
//! write_wav_stereo("out.wav", &left, &right, WavSpec { channels: 2, ..spec })?;
//! ```

mod stream;
mod wav;

pub use stream::{AudioDevice, OutputStream, default_output_device, list_devices};
pub use wav::{WavInfo, WavSpec, read_wav, read_wav_info, write_wav_stereo};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

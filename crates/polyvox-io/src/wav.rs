//! WAV file reading and writing.

use crate::Result;
use hound::{SampleFormat, WavReader, WavWriter};
use std::path::Path;

/// WAV file specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Bit depth per sample (16, 24, or 32; 32 is written as float).
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
        }
    }
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// WAV metadata read without loading sample data.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Format of the file.
    pub spec: WavSpec,
    /// Sample frames (samples per channel).
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

/// Read WAV metadata only.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());
    let num_frames = u64::from(reader.len()) / u64::from(spec.channels.max(1));
    Ok(WavInfo {
        spec,
        num_frames,
        duration_secs: num_frames as f64 / f64::from(spec.sample_rate),
    })
}

/// Read a WAV file as mono `f32` samples.
///
/// Multi-channel files are mixed down by averaging channels. Integer
/// formats are scaled to -1.0..1.0.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, WavSpec)> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());
    let channels = usize::from(spec.channels.max(1));

    let samples: Vec<f32> = match reader.spec().sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    tracing::debug!(
        path = %path.display(),
        frames = mono.len(),
        sample_rate = spec.sample_rate,
        channels,
        "loaded wav"
    );
    Ok((mono, spec))
}

/// Write separate left and right channels to a stereo WAV file.
///
/// `spec.channels` is ignored; the file is always stereo. If the channels
/// differ in length the shorter one sets the frame count.
pub fn write_wav_stereo<P: AsRef<Path>>(
    path: P,
    left: &[f32],
    right: &[f32],
    spec: WavSpec,
) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        ..spec
    };
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;

    if spec.bits_per_sample == 32 {
        for (&l, &r) in left.iter().zip(right) {
            writer.write_sample(l)?;
            writer.write_sample(r)?;
        }
    } else {
        let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
        let quantize = |x: f32| (x * max_val).clamp(-max_val, max_val - 1.0) as i32;
        for (&l, &r) in left.iter().zip(right) {
            writer.write_sample(quantize(l))?;
            writer.write_sample(quantize(r))?;
        }
    }

    writer.finalize()?;
    Ok(())
}

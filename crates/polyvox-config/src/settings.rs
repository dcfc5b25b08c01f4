//! Synth settings model.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::validation::{Checker, ValidationResult};

/// Frames per processing block; the command queue is sized in multiples of it.
const BLOCK_FRAMES: usize = 64;

/// Top-level synth settings.
///
/// Every field has a default, so a settings file only needs the values it
/// changes:
///
/// ```rust
/// use polyvox_config::SynthSettings;
///
/// let settings = SynthSettings::from_toml("polyphony = 64\n[reverb]\nroomsize = 0.6\n").unwrap();
/// assert_eq!(settings.polyphony, 64);
/// assert_eq!(settings.reverb.roomsize, 0.6);
/// assert_eq!(settings.sample_rate, 44100.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    /// Output sample rate in Hz (8000–96000).
    pub sample_rate: f32,
    /// Maximum simultaneous voices (1–65535).
    pub polyphony: usize,
    /// Master output gain (0–10).
    pub gain: f32,
    /// Number of stereo dry output groups (1–128).
    pub audio_groups: usize,
    /// CPU cores to render on; `cpu_cores - 1` worker threads are started
    /// (1–256).
    pub cpu_cores: usize,
    /// Use worker threads when enough voices are active.
    pub parallel_render: bool,
    /// Most blocks a single render call can produce (1–1024).
    pub max_blocks: usize,
    /// Command ring capacity. Defaults to `polyphony * 64`.
    pub queue_capacity: Option<usize>,
    /// Split control and render threads through a command queue. When
    /// `false`, commands are applied immediately on the calling thread.
    pub threadsafe: bool,
    /// Mix effect output into the main dry buffers. When `false`, effect
    /// output replaces the send buffers instead.
    pub mix_fx: bool,
    /// Reverb settings.
    pub reverb: ReverbSettings,
    /// Chorus settings.
    pub chorus: ChorusSettings,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            polyphony: 256,
            gain: 0.2,
            audio_groups: 1,
            cpu_cores: 1,
            parallel_render: true,
            max_blocks: 64,
            queue_capacity: None,
            threadsafe: true,
            mix_fx: true,
            reverb: ReverbSettings::default(),
            chorus: ChorusSettings::default(),
        }
    }
}

/// Reverb section of [`SynthSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbSettings {
    /// Enable the reverb send.
    pub active: bool,
    /// Room size (0–1).
    pub roomsize: f32,
    /// Damping (0–1).
    pub damping: f32,
    /// Stereo width (0–100).
    pub width: f32,
    /// Output level (0–1).
    pub level: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            active: true,
            roomsize: 0.2,
            damping: 0.0,
            width: 0.5,
            level: 0.9,
        }
    }
}

/// Chorus modulation shape as written in settings files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChorusShape {
    /// Sine sweep.
    #[default]
    Sine,
    /// Triangle sweep.
    Triangle,
}

/// Chorus section of [`SynthSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusSettings {
    /// Enable the chorus send.
    pub active: bool,
    /// Number of chorus voices (0–99).
    pub nr: usize,
    /// Output level (0–10).
    pub level: f32,
    /// Modulation speed in Hz (0.29–5).
    pub speed: f32,
    /// Modulation depth in ms (0–256).
    pub depth_ms: f32,
    /// Modulation shape.
    pub waveform: ChorusShape,
}

impl Default for ChorusSettings {
    fn default() -> Self {
        Self {
            active: true,
            nr: 3,
            level: 2.0,
            speed: 0.3,
            depth_ms: 8.0,
            waveform: ChorusShape::Sine,
        }
    }
}

impl SynthSettings {
    /// Load settings from a TOML file.
    ///
    /// The file is parsed but not validated; call
    /// [`validate`](Self::validate) before use.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save settings to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field against its documented range.
    ///
    /// All problems are reported together.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut c = Checker::default();
        c.range("sample_rate", f64::from(self.sample_rate), 8000.0, 96000.0);
        c.range("polyphony", self.polyphony as f64, 1.0, 65535.0);
        c.range("gain", f64::from(self.gain), 0.0, 10.0);
        c.range("audio_groups", self.audio_groups as f64, 1.0, 128.0);
        c.range("cpu_cores", self.cpu_cores as f64, 1.0, 256.0);
        c.range("max_blocks", self.max_blocks as f64, 1.0, 1024.0);
        if let Some(cap) = self.queue_capacity
            && cap == 0
        {
            c.fail("queue_capacity", "must be at least 1");
        }

        c.range("reverb.roomsize", f64::from(self.reverb.roomsize), 0.0, 1.0);
        c.range("reverb.damping", f64::from(self.reverb.damping), 0.0, 1.0);
        c.range("reverb.width", f64::from(self.reverb.width), 0.0, 100.0);
        c.range("reverb.level", f64::from(self.reverb.level), 0.0, 1.0);

        c.range("chorus.nr", self.chorus.nr as f64, 0.0, 99.0);
        c.range("chorus.level", f64::from(self.chorus.level), 0.0, 10.0);
        c.range("chorus.speed", f64::from(self.chorus.speed), 0.29, 5.0);
        c.range("chorus.depth_ms", f64::from(self.chorus.depth_ms), 0.0, 256.0);
        c.finish()
    }

    /// Command ring capacity: the configured value or `polyphony * 64`.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.polyphony.saturating_mul(BLOCK_FRAMES))
            .max(1)
    }

    /// Number of extra render threads implied by `cpu_cores`.
    ///
    /// Zero when parallel rendering is disabled.
    pub fn worker_threads(&self) -> usize {
        if self.parallel_render {
            self.cpu_cores.saturating_sub(1)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationError;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SynthSettings::default().validate().is_ok());
    }

    #[test]
    fn test_queue_capacity_default() {
        let s = SynthSettings::default();
        assert_eq!(s.queue_capacity(), 256 * 64);
        let s = SynthSettings {
            queue_capacity: Some(100),
            ..SynthSettings::default()
        };
        assert_eq!(s.queue_capacity(), 100);
    }

    #[test]
    fn test_worker_threads() {
        let mut s = SynthSettings {
            cpu_cores: 4,
            ..SynthSettings::default()
        };
        assert_eq!(s.worker_threads(), 3);
        s.parallel_render = false;
        assert_eq!(s.worker_threads(), 0);
    }

    #[test]
    fn test_all_errors_reported() {
        let mut s = SynthSettings::default();
        s.sample_rate = 1000.0;
        s.reverb.level = 2.0;
        s.chorus.nr = 200;
        match s.validate() {
            Err(ValidationError::Multiple(errs)) => {
                assert_eq!(errs.len(), 3);
                let names: Vec<String> = errs
                    .iter()
                    .filter_map(|e| match e {
                        ValidationError::OutOfRange { name, .. } => Some(name.clone()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(names, vec!["sample_rate", "reverb.level", "chorus.nr"]);
            }
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let s = SynthSettings {
            queue_capacity: Some(0),
            ..SynthSettings::default()
        };
        assert!(matches!(
            s.validate(),
            Err(ValidationError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_waveform_lowercase() {
        let s = SynthSettings::from_toml("[chorus]\nwaveform = \"triangle\"\n").unwrap();
        assert_eq!(s.chorus.waveform, ChorusShape::Triangle);
        assert!(SynthSettings::from_toml("[chorus]\nwaveform = \"square\"\n").is_err());
    }
}

//! Real-time playback via cpal.

use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Initial per-channel scratch size; grown only if the host asks for more.
const SCRATCH_FRAMES: usize = 8192;

/// Extract device name via `description()` (cpal 0.17+).
fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Output device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Position in the host's output device list.
    pub index: usize,
    /// Human-readable device name.
    pub name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default channel count.
    pub channels: u16,
    /// Whether this is the host's default output.
    pub is_default: bool,
}

/// List all output devices of the default host.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| device_name(&d).ok());

    let outputs = host
        .output_devices()
        .map_err(|e| Error::Stream(e.to_string()))?;

    let mut devices = Vec::new();
    for (index, device) in outputs.enumerate() {
        let Ok(name) = device_name(&device) else {
            continue;
        };
        let config = device.default_output_config().ok();
        devices.push(AudioDevice {
            index,
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            default_sample_rate: config.as_ref().map_or(48000, |c| c.sample_rate()),
            channels: config.as_ref().map_or(2, |c| c.channels()),
        });
    }
    Ok(devices)
}

/// The default output device, if any.
pub fn default_output_device() -> Result<Option<AudioDevice>> {
    Ok(list_devices()?.into_iter().find(|d| d.is_default))
}

/// Real-time output stream.
///
/// Call [`play_stereo`](Self::play_stereo) with a render callback; it blocks
/// until [`stop`](Self::stop) is called or the flag returned by
/// [`running_flag`](Self::running_flag) is cleared, from any thread.
pub struct OutputStream {
    device: Device,
    name: String,
    sample_rate: u32,
    channels: u16,
    running: Arc<AtomicBool>,
    stream: Option<Stream>,
}

impl OutputStream {
    /// Open the default output device, or the device matching `name_or_index`
    /// (index, exact name, or case-insensitive substring).
    pub fn new(name_or_index: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match name_or_index {
            Some(search) => {
                let devices: Vec<Device> = host
                    .output_devices()
                    .map_err(|e| Error::Stream(e.to_string()))?
                    .collect();
                find_device(&devices, search)?
            }
            None => host.default_output_device().ok_or(Error::NoDevice)?,
        };

        let config = device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        let name = device_name(&device).unwrap_or_else(|_| "<unknown>".to_string());

        Ok(Self {
            sample_rate: config.sample_rate(),
            channels: config.channels(),
            device,
            name,
            running: Arc::new(AtomicBool::new(false)),
            stream: None,
        })
    }

    /// Device name.
    pub fn device_name(&self) -> &str {
        &self.name
    }

    /// Device sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Shared running flag; clearing it stops playback.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Play stereo audio produced by `render` until stopped.
    ///
    /// `render(left, right)` must fill both slices. Blocks the calling
    /// thread.
    pub fn play_stereo<F>(&mut self, mut render: F) -> Result<()>
    where
        F: FnMut(&mut [f32], &mut [f32]) + Send + 'static,
    {
        let config = self
            .device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        let channels = usize::from(config.channels());

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let mut left = vec![0.0f32; SCRATCH_FRAMES];
        let mut right = vec![0.0f32; SCRATCH_FRAMES];

        let stream = self
            .device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    let frames = data.len() / channels;
                    if frames > left.len() {
                        left.resize(frames, 0.0);
                        right.resize(frames, 0.0);
                    }
                    render(&mut left[..frames], &mut right[..frames]);
                    interleave_into(&left[..frames], &right[..frames], data, channels);
                },
                |err| tracing::error!(error = %err, "output stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            device = %self.name,
            sample_rate = self.sample_rate,
            channels,
            "output stream started"
        );
        self.stream = Some(stream);

        while self.running.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        self.stream = None;
        tracing::info!(device = %self.name, "output stream stopped");
        Ok(())
    }

    /// Stop playback.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// `true` while playing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("device", &self.name)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Interleave left and right into a device buffer of `channels` channels.
///
/// Mono devices get the average of both sides; channels past the second
/// are silenced.
fn interleave_into(left: &[f32], right: &[f32], output: &mut [f32], channels: usize) {
    match channels {
        0 => {}
        1 => {
            for ((out, l), r) in output.iter_mut().zip(left).zip(right) {
                *out = (l + r) * 0.5;
            }
        }
        _ => {
            for ((frame, &l), &r) in output.chunks_exact_mut(channels).zip(left).zip(right) {
                frame[0] = l;
                frame[1] = r;
                frame[2..].fill(0.0);
            }
        }
    }
}

/// Find a device by index, exact name, or case-insensitive substring.
fn find_device(devices: &[Device], name_or_index: &str) -> Result<Device> {
    if let Ok(index) = name_or_index.parse::<usize>() {
        return devices.get(index).cloned().ok_or_else(|| {
            Error::DeviceNotFound(format!(
                "output device index {index} (only {} devices available)",
                devices.len()
            ))
        });
    }

    for device in devices {
        if device_name(device).is_ok_and(|n| n == name_or_index) {
            return Ok(device.clone());
        }
    }

    let search = name_or_index.to_lowercase();
    let mut matches: Vec<(Device, String)> = devices
        .iter()
        .filter_map(|d| {
            device_name(d)
                .ok()
                .filter(|name| name.to_lowercase().contains(&search))
                .map(|name| (d.clone(), name))
        })
        .collect();

    match matches.len() {
        0 => Err(Error::DeviceNotFound(format!(
            "no output device matching '{name_or_index}'"
        ))),
        1 => Ok(matches.remove(0).0),
        _ => {
            let names: Vec<&str> = matches.iter().map(|(_, n)| n.as_str()).collect();
            tracing::warn!(
                search = name_or_index,
                ?names,
                "several output devices match, using the first"
            );
            Ok(matches.remove(0).0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Device availability depends on the system; only check it returns
        let _ = list_devices();
        let _ = default_output_device();
    }

    #[test]
    fn test_interleave_stereo() {
        let mut out = [9.0; 6];
        interleave_into(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0], &mut out, 2);
        assert_eq!(out, [1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn test_interleave_mono_and_wide() {
        let mut mono = [0.0; 2];
        interleave_into(&[1.0, 0.0], &[0.0, 1.0], &mut mono, 1);
        assert_eq!(mono, [0.5, 0.5]);

        let mut quad = [9.0; 8];
        interleave_into(&[1.0, 2.0], &[3.0, 4.0], &mut quad, 4);
        assert_eq!(quad, [1.0, 3.0, 0.0, 0.0, 2.0, 4.0, 0.0, 0.0]);
    }
}

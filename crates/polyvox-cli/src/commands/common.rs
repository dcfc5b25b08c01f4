//! Shared CLI helpers: settings loading, note scores, and voice building.

use clap::Args;
use polyvox_config::{SynthSettings, paths};
use polyvox_engine::{BLOCK_SIZE, SynthHandle, SynthSink};
use polyvox_voice::{Envelope, LoopMode, OutputMappings, Sample, Voice, VoiceId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options shared by every command that plays a score.
#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    /// Notes as "key:start:duration" (seconds), comma separated
    #[arg(short, long, default_value = "60:0:1,64:0.25:1,67:0.5:1")]
    pub notes: String,

    /// WAV file to use as the sample (default: synthesized sine)
    #[arg(short, long)]
    pub sample: Option<PathBuf>,

    /// MIDI key at which the WAV sample plays at its recorded pitch
    #[arg(long, default_value = "60")]
    pub root_key: f32,

    /// Loop the whole WAV sample while a note is held
    #[arg(long)]
    pub loop_sample: bool,

    /// Attack time in seconds
    #[arg(long, default_value = "0.01")]
    pub attack: f32,

    /// Decay time in seconds
    #[arg(long, default_value = "0.1")]
    pub decay: f32,

    /// Sustain level (0-1)
    #[arg(long, default_value = "0.8")]
    pub sustain: f32,

    /// Release time in seconds
    #[arg(long, default_value = "0.3")]
    pub release: f32,

    /// Reverb send level (0-1)
    #[arg(long, default_value = "0.2")]
    pub reverb_send: f32,

    /// Chorus send level (0-1)
    #[arg(long, default_value = "0.0")]
    pub chorus_send: f32,

    /// Settings file (default: user settings if present, else built-in)
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

/// One note of a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// MIDI key (fractional allowed).
    pub key: f32,
    /// Start time in seconds.
    pub start: f32,
    /// Held time in seconds before release.
    pub duration: f32,
}

/// Parse a `key:start:duration` list, comma separated.
pub fn parse_notes(s: &str) -> anyhow::Result<Vec<Note>> {
    let mut notes = Vec::new();
    for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let parts: Vec<&str> = item.split(':').collect();
        if parts.len() != 3 {
            anyhow::bail!("Invalid note '{}' (expected key:start:duration)", item);
        }
        let parse = |field: &str, what: &str| -> anyhow::Result<f32> {
            field
                .trim()
                .parse::<f32>()
                .map_err(|_| anyhow::anyhow!("Invalid {} '{}' in note '{}'", what, field, item))
        };
        let note = Note {
            key: parse(parts[0], "key")?,
            start: parse(parts[1], "start")?,
            duration: parse(parts[2], "duration")?,
        };
        if !(0.0..=127.0).contains(&note.key) {
            anyhow::bail!("Key {} out of range 0-127 in note '{}'", note.key, item);
        }
        if note.start < 0.0 || note.duration < 0.0 {
            anyhow::bail!("Negative time in note '{}'", item);
        }
        notes.push(note);
    }
    if notes.is_empty() {
        anyhow::bail!("Score has no notes");
    }
    Ok(notes)
}

/// Load settings from `path`, the user settings file, or defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<SynthSettings> {
    let settings = match path {
        Some(p) => SynthSettings::load(p)?,
        None => {
            let user = paths::default_settings_path();
            if user.exists() {
                tracing::info!(path = %user.display(), "using user settings");
                SynthSettings::load(&user)?
            } else {
                SynthSettings::default()
            }
        }
    };
    settings.validate()?;
    Ok(settings)
}

/// Seconds to whole blocks at `sample_rate`, rounded.
pub fn secs_to_blocks(secs: f32, sample_rate: f32) -> u64 {
    (secs.max(0.0) * sample_rate / BLOCK_SIZE as f32).round() as u64
}

/// Builds voices for notes from one sample and one envelope shape.
#[derive(Debug, Clone)]
pub struct VoiceTemplate {
    sample: Arc<Sample>,
    loop_mode: LoopMode,
    envelope: Envelope,
    mappings: OutputMappings,
    sample_rate: f32,
}

impl VoiceTemplate {
    /// Template for `args` rendering at `settings.sample_rate`.
    pub fn new(args: &ScoreArgs, settings: &SynthSettings) -> anyhow::Result<Self> {
        let sr = settings.sample_rate;
        let (sample, loop_mode) = match &args.sample {
            Some(path) => {
                let (data, spec) = polyvox_io::read_wav(path)?;
                if data.is_empty() {
                    anyhow::bail!("Sample file {} is empty", path.display());
                }
                let len = data.len();
                let name = path
                    .file_stem()
                    .map_or_else(|| "sample".to_string(), |s| s.to_string_lossy().into_owned());
                let mut sample = Sample::new(name, data, spec.sample_rate as f32, args.root_key);
                let mode = if args.loop_sample {
                    sample = sample.with_loop(0, len);
                    LoopMode::Looped
                } else {
                    LoopMode::Unlooped
                };
                (sample, mode)
            }
            None => (Sample::sine(sr, 100), LoopMode::Looped),
        };

        let blocks = |secs: f32| secs_to_blocks(secs, sr).min(u64::from(u32::MAX)) as u32;
        let envelope = Envelope::adsr(
            blocks(args.attack),
            blocks(args.decay),
            args.sustain,
            blocks(args.release).max(1),
        );

        Ok(Self {
            sample: sample.into_shared(),
            loop_mode,
            envelope,
            mappings: OutputMappings::stereo(
                0,
                settings.audio_groups,
                args.reverb_send,
                args.chorus_send,
            ),
            sample_rate: sr,
        })
    }

    /// A fresh voice for `key`. The handle assigns the real id.
    pub fn voice(&self, key: f32) -> Voice {
        Voice::new(VoiceId(0), Arc::clone(&self.sample), self.sample_rate)
            .with_key(key)
            .with_loop_mode(self.loop_mode)
            .with_envelope(self.envelope.clone())
            .with_mappings(self.mappings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Off(usize),
    On(usize),
}

/// Fires note-on and note-off commands at block boundaries.
#[derive(Debug)]
pub struct ScorePlayer {
    notes: Vec<Note>,
    events: Vec<(u64, EventKind)>,
    next: usize,
    ids: Vec<Option<VoiceId>>,
    template: VoiceTemplate,
}

impl ScorePlayer {
    /// Schedule `notes` at `sample_rate`.
    pub fn new(notes: Vec<Note>, template: VoiceTemplate, sample_rate: f32) -> Self {
        let mut events = Vec::with_capacity(notes.len() * 2);
        for (i, note) in notes.iter().enumerate() {
            let on = secs_to_blocks(note.start, sample_rate);
            let off = on + secs_to_blocks(note.duration, sample_rate).max(1);
            events.push((on, EventKind::On(i)));
            events.push((off, EventKind::Off(i)));
        }
        // Offs sort before ons in the same block
        events.sort_unstable();
        Self {
            ids: vec![None; notes.len()],
            notes,
            events,
            next: 0,
            template,
        }
    }

    /// Block of the last scheduled event.
    pub fn last_block(&self) -> u64 {
        self.events.last().map_or(0, |(b, _)| *b)
    }

    /// `true` once every event has fired.
    pub fn is_done(&self) -> bool {
        self.next >= self.events.len()
    }

    /// Fire every event due at or before `block`.
    ///
    /// Rejected commands are logged and skipped.
    pub fn advance<S: SynthSink>(&mut self, block: u64, handle: &mut SynthHandle<S>) {
        while let Some(&(at, kind)) = self.events.get(self.next) {
            if at > block {
                break;
            }
            self.next += 1;
            match kind {
                EventKind::On(i) => {
                    let key = self.notes[i].key;
                    match handle.start_voice(self.template.voice(key)) {
                        Ok(id) => {
                            tracing::debug!(%id, key, block, "note on");
                            self.ids[i] = Some(id);
                        }
                        Err(e) => tracing::warn!(key, error = %e, "note dropped"),
                    }
                }
                EventKind::Off(i) => {
                    let Some(id) = self.ids[i].take() else {
                        continue;
                    };
                    if let Err(e) = handle.note_off(id) {
                        tracing::warn!(%id, error = %e, "note off dropped");
                    }
                }
            }
        }
    }
}

//! Offline rendering of a note score to a WAV file.

use super::common::{ScoreArgs, ScorePlayer, VoiceTemplate, load_settings, parse_notes, secs_to_blocks};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use polyvox_engine::{BLOCK_SIZE, DirectSink, Renderer, Synth, SynthHandle};
use polyvox_io::{WavSpec, write_wav_stereo};
use std::path::PathBuf;

/// Direct or queued front end, chosen by `threadsafe` in the settings.
enum Engine {
    Direct(SynthHandle<DirectSink>),
    Queued(SynthHandle, Renderer),
}

impl Engine {
    fn active_voices(&self) -> usize {
        match self {
            Engine::Direct(handle) => handle.active_voices().count(),
            Engine::Queued(handle, _) => handle.active_voices().count(),
        }
    }
}

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    #[command(flatten)]
    score: ScoreArgs,

    /// Extra seconds rendered after the last note-off
    #[arg(long, default_value = "1.0")]
    tail: f32,

    /// Output sample rate in Hz (overrides settings)
    #[arg(long)]
    sample_rate: Option<f32>,

    /// Output bit depth (16, 24, or 32 for float)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    if !matches!(args.bit_depth, 16 | 24 | 32) {
        anyhow::bail!("Unsupported bit depth {} (use 16, 24, or 32)", args.bit_depth);
    }

    let mut settings = load_settings(args.score.settings.as_deref())?;
    if let Some(sr) = args.sample_rate {
        settings.sample_rate = sr;
        settings.validate()?;
    }
    let sr = settings.sample_rate;

    let notes = parse_notes(&args.score.notes)?;
    let template = VoiceTemplate::new(&args.score, &settings)?;
    let mut player = ScorePlayer::new(notes, template, sr);
    let mut engine = if settings.threadsafe {
        let (handle, renderer) = Synth::new(&settings)?;
        Engine::Queued(handle, renderer)
    } else {
        Engine::Direct(Synth::direct(&settings)?)
    };

    let total_blocks = player.last_block()
        + secs_to_blocks(args.score.release, sr)
        + secs_to_blocks(args.tail, sr)
        + 1;
    let total_frames = total_blocks as usize * BLOCK_SIZE;

    println!(
        "Rendering {} to {}",
        args.score.notes,
        args.output.display()
    );
    println!(
        "  {} Hz, {} blocks ({:.2}s), polyphony {}",
        sr,
        total_blocks,
        total_frames as f32 / sr,
        settings.polyphony
    );

    let mut left = vec![0.0f32; total_frames];
    let mut right = vec![0.0f32; total_frames];

    let pb = ProgressBar::new(total_blocks);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta})")?
            .progress_chars("##-"),
    );

    let mut finished = 0usize;
    for (block, (l, r)) in left
        .chunks_mut(BLOCK_SIZE)
        .zip(right.chunks_mut(BLOCK_SIZE))
        .enumerate()
    {
        finished += match &mut engine {
            Engine::Direct(handle) => {
                player.advance(block as u64, handle);
                handle.write_stereo(l, r);
                handle.collect_finished().len()
            }
            Engine::Queued(handle, renderer) => {
                player.advance(block as u64, handle);
                handle.flush();
                renderer.write_stereo(l, r);
                handle.collect_finished().len()
            }
        };
        if block % 256 == 0 {
            pb.set_position(block as u64);
        }
    }
    pb.finish_and_clear();

    let spec = WavSpec {
        channels: 2,
        sample_rate: sr.round() as u32,
        bits_per_sample: args.bit_depth,
    };
    write_wav_stereo(&args.output, &left, &right, spec)?;

    let peak = left
        .iter()
        .chain(&right)
        .fold(0.0f32, |m, s| m.max(s.abs()));
    println!(
        "Done: {} voices finished, peak {:.3}, {} still sounding",
        finished,
        peak,
        engine.active_voices()
    );
    Ok(())
}

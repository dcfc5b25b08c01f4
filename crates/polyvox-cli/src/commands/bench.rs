//! Render timing across worker thread counts.

use clap::Args;
use polyvox_config::SynthSettings;
use polyvox_engine::{BLOCK_SIZE, Synth, VOICES_PER_THREAD};
use polyvox_voice::{LoopMode, OutputMappings, Sample, Voice, VoiceId};
use std::time::Instant;

#[derive(Args)]
pub struct BenchArgs {
    /// Number of simultaneous voices
    #[arg(short, long, default_value = "64")]
    voices: usize,

    /// Blocks to render per configuration
    #[arg(short, long, default_value = "2000")]
    blocks: usize,

    /// Highest worker thread count to try
    #[arg(short, long, default_value = "3")]
    threads: usize,

    /// Sample rate in Hz
    #[arg(long, default_value = "44100")]
    sample_rate: f32,
}

pub fn run(args: BenchArgs) -> anyhow::Result<()> {
    if args.voices == 0 || args.blocks == 0 {
        anyhow::bail!("--voices and --blocks must be at least 1");
    }

    println!(
        "Rendering {} voices for {} blocks ({:.1}s of audio)",
        args.voices,
        args.blocks,
        (args.blocks * BLOCK_SIZE) as f32 / args.sample_rate
    );
    if args.threads > 0 && args.voices < VOICES_PER_THREAD * 2 {
        println!(
            "  note: workers wake once per {} voices; {} voices use at most {} worker(s)",
            VOICES_PER_THREAD,
            args.voices,
            args.voices / VOICES_PER_THREAD
        );
    }
    println!();
    println!("{:>8}  {:>10}  {:>10}  {:>12}", "workers", "time (ms)", "x realtime", "max diff");

    let audio_secs = (args.blocks * BLOCK_SIZE) as f64 / f64::from(args.sample_rate);
    let mut reference: Option<(Vec<f32>, Vec<f32>)> = None;

    for workers in 0..=args.threads {
        let (left, right, elapsed) = render_once(&args, workers)?;
        let secs = elapsed.as_secs_f64();

        let diff = reference.as_ref().map_or(0.0, |(rl, rr)| {
            rl.iter()
                .zip(&left)
                .chain(rr.iter().zip(&right))
                .fold(0.0f32, |m, (a, b)| m.max((a - b).abs()))
        });
        println!(
            "{:>8}  {:>10.2}  {:>10.1}  {:>12.3e}",
            workers,
            secs * 1000.0,
            audio_secs / secs.max(f64::EPSILON),
            diff
        );
        if reference.is_none() {
            reference = Some((left, right));
        }
    }
    Ok(())
}

fn render_once(
    args: &BenchArgs,
    workers: usize,
) -> anyhow::Result<(Vec<f32>, Vec<f32>, std::time::Duration)> {
    let settings = SynthSettings {
        sample_rate: args.sample_rate,
        polyphony: args.voices,
        cpu_cores: workers + 1,
        parallel_render: true,
        gain: 1.0 / args.voices as f32,
        ..SynthSettings::default()
    };
    let mut synth = Synth::direct(&settings)?;

    let sample = Sample::sine(args.sample_rate, 100).into_shared();
    for i in 0..args.voices {
        let voice = Voice::new(VoiceId(0), std::sync::Arc::clone(&sample), args.sample_rate)
            .with_key(36.0 + (i % 48) as f32)
            .with_loop_mode(LoopMode::Looped)
            .with_mappings(OutputMappings::stereo(0, 1, 0.1, 0.1));
        synth.start_voice(voice)?;
    }

    let frames = args.blocks * BLOCK_SIZE;
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];

    let start = Instant::now();
    synth.write_stereo(&mut left, &mut right);
    let elapsed = start.elapsed();

    tracing::debug!(workers, ms = elapsed.as_millis() as u64, "bench run");
    Ok((left, right, elapsed))
}

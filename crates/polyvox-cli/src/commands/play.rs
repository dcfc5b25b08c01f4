//! Real-time playback of a note score.

use super::common::{ScoreArgs, ScorePlayer, VoiceTemplate, load_settings, parse_notes, secs_to_blocks};
use clap::Args;
use polyvox_engine::{BLOCK_SIZE, Synth};
use polyvox_io::OutputStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How often the control thread checks the score.
const CONTROL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Args)]
pub struct PlayArgs {
    #[command(flatten)]
    score: ScoreArgs,

    /// Output device (index, exact name, or partial name)
    #[arg(short, long)]
    output: Option<String>,

    /// Extra seconds played after the last note-off
    #[arg(long, default_value = "1.0")]
    tail: f32,
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let mut stream = OutputStream::new(args.output.as_deref())?;

    let mut settings = load_settings(args.score.settings.as_deref())?;
    settings.sample_rate = stream.sample_rate() as f32;
    settings.validate()?;
    let sr = settings.sample_rate;

    let notes = parse_notes(&args.score.notes)?;
    let template = VoiceTemplate::new(&args.score, &settings)?;
    let mut player = ScorePlayer::new(notes, template, sr);
    let end_block = player.last_block()
        + secs_to_blocks(args.score.release, sr)
        + secs_to_blocks(args.tail, sr);

    let (mut handle, mut renderer) = Synth::new(&settings)?;

    println!(
        "Playing on {} ({} Hz, {} channels, {} worker threads)",
        stream.device_name(),
        stream.sample_rate(),
        stream.channels(),
        settings.worker_threads()
    );
    println!("Press Ctrl+C to stop.\n");

    let running = stream.running_flag();
    let stop = Arc::new(AtomicBool::new(false));
    {
        let running = Arc::clone(&running);
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            println!("\nStopping...");
            stop.store(true, Ordering::SeqCst);
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let control = std::thread::Builder::new()
        .name("polyvox-control".into())
        .spawn(move || {
            let start = Instant::now();
            let mut returned = 0usize;
            while !stop.load(Ordering::SeqCst) {
                let block = (start.elapsed().as_secs_f64() * f64::from(sr) / BLOCK_SIZE as f64)
                    as u64;
                player.advance(block, &mut handle);
                handle.flush();
                returned += handle.collect_finished().len();

                if player.is_done() && block > end_block {
                    break;
                }
                std::thread::sleep(CONTROL_INTERVAL);
            }
            running.store(false, Ordering::SeqCst);
            returned
        })?;

    stream.play_stereo(move |left, right| renderer.write_stereo(left, right))?;

    let returned = control
        .join()
        .map_err(|_| anyhow::anyhow!("control thread panicked"))?;
    println!("Done! {} voices finished.", returned);
    Ok(())
}

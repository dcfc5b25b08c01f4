//! polyvox CLI - render, play, and benchmark the polyvox voice mixer.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyvox")]
#[command(author, version, about = "Polyphonic sample-voice mixer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a note score to a WAV file
    Render(commands::render::RenderArgs),

    /// Play a note score through an audio device
    Play(commands::play::PlayArgs),

    /// Compare render time across worker thread counts
    Bench(commands::bench::BenchArgs),

    /// List audio output devices
    Devices(commands::devices::DevicesArgs),

    /// Show or check synth settings
    Settings(commands::settings::SettingsArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Play(args) => commands::play::run(args),
        Commands::Bench(args) => commands::bench::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Settings(args) => commands::settings::run(args),
    }
}

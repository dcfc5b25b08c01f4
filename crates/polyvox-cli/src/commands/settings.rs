//! Settings inspection and validation command.

use clap::{Args, Subcommand};
use polyvox_config::{SynthSettings, paths};
use std::path::PathBuf;

#[derive(Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    command: SettingsCommand,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print settings as TOML (defaults unless a file is given)
    Show {
        /// Settings file to load
        file: Option<PathBuf>,
    },

    /// Validate a settings file
    Check {
        /// Settings file to check
        file: PathBuf,
    },

    /// Write default settings to the user settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the user settings path
    Path,
}

pub fn run(args: SettingsArgs) -> anyhow::Result<()> {
    match args.command {
        SettingsCommand::Show { file } => {
            let settings = match file {
                Some(path) => SynthSettings::load(&path)?,
                None => SynthSettings::default(),
            };
            print!("{}", settings.to_toml()?);
        }

        SettingsCommand::Check { file } => {
            let settings = SynthSettings::load(&file)?;
            settings.validate()?;
            println!("{}: OK", file.display());
            println!(
                "  sample rate {} Hz, polyphony {}, {} worker thread(s), queue {}",
                settings.sample_rate,
                settings.polyphony,
                settings.worker_threads(),
                settings.queue_capacity()
            );
        }

        SettingsCommand::Init { force } => {
            let path = paths::default_settings_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            SynthSettings::default().save(&path)?;
            println!("Wrote {}", path.display());
        }

        SettingsCommand::Path => {
            println!("{}", paths::default_settings_path().display());
        }
    }
    Ok(())
}

pub mod commands;

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chirpmail")]
#[command(about = "Email new home-timeline posts since the last run", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: ~/.config/chirpmail/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the digest instead of sending it; the checkpoint is not touched
    #[arg(long)]
    pub dry_run: bool,
}

//! Command-line flags.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "mlb-presence",
    version,
    about = "Show an MLB team's game as Discord Rich Presence"
)]
pub struct Cli {
    /// Team abbreviation, e.g. NYY (required unless set in the config file)
    #[arg(long)]
    pub team: Option<String>,

    /// IANA timezone for start times, e.g. America/Chicago
    #[arg(long = "tz")]
    pub timezone: Option<String>,

    /// Only show live games; clear the status otherwise
    #[arg(long)]
    pub live_only: bool,

    /// Push presence through an HTTP bridge instead of local Discord IPC
    #[arg(long, env = "REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,
}

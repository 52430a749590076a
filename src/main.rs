//! MLB presence daemon.
//!
//! Follows one MLB team and mirrors its current or upcoming game into
//! Discord Rich Presence, either over the local Discord IPC socket or
//! through an HTTP bridge.
//!
//! Architecture:
//! - Tokio async runtime; one sequential poll loop
//! - MLB Stats API client with retry and backoff
//! - Presence channel: Discord IPC or remote bridge
//! - Ctrl+C cancels the loop, which clears the presence before exiting

use clap::{CommandFactory, Parser};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mlb_presence::api::{DataSource, StatsApiClient};
use mlb_presence::cli::Cli;
use mlb_presence::config::{ConfigError, LogSettings, Settings};
use mlb_presence::data::models::TeamDirectory;
use mlb_presence::poller::Poller;
use mlb_presence::presence::discord::DiscordIpc;
use mlb_presence::presence::remote::RemoteBridge;
use mlb_presence::presence::{PresenceBuilder, PresenceChannel};

/// Request timeout for the presence bridge.
const BRIDGE_TIMEOUT_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load .env file (ignore if not found).
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(&LogSettings::from_env());

    info!("=== MLB Presence ===");

    let settings = match Settings::load(&cli) {
        Ok(settings) => settings,
        Err(ConfigError::MissingTeam) => Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                ConfigError::MissingTeam.to_string(),
            )
            .exit(),
        Err(e) => {
            error!(error = %e, "Configuration error");
            return Err(e.into());
        }
    };
    info!(
        team = %settings.team_abbr,
        zone = ?settings.zone,
        live_only = settings.live_only,
        remote = settings.remote_url.is_some(),
        "Configuration loaded"
    );

    // =========================================================================
    // Team resolution
    // =========================================================================
    let client = StatsApiClient::with_defaults(&settings.api_base_url)?;

    let teams = match client.fetch_team_directory().await {
        Ok(teams) => teams,
        Err(e) => {
            error!(error = %e, "Failed to fetch team directory");
            anyhow::bail!("Team directory unavailable");
        }
    };
    let directory = TeamDirectory::new(teams);
    if directory.is_empty() {
        error!("Team directory is empty");
        anyhow::bail!("Team directory unavailable");
    }

    let Some(team) = directory.find_by_abbreviation(&settings.team_abbr).cloned() else {
        error!(
            team = %settings.team_abbr,
            known = directory.len(),
            "Team abbreviation not found"
        );
        anyhow::bail!("Unknown team '{}'", settings.team_abbr);
    };
    info!(id = team.id, name = %team.name, "Team resolved");

    let builder = PresenceBuilder::new(team, directory, settings.zone, settings.icons.clone());

    // =========================================================================
    // Presence channel
    // =========================================================================
    let channel: Box<dyn PresenceChannel> = match (&settings.remote_url, &settings.client_id) {
        (Some(url), _) => {
            info!(url = %url, "Using presence bridge");
            Box::new(RemoteBridge::new(url, BRIDGE_TIMEOUT_SECS)?)
        }
        (None, Some(client_id)) => Box::new(DiscordIpc::new(client_id.clone())),
        (None, None) => return Err(ConfigError::MissingClientId.into()),
    };

    // Shutdown signal.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!(error = %e, "Failed to listen for ctrl+c");
                return;
            }
        }
        cancel_clone.cancel();
    });

    let mut poller = Poller::new(client, channel, builder, settings.poller_config());
    poller.run(cancel).await;

    Ok(())
}

fn init_logging(settings: &LogSettings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    if settings.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

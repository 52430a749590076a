//! Configuration management.
//!
//! Settings come from three layers, later layers winning:
//! `config.toml` → environment (and `.env`) → command-line flags.
//! The merged [`Settings`] snapshot is immutable for the process lifetime.

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::client::DEFAULT_BASE_URL;
use crate::cli::Cli;
use crate::poller::PollerConfig;
use crate::presence::format::{BaseIcons, DisplayZone};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no team given; pass --team <ABBR> or set `team` in the config file")]
    MissingTeam,

    #[error("CLIENT_ID is not set; add it to your .env file")]
    MissingClientId,

    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),

    #[error("{0} must be at least one second")]
    InvalidInterval(&'static str),

    #[error("{0} must not be empty")]
    EmptyIcon(&'static str),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

// =============================================================================
// File layer
// =============================================================================

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub team: Option<String>,
    pub timezone: Option<String>,
    pub live_only: Option<bool>,
    pub remote_url: Option<String>,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub refresh: RefreshSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisplaySection {
    pub base_icon_filled: Option<String>,
    pub base_icon_empty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshSection {
    /// Seconds between polls while a game is live.
    pub live_interval: Option<u64>,
    /// Seconds between polls otherwise.
    pub idle_interval: Option<u64>,
}

impl FileConfig {
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load the file, treating a missing or malformed file as empty.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file");
                return Self::default();
            }
        };

        match Self::parse(&contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring config file");
                Self::default()
            }
        }
    }
}

// =============================================================================
// Environment layer
// =============================================================================

/// Values read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub client_id: Option<String>,
    pub api_base_url: Option<String>,
    pub tz: Option<String>,
    /// IANA name of the host's zone, e.g. `America/New_York`.
    pub system_zone: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            client_id: env_opt("CLIENT_ID"),
            api_base_url: env_opt("MLB_API_BASE_URL"),
            tz: env_opt("TZ"),
            system_zone: system_zone_name(),
        }
    }
}

/// Logging options, read before anything else so config loading can log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self {
            level: env_str("LOG_LEVEL", "info"),
            json: env_bool("LOG_JSON", false),
        }
    }
}

// =============================================================================
// Merged settings
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Discord application id; unused with a remote bridge.
    pub client_id: Option<String>,
    pub team_abbr: String,
    pub zone: DisplayZone,
    pub live_only: bool,
    pub remote_url: Option<String>,
    pub icons: BaseIcons,
    pub live_interval: Duration,
    pub idle_interval: Duration,
    pub api_base_url: String,
}

impl Settings {
    /// Load the config file and the environment, then apply `cli`.
    ///
    /// `.env` must already have been loaded into the environment.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = FileConfig::load(&cli.config);
        Self::resolve(cli, file, EnvConfig::from_env())
    }

    /// Merge the three layers and validate the result.
    pub fn resolve(cli: &Cli, file: FileConfig, env: EnvConfig) -> Result<Self, ConfigError> {
        let team_abbr = cli
            .team
            .clone()
            .or(file.team)
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingTeam)?;

        let zone = match cli.timezone.clone().or(file.timezone) {
            Some(name) => DisplayZone::Named(
                name.parse::<Tz>()
                    .map_err(|_| ConfigError::InvalidTimezone(name.clone()))?,
            ),
            // TZ and the host zone are hints; unparseable names such as
            // ":/etc/localtime" are skipped.
            None => [env.tz.as_deref(), env.system_zone.as_deref()]
                .into_iter()
                .flatten()
                .find_map(|name| name.parse::<Tz>().ok())
                .map(DisplayZone::Named)
                .unwrap_or(DisplayZone::Local),
        };

        let remote_url = cli
            .remote_url
            .clone()
            .or(file.remote_url)
            .filter(|u| !u.trim().is_empty());

        let client_id = env.client_id.filter(|c| !c.trim().is_empty());
        if remote_url.is_none() && client_id.is_none() {
            return Err(ConfigError::MissingClientId);
        }

        let defaults = BaseIcons::default();
        let icons = BaseIcons {
            filled: file.display.base_icon_filled.unwrap_or(defaults.filled),
            empty: file.display.base_icon_empty.unwrap_or(defaults.empty),
        };
        if icons.filled.is_empty() {
            return Err(ConfigError::EmptyIcon("base_icon_filled"));
        }
        if icons.empty.is_empty() {
            return Err(ConfigError::EmptyIcon("base_icon_empty"));
        }

        let cadence = PollerConfig::default();
        let live_interval = interval(file.refresh.live_interval, cadence.live_interval, "live_interval")?;
        let idle_interval = interval(file.refresh.idle_interval, cadence.idle_interval, "idle_interval")?;

        Ok(Self {
            client_id,
            team_abbr,
            zone,
            live_only: cli.live_only || file.live_only.unwrap_or(false),
            remote_url,
            icons,
            live_interval,
            idle_interval,
            api_base_url: env
                .api_base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            live_interval: self.live_interval,
            idle_interval: self.idle_interval,
            live_only: self.live_only,
            ..PollerConfig::default()
        }
    }
}

fn interval(
    secs: Option<u64>,
    default: Duration,
    name: &'static str,
) -> Result<Duration, ConfigError> {
    match secs {
        Some(0) => Err(ConfigError::InvalidInterval(name)),
        Some(s) => Ok(Duration::from_secs(s)),
        None => Ok(default),
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn system_zone_name() -> Option<String> {
    match iana_time_zone::get_timezone() {
        Ok(name) => Some(name),
        Err(e) => {
            debug!(error = %e, "Could not determine system timezone");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(team: Option<&str>) -> Cli {
        Cli {
            team: team.map(str::to_string),
            ..Cli::default()
        }
    }

    fn env_with_client() -> EnvConfig {
        EnvConfig {
            client_id: Some("1234".into()),
            ..EnvConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let s = Settings::resolve(&cli(Some("nyy")), FileConfig::default(), env_with_client()).unwrap();
        assert_eq!(s.team_abbr, "NYY");
        assert_eq!(s.zone, DisplayZone::Local);
        assert_eq!(s.live_interval, Duration::from_secs(15));
        assert_eq!(s.idle_interval, Duration::from_secs(90));
        assert_eq!(s.icons, BaseIcons::default());
        assert_eq!(s.api_base_url, DEFAULT_BASE_URL);
        assert!(!s.live_only);
    }

    #[test]
    fn test_file_values_and_cli_precedence() {
        let file = FileConfig::parse(
            r#"
            team = "BOS"
            timezone = "America/Chicago"
            live_only = true

            [display]
            base_icon_filled = "X"

            [refresh]
            live_interval = 30
            "#,
        )
        .unwrap();

        let mut flags = cli(Some("sea"));
        flags.timezone = Some("UTC".into());
        let s = Settings::resolve(&flags, file, env_with_client()).unwrap();

        assert_eq!(s.team_abbr, "SEA");
        assert_eq!(s.zone, DisplayZone::Named(chrono_tz::UTC));
        assert!(s.live_only);
        assert_eq!(s.icons.filled, "X");
        assert_eq!(s.icons.empty, "⬜");
        assert_eq!(s.live_interval, Duration::from_secs(30));
        assert_eq!(s.poller_config().idle_interval, Duration::from_secs(90));
    }

    #[test]
    fn test_missing_team() {
        let err = Settings::resolve(&cli(None), FileConfig::default(), env_with_client()).unwrap_err();
        assert_eq!(err, ConfigError::MissingTeam);
    }

    #[test]
    fn test_client_id_required_without_bridge() {
        let err = Settings::resolve(&cli(Some("NYY")), FileConfig::default(), EnvConfig::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingClientId);

        let mut flags = cli(Some("NYY"));
        flags.remote_url = Some("http://10.0.0.2:6463".into());
        let s = Settings::resolve(&flags, FileConfig::default(), EnvConfig::default()).unwrap();
        assert!(s.client_id.is_none());
    }

    #[test]
    fn test_invalid_timezone() {
        let mut flags = cli(Some("NYY"));
        flags.timezone = Some("Mars/Olympus".into());
        let err = Settings::resolve(&flags, FileConfig::default(), env_with_client()).unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimezone("Mars/Olympus".into()));
    }

    #[test]
    fn test_tz_env_hint() {
        let env = EnvConfig {
            tz: Some("Europe/London".into()),
            ..env_with_client()
        };
        let s = Settings::resolve(&cli(Some("NYY")), FileConfig::default(), env).unwrap();
        assert_eq!(s.zone, DisplayZone::Named(chrono_tz::Europe::London));

        let env = EnvConfig {
            tz: Some(":/etc/localtime".into()),
            ..env_with_client()
        };
        let s = Settings::resolve(&cli(Some("NYY")), FileConfig::default(), env).unwrap();
        assert_eq!(s.zone, DisplayZone::Local);
    }

    #[test]
    fn test_system_zone_used_when_unconfigured() {
        let env = EnvConfig {
            tz: Some(":/etc/localtime".into()),
            system_zone: Some("America/Chicago".into()),
            ..env_with_client()
        };
        let s = Settings::resolve(&cli(Some("NYY")), FileConfig::default(), env).unwrap();
        assert_eq!(s.zone, DisplayZone::Named(chrono_tz::America::Chicago));

        let start = chrono::DateTime::parse_from_rfc3339("2024-07-14T23:05:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(s.zone.format_start(start), "Sun 18:05 CDT");

        // An explicit setting still wins over the host zone.
        let mut flags = cli(Some("NYY"));
        flags.timezone = Some("UTC".into());
        let env = EnvConfig {
            system_zone: Some("America/Chicago".into()),
            ..env_with_client()
        };
        let s = Settings::resolve(&flags, FileConfig::default(), env).unwrap();
        assert_eq!(s.zone, DisplayZone::Named(chrono_tz::UTC));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = FileConfig::parse("[refresh]\nidle_interval = 0\n").unwrap();
        let err = Settings::resolve(&cli(Some("NYY")), file, env_with_client()).unwrap_err();
        assert_eq!(err, ConfigError::InvalidInterval("idle_interval"));
    }

    #[test]
    fn test_malformed_file() {
        assert!(matches!(
            FileConfig::parse("team = ["),
            Err(ConfigError::Parse(_))
        ));
    }
}

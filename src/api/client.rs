//! Async REST client for the MLB Stats API.
//!
//! Features:
//! - Fixed per-request timeout
//! - Automatic retries with exponential backoff
//! - Typed responses

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::data::models::{
    DirectoryTeam, GameSnapshot, RecordPair, ScheduleResponse, StandingsResponse, TeamInfo,
    TeamsResponse,
};

use super::errors::ApiError;
use super::source::DataSource;

pub const DEFAULT_BASE_URL: &str = "https://statsapi.mlb.com";

/// MLB regular season.
const SPORT_ID: &str = "1";
/// American and National League standings.
const LEAGUE_IDS: &str = "103,104";
const LIVE_HYDRATE: &str = "linescore(runners),boxscore,team";

/// Async REST client for the MLB Stats API.
pub struct StatsApiClient {
    base_url: String,
    client: Client,
    max_retries: u32,
}

impl StatsApiClient {
    pub fn new(base_url: &str, max_retries: u32, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("mlb-presence/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            max_retries: max_retries.max(1),
        })
    }

    /// Create with default settings: 3 attempts, 10s timeout.
    pub fn with_defaults(base_url: &str) -> Result<Self, ApiError> {
        Self::new(base_url, 3, 10)
    }

    // =========================================================================
    // Core request method
    // =========================================================================

    async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay_ms = 500 * 2u64.pow(attempt - 1);
                debug!(path = %path, delay_ms, attempt = attempt + 1, "Retrying API request");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            debug!(path = %path, attempt = attempt + 1, "API request");

            let result = self.client.get(&url).query(params).send().await;

            let err = match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let text = response
                            .text()
                            .await
                            .map_err(|e| ApiError::from_transport(&e))?;
                        return serde_json::from_str(&text)
                            .map_err(|e| ApiError::Deserialization(e.to_string()));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    ApiError::from_response(status.as_u16(), &body_text)
                }
                Err(e) => ApiError::from_transport(&e),
            };

            if !err.is_retryable() {
                return Err(err);
            }

            warn!(
                path = %path,
                error = %err,
                attempt = attempt + 1,
                "API request failed"
            );
            last_error = Some(err);
        }

        Err(ApiError::MaxRetriesExceeded {
            attempts: self.max_retries,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[async_trait]
impl DataSource for StatsApiClient {
    async fn fetch_team_directory(&self) -> Result<Vec<TeamInfo>, ApiError> {
        let data: TeamsResponse = self
            .request("/api/v1/teams", &[("sportId", SPORT_ID.to_string())])
            .await?;

        Ok(data
            .teams
            .into_iter()
            .filter_map(DirectoryTeam::into_team_info)
            .collect())
    }

    async fn fetch_live_game(&self, team_id: u32) -> Result<Option<GameSnapshot>, ApiError> {
        let data: ScheduleResponse = self
            .request(
                "/api/v1/schedule/games/",
                &[
                    ("sportId", SPORT_ID.to_string()),
                    ("hydrate", LIVE_HYDRATE.to_string()),
                ],
            )
            .await?;

        Ok(first_game_for(data, team_id))
    }

    async fn fetch_schedule_window(
        &self,
        team_id: u32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<GameSnapshot>, ApiError> {
        let data: ScheduleResponse = self
            .request(
                "/api/v1/schedule",
                &[
                    ("sportId", SPORT_ID.to_string()),
                    ("teamId", team_id.to_string()),
                    ("startDate", start.format("%Y-%m-%d").to_string()),
                    ("endDate", end.format("%Y-%m-%d").to_string()),
                    ("hydrate", "team".to_string()),
                ],
            )
            .await?;

        Ok(data.into_games())
    }

    async fn fetch_standings(
        &self,
        team_id: u32,
        season: i32,
    ) -> Result<Option<RecordPair>, ApiError> {
        let data: StandingsResponse = self
            .request(
                "/api/v1/standings",
                &[
                    ("leagueId", LEAGUE_IDS.to_string()),
                    ("teamId", team_id.to_string()),
                    ("season", season.to_string()),
                    ("standingsTypes", "regularSeason".to_string()),
                ],
            )
            .await?;

        Ok(data.record_for(team_id))
    }
}

/// The first game of the day's slate involving the team.
fn first_game_for(data: ScheduleResponse, team_id: u32) -> Option<GameSnapshot> {
    data.into_games().into_iter().find(|g| g.involves(team_id))
}

//! The data-source seam between the poller and the league API.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::data::models::{GameSnapshot, RecordPair, TeamInfo};

use super::errors::ApiError;

/// Everything the presence pipeline needs from upstream.
///
/// Implementations may fail transiently; callers degrade failures to
/// "no data" rather than propagating them.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// All clubs in the league.
    async fn fetch_team_directory(&self) -> Result<Vec<TeamInfo>, ApiError>;

    /// Today's game for the team, if any, with linescore and boxscore.
    async fn fetch_live_game(&self, team_id: u32) -> Result<Option<GameSnapshot>, ApiError>;

    /// Every game for the team between two calendar dates, inclusive.
    async fn fetch_schedule_window(
        &self,
        team_id: u32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<GameSnapshot>, ApiError>;

    /// Regular-season record from the standings table.
    async fn fetch_standings(
        &self,
        team_id: u32,
        season: i32,
    ) -> Result<Option<RecordPair>, ApiError>;
}

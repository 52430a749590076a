//! Core data models for the MLB Stats API.
//!
//! Every upstream field is optional: the API omits keys freely depending on
//! game phase and hydration, and absence is never an error. Accessors on
//! [`GameSnapshot`] give each "missing" case a name at the point of use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

// =============================================================================
// Enums
// =============================================================================

/// Coarse game phase as reported by `status.abstractGameState`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbstractState {
    Preview,
    Live,
    Final,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for AbstractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preview => write!(f, "Preview"),
            Self::Live => write!(f, "Live"),
            Self::Final => write!(f, "Final"),
            Self::Other => write!(f, "Scheduled"),
        }
    }
}

/// Detailed states that mean the game is over.
const FINISHED_STATES: [&str; 3] = ["Final", "Game Over", "Completed Early"];

/// Whether a `detailedState` string denotes a finished game.
pub fn is_finished_state(detailed: &str) -> bool {
    FINISHED_STATES.contains(&detailed)
}

/// Which side of the game a team is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeAway {
    Home,
    Away,
}

impl HomeAway {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Home => Self::Away,
            Self::Away => Self::Home,
        }
    }
}

impl fmt::Display for HomeAway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "Home"),
            Self::Away => write!(f, "Away"),
        }
    }
}

// =============================================================================
// Team models
// =============================================================================

/// Identity of a club, resolved from the team directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamInfo {
    pub id: u32,
    pub name: String,
    /// Logo code used by the logo CDN.
    pub code: String,
    pub abbreviation: String,
}

/// Immutable id → team lookup built once at startup.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    teams: HashMap<u32, TeamInfo>,
}

impl TeamDirectory {
    pub fn new(teams: Vec<TeamInfo>) -> Self {
        Self {
            teams: teams.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&TeamInfo> {
        self.teams.get(&id)
    }

    /// Case-insensitive lookup by abbreviation.
    pub fn find_by_abbreviation(&self, abbr: &str) -> Option<&TeamInfo> {
        self.teams
            .values()
            .find(|t| t.abbreviation.eq_ignore_ascii_case(abbr))
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

/// Wire form of `/api/v1/teams`.
#[derive(Debug, Default, Deserialize)]
pub struct TeamsResponse {
    #[serde(default)]
    pub teams: Vec<DirectoryTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryTeam {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub file_code: Option<String>,
}

impl DirectoryTeam {
    /// Entries without an abbreviation cannot be tracked and are dropped.
    pub fn into_team_info(self) -> Option<TeamInfo> {
        let abbreviation = self.abbreviation?.to_uppercase();
        let code = self
            .file_code
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| abbreviation.to_lowercase());
        Some(TeamInfo {
            id: self.id,
            name: self.name.unwrap_or_else(|| abbreviation.clone()),
            code,
            abbreviation,
        })
    }
}

// =============================================================================
// Records
// =============================================================================

/// Win-loss record; either half may be unknown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordPair {
    pub wins: Option<u32>,
    pub losses: Option<u32>,
}

impl RecordPair {
    pub fn new(wins: u32, losses: u32) -> Self {
        Self {
            wins: Some(wins),
            losses: Some(losses),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for RecordPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.wins, self.losses) {
            (Some(w), Some(l)) => write!(f, "{w}-{l}"),
            _ => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LeagueRecord {
    #[serde(default)]
    pub wins: Option<u32>,
    #[serde(default)]
    pub losses: Option<u32>,
}

impl LeagueRecord {
    /// Both halves, or nothing.
    pub fn pair(&self) -> Option<RecordPair> {
        Some(RecordPair::new(self.wins?, self.losses?))
    }
}

/// Wire form of `/api/v1/standings`.
#[derive(Debug, Default, Deserialize)]
pub struct StandingsResponse {
    #[serde(default)]
    pub records: Vec<StandingsDivision>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsDivision {
    #[serde(default)]
    pub team_records: Vec<StandingsTeamRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StandingsTeamRecord {
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(default)]
    pub wins: Option<u32>,
    #[serde(default)]
    pub losses: Option<u32>,
}

impl StandingsResponse {
    pub fn record_for(&self, team_id: u32) -> Option<RecordPair> {
        self.records
            .iter()
            .flat_map(|d| d.team_records.iter())
            .find(|r| r.team.as_ref().map(|t| t.id) == Some(team_id))
            .map(|r| RecordPair {
                wins: r.wins,
                losses: r.losses,
            })
    }
}

// =============================================================================
// Schedule / game models
// =============================================================================

/// Wire form of `/api/v1/schedule`.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub dates: Vec<ScheduleDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleDate {
    #[serde(default, deserialize_with = "skip_malformed_games")]
    pub games: Vec<GameSnapshot>,
}

/// Decode each game on its own so one malformed entry does not fail the slate.
fn skip_malformed_games<'de, D>(deserializer: D) -> Result<Vec<GameSnapshot>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<GameSnapshot>(value) {
            Ok(game) => Some(game),
            Err(e) => {
                debug!(error = %e, "Skipping malformed game entry");
                None
            }
        })
        .collect())
}

impl ScheduleResponse {
    pub fn into_games(self) -> Vec<GameSnapshot> {
        self.dates.into_iter().flat_map(|d| d.games).collect()
    }
}

/// One game's state as returned by the schedule endpoints.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(default)]
    pub game_pk: Option<u64>,
    #[serde(default)]
    pub game_date: Option<String>,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub teams: GameTeams,
    #[serde(default)]
    pub series_game_number: Option<u32>,
    #[serde(default)]
    pub games_in_series: Option<u32>,
    #[serde(default)]
    pub venue: Option<Venue>,
    #[serde(default)]
    pub linescore: Option<Linescore>,
    #[serde(default)]
    pub boxscore: Option<Boxscore>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    #[serde(default)]
    pub abstract_game_state: AbstractState,
    #[serde(default)]
    pub detailed_state: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct GameTeams {
    #[serde(default)]
    pub home: Option<GameTeamSide>,
    #[serde(default)]
    pub away: Option<GameTeamSide>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameTeamSide {
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub is_winner: Option<bool>,
    #[serde(default)]
    pub league_record: Option<LeagueRecord>,
}

impl GameTeamSide {
    pub fn team_id(&self) -> Option<u32> {
        self.team.as_ref().map(|t| t.id)
    }

    pub fn won(&self) -> bool {
        self.is_winner.unwrap_or(false)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub file_code: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Venue {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linescore {
    #[serde(default)]
    pub current_inning: Option<u32>,
    #[serde(default)]
    pub inning_state: Option<String>,
    #[serde(default)]
    pub outs: Option<u32>,
    #[serde(default)]
    pub balls: Option<u32>,
    #[serde(default)]
    pub strikes: Option<u32>,
    #[serde(default)]
    pub offense: Option<Offense>,
    #[serde(default)]
    pub defense: Option<Defense>,
}

/// Offensive situation. A base key is present only while occupied.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Offense {
    #[serde(default)]
    pub batter: Option<PersonRef>,
    #[serde(default)]
    pub first: Option<serde_json::Value>,
    #[serde(default)]
    pub second: Option<serde_json::Value>,
    #[serde(default)]
    pub third: Option<serde_json::Value>,
    #[serde(default)]
    pub team: Option<TeamRef>,
}

impl Offense {
    /// Occupancy of first, second and third base.
    pub fn bases(&self) -> [bool; 3] {
        let occupied = |base: &Option<serde_json::Value>| {
            base.as_ref().map(|v| !v.is_null()).unwrap_or(false)
        };
        [
            occupied(&self.first),
            occupied(&self.second),
            occupied(&self.third),
        ]
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Defense {
    #[serde(default)]
    pub pitcher: Option<PersonRef>,
    #[serde(default)]
    pub team: Option<TeamRef>,
}

/// A player reference: either a hydrated person or a bare id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PersonRef {
    Person(Person),
    Id(u32),
}

impl PersonRef {
    pub fn id(&self) -> Option<u32> {
        match self {
            Self::Person(p) => p.id,
            Self::Id(id) => Some(*id),
        }
    }

    pub fn full_name(&self) -> Option<&str> {
        match self {
            Self::Person(p) => p.full_name.as_deref().filter(|n| !n.is_empty()),
            Self::Id(_) => None,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Boxscore {
    #[serde(default)]
    pub teams: BoxscoreTeams,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BoxscoreTeams {
    #[serde(default)]
    pub home: Option<BoxscoreTeam>,
    #[serde(default)]
    pub away: Option<BoxscoreTeam>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BoxscoreTeam {
    /// Keyed by `"ID<playerId>"`.
    #[serde(default)]
    pub players: HashMap<String, BoxscorePlayer>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BoxscorePlayer {
    #[serde(default)]
    pub person: Option<Person>,
}

impl Boxscore {
    /// Search both rosters for a player's full name.
    pub fn player_name(&self, player_id: u32) -> Option<&str> {
        [&self.teams.home, &self.teams.away]
            .into_iter()
            .flatten()
            .flat_map(|t| t.players.values())
            .filter_map(|p| p.person.as_ref())
            .find(|p| p.id == Some(player_id))
            .and_then(|p| p.full_name.as_deref())
    }
}

// =============================================================================
// GameSnapshot accessors
// =============================================================================

/// The tracked team's side of a game and its opponent's.
#[derive(Debug, Clone, Copy)]
pub struct Matchup<'a> {
    pub main: &'a GameTeamSide,
    pub opponent: &'a GameTeamSide,
    pub main_side: HomeAway,
}

impl GameSnapshot {
    pub fn abstract_state(&self) -> AbstractState {
        self.status.abstract_game_state
    }

    pub fn is_live(&self) -> bool {
        self.abstract_state() == AbstractState::Live
    }

    pub fn detailed_state(&self) -> Option<&str> {
        self.status.detailed_state.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether the detailed status says the game is over.
    pub fn is_finished(&self) -> bool {
        self.detailed_state().map(is_finished_state).unwrap_or(false)
    }

    /// Scheduled first pitch, if the timestamp is present and well-formed.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.game_date.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn venue_name(&self) -> Option<&str> {
        self.venue
            .as_ref()
            .and_then(|v| v.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    /// `(seriesGameNumber, gamesInSeries)`, zero when absent.
    pub fn series_position(&self) -> (u32, u32) {
        (
            self.series_game_number.unwrap_or(0),
            self.games_in_series.unwrap_or(0),
        )
    }

    pub fn involves(&self, team_id: u32) -> bool {
        self.home_id() == Some(team_id) || self.away_id() == Some(team_id)
    }

    pub fn home_id(&self) -> Option<u32> {
        self.teams.home.as_ref().and_then(|s| s.team_id())
    }

    pub fn away_id(&self) -> Option<u32> {
        self.teams.away.as_ref().and_then(|s| s.team_id())
    }

    /// Split the game into the tracked team's side and the opponent's.
    pub fn matchup(&self, team_id: u32) -> Option<Matchup<'_>> {
        let home = self.teams.home.as_ref()?;
        let away = self.teams.away.as_ref()?;
        if home.team_id() == Some(team_id) {
            Some(Matchup {
                main: home,
                opponent: away,
                main_side: HomeAway::Home,
            })
        } else if away.team_id() == Some(team_id) {
            Some(Matchup {
                main: away,
                opponent: home,
                main_side: HomeAway::Away,
            })
        } else {
            None
        }
    }
}

//! Shared fakes for the integration tests: an in-memory data source and a
//! presence channel that records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

use mlb_presence::api::{ApiError, DataSource};
use mlb_presence::data::models::{GameSnapshot, RecordPair, TeamDirectory, TeamInfo};
use mlb_presence::presence::format::{BaseIcons, DisplayZone};
use mlb_presence::presence::{ChannelError, PresenceBuilder, PresenceChannel, PresencePayload};

pub const NYY: u32 = 147;
pub const BOS: u32 = 111;

// =============================================================================
// Teams
// =============================================================================

pub fn yankees() -> TeamInfo {
    TeamInfo {
        id: NYY,
        name: "New York Yankees".into(),
        code: "nyy".into(),
        abbreviation: "NYY".into(),
    }
}

pub fn red_sox() -> TeamInfo {
    TeamInfo {
        id: BOS,
        name: "Boston Red Sox".into(),
        code: "bos".into(),
        abbreviation: "BOS".into(),
    }
}

pub fn builder() -> PresenceBuilder {
    PresenceBuilder::new(
        yankees(),
        TeamDirectory::new(vec![yankees(), red_sox()]),
        DisplayZone::Named(chrono_tz::UTC),
        BaseIcons::default(),
    )
}

// =============================================================================
// Game fixtures
// =============================================================================

/// Live game: NYY at home trailing BOS 2-3, bottom 7th, runner on first,
/// one out, Judge up against Crochet.
pub fn live_game() -> GameSnapshot {
    game_from(live_game_json())
}

/// Raw document behind [`live_game`], for tests that tweak one field.
pub fn live_game_json() -> Value {
    json!({
        "gamePk": 745123,
        "gameDate": "2024-07-14T23:05:00Z",
        "status": {"abstractGameState": "Live", "detailedState": "In Progress"},
        "teams": {
            "home": {
                "team": {"id": NYY, "name": "New York Yankees", "abbreviation": "NYY"},
                "score": 2,
                "leagueRecord": {"wins": 60, "losses": 38}
            },
            "away": {
                "team": {"id": BOS, "name": "Boston Red Sox", "abbreviation": "BOS"},
                "score": 3,
                "leagueRecord": {"wins": 52, "losses": 44}
            }
        },
        "seriesGameNumber": 2,
        "gamesInSeries": 3,
        "venue": {"name": "Yankee Stadium"},
        "linescore": {
            "currentInning": 7,
            "inningState": "Bottom",
            "outs": 1,
            "balls": 2,
            "strikes": 1,
            "offense": {
                "batter": {"id": 592450, "fullName": "Aaron Judge"},
                "first": {"id": 665742, "fullName": "Juan Soto"},
                "team": {"id": NYY}
            },
            "defense": {"pitcher": 676979, "team": {"id": BOS}}
        },
        "boxscore": {
            "teams": {
                "away": {"players": {"ID676979": {"person": {"id": 676979, "fullName": "Garrett Crochet"}}}}
            }
        }
    })
}

/// A completed game, NYY at home against BOS.
pub fn finished_game(
    date: &str,
    nyy_score: u32,
    bos_score: u32,
    series: (u32, u32),
) -> GameSnapshot {
    game_from(json!({
        "gameDate": date,
        "status": {"abstractGameState": "Final", "detailedState": "Final"},
        "teams": {
            "home": {
                "team": {"id": NYY},
                "score": nyy_score,
                "isWinner": nyy_score > bos_score
            },
            "away": {
                "team": {"id": BOS},
                "score": bos_score,
                "isWinner": bos_score > nyy_score
            }
        },
        "seriesGameNumber": series.0,
        "gamesInSeries": series.1
    }))
}

/// A scheduled NYY vs BOS game with no scores yet.
pub fn scheduled_game(date: &str, series: (u32, u32)) -> GameSnapshot {
    game_from(json!({
        "gameDate": date,
        "status": {"abstractGameState": "Preview", "detailedState": "Scheduled"},
        "teams": {
            "home": {"team": {"id": NYY}},
            "away": {"team": {"id": BOS}}
        },
        "seriesGameNumber": series.0,
        "gamesInSeries": series.1,
        "venue": {"name": "Yankee Stadium"}
    }))
}

pub fn game_from(value: Value) -> GameSnapshot {
    serde_json::from_value(value).unwrap()
}

// =============================================================================
// Data source
// =============================================================================

/// One scripted answer to `fetch_live_game`.
pub enum LiveReply {
    Game(Option<GameSnapshot>),
    Timeout,
    Panic,
}

/// In-memory [`DataSource`].
///
/// Live-game replies are consumed in order; once exhausted, `fallback` is
/// returned forever. Schedule windows are filtered from `schedule` by date.
#[derive(Default)]
pub struct FakeSource {
    pub teams: Vec<TeamInfo>,
    pub schedule: Vec<GameSnapshot>,
    pub standings: HashMap<u32, RecordPair>,
    pub fallback: Option<GameSnapshot>,
    replies: Mutex<VecDeque<LiveReply>>,
    live_calls: Mutex<Vec<Instant>>,
    started: Option<Instant>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            teams: vec![yankees(), red_sox()],
            started: Some(Instant::now()),
            ..Self::default()
        }
    }

    pub fn with_replies(mut self, replies: Vec<LiveReply>) -> Self {
        self.replies = Mutex::new(replies.into());
        self
    }

    pub fn with_fallback(mut self, game: Option<GameSnapshot>) -> Self {
        self.fallback = game;
        self
    }

    pub fn with_schedule(mut self, games: Vec<GameSnapshot>) -> Self {
        self.schedule = games;
        self
    }

    /// Offsets from construction at which the live game was fetched.
    pub fn live_fetch_offsets(&self) -> Vec<Duration> {
        let started = self.started.unwrap_or_else(Instant::now);
        self.live_calls
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(started))
            .collect()
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn fetch_team_directory(&self) -> Result<Vec<TeamInfo>, ApiError> {
        Ok(self.teams.clone())
    }

    async fn fetch_live_game(&self, team_id: u32) -> Result<Option<GameSnapshot>, ApiError> {
        self.live_calls.lock().unwrap().push(Instant::now());
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(LiveReply::Game(game)) => Ok(game.filter(|g| g.involves(team_id))),
            Some(LiveReply::Timeout) => Err(ApiError::Timeout("operation timed out".into())),
            Some(LiveReply::Panic) => panic!("malformed snapshot"),
            None => Ok(self.fallback.clone().filter(|g| g.involves(team_id))),
        }
    }

    async fn fetch_schedule_window(
        &self,
        team_id: u32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<GameSnapshot>, ApiError> {
        Ok(self
            .schedule
            .iter()
            .filter(|g| g.involves(team_id))
            .filter(|g| {
                g.start_time()
                    .map(|t| (start..=end).contains(&t.date_naive()))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn fetch_standings(
        &self,
        team_id: u32,
        _season: i32,
    ) -> Result<Option<RecordPair>, ApiError> {
        Ok(self.standings.get(&team_id).copied())
    }
}

// =============================================================================
// Presence channel
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Push(PresencePayload),
    Clear,
}

/// A [`PresenceChannel`] that records calls and can be scripted to fail.
#[derive(Default)]
pub struct RecordingChannel {
    pub events: Vec<(Duration, Event)>,
    /// What a viewer would currently see.
    pub displayed: Option<PresencePayload>,
    connect_failures: u32,
    push_failures: VecDeque<ChannelError>,
    started: Option<Instant>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            started: Some(Instant::now()),
            ..Self::default()
        }
    }

    pub fn failing_connects(mut self, n: u32) -> Self {
        self.connect_failures = n;
        self
    }

    pub fn failing_pushes(mut self, errors: Vec<ChannelError>) -> Self {
        self.push_failures = errors.into();
        self
    }

    fn record(&mut self, event: Event) {
        let started = self.started.unwrap_or_else(Instant::now);
        self.events.push((Instant::now().duration_since(started), event));
    }

    pub fn pushes(&self) -> Vec<&PresencePayload> {
        self.events
            .iter()
            .filter_map(|(_, e)| match e {
                Event::Push(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| std::mem::discriminant(e) == std::mem::discriminant(wanted))
            .count()
    }

    pub fn offsets_of(&self, wanted: &Event) -> Vec<Duration> {
        self.events
            .iter()
            .filter(|(_, e)| std::mem::discriminant(e) == std::mem::discriminant(wanted))
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last().map(|(_, e)| e)
    }
}

#[async_trait]
impl PresenceChannel for RecordingChannel {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.record(Event::Connect);
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(ChannelError::NotFound);
        }
        Ok(())
    }

    async fn push(&mut self, payload: &PresencePayload) -> Result<(), ChannelError> {
        if let Some(err) = self.push_failures.pop_front() {
            return Err(err);
        }
        self.record(Event::Push(payload.clone()));
        self.displayed = Some(payload.clone());
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), ChannelError> {
        self.record(Event::Clear);
        self.displayed = None;
        Ok(())
    }
}

//! Win-loss record and series standing resolution.
//!
//! Both lookups prefer data already embedded in the game snapshot and fall
//! back to one extra request. Failures resolve to "unknown", never to an
//! error: a missing record renders as `N/A` and a missing series is simply
//! not shown.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::api::source::DataSource;
use crate::data::models::{GameSnapshot, RecordPair};

// =============================================================================
// Records
// =============================================================================

/// Resolve a team's record, preferring the game's embedded league record.
pub async fn resolve_record<D: DataSource + ?Sized>(
    source: &D,
    team_id: u32,
    game: Option<&GameSnapshot>,
    season: i32,
) -> RecordPair {
    if let Some(pair) = game.and_then(|g| embedded_record(g, team_id)) {
        return pair;
    }

    match source.fetch_standings(team_id, season).await {
        Ok(Some(pair)) => pair,
        Ok(None) => {
            debug!(team_id, season, "Team missing from standings");
            RecordPair::unknown()
        }
        Err(e) => {
            warn!(team_id, season, error = %e, "Failed to fetch team record");
            RecordPair::unknown()
        }
    }
}

fn embedded_record(game: &GameSnapshot, team_id: u32) -> Option<RecordPair> {
    [&game.teams.home, &game.teams.away]
        .into_iter()
        .flatten()
        .find(|side| side.team_id() == Some(team_id))
        .and_then(|side| side.league_record.as_ref())
        .and_then(|rec| rec.pair())
}

// =============================================================================
// Series
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesSide {
    Team,
    Opponent,
}

/// Standing of a multi-game series from the tracked team's perspective.
///
/// `ahead`/`behind` are the leader's wins and losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStatus {
    NoSeries,
    Leads {
        side: SeriesSide,
        ahead: u32,
        behind: u32,
    },
    Tied {
        each: u32,
    },
    Won {
        side: SeriesSide,
        ahead: u32,
        behind: u32,
    },
}

impl SeriesStatus {
    /// Classify a tally. `concluded` picks the terminal verb.
    pub fn from_tally(wins: u32, losses: u32, concluded: bool) -> Self {
        if wins == 0 && losses == 0 {
            return Self::NoSeries;
        }
        let (side, ahead, behind) = if wins > losses {
            (SeriesSide::Team, wins, losses)
        } else if losses > wins {
            (SeriesSide::Opponent, losses, wins)
        } else {
            return Self::Tied { each: wins };
        };
        if concluded {
            Self::Won {
                side,
                ahead,
                behind,
            }
        } else {
            Self::Leads {
                side,
                ahead,
                behind,
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won { .. })
    }

    /// Human wording, e.g. `"NYY leads series 2-1"`.
    pub fn describe(&self, team_abbr: &str, opp_abbr: &str) -> Option<String> {
        let name = |side: &SeriesSide| match side {
            SeriesSide::Team => team_abbr,
            SeriesSide::Opponent => opp_abbr,
        };
        match self {
            Self::NoSeries => None,
            Self::Tied { each } => Some(format!("Series tied {each}-{each}")),
            Self::Leads {
                side,
                ahead,
                behind,
            } => Some(format!("{} leads series {ahead}-{behind}", name(side))),
            Self::Won {
                side,
                ahead,
                behind,
            } => Some(format!("{} wins series {ahead}-{behind}", name(side))),
        }
    }
}

/// The first day of the series containing a game played at `game_date`.
pub fn series_window_start(game_date: DateTime<Utc>, series_game_number: u32) -> chrono::NaiveDate {
    let offset = i64::from(series_game_number.saturating_sub(1));
    (game_date - Duration::days(offset)).date_naive()
}

/// Tally the tracked team's wins and losses against one opponent.
pub fn tally_series(games: &[GameSnapshot], team_id: u32, opponent_id: u32) -> (u32, u32) {
    let mut wins = 0;
    let mut losses = 0;

    for game in games {
        let Some(m) = game.matchup(team_id) else {
            continue;
        };
        if m.opponent.team_id() != Some(opponent_id) {
            continue;
        }
        if m.main.won() {
            wins += 1;
        } else if m.opponent.won() {
            losses += 1;
        }
    }

    (wins, losses)
}

/// Resolve the series standing for `game` from the tracked team's view.
pub async fn resolve_series<D: DataSource + ?Sized>(
    source: &D,
    team_id: u32,
    game: &GameSnapshot,
) -> SeriesStatus {
    let (game_number, total) = game.series_position();
    if game_number <= 1 || total == 0 {
        return SeriesStatus::NoSeries;
    }

    let Some(opponent_id) = game.matchup(team_id).and_then(|m| m.opponent.team_id()) else {
        return SeriesStatus::NoSeries;
    };
    let Some(game_date) = game.start_time() else {
        return SeriesStatus::NoSeries;
    };

    let start = series_window_start(game_date, game_number);
    let end = game_date.date_naive();

    let games = match source.fetch_schedule_window(team_id, start, end).await {
        Ok(games) => games,
        Err(e) => {
            warn!(team_id, %start, %end, error = %e, "Failed to fetch series games");
            return SeriesStatus::NoSeries;
        }
    };

    let (wins, losses) = tally_series(&games, team_id, opponent_id);
    let concluded = game_number == total && game.is_finished();

    debug!(team_id, opponent_id, wins, losses, concluded, "Series tally");
    SeriesStatus::from_tally(wins, losses, concluded)
}

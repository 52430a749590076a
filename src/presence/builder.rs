//! Game → presence payload translation.
//!
//! [`PresenceBuilder::build`] handles every game phase; when the fetched
//! game cannot supply a score (it has not started) the builder falls back to
//! [`PresenceBuilder::build_preview`], which combines independent next-game
//! and previous-game lookups. Lookup failures degrade to placeholder text:
//! the builder always returns a complete payload.

use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::{debug, warn};

use crate::api::source::DataSource;
use crate::data::models::{
    AbstractState, GameSnapshot, GameTeamSide, RecordPair, TeamDirectory, TeamInfo,
};
use crate::data::records::{resolve_record, resolve_series};

use super::format::{live_state_line, series_counter, BaseIcons, DisplayZone, SEP};
use super::payload::{logo_url, PresencePayload};

/// How far the next/previous game lookups reach.
const LOOKAHEAD_DAYS: i64 = 7;

const UNKNOWN_ABBR: &str = "???";

/// Display identity of one side of a game.
#[derive(Debug, Clone)]
struct SideIdentity {
    abbreviation: String,
    name: String,
    /// Logo file code; `None` when the side is unknown.
    code: Option<String>,
}

/// Builds presence payloads for one tracked team.
#[derive(Debug, Clone)]
pub struct PresenceBuilder {
    team: TeamInfo,
    directory: TeamDirectory,
    zone: DisplayZone,
    icons: BaseIcons,
}

impl PresenceBuilder {
    pub fn new(team: TeamInfo, directory: TeamDirectory, zone: DisplayZone, icons: BaseIcons) -> Self {
        Self {
            team,
            directory,
            zone,
            icons,
        }
    }

    pub fn team(&self) -> &TeamInfo {
        &self.team
    }

    // =========================================================================
    // Current game
    // =========================================================================

    /// Payload for the game fetched this cycle.
    pub async fn build<D: DataSource + ?Sized>(
        &self,
        source: &D,
        game: &GameSnapshot,
        now: DateTime<Utc>,
    ) -> PresencePayload {
        let Some(m) = game.matchup(self.team.id) else {
            debug!(game_pk = ?game.game_pk, "Tracked team not in game, using preview");
            return self.build_preview(source, now).await;
        };
        let (Some(main_score), Some(opp_score)) = (m.main.score, m.opponent.score) else {
            debug!(game_pk = ?game.game_pk, "Game has no score yet, using preview");
            return self.build_preview(source, now).await;
        };

        let season = now.year();
        let main = self.identify(m.main);
        let opp = self.identify(m.opponent);

        let main_record = resolve_record(source, self.team.id, Some(game), season).await;
        let opp_record = match m.opponent.team_id() {
            Some(id) => resolve_record(source, id, Some(game), season).await,
            None => RecordPair::unknown(),
        };

        let finished = game.is_finished();
        let status = status_text(game);

        let mut details = format!(
            "{} {main_score} vs {} {opp_score}",
            main.abbreviation, opp.abbreviation
        );
        if finished {
            details = format!("FINAL{SEP}{details}");
        }

        let mut state_parts = Vec::new();
        if game.is_live() {
            state_parts.push(live_state_line(game, self.team.id, &self.icons));
        } else if finished {
            match self.find_next_game(source, now).await {
                Some(next) => state_parts.push(self.describe_next(&next)),
                None => state_parts.push(status),
            }
        } else {
            state_parts.push(status);
        }

        if !game.is_live() {
            let series = resolve_series(source, self.team.id, game).await;
            if let Some(mut text) = series.describe(&main.abbreviation, &opp.abbreviation) {
                if finished {
                    details.push_str(SEP);
                    details.push_str(&text);
                } else {
                    if game.abstract_state() != AbstractState::Final {
                        if let Some(counter) = series_counter(game) {
                            text = format!("{text} {counter}");
                        }
                    }
                    state_parts.push(text);
                }
            }
        }

        let payload = PresencePayload::new(details, state_parts.join(SEP)).with_large(
            logo_url(&self.team.code),
            format!("{}{SEP}{main_record} | {}", self.team.name, m.main_side),
        );
        match &opp.code {
            Some(code) => payload.with_small(
                logo_url(code),
                format!("{}{SEP}{opp_record} | {}", opp.name, m.main_side.opposite()),
            ),
            None => {
                debug!(game_pk = ?game.game_pk, "Opponent has no logo code, omitting small asset");
                payload
            }
        }
    }

    // =========================================================================
    // Next / previous game preview
    // =========================================================================

    /// Payload combining the next scheduled game and the last result.
    pub async fn build_preview<D: DataSource + ?Sized>(
        &self,
        source: &D,
        now: DateTime<Utc>,
    ) -> PresencePayload {
        let season = now.year();
        let next = self.find_next_game(source, now).await;
        let previous = self.find_previous_game(source, now).await;

        let mut state = previous
            .as_ref()
            .map(|g| self.describe_previous(g))
            .unwrap_or_else(|| "No recent game".to_string());

        let Some(next) = next else {
            let record = resolve_record(source, self.team.id, None, season).await;
            return PresencePayload::new("No upcoming game", state).with_large(
                logo_url(&self.team.code),
                format!("{}{SEP}{record}", self.team.name),
            );
        };

        let details = self.describe_next(&next);
        let main_record = resolve_record(source, self.team.id, Some(&next), season).await;

        let series = resolve_series(source, self.team.id, &next).await;
        let opponent = next.matchup(self.team.id).map(|m| m.opponent);
        let opp = opponent.map(|side| self.identify(side));

        let opp_abbr = opp
            .as_ref()
            .map(|o| o.abbreviation.as_str())
            .unwrap_or(UNKNOWN_ABBR);
        if let Some(text) = series.describe(&self.team.abbreviation, opp_abbr) {
            state.push_str(SEP);
            state.push_str(&text);
        }

        let mut payload = PresencePayload::new(details, state).with_large(
            logo_url(&self.team.code),
            format!("{}{SEP}{main_record}", self.team.name),
        );

        let opp = opp.and_then(|o| Some((o.name, o.code?)));
        if let (Some(side), Some((name, code))) = (opponent, opp) {
            let opp_record = match side.team_id() {
                Some(id) => resolve_record(source, id, Some(&next), season).await,
                None => RecordPair::unknown(),
            };
            payload = payload.with_small(
                logo_url(&code),
                format!("{}{SEP}{opp_record}", name),
            );
        }

        payload
    }

    /// Nearest game strictly after `now`, within the lookahead window.
    async fn find_next_game<D: DataSource + ?Sized>(
        &self,
        source: &D,
        now: DateTime<Utc>,
    ) -> Option<GameSnapshot> {
        let start = now.date_naive();
        let end = (now + Duration::days(LOOKAHEAD_DAYS)).date_naive();

        let games = match source.fetch_schedule_window(self.team.id, start, end).await {
            Ok(games) => games,
            Err(e) => {
                warn!(team_id = self.team.id, error = %e, "Failed to fetch next game");
                return None;
            }
        };

        games
            .into_iter()
            .filter_map(|g| g.start_time().map(|t| (t, g)))
            .filter(|(t, _)| *t > now)
            .min_by_key(|(t, _)| *t)
            .map(|(_, g)| g)
    }

    /// Most recent game strictly before `now`, within the lookback window.
    async fn find_previous_game<D: DataSource + ?Sized>(
        &self,
        source: &D,
        now: DateTime<Utc>,
    ) -> Option<GameSnapshot> {
        let start = (now - Duration::days(LOOKAHEAD_DAYS)).date_naive();
        let end = now.date_naive();

        let games = match source.fetch_schedule_window(self.team.id, start, end).await {
            Ok(games) => games,
            Err(e) => {
                warn!(team_id = self.team.id, error = %e, "Failed to fetch previous game");
                return None;
            }
        };

        games
            .into_iter()
            .filter_map(|g| g.start_time().map(|t| (t, g)))
            .filter(|(t, _)| *t < now)
            .max_by_key(|(t, _)| *t)
            .map(|(_, g)| g)
    }

    /// `"Next game: BOS vs NYY (Game 1/3) • Fri 19:05 EDT • Yankee Stadium"`.
    fn describe_next(&self, game: &GameSnapshot) -> String {
        let (away, home) = self.abbreviations(game);
        let mut desc = format!("Next game: {away} vs {home}");
        if let Some(counter) = series_counter(game) {
            desc.push(' ');
            desc.push_str(&counter);
        }
        if let Some(start) = game.start_time() {
            desc.push_str(SEP);
            desc.push_str(&self.zone.format_start(start));
        }
        if let Some(venue) = game.venue_name() {
            desc.push_str(SEP);
            desc.push_str(venue);
        }
        desc
    }

    /// `"Prev: BOS 4 - NYY 6"`.
    fn describe_previous(&self, game: &GameSnapshot) -> String {
        let (away, home) = self.abbreviations(game);
        let score = |side: &Option<GameTeamSide>| {
            side.as_ref().and_then(|s| s.score).unwrap_or(0)
        };
        format!(
            "Prev: {away} {} - {home} {}",
            score(&game.teams.away),
            score(&game.teams.home)
        )
    }

    // =========================================================================
    // Identity helpers
    // =========================================================================

    fn abbreviations(&self, game: &GameSnapshot) -> (String, String) {
        let abbr = |side: &Option<GameTeamSide>| {
            side.as_ref()
                .map(|s| self.identify(s).abbreviation)
                .unwrap_or_else(|| UNKNOWN_ABBR.to_string())
        };
        (abbr(&game.teams.away), abbr(&game.teams.home))
    }

    /// Abbreviation, name and logo code for a side, preferring the game's
    /// own hydrated team fields over the directory.
    fn identify(&self, side: &GameTeamSide) -> SideIdentity {
        let team_ref = side.team.as_ref();
        let known = team_ref.and_then(|t| self.directory.get(t.id));

        let abbreviation = team_ref
            .and_then(|t| t.abbreviation.clone())
            .or_else(|| known.map(|k| k.abbreviation.clone()))
            .unwrap_or_else(|| UNKNOWN_ABBR.to_string());
        let name = team_ref
            .and_then(|t| t.name.clone())
            .or_else(|| known.map(|k| k.name.clone()))
            .unwrap_or_else(|| abbreviation.clone());
        let code = team_ref
            .and_then(|t| t.file_code.clone())
            .or_else(|| known.map(|k| k.code.clone()))
            .or_else(|| (abbreviation != UNKNOWN_ABBR).then(|| abbreviation.to_lowercase()));

        SideIdentity {
            abbreviation,
            name,
            code,
        }
    }
}

/// Detailed status, falling back to the abstract phase name.
fn status_text(game: &GameSnapshot) -> String {
    game.detailed_state()
        .map(str::to_string)
        .unwrap_or_else(|| game.abstract_state().to_string())
}

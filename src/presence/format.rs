//! Text formatting for presence lines.

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;

use crate::data::models::{GameSnapshot, Linescore, PersonRef};

pub const DEFAULT_BASE_ICON_FILLED: &str = "🟨";
pub const DEFAULT_BASE_ICON_EMPTY: &str = "⬜";

/// Separator between clauses of one presence line.
pub const SEP: &str = " • ";

/// Glyphs for occupied and empty bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseIcons {
    pub filled: String,
    pub empty: String,
}

impl Default for BaseIcons {
    fn default() -> Self {
        Self {
            filled: DEFAULT_BASE_ICON_FILLED.to_string(),
            empty: DEFAULT_BASE_ICON_EMPTY.to_string(),
        }
    }
}

impl BaseIcons {
    /// First, second, third, left to right.
    pub fn render(&self, bases: [bool; 3]) -> String {
        bases
            .iter()
            .map(|&on| if on { self.filled.as_str() } else { self.empty.as_str() })
            .collect()
    }
}

/// Timezone used for start times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayZone {
    Named(Tz),
    Local,
}

impl DisplayZone {
    /// `"Sat 19:05 EDT"`.
    pub fn format_start(&self, dt: DateTime<Utc>) -> String {
        match self {
            Self::Named(tz) => dt.with_timezone(tz).format("%a %H:%M %Z").to_string(),
            Self::Local => dt.with_timezone(&Local).format("%a %H:%M %Z").to_string(),
        }
    }
}

/// `1st`, `2nd`, `3rd`, `4th`, ..., `11th`, `12th`, `13th`, `21st`.
pub fn ordinal(n: u32) -> String {
    let suffix = if (11..=13).contains(&(n % 100)) {
        "th"
    } else {
        match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{n}{suffix}")
}

/// Keep a player's surname (and suffix, for three-plus token names).
pub fn shorten_name(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.len() {
        0 => name.to_string(),
        1 | 2 => parts[parts.len() - 1].to_string(),
        n => parts[n - 2..].join(" "),
    }
}

/// `"0 Outs"`, `"1 Out"`, `"2 Outs"`, `"? Outs"`.
pub fn outs_text(outs: Option<u32>) -> String {
    match outs {
        Some(1) => "1 Out".to_string(),
        Some(n) => format!("{n} Outs"),
        None => "? Outs".to_string(),
    }
}

/// `"Bottom 7th"`, or `"Inning ?"` before the linescore has an inning.
pub fn inning_text(linescore: &Linescore) -> String {
    match linescore.current_inning {
        Some(inning) => {
            let half = linescore.inning_state.as_deref().unwrap_or("").trim();
            if half.is_empty() {
                ordinal(inning)
            } else {
                format!("{half} {}", ordinal(inning))
            }
        }
        None => "Inning ?".to_string(),
    }
}

/// `(game g/total)` counter, or `None` outside a series.
pub fn series_counter(game: &GameSnapshot) -> Option<String> {
    let (number, total) = game.series_position();
    if number == 0 {
        return None;
    }
    if total > 0 {
        Some(format!("(Game {number}/{total})"))
    } else {
        Some(format!("(Game {number})"))
    }
}

fn player_name(game: &GameSnapshot, reference: Option<&PersonRef>) -> Option<String> {
    let reference = reference?;
    if let Some(name) = reference.full_name() {
        return Some(name.to_string());
    }
    let id = reference.id()?;
    game.boxscore.as_ref()?.player_name(id).map(str::to_string)
}

/// The current batter's full name.
pub fn current_batter(game: &GameSnapshot) -> Option<String> {
    let offense = game.linescore.as_ref()?.offense.as_ref()?;
    player_name(game, offense.batter.as_ref())
}

/// The current pitcher's full name.
pub fn current_pitcher(game: &GameSnapshot) -> Option<String> {
    let defense = game.linescore.as_ref()?.defense.as_ref()?;
    player_name(game, defense.pitcher.as_ref())
}

/// The situational line for a live game.
///
/// `"Bottom 7th | Bases 🟨⬜⬜ | 1 Out | Judge batting Crochet (2-1)"`
pub fn live_state_line(game: &GameSnapshot, team_id: u32, icons: &BaseIcons) -> String {
    let empty = Linescore::default();
    let linescore = game.linescore.as_ref().unwrap_or(&empty);

    let bases = linescore
        .offense
        .as_ref()
        .map(|o| o.bases())
        .unwrap_or_default();

    let mut line = format!(
        "{} | Bases {} | {}",
        inning_text(linescore),
        icons.render(bases),
        outs_text(linescore.outs)
    );

    let half = linescore
        .inning_state
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    let mid_inning = half != "top" && half != "bottom";

    let team_on_offense = linescore
        .offense
        .as_ref()
        .and_then(|o| o.team.as_ref())
        .map(|t| t.id == team_id)
        .unwrap_or(false);

    let batter = current_batter(game).map(|n| shorten_name(&n));
    let pitcher = current_pitcher(game).map(|n| shorten_name(&n));

    if batter.is_none() && pitcher.is_none() {
        return line;
    }

    // The tracked team's player leads the clause.
    let (first, second, verb, other_verb) = if team_on_offense {
        (&batter, &pitcher, "batting", "pitching")
    } else {
        (&pitcher, &batter, "pitching", "batting")
    };
    let prefix = if mid_inning { "Next up: " } else { "" };

    match (first, second) {
        (Some(a), Some(b)) => line.push_str(&format!(" | {prefix}{a} {verb} {b}")),
        (Some(a), None) => line.push_str(&format!(" | {prefix}{a} {verb}")),
        (None, Some(b)) => line.push_str(&format!(" | {prefix}{b} {other_verb}")),
        (None, None) => {}
    }

    if !mid_inning && batter.is_some() {
        if let (Some(balls), Some(strikes)) = (linescore.balls, linescore.strikes) {
            line.push_str(&format!(" ({balls}-{strikes})"));
        }
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(112), "112th");
    }

    #[test]
    fn test_shorten_name() {
        assert_eq!(shorten_name("Aaron Judge"), "Judge");
        assert_eq!(shorten_name("Vladimir Guerrero Jr."), "Guerrero Jr.");
        assert_eq!(shorten_name("Ichiro"), "Ichiro");
        assert_eq!(shorten_name(""), "");
    }

    #[test]
    fn test_outs_noun() {
        assert_eq!(outs_text(Some(0)), "0 Outs");
        assert_eq!(outs_text(Some(1)), "1 Out");
        assert_eq!(outs_text(Some(2)), "2 Outs");
        assert_eq!(outs_text(None), "? Outs");
    }

    #[test]
    fn test_inning_text() {
        let ls = Linescore {
            current_inning: Some(7),
            inning_state: Some("Middle".into()),
            ..Default::default()
        };
        assert_eq!(inning_text(&ls), "Middle 7th");
        assert_eq!(inning_text(&Linescore::default()), "Inning ?");
    }

    #[test]
    fn test_base_icons() {
        let icons = BaseIcons {
            filled: "X".into(),
            empty: "o".into(),
        };
        assert_eq!(icons.render([true, false, true]), "XoX");
        assert_eq!(BaseIcons::default().render([false; 3]), "⬜⬜⬜");
    }

    #[test]
    fn test_named_zone_start_time() {
        let dt = Utc.with_ymd_and_hms(2024, 7, 14, 23, 5, 0).unwrap();
        let zone = DisplayZone::Named(chrono_tz::America::New_York);
        assert_eq!(zone.format_start(dt), "Sun 19:05 EDT");
    }
}

use crate::models::{AchievementSummary, OwnedGame};

/// 2020-01-01T00:00:00Z. Games last played before this are considered stale.
pub const FILTER_CUTOFF_TS: i64 = 1_577_836_800;

const MIN_PLAYED_HOURS: f64 = 0.1;
const STALE_MAX_HOURS: f64 = 6.0;

/// Returns `false` for games not worth a database entry.
///
/// A game is dropped when it has no achievements and was either barely
/// played, or last played before [`FILTER_CUTOFF_TS`] for under six hours.
/// Hours are compared unrounded, so five minutes (0.08 h) counts as barely played.
pub fn is_worth_recording(game: &OwnedGame, achievements: &AchievementSummary) -> bool {
    let hours = game.playtime_forever as f64 / 60.0;
    let no_achievements = achievements.total < 1;

    let barely_played = hours < MIN_PLAYED_HOURS && no_achievements;
    let stale = game.last_played() < FILTER_CUTOFF_TS && no_achievements && hours < STALE_MAX_HOURS;

    !(barely_played || stale)
}

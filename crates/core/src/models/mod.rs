//! Shared domain models.

use chrono::{DateTime, Utc};
use serde::Deserialize;

const STORE_URL_BASE: &str = "https://store.steampowered.com/app";
const COVER_URL_BASE: &str = "https://steamcdn-a.akamaihd.net/steam/apps";
const ICON_URL_BASE: &str = "https://media.steampowered.com/steamcommunity/public/images/apps";

/// A title in the user's Steam library, as reported by `GetOwnedGames`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OwnedGame {
    /// Steam application id.
    pub appid: u32,
    /// Display name. Only present when app info was requested.
    #[serde(default)]
    pub name: String,
    /// Total playtime in minutes.
    #[serde(default)]
    pub playtime_forever: i64,
    /// Unix timestamp of the last session, if Steam recorded one.
    #[serde(default)]
    pub rtime_last_played: Option<i64>,
    /// Icon hash used to build the icon image URL.
    #[serde(default)]
    pub img_icon_url: String,
}

impl OwnedGame {
    /// Last-played timestamp, `0` when Steam never recorded one.
    pub fn last_played(&self) -> i64 {
        self.rtime_last_played.unwrap_or(0)
    }

    /// Playtime converted to hours and rounded to one decimal.
    pub fn playtime_hours(&self) -> f64 {
        playtime_hours(self.playtime_forever)
    }

    /// Store page for this app.
    pub fn store_url(&self) -> String {
        format!("{STORE_URL_BASE}/{}", self.appid)
    }

    /// Header image used as the page cover.
    pub fn cover_url(&self) -> String {
        format!("{COVER_URL_BASE}/{}/header.jpg", self.appid)
    }

    /// Community icon used as the page icon.
    pub fn icon_url(&self) -> String {
        format!("{ICON_URL_BASE}/{}/{}.jpg", self.appid, self.img_icon_url)
    }
}

/// Achievement counts for a single game.
///
/// A `total` of `-1` means Steam had no usable achievement data for the game,
/// while `0` means the query succeeded but listed no achievements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementSummary {
    /// Number of achievements defined for the game.
    pub total: i64,
    /// Number of achievements the user has unlocked.
    pub achieved: i64,
}

impl AchievementSummary {
    /// Sentinel used when achievement data is unavailable.
    pub const UNKNOWN: Self = Self {
        total: -1,
        achieved: -1,
    };

    /// Build a summary from explicit counts.
    pub fn new(total: i64, achieved: i64) -> Self {
        Self { total, achieved }
    }

    /// Returns `true` when the counts are the unavailable sentinel.
    pub fn is_unknown(&self) -> bool {
        self.total < 0
    }

    /// Completion percentage rounded to one decimal, `-1.0` when there is nothing to complete.
    pub fn completion_percent(&self) -> f64 {
        if self.total > 0 {
            round_tenth(self.achieved as f64 / self.total as f64 * 100.0)
        } else {
            -1.0
        }
    }
}

/// The projection of a game written to the Notion database.
#[derive(Debug, Clone, PartialEq)]
pub struct NotionGameRecord {
    /// Title property; also the lookup key.
    pub name: String,
    /// Playtime in hours, one decimal.
    pub playtime_hours: f64,
    /// Last-played day formatted as `YYYY-MM-DD` (UTC).
    pub last_play_date: String,
    /// Steam store page.
    pub store_url: String,
    /// External cover image.
    pub cover_url: String,
    /// External icon image.
    pub icon_url: String,
    /// Completion percentage or `-1`.
    pub completion_percent: f64,
    /// Total achievements, `-1` when unknown.
    pub total_achievements: i64,
    /// Achieved achievements, `-1` when unknown.
    pub achieved_achievements: i64,
}

impl NotionGameRecord {
    /// Derive the record for a game and its achievement counts.
    pub fn from_game(game: &OwnedGame, achievements: &AchievementSummary) -> Self {
        Self {
            name: game.name.clone(),
            playtime_hours: game.playtime_hours(),
            last_play_date: format_play_date(game.last_played()),
            store_url: game.store_url(),
            cover_url: game.cover_url(),
            icon_url: game.icon_url(),
            completion_percent: achievements.completion_percent(),
            total_achievements: achievements.total,
            achieved_achievements: achievements.achieved,
        }
    }
}

/// Convert minutes into hours rounded to one decimal.
pub fn playtime_hours(minutes: i64) -> f64 {
    round_tenth(minutes as f64 / 60.0)
}

/// Round half away from zero to one decimal place.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Format a unix timestamp as a UTC calendar day.
pub fn format_play_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_life() -> OwnedGame {
        OwnedGame {
            appid: 70,
            name: "Half-Life".to_string(),
            playtime_forever: 125,
            rtime_last_played: Some(1_700_000_000),
            img_icon_url: "95be6d131fc61f145797317ca437c9765f24b41c".to_string(),
        }
    }

    #[test]
    fn playtime_rounds_to_one_decimal() {
        assert_eq!(playtime_hours(0), 0.0);
        assert_eq!(playtime_hours(59), 1.0);
        assert_eq!(playtime_hours(60), 1.0);
        assert_eq!(playtime_hours(125), 2.1);
        assert_eq!(playtime_hours(5), 0.1);
        assert_eq!(playtime_hours(2), 0.0);
    }

    #[test]
    fn completion_uses_sentinel_without_achievements() {
        assert_eq!(AchievementSummary::new(0, 0).completion_percent(), -1.0);
        assert_eq!(AchievementSummary::UNKNOWN.completion_percent(), -1.0);
        assert_eq!(AchievementSummary::new(3, 1).completion_percent(), 33.3);
        assert_eq!(AchievementSummary::new(10, 5).completion_percent(), 50.0);
    }

    #[test]
    fn missing_last_played_decodes_to_zero() {
        let game: OwnedGame = serde_json::from_str(
            r#"{"appid": 220, "name": "Half-Life 2", "playtime_forever": 30, "img_icon_url": "abc"}"#,
        )
        .expect("owned game");
        assert_eq!(game.rtime_last_played, None);
        assert_eq!(game.last_played(), 0);
        assert_eq!(format_play_date(game.last_played()), "1970-01-01");
    }

    #[test]
    fn record_derives_urls_and_dates() {
        let record = NotionGameRecord::from_game(&half_life(), &AchievementSummary::new(0, 0));
        assert_eq!(record.name, "Half-Life");
        assert_eq!(record.playtime_hours, 2.1);
        assert_eq!(record.last_play_date, "2023-11-14");
        assert_eq!(record.store_url, "https://store.steampowered.com/app/70");
        assert_eq!(
            record.cover_url,
            "https://steamcdn-a.akamaihd.net/steam/apps/70/header.jpg"
        );
        assert_eq!(
            record.icon_url,
            "https://media.steampowered.com/steamcommunity/public/images/apps/70/95be6d131fc61f145797317ca437c9765f24b41c.jpg"
        );
        assert_eq!(record.completion_percent, -1.0);
        assert_eq!(record.total_achievements, 0);
    }
}

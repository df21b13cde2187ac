use std::fmt;

use tracing::{debug, error, info};

use super::filter::is_worth_recording;
use crate::{
    config::AppConfig,
    error::SyncError,
    gateway::{ExistingPage, NotionGateway, SteamGateway},
    models::{NotionGameRecord, OwnedGame},
};

/// Terminal result of reconciling one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// A new page was written.
    Created,
    /// An existing page was rewritten with new playtime.
    Updated,
    /// The filter judged the game not worth recording.
    SkippedFiltered,
    /// A page exists and updates are disabled.
    SkippedExisting,
    /// A page exists with the same playtime.
    SkippedUnchanged,
    /// The name lookup failed, so nothing was written.
    SkippedLookupFailed,
    /// The create or update call failed.
    WriteFailed,
}

/// What to do with a game once its page lookup is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No page exists yet.
    Create,
    /// Rewrite the page with this id.
    Update {
        /// Page to patch.
        page_id: String,
    },
    /// Leave the existing page alone because updates are off.
    SkipExisting,
    /// Leave the existing page alone because nothing changed.
    SkipUnchanged,
}

/// Choose create, update or skip for `record` given the page found by name.
///
/// A page without a stored playtime is treated as changed.
pub fn decide(
    record: &NotionGameRecord,
    existing: Option<&ExistingPage>,
    update_enabled: bool,
) -> Decision {
    match existing {
        None => Decision::Create,
        Some(_) if !update_enabled => Decision::SkipExisting,
        Some(page) if page.playtime_hours == Some(record.playtime_hours) => Decision::SkipUnchanged,
        Some(page) => Decision::Update {
            page_id: page.id.clone(),
        },
    }
}

/// Behaviour switches for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Drop games that fail [`is_worth_recording`].
    pub enable_filter: bool,
    /// Rewrite existing pages whose playtime changed.
    pub enable_item_update: bool,
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            enable_filter: config.enable_filter,
            enable_item_update: config.enable_item_update,
        }
    }
}

/// Per-outcome tally for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Pages created.
    pub created: usize,
    /// Pages updated.
    pub updated: usize,
    /// Games dropped by the filter.
    pub skipped_filtered: usize,
    /// Games left alone because updates are off.
    pub skipped_existing: usize,
    /// Games left alone because nothing changed.
    pub skipped_unchanged: usize,
    /// Games skipped after a failed lookup.
    pub skipped_lookup_failed: usize,
    /// Failed writes.
    pub write_failed: usize,
}

impl RunReport {
    /// Count one outcome.
    pub fn record(&mut self, outcome: Outcome) {
        let slot = match outcome {
            Outcome::Created => &mut self.created,
            Outcome::Updated => &mut self.updated,
            Outcome::SkippedFiltered => &mut self.skipped_filtered,
            Outcome::SkippedExisting => &mut self.skipped_existing,
            Outcome::SkippedUnchanged => &mut self.skipped_unchanged,
            Outcome::SkippedLookupFailed => &mut self.skipped_lookup_failed,
            Outcome::WriteFailed => &mut self.write_failed,
        };
        *slot += 1;
    }

    /// Games processed.
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.skipped_filtered
            + self.skipped_existing
            + self.skipped_unchanged
            + self.skipped_lookup_failed
            + self.write_failed
    }

    /// Successful writes to Notion.
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }

    /// Games that hit a remote failure.
    pub fn failures(&self) -> usize {
        self.skipped_lookup_failed + self.write_failed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} games: {} created, {} updated, {} unchanged, {} existing, {} filtered, {} lookup failures, {} write failures",
            self.total(),
            self.created,
            self.updated,
            self.skipped_unchanged,
            self.skipped_existing,
            self.skipped_filtered,
            self.skipped_lookup_failed,
            self.write_failed
        )
    }
}

/// Drives Steam → Notion reconciliation, one game at a time.
pub struct Reconciler {
    steam: SteamGateway,
    notion: NotionGateway,
    options: SyncOptions,
}

impl Reconciler {
    /// Build both gateways from configuration. Requires a database id.
    pub fn new(config: &AppConfig) -> Result<Self, SyncError> {
        config.database_id()?;
        Ok(Self::from_parts(
            SteamGateway::new(config)?,
            NotionGateway::new(config)?,
            SyncOptions::from(config),
        ))
    }

    /// Assemble from already-built gateways.
    pub fn from_parts(steam: SteamGateway, notion: NotionGateway, options: SyncOptions) -> Self {
        Self {
            steam,
            notion,
            options,
        }
    }

    /// Reconcile the whole library.
    ///
    /// Only a failure to list owned games is returned as an error; per-game
    /// failures are logged and counted in the report.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let games = self.steam.fetch_owned_games().await?;

        let mut report = RunReport::default();
        for game in &games {
            report.record(self.process_game(game).await);
        }

        info!(%report, "sync finished");
        Ok(report)
    }

    /// Fetch, filter, look up, decide and apply for a single game.
    pub async fn process_game(&self, game: &OwnedGame) -> Outcome {
        let achievements = self.steam.achievement_summary(game).await;
        if achievements.is_unknown() {
            debug!(game = %game.name, "achievement counts unavailable, recording -1");
        }
        if game.rtime_last_played.is_none() {
            info!(game = %game.name, "no last play time, using 0");
        }

        if self.options.enable_filter && !is_worth_recording(game, &achievements) {
            info!(game = %game.name, "does not meet filter rule, skipping");
            return Outcome::SkippedFiltered;
        }

        let existing = match self.notion.find_page_by_exact_name(&game.name).await {
            Ok(existing) => existing,
            Err(err) => {
                error!(game = %game.name, error = %err, "database query failed, skipping");
                return Outcome::SkippedLookupFailed;
            }
        };

        let record = NotionGameRecord::from_game(game, &achievements);
        match decide(&record, existing.as_ref(), self.options.enable_item_update) {
            Decision::Create => {
                info!(game = %game.name, "not in database, creating");
                match self.notion.create_page(&record).await {
                    Ok(_) => Outcome::Created,
                    Err(err) => {
                        error!(game = %game.name, error = %err, "create failed");
                        Outcome::WriteFailed
                    }
                }
            }
            Decision::Update { page_id } => {
                info!(game = %game.name, playtime = record.playtime_hours, "playtime changed, updating");
                match self.notion.update_page(&page_id, &record).await {
                    Ok(_) => Outcome::Updated,
                    Err(err) => {
                        error!(game = %game.name, error = %err, "update failed");
                        Outcome::WriteFailed
                    }
                }
            }
            Decision::SkipExisting => {
                info!(game = %game.name, "already exists, skipping");
                Outcome::SkippedExisting
            }
            Decision::SkipUnchanged => {
                info!(game = %game.name, "already up to date, skipping");
                Outcome::SkippedUnchanged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AchievementSummary;

    fn record(minutes: i64) -> NotionGameRecord {
        let game = OwnedGame {
            appid: 620,
            name: "Portal 2".to_string(),
            playtime_forever: minutes,
            rtime_last_played: Some(1_700_000_000),
            img_icon_url: String::new(),
        };
        NotionGameRecord::from_game(&game, &AchievementSummary::new(51, 20))
    }

    fn page(playtime: Option<f64>) -> ExistingPage {
        ExistingPage {
            id: "page-1".to_string(),
            playtime_hours: playtime,
        }
    }

    #[test]
    fn missing_page_is_created() {
        assert_eq!(decide(&record(125), None, false), Decision::Create);
        assert_eq!(decide(&record(125), None, true), Decision::Create);
    }

    #[test]
    fn existing_page_is_left_alone_when_updates_are_off() {
        assert_eq!(
            decide(&record(125), Some(&page(Some(1.0))), false),
            Decision::SkipExisting
        );
    }

    #[test]
    fn equal_playtime_is_unchanged() {
        assert_eq!(
            decide(&record(125), Some(&page(Some(2.1))), true),
            Decision::SkipUnchanged
        );
    }

    #[test]
    fn different_or_missing_playtime_is_updated() {
        let update = Decision::Update {
            page_id: "page-1".to_string(),
        };
        assert_eq!(decide(&record(130), Some(&page(Some(2.1))), true), update);
        assert_eq!(decide(&record(130), Some(&page(None)), true), update);
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut report = RunReport::default();
        for outcome in [
            Outcome::Created,
            Outcome::Created,
            Outcome::Updated,
            Outcome::SkippedUnchanged,
            Outcome::SkippedFiltered,
            Outcome::SkippedLookupFailed,
            Outcome::WriteFailed,
        ] {
            report.record(outcome);
        }

        assert_eq!(report.total(), 7);
        assert_eq!(report.writes(), 3);
        assert_eq!(report.failures(), 2);
        assert_eq!(
            report.to_string(),
            "7 games: 2 created, 1 updated, 1 unchanged, 0 existing, 1 filtered, 1 lookup failures, 1 write failures"
        );
    }
}

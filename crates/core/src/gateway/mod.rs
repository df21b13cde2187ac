//! Remote services the sync reads from and writes to.

/// Notion database pages.
pub mod notion;
/// Steam Web API library and achievement queries.
pub mod steam;

pub use notion::{DatabaseRef, ExistingPage, NotionGateway, PageRef};
pub use steam::{summarize_achievements, PlayerAchievements, SteamGateway};

use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::error::SyncError;

/// Read a successful response body and decode it as JSON.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, SyncError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| SyncError::decode(service, err.without_url().to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| SyncError::decode(service, err.to_string()))
}

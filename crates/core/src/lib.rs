#![warn(clippy::all, missing_docs)]

//! Core logic for mirroring a Steam library into a Notion database.
//!
//! This crate hosts the data models, configuration handling, the retrying
//! HTTP client, the Steam and Notion gateways, and the reconciliation
//! engine used by the command-line frontend.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod models;
pub mod reconcile;

pub use crate::config::AppConfig;
pub use error::{ConfigError, HttpError, SyncError};
pub use gateway::{NotionGateway, SteamGateway};
pub use models::{AchievementSummary, NotionGameRecord, OwnedGame};
pub use reconcile::{Outcome, Reconciler, RunReport};

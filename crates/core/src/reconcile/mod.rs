//! Per-game reconciliation of the Steam library against the Notion database.

/// Orchestration, decisions and run reporting.
pub mod engine;
/// The "not worth recording" predicate.
pub mod filter;

pub use engine::{decide, Decision, Outcome, Reconciler, RunReport, SyncOptions};
pub use filter::{is_worth_recording, FILTER_CUTOFF_TS};

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use steam2notion_core::{ConfigError, SyncError};

/// Exit status for a missing or invalid configuration.
pub const EXIT_CONFIG: u8 = 2;
/// Exit status for any other fatal failure.
pub const EXIT_FAILURE: u8 = 1;

/// Mirror a Steam library into a Notion database.
#[derive(Debug, Parser)]
#[command(name = "steam2notion", version, about)]
pub struct Cli {
    /// Config file to read instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to do once configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create or update one page per owned game (default).
    Sync,
    /// Create the games database under a page, or print the existing one.
    InitDatabase {
        /// Notion page that will contain the database.
        #[arg(long, value_name = "PAGE_ID")]
        parent_page: String,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Sync)
    }
}

/// Map a fatal error to the process exit status.
pub fn exit_status_for(err: &anyhow::Error) -> u8 {
    let is_config = err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || matches!(cause.downcast_ref::<SyncError>(), Some(SyncError::Config(_)))
    });
    if is_config {
        EXIT_CONFIG
    } else {
        EXIT_FAILURE
    }
}

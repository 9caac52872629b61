//! Clap CLI definitions for Hippo.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1;36mExamples:\x1b[0m
  hippo consolidate             Summarize new session log entries into memory
  hippo reflect                 Preview what consolidation would store
  hippo compact --dry-run       Show duplicate/superseded/related decisions
  hippo tag --all               Extract entity tags for under-tagged records
  hippo predict -o PRELOAD.md   Write the next-session briefing
  hippo recall \"postgres\"       Ranked search over active memories
  hippo status                  Store counts, cursors and open threads

\x1b[1;36mEnvironment:\x1b[0m
  HIPPO_HOME   Data directory (default ~/.hippo)
  RUST_LOG     Log filter (default info)";

/// Hippo: long-term memory consolidation for assistant sessions.
#[derive(Parser)]
#[command(
    name = "hippo",
    version,
    about = "Hippo: memory consolidation engine",
    after_help = AFTER_HELP,
)]
pub struct Cli {
    /// Path to config file (default ~/.hippo/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the memory database, overriding the config.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consolidate unprocessed session log entries into session-summary records.
    Consolidate {
        /// Show the extracted deltas without storing anything.
        #[arg(long)]
        dry_run: bool,
        /// Session log to read, overriding the config.
        #[arg(long)]
        session_log: Option<PathBuf>,
    },
    /// Dry-run consolidation: show what would be stored.
    Reflect {
        /// Session log to read, overriding the config.
        #[arg(long)]
        session_log: Option<PathBuf>,
    },
    /// Deduplicate and link overlapping records.
    Compact {
        /// Report decisions without changing the store.
        #[arg(long)]
        dry_run: bool,
        /// Jaccard overlap threshold for classification (0-1).
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Extract entity tags for one record or every under-tagged record.
    Tag {
        /// Record id (or unique id prefix).
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        id: Option<String>,
        /// Tag every active record below the tag threshold.
        #[arg(long)]
        all: bool,
    },
    /// Build the pre-session briefing.
    Predict {
        /// Write the markdown briefing to this file instead of stdout.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Ranked retrieval over active records.
    Recall {
        /// Query text.
        query: String,
        /// Maximum results.
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show store counts, cursors and open threads.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts.
    Completion {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tag_requires_target() {
        assert!(Cli::try_parse_from(["hippo", "tag"]).is_err());
        assert!(Cli::try_parse_from(["hippo", "tag", "--id", "ab", "--all"]).is_err());
        assert!(Cli::try_parse_from(["hippo", "tag", "--all"]).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["hippo", "compact", "--dry-run", "--db", "/tmp/m.db"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/m.db")));
        assert!(matches!(cli.command, Commands::Compact { dry_run: true, threshold: None }));
    }
}

//! Hippo CLI: consolidate, compact, tag and brief from a local memory store.
//!
//! Every command boots the kernel in-process against the configured SQLite
//! database. Logs go to stderr so stdout stays clean for markdown and JSON.

mod cli;
mod cmd;
mod table;
mod ui;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use cmd::GlobalOpts;
use hippo_kernel::KernelError;
use hippo_types::error::HippoError;

fn init_tracing_stderr(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing_stderr(cli.json_logs);
    let opts = GlobalOpts::from_cli(&cli);

    let result = match cli.command {
        Commands::Consolidate {
            dry_run,
            session_log,
        } => cmd::consolidate::cmd_consolidate(&opts, dry_run, session_log),
        Commands::Reflect { session_log } => {
            cmd::consolidate::cmd_consolidate(&opts, true, session_log)
        }
        Commands::Compact { dry_run, threshold } => {
            cmd::compact::cmd_compact(&opts, dry_run, threshold)
        }
        Commands::Tag { id, all } => cmd::tag::cmd_tag(&opts, id, all),
        Commands::Predict { output } => cmd::predict::cmd_predict(&opts, output),
        Commands::Recall { query, limit, json } => {
            cmd::recall::cmd_recall(&opts, &query, limit, json)
        }
        Commands::Status { json } => cmd::status::cmd_status(&opts, json),
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "hippo", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
}

fn report_error(err: &anyhow::Error) {
    let hippo = err.downcast_ref::<HippoError>().or_else(|| {
        err.downcast_ref::<KernelError>().and_then(|k| match k {
            KernelError::Hippo(h) => Some(h),
            KernelError::BootFailed(_) => None,
        })
    });

    match hippo {
        Some(HippoError::ConfigInvalid(msg)) => ui::error_with_fix(
            &format!("Invalid configuration: {msg}"),
            "Check ~/.hippo/config.toml or the file passed with --config",
        ),
        Some(HippoError::StorageBusy { .. }) => ui::error_with_fix(
            &err.to_string(),
            "Another hippo process may hold the database; retry when it finishes",
        ),
        Some(HippoError::StorageCorrupt(msg)) => ui::error_with_fix(
            &format!("Memory database is unreadable: {msg}"),
            "Restore the database from a backup or point --db at a fresh file",
        ),
        Some(HippoError::NotFound(what)) => ui::error_with_fix(
            &format!("No record matches '{what}'"),
            "List candidates with `hippo recall <query>`",
        ),
        Some(HippoError::InferenceUnavailable(msg)) => ui::error_with_fix(
            &format!("Inference backend unavailable: {msg}"),
            "Start the local model server or set [inference] in config.toml",
        ),
        _ => match err.downcast_ref::<KernelError>() {
            Some(KernelError::BootFailed(msg)) => ui::error_with_fix(
                &format!("Failed to open the memory store: {msg}"),
                "Check that the data directory is writable, or pass --db",
            ),
            _ => ui::error_with_fix(&format!("{err:#}"), "Run with RUST_LOG=debug for details"),
        },
    }
}

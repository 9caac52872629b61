//! Command implementations.
//!
//! Each command boots an in-process kernel, runs one engine on a fresh Tokio
//! runtime, and prints a human summary (or JSON where offered).

pub mod compact;
pub mod consolidate;
pub mod predict;
pub mod recall;
pub mod status;
pub mod tag;

use crate::cli::Cli;
use crate::ui;
use anyhow::Context;
use hippo_kernel::config::load_config;
use hippo_kernel::{CancelFlag, HippoKernel};
use std::path::PathBuf;
use tokio::runtime::Runtime;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            db: cli.db.clone(),
        }
    }
}

/// Load config, apply flag overrides and boot the kernel.
pub fn boot(opts: &GlobalOpts) -> anyhow::Result<HippoKernel> {
    let mut config = load_config(opts.config.as_deref())?;
    if let Some(db) = &opts.db {
        config.db_path = Some(db.clone());
    }
    Ok(HippoKernel::boot(config)?)
}

pub fn runtime() -> anyhow::Result<Runtime> {
    Runtime::new().context("failed to start the async runtime")
}

/// First Ctrl+C requests cooperative cancellation; a second one aborts.
pub fn watch_ctrl_c(rt: &Runtime, cancel: CancelFlag) {
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        cancel.cancel();
        ui::warn_with_fix(
            "Interrupted: finishing the current unit, progress is saved",
            "press Ctrl+C again to abort immediately",
        );
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

/// Warn when nothing can answer inference calls.
pub fn warn_if_offline(kernel: &HippoKernel) {
    if kernel.backend_name() == "offline" {
        ui::warn_with_fix(
            "No inference backend is available; inference steps will be skipped",
            "set [inference] server_url or install a command backend (see config.toml)",
        );
    }
}

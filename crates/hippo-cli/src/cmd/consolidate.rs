//! `hippo consolidate` and `hippo reflect`.

use super::{boot, runtime, warn_if_offline, watch_ctrl_c, GlobalOpts};
use crate::ui;
use chrono::Utc;
use hippo_kernel::ConsolidationReport;
use hippo_runtime::SessionSource;
use std::path::PathBuf;

pub fn cmd_consolidate(
    opts: &GlobalOpts,
    dry_run: bool,
    session_log: Option<PathBuf>,
) -> anyhow::Result<()> {
    let kernel = boot(opts)?;
    warn_if_offline(&kernel);
    let log = kernel.session_log(session_log.as_deref())?;
    let log_path = log
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let rt = runtime()?;
    watch_ctrl_c(&rt, kernel.cancel_flag());
    let report = rt.block_on(kernel.consolidator().run(&log, dry_run, Utc::now()))?;

    ui::section(if dry_run {
        "Reflection (dry run)"
    } else {
        "Consolidation"
    });
    ui::kv("Session log", &log_path);
    ui::kv(
        "Cursor",
        &format!(
            "{} -> {} of {}",
            report.cursor_before,
            report.cursor_after,
            log.len()
        ),
    );
    print_entries(&report);
    ui::blank();
    ui::batch_summary(&report.batch);
    if report.cursor_after < log.len() && !report.batch.cancelled {
        ui::hint("more entries remain; run consolidate again");
    }
    Ok(())
}

fn print_entries(report: &ConsolidationReport) {
    for entry in &report.entries {
        ui::blank();
        let title = match &entry.record_id {
            Some(id) => format!("{} [{}]", entry.heading, id.short()),
            None => entry.heading.clone(),
        };
        ui::section(&title);
        ui::kv("Summary", &entry.delta.summary);
        if !entry.delta.entities.all.is_empty() {
            ui::kv("Entities", &entry.delta.entities.all.join(", "));
        }
        if !entry.delta.security_flags.is_empty() {
            ui::kv_warn("Security", &entry.delta.security_flags.join(", "));
        }
        if !entry.delta.emotional_signals.is_empty() {
            ui::kv("Signals", &entry.delta.emotional_signals.join(", "));
        }
        for thread in &entry.delta.open_threads {
            ui::item(thread);
        }
    }
}

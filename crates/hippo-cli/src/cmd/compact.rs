//! `hippo compact`.

use super::{boot, runtime, warn_if_offline, watch_ctrl_c, GlobalOpts};
use crate::table::Table;
use crate::ui;
use chrono::Utc;
use hippo_kernel::{ActionOutcome, CompactionAction};

pub fn cmd_compact(opts: &GlobalOpts, dry_run: bool, threshold: Option<f64>) -> anyhow::Result<()> {
    let kernel = boot(opts)?;
    warn_if_offline(&kernel);
    let rt = runtime()?;
    watch_ctrl_c(&rt, kernel.cancel_flag());
    let report = rt.block_on(kernel.compactor().run(dry_run, threshold, Utc::now()))?;

    ui::section(if dry_run {
        "Compaction (dry run)"
    } else {
        "Compaction"
    });
    ui::kv("Pairs compared", &report.compared.to_string());
    ui::kv("Candidates", &report.candidates.to_string());
    if report.windowed {
        ui::kv("Scope", "records changed since the last run");
    }
    if report.deferred > 0 {
        ui::kv_warn("Deferred", &format!("{} pairs over the per-run limit", report.deferred));
    }
    if report.pending > 0 && !dry_run {
        ui::kv_warn("Pending", &format!("{} pairs queued for the next run", report.pending));
    }

    let mut table = Table::new(&["Pair", "Overlap", "Relationship", "Action"])
        .right(1)
        .max_width(3, 60);
    for action in &report.actions {
        let pair = format!("{} ~ {}", action.a.short(), action.b.short());
        let relationship = if action.malformed {
            format!("{} (unreadable)", action.relationship)
        } else {
            action.relationship.to_string()
        };
        table.add_row(&[
            &pair,
            &format!("{:.2}", action.similarity),
            &relationship,
            &describe(action),
        ]);
    }
    if !table.is_empty() {
        ui::blank();
        table.print();
    }
    ui::blank();
    ui::batch_summary(&report.batch);
    Ok(())
}

fn describe(action: &CompactionAction) -> String {
    match &action.outcome {
        ActionOutcome::Merge { survivor, retired } => {
            format!("keep {}, merge {}", survivor.short(), retired.short())
        }
        ActionOutcome::Supersede { newer, older } => {
            format!("{} supersedes {}", newer.short(), older.short())
        }
        ActionOutcome::Relate { from, to } => format!("link {} -> {}", from.short(), to.short()),
        ActionOutcome::MergeInto { new_id, sources } => format!(
            "merge {} into new {}",
            sources
                .iter()
                .map(|s| s.short().to_string())
                .collect::<Vec<_>>()
                .join(" + "),
            new_id.short()
        ),
        ActionOutcome::Keep => "keep both".to_string(),
    }
}

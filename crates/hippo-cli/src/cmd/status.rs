//! `hippo status`.

use super::{boot, GlobalOpts};
use crate::ui;

pub fn cmd_status(opts: &GlobalOpts, json: bool) -> anyhow::Result<()> {
    let kernel = boot(opts)?;
    let status = kernel.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let stats = &status.stats;
    ui::section("Hippo Status");
    ui::blank();
    ui::kv("Database", &status.db_path.display().to_string());
    if let Some(bytes) = stats.db_size_bytes {
        ui::kv("Size", &format!("{:.1} KiB", bytes as f64 / 1024.0));
    }
    if status.backend == "offline" {
        ui::kv_warn("Backend", &status.backend);
    } else {
        ui::kv_ok("Backend", &status.backend);
    }
    ui::kv(
        "Records",
        &format!("{} active / {} total", stats.active(), stats.total),
    );
    for (state, count) in &stats.by_status {
        ui::item(&format!("{state}: {count}"));
    }
    ui::kv("Edges", &stats.edges.to_string());
    for (kind, count) in &stats.edges_by_kind {
        ui::item(&format!("{kind}: {count}"));
    }
    ui::kv("Visited pairs", &stats.visited_pairs.to_string());
    ui::kv(
        "Sessions",
        &format!(
            "{} of {} consolidated ({})",
            status.session_cursor,
            status.session_entries,
            status.session_log.display()
        ),
    );
    ui::kv(
        "Last compaction",
        status.last_compaction.as_deref().unwrap_or("never"),
    );

    if !stats.by_category.is_empty() {
        ui::blank();
        ui::section("Active by category");
        for (category, count) in &stats.by_category {
            ui::item(&format!("{category}: {count}"));
        }
    }
    if !status.open_threads.is_empty() {
        ui::blank();
        ui::section("Open threads (latest session)");
        for thread in &status.open_threads {
            ui::item(thread);
        }
    }
    Ok(())
}

//! `hippo predict`.

use super::{boot, runtime, GlobalOpts};
use crate::ui;
use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;

pub fn cmd_predict(opts: &GlobalOpts, output: Option<PathBuf>) -> anyhow::Result<()> {
    let kernel = boot(opts)?;
    let rt = runtime()?;
    let briefing = rt.block_on(kernel.predictor().predict(Utc::now()))?;
    let markdown = briefing.render_markdown();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(&path, &markdown)
                .with_context(|| format!("writing {}", path.display()))?;
            ui::success(&format!("Briefing written to {}", path.display()));
            ui::kv("Open threads", &briefing.open_threads.len().to_string());
            ui::kv("People", &briefing.people.len().to_string());
            if briefing.empty {
                ui::hint("no session summaries yet; run `hippo consolidate` first");
            } else if !briefing.generated_prose {
                ui::hint("inference unavailable; prose sections use the latest summary");
            }
        }
        None => print!("{markdown}"),
    }
    Ok(())
}

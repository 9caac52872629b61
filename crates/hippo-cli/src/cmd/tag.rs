//! `hippo tag`.

use super::{boot, runtime, warn_if_offline, watch_ctrl_c, GlobalOpts};
use crate::ui;
use hippo_kernel::HippoKernel;
use hippo_types::error::HippoError;
use hippo_types::record::RecordId;

pub fn cmd_tag(opts: &GlobalOpts, id: Option<String>, all: bool) -> anyhow::Result<()> {
    let kernel = boot(opts)?;
    warn_if_offline(&kernel);
    let rt = runtime()?;
    watch_ctrl_c(&rt, kernel.cancel_flag());
    let tagger = kernel.tagger();

    match (id, all) {
        (Some(prefix), _) => {
            let id = resolve_id(&kernel, &prefix)?;
            let outcome = rt.block_on(tagger.tag_one(&id))?;
            ui::section(&format!("Tagged {}", id.short()));
            ui::kv("Added", &outcome.added.join(", "));
            ui::kv("Tags", &outcome.tags.join(", "));
        }
        (None, _) => {
            let report = rt.block_on(tagger.tag_all())?;
            ui::section("Batch tagging");
            for outcome in report.outcomes.iter().filter(|o| !o.added.is_empty()) {
                ui::item(&format!("{}  +{}", outcome.id.short(), outcome.added.join(", +")));
            }
            ui::blank();
            ui::batch_summary(&report.batch);
        }
    }
    Ok(())
}

/// Accept a full id or a unique prefix of one.
fn resolve_id(kernel: &HippoKernel, prefix: &str) -> anyhow::Result<RecordId> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        anyhow::bail!("record id must not be empty");
    }
    let matches: Vec<RecordId> = kernel
        .store()
        .get_all(true)?
        .into_iter()
        .map(|r| r.id)
        .filter(|id| id.as_str().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.clone()),
        [] => Err(HippoError::NotFound(prefix).into()),
        many => anyhow::bail!("id prefix '{prefix}' matches {} records", many.len()),
    }
}

//! `hippo recall`.

use super::{boot, GlobalOpts};
use crate::table::Table;
use crate::ui;
use chrono::Utc;

pub fn cmd_recall(opts: &GlobalOpts, query: &str, limit: usize, json: bool) -> anyhow::Result<()> {
    let kernel = boot(opts)?;
    let hits = kernel.retriever().recall(query, None, limit, Utc::now())?;

    if json {
        let items: Vec<serde_json::Value> = hits
            .iter()
            .map(|h| {
                serde_json::json!({
                    "id": h.record.id,
                    "score": h.score,
                    "similarity": h.similarity,
                    "category": h.record.category,
                    "tags": h.record.tags,
                    "content": h.record.content,
                    "created_at": h.record.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if hits.is_empty() {
        ui::hint(&format!("no active records match '{query}'"));
        return Ok(());
    }
    let mut table = Table::new(&["Score", "Id", "Category", "Content"])
        .right(0)
        .max_width(3, 72);
    for hit in &hits {
        table.add_row(&[
            &format!("{:.3}", hit.score),
            hit.record.id.short(),
            &hit.record.category,
            &hit.record.content,
        ]);
    }
    table.print();
    Ok(())
}

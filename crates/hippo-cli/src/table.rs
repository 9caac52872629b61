//! Box-drawn tables for recall and compaction output.
//!
//! Widths are measured in characters, and wide cells are cut to a per-column
//! limit with an ellipsis so long memory content stays on one line.

use colored::Colorize;

/// Column alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

struct Column {
    header: String,
    align: Align,
    max_width: Option<usize>,
}

/// A table builder that collects rows, then renders with box-drawing borders.
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table with left-aligned, unbounded columns.
    pub fn new(headers: &[&str]) -> Self {
        Self {
            columns: headers
                .iter()
                .map(|h| Column {
                    header: h.to_string(),
                    align: Align::Left,
                    max_width: None,
                })
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Right-align column `col`. Out-of-range indices are ignored.
    pub fn right(mut self, col: usize) -> Self {
        if let Some(c) = self.columns.get_mut(col) {
            c.align = Align::Right;
        }
        self
    }

    /// Cap column `col` at `width` characters.
    pub fn max_width(mut self, col: usize, width: usize) -> Self {
        if let Some(c) = self.columns.get_mut(col) {
            c.max_width = Some(width.max(2));
        }
        self
    }

    /// Add a row. Extra cells are dropped; missing cells are empty.
    pub fn add_row(&mut self, cells: &[&str]) {
        let row = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let cell = cells.get(i).copied().unwrap_or("");
                let flat = cell.split_whitespace().collect::<Vec<_>>().join(" ");
                match col.max_width {
                    Some(max) => ellipsize(&flat, max),
                    None => flat,
                }
            })
            .collect();
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(col.header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Render without color.
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    fn render_with(&self, color: bool) -> String {
        let widths = self.widths();
        let border = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "\u{2500}".repeat(w + 2)).collect();
            format!("{left}{}{right}", segments.join(mid))
        };
        let line = |cells: Vec<String>| format!("\u{2502} {} \u{2502}", cells.join(" \u{2502} "));

        let mut out = Vec::with_capacity(self.rows.len() + 4);
        out.push(border("\u{250c}", "\u{252c}", "\u{2510}"));
        out.push(line(
            self.columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| {
                    let padded = pad(&c.header, *w, Align::Left);
                    if color {
                        padded.bold().to_string()
                    } else {
                        padded
                    }
                })
                .collect(),
        ));
        out.push(border("\u{251c}", "\u{253c}", "\u{2524}"));
        for row in &self.rows {
            out.push(line(
                row.iter()
                    .zip(&self.columns)
                    .zip(&widths)
                    .map(|((cell, col), w)| pad(cell, *w, col.align))
                    .collect(),
            ));
        }
        out.push(border("\u{2514}", "\u{2534}", "\u{2518}"));
        out.join("\n")
    }

    /// Print to stdout with a bold header.
    pub fn print(&self) {
        println!("{}", self.render_with(true));
    }
}

fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    match align {
        Align::Left => format!("{text}{fill}"),
        Align::Right => format!("{fill}{text}"),
    }
}

fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max - 1).collect();
    format!("{cut}\u{2026}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_layout() {
        let mut t = Table::new(&["Score", "Content"]).right(0);
        t.add_row(&["0.75", "postgres migration"]);
        t.add_row(&["0.5"]);
        let lines: Vec<String> = t.render().lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].contains("Score"));
        assert!(lines[4].starts_with("\u{2502}   0.5 \u{2502}"));
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_max_width_ellipsizes() {
        let mut t = Table::new(&["Content"]).max_width(0, 8);
        t.add_row(&["a very long line\nof memory content"]);
        assert!(t.render().contains("a very \u{2026}"));
    }

    #[test]
    fn test_unicode_width_by_chars() {
        let mut t = Table::new(&["Name"]);
        t.add_row(&["Zo\u{eb}"]);
        let rendered = t.render();
        let widths: Vec<usize> = rendered.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }
}

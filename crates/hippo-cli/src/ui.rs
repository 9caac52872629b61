//! Shared terminal output helpers for subcommands.
//!
//! Uses `colored` for terminal output. Everything goes to stdout; logs go to
//! stderr through tracing.

use colored::Colorize;
use hippo_types::report::BatchReport;

/// Print a success message.
pub fn success(msg: &str) {
    println!("  {} {}", "\u{2714}".bright_green(), msg);
}

/// Section header: ">> Title" in cyan.
pub fn section(title: &str) {
    println!("  {} {}", ">>".bright_cyan().bold(), title.bold());
}

/// Key-value display: "  Label:       value".
pub fn kv(label: &str, value: &str) {
    println!("  {:<16}{}", format!("{label}:"), value);
}

/// Key-value with green value.
pub fn kv_ok(label: &str, value: &str) {
    println!("  {:<16}{}", format!("{label}:"), value.bright_green());
}

/// Key-value with yellow value.
pub fn kv_warn(label: &str, value: &str) {
    println!("  {:<16}{}", format!("{label}:"), value.bright_yellow());
}

/// Hint line: "  hint: message" in dimmed text.
pub fn hint(msg: &str) {
    println!("  {} {}", "hint:".dimmed(), msg.dimmed());
}

/// Bullet line under a section.
pub fn item(msg: &str) {
    println!("    {} {}", "-".dimmed(), msg);
}

/// Red error + yellow "fix:" suggestion. Goes to stderr.
pub fn error_with_fix(msg: &str, fix: &str) {
    eprintln!("  {} {}", "\u{2718}".bright_red(), msg.bright_red());
    eprintln!("    {} {}", "fix:".bright_yellow(), fix);
}

/// Yellow warning + "try:" suggestion. Goes to stderr.
pub fn warn_with_fix(msg: &str, fix: &str) {
    eprintln!("  {} {}", "-".bright_yellow(), msg.yellow());
    eprintln!("    {} {}", "try:".bright_yellow(), fix);
}

/// The processed/skipped/failed line every batch command ends with.
pub fn batch_summary(report: &BatchReport) {
    let counts = format!(
        "processed={} skipped={} failed={}",
        report.processed, report.skipped, report.failed
    );
    let suffix = match (report.dry_run, report.cancelled) {
        (true, true) => " (dry run, cancelled)",
        (true, false) => " (dry run)",
        (false, true) => " (cancelled)",
        (false, false) => "",
    };
    if report.failed > 0 || report.cancelled {
        kv_warn("Result", &format!("{counts}{suffix}"));
    } else {
        kv_ok("Result", &format!("{counts}{suffix}"));
    }
}

/// Empty line.
pub fn blank() {
    println!();
}

//! Batch outcome counters shared by every engine.

use serde::{Deserialize, Serialize};

/// Outcome counts for one batch run. Dry runs use the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Units fully handled.
    pub processed: usize,
    /// Units intentionally passed over (already done, nothing to do, unavailable backend).
    pub skipped: usize,
    /// Units that errored; the batch continued.
    pub failed: usize,
    /// No store mutation was made.
    pub dry_run: bool,
    /// Set when cooperative cancellation stopped the run early.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed={} skipped={} failed={}",
            self.processed, self.skipped, self.failed
        )?;
        if self.dry_run {
            f.write_str(" (dry run)")?;
        }
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let mut report = BatchReport::new(true);
        report.processed = 3;
        report.failed = 1;
        assert_eq!(report.total(), 4);
        assert_eq!(report.to_string(), "processed=3 skipped=0 failed=1 (dry run)");
    }
}

//! Cooperative cancellation shared by every batch engine.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Cancellation signal checked between units of work.
///
/// Setting it never interrupts a unit in flight. Engines stop before the next
/// unit and leave their cursor and visited-set at the last committed unit.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.tx.send_replace(true) {
            info!("Cancellation requested, stopping after the current unit");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

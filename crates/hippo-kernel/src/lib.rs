//! Core engines for the Hippo memory system.
//!
//! The kernel wires the store, the inference backend and the batch engines
//! (consolidation, compaction, tagging, prediction, recall) together.

pub mod cancel;
pub mod compactor;
pub mod config;
pub mod consolidator;
pub mod error;
pub mod kernel;
pub mod predictor;
pub mod retriever;
pub mod tagger;

pub use cancel::CancelFlag;
pub use compactor::{ActionOutcome, CompactionAction, CompactionReport, Compactor};
pub use consolidator::{ConsolidatedEntry, ConsolidationReport, Consolidator};
pub use error::{KernelError, KernelResult};
pub use kernel::{HippoKernel, KernelStatus};
pub use predictor::{Briefing, PersonState, Predictor, ThreadContext};
pub use retriever::Retriever;
pub use tagger::{TagOutcome, Tagger, TaggingReport};

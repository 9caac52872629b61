//! Persistence and scoring for the Hippo memory engine.
//!
//! - **Store** (SQLite, WAL): records, lineage edges, the compaction
//!   visited-set and progress cursors, with transactional writes retried on
//!   lock contention
//! - **Scorer**: pure decay-weighted relevance
//! - **Index**: read access to embeddings owned by the external index process
//! - **Text**: token sets and Jaccard overlap

pub mod cursor;
pub mod index;
pub mod lineage;
pub mod migration;
pub mod retry;
pub mod scoring;
pub mod store;
pub mod text;

pub use index::{SimilarityIndex, SqliteEmbeddingIndex};
pub use lineage::{StoreChange, VisitedPair};
pub use scoring::{ScoredRecord, Scorer};
pub use store::{MemoryStore, StoreStats};

//! Inference plumbing for the Hippo memory engine.
//!
//! - `Generator` and `Classifier` contracts
//! - `InferenceBackend`: server, command or offline, selected once per process
//! - JSON extraction from model output and the prompt templates
//! - Session-log sources feeding consolidation

pub mod backend;
pub mod classifier;
pub mod drivers;
pub mod extract;
pub mod generator;
pub mod prompts;
pub mod session;

pub use backend::{select_backend, InferenceBackend};
pub use classifier::{Classifier, LlmClassifier};
pub use generator::Generator;
pub use session::{MarkdownSessionLog, SessionCursor, SessionEntry, SessionSource};

pub mod fetcher;
pub mod merger;
pub mod orchestrator;

pub use fetcher::{Feed, Fetcher};
pub use merger::Merger;
pub use orchestrator::{CycleReport, StudentOutcome, SyncFailure, SyncOrchestrator, SyncSummary};

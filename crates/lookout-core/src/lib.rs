pub mod archive;
pub mod engine;
pub mod error;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod store;
#[cfg(test)]
mod testutil;
pub mod traits;

pub use archive::PageArchive;
pub use engine::{Engine, EngineConfig};
pub use error::AppError;
pub use models::{ExtractionResult, Outcome, Outcomes, Snapshot, SnapshotCollection};
pub use registry::{AddOutcome, Registry, RegistryView, SharedRegistry};
pub use scheduler::{Scheduler, SchedulerEvent, SchedulerReporter, TracingReporter, Trigger};
pub use traits::{Extractor, Fetcher};

//! The Validate → Classify → Confirm → Commit workflow.

pub mod ingestion;
pub mod lease;
pub mod state;

pub use ingestion::{notice_for, IngestionSaga};
pub use lease::{EditContext, EditContexts, EditLease};
pub use state::{CommitKind, CommitOutcome, IngestTarget, PendingIngestion, SagaEvent, SagaState};

//! Client-side ingestion workflow for versioned construction documents.
//!
//! `docstage-core` takes a user-selected file through validation, remote
//! classification, category confirmation and commit, either as a new document
//! or as a new version of an existing one. Every step is an explicit
//! transition of [`saga::SagaState`]; the remote store is reached only through
//! the [`store::DocumentStore`] port, and user-facing notices go through an
//! injected [`notify::Notifier`].
//!
//! The role-based checks in [`permissions`] mirror the store's policy so the
//! workflow can refuse early. The store remains the authority.

pub mod catalog;
pub mod classify;
pub mod commit;
pub mod config;
pub mod document;
pub mod error;
pub mod notify;
pub mod permissions;
pub mod saga;
pub mod session;
pub mod store;
pub mod types;
pub mod validation;

pub use catalog::{DocumentCatalogView, SortOrder};
pub use classify::{ClassificationClient, ClassificationResult};
pub use commit::{DocumentPatch, InfoEdit};
pub use config::IngestConfig;
pub use document::{Document, Project, Version, VersionHistory};
pub use error::{CatalogError, ConfigError, SagaError, StoreError, ValidationError};
pub use notify::{Notice, NoticeLevel, Notifier, TracingNotifier};
pub use permissions::{ActorRole, Capability, CapabilitySet, PermissionGate};
pub use saga::{EditContext, EditContexts, IngestTarget, IngestionSaga, SagaState};
pub use session::Session;
pub use store::{CatalogScope, DocumentStore, HttpDocumentStore};
pub use types::{Category, DocumentId, ProjectId, UserId};
pub use validation::{FileValidator, SelectedFile, ValidationPolicy, Verdict};

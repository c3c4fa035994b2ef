//! Port to the remote document store.
//!
//! The store owns the category enumeration, project membership and the
//! authoritative permission checks. Everything in this crate talks to it
//! through [`DocumentStore`].

pub mod http;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::classify::ClassificationResult;
use crate::commit::{DocumentPatch, NewDocumentRequest, ReplaceRequest};
use crate::document::{Document, Project};
use crate::error::StoreError;
use crate::permissions::ActorRole;
use crate::types::identifiers::{DocumentId, UserId};
use crate::validation::SelectedFile;

pub use http::HttpDocumentStore;

/// Result of a write. Some endpoints echo the document back, others only its id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreReceipt {
    pub document_id: DocumentId,
    #[serde(default)]
    pub document: Option<Document>,
}

/// Which documents a catalog listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CatalogScope {
    /// Every document in the projects the user belongs to.
    #[default]
    Project,
    /// Only documents the user uploaded.
    Own,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `POST classify`: stage the file and predict its category.
    async fn classify(&self, file: &SelectedFile) -> Result<ClassificationResult, StoreError>;

    /// `POST upload`: new-document commit.
    async fn upload(&self, request: &NewDocumentRequest) -> Result<StoreReceipt, StoreError>;

    /// `PUT update/{id}`: rename/recategorize without a new file.
    async fn update_info(
        &self,
        document_id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<StoreReceipt, StoreError>;

    /// `PUT update/{id}/file`: replace commit, appends a version.
    async fn replace_file(&self, request: &ReplaceRequest<'_>) -> Result<StoreReceipt, StoreError>;

    /// `GET info/{id}`: document with its full version history.
    async fn info(&self, document_id: &DocumentId) -> Result<Document, StoreError>;

    async fn delete(&self, document_id: &DocumentId) -> Result<(), StoreError>;

    async fn list_documents(
        &self,
        user_id: &UserId,
        scope: CatalogScope,
    ) -> Result<Vec<Document>, StoreError>;

    async fn list_projects(&self, user_id: &UserId, role: ActorRole) -> Result<Vec<Project>, StoreError>;
}

/// Bound a store call by `timeout`.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout.as_millis() as u64)),
    }
}

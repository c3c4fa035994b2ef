//! Request shapes for the three commit endpoints, and the minimal-diff rule
//! that decides which fields a rename/recategorize actually sends.

pub mod info;

use serde::Serialize;

use crate::document::Document;
use crate::types::category::Category;
use crate::types::identifiers::{DocumentId, ProjectId, StagingHandle, UserId};
use crate::validation::SelectedFile;

pub use info::InfoEdit;

/// Creates a document with a single version from a staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocumentRequest {
    pub project_id: ProjectId,
    pub doc_name: String,
    pub confirmed_category: Category,
    pub staging_handle: StagingHandle,
    pub original_filename: String,
    pub uploader_id: UserId,
    pub idempotency_key: String,
}

/// Appends a version to an existing document. The file is uploaded again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceRequest<'a> {
    pub document_id: DocumentId,
    pub file: &'a SelectedFile,
    /// Category of the new version. Always sent.
    pub confirmed_category: Category,
    pub uploader_id: UserId,
    pub patch: DocumentPatch,
    pub idempotency_key: String,
}

/// Fields of a document that changed. Empty fields are left off the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_category: Option<Category>,
}

impl DocumentPatch {
    /// Compare the wanted name and category against the persisted document.
    ///
    /// `name` is compared after trimming; a `None` name or category means
    /// "keep the current value".
    pub fn diff(current: &Document, name: Option<&str>, category: Option<Category>) -> Self {
        let new_name = name
            .map(str::trim)
            .filter(|n| *n != current.document_name)
            .map(str::to_string);
        let new_category = category.filter(|c| current.document_category != Some(*c));
        DocumentPatch {
            new_name,
            new_category,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.new_category.is_none()
    }
}

/// Default display name for a new document: the original filename minus its
/// extension.
pub fn default_doc_name(original_filename: &str) -> String {
    match original_filename.rsplit_once('.') {
        Some((stem, _)) if !stem.trim().is_empty() => stem.to_string(),
        _ => original_filename.to_string(),
    }
}

use std::time::Duration;

use crate::document::Document;
use crate::error::{CatalogError, ValidationError};
use crate::notify::{Notice, Notifier};
use crate::permissions::Capability;
use crate::session::Session;
use crate::store::{bounded, DocumentStore};
use crate::types::category::Category;
use crate::validation::normalize_name;

use super::DocumentPatch;

/// Rename and/or recategorize a document without uploading a new file.
#[derive(Debug, Clone)]
pub struct InfoEdit<'a> {
    document: &'a Document,
    name: Option<String>,
    category: Option<Category>,
}

impl<'a> InfoEdit<'a> {
    pub fn new(document: &'a Document) -> Self {
        InfoEdit {
            document,
            name: None,
            category: None,
        }
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn recategorize(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// The fields that would actually be sent.
    pub fn patch(&self) -> Result<DocumentPatch, ValidationError> {
        let name = self.name.as_deref().map(normalize_name).transpose()?;
        Ok(DocumentPatch::diff(self.document, name.as_deref(), self.category))
    }

    /// Send the edit. `Ok(None)` means nothing differed and no request was made.
    pub async fn submit<S, N>(
        self,
        store: &S,
        notifier: &N,
        session: &Session,
        timeout: Duration,
    ) -> Result<Option<Document>, CatalogError>
    where
        S: DocumentStore + ?Sized,
        N: Notifier + ?Sized,
    {
        let document_id = &self.document.document_id;

        if !session.can(Capability::Edit) {
            tracing::warn!(user = %session.user_id, role = %session.role, document = %document_id, "info edit denied");
            notifier.notify(Notice::warning(
                "Access Denied",
                "You do not have permission to edit documents. Only Project Owners and Project Managers can edit documents.",
            ));
            return Err(CatalogError::PermissionDenied(Capability::Edit));
        }

        let patch = match self.patch() {
            Ok(patch) => patch,
            Err(err) => {
                notifier.notify(Notice::warning("Validation Error", err.to_string()));
                return Err(err.into());
            }
        };
        if patch.is_empty() {
            tracing::debug!(document = %document_id, "info edit is a no-op");
            notifier.notify(Notice::info("Nothing to Update", "No changes to save"));
            return Ok(None);
        }

        tracing::info!(
            document = %document_id,
            rename = patch.new_name.is_some(),
            recategorize = patch.new_category.is_some(),
            "updating document info"
        );
        let receipt = match bounded(timeout, store.update_info(document_id, &patch)).await {
            Ok(receipt) => receipt,
            Err(err) => {
                notifier.notify(Notice::error("Update Failed", err.to_string()));
                return Err(err.into());
            }
        };

        let updated = match receipt.document {
            Some(document) => document,
            None => match bounded(timeout, store.info(document_id)).await {
                Ok(document) => document,
                Err(err) => {
                    tracing::warn!(document = %document_id, error = %err, "updated document could not be fetched; patching locally");
                    patched(self.document, &patch)
                }
            },
        };

        notifier.notify(Notice::success(
            "Document Updated",
            format!("\"{}\" was updated successfully", updated.display_name()),
        ));
        Ok(Some(updated))
    }
}

fn patched(document: &Document, patch: &DocumentPatch) -> Document {
    let mut document = document.clone();
    if let Some(name) = &patch.new_name {
        document.document_name = name.clone();
    }
    if let Some(category) = patch.new_category {
        document.document_category = Some(category);
    }
    document
}

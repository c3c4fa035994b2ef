//! The document list a user browses: listing, search, ordering, and the
//! catalog-level actions (edit info, delete, version history).

use std::cmp::Ordering;
use std::time::Duration;

use crate::commit::InfoEdit;
use crate::config::IngestConfig;
use crate::document::{Document, VersionHistory};
use crate::error::CatalogError;
use crate::notify::{Notice, Notifier};
use crate::permissions::Capability;
use crate::saga::CommitOutcome;
use crate::session::Session;
use crate::store::{bounded, CatalogScope, DocumentStore};
use crate::types::category::Category;
use crate::types::identifiers::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Most recently modified first.
    #[default]
    Recent,
    /// Least recently modified first.
    Oldest,
    Name,
}

/// Phrase a user must type to confirm deleting `document`.
pub fn delete_phrase(document: &Document) -> String {
    format!("DELETE {}", document.document_name)
}

pub struct DocumentCatalogView<N> {
    session: Session,
    notifier: N,
    scope: CatalogScope,
    timeout: Duration,
    documents: Vec<Document>,
    search: String,
    sort: SortOrder,
}

impl<N: Notifier> DocumentCatalogView<N> {
    pub fn new(session: Session, notifier: N, config: &IngestConfig) -> Self {
        DocumentCatalogView {
            session,
            notifier,
            scope: CatalogScope::default(),
            timeout: config.request_timeout(),
            documents: Vec::new(),
            search: String::new(),
            sort: SortOrder::default(),
        }
    }

    pub fn with_scope(mut self, scope: CatalogScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> CatalogScope {
        self.scope
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, document_id: &DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| &d.document_id == document_id)
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    /// Reload the whole listing from the store.
    pub async fn refresh<S>(&mut self, store: &S) -> Result<usize, CatalogError>
    where
        S: DocumentStore + ?Sized,
    {
        let call = store.list_documents(&self.session.user_id, self.scope);
        match bounded(self.timeout, call).await {
            Ok(documents) => {
                tracing::debug!(count = documents.len(), scope = ?self.scope, "catalog refreshed");
                self.documents = documents;
                Ok(self.documents.len())
            }
            Err(err) => {
                tracing::warn!(error = %err, scope = ?self.scope, "catalog refresh failed");
                self.notifier.notify(Notice::error("Loading Error", err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Documents matching the search, in the chosen order.
    pub fn visible(&self) -> Vec<&Document> {
        let query = self.search.trim().to_lowercase();
        let mut visible: Vec<&Document> = self
            .documents
            .iter()
            .filter(|d| query.is_empty() || matches_query(d, &query))
            .collect();

        match self.sort {
            SortOrder::Recent => visible.sort_by(|a, b| newest_first(a, b)),
            SortOrder::Oldest => visible.sort_by(|a, b| oldest_first(a, b)),
            SortOrder::Name => visible.sort_by(|a, b| {
                a.display_name()
                    .to_lowercase()
                    .cmp(&b.display_name().to_lowercase())
            }),
        }
        visible
    }

    /// Insert or replace one entry.
    pub fn patch(&mut self, document: Document) {
        match self
            .documents
            .iter_mut()
            .find(|d| d.document_id == document.document_id)
        {
            Some(existing) => *existing = document,
            None => self.documents.push(document),
        }
    }

    /// Bring the catalog up to date after a commit: patch the single entry when
    /// the committed document can be had, otherwise reload everything.
    pub async fn apply_commit<S>(&mut self, outcome: &CommitOutcome, store: &S) -> Result<(), CatalogError>
    where
        S: DocumentStore + ?Sized,
    {
        let document = match &outcome.document {
            Some(document) => Some(document.clone()),
            None => match bounded(self.timeout, store.info(&outcome.document_id)).await {
                Ok(document) => Some(document),
                Err(err) => {
                    tracing::debug!(document = %outcome.document_id, error = %err, "falling back to a full refresh");
                    None
                }
            },
        };

        match document {
            Some(document) => {
                self.patch(document);
                Ok(())
            }
            None => self.refresh(store).await.map(|_| ()),
        }
    }

    fn require(&self, capability: Capability) -> Result<(), CatalogError> {
        if self.session.can(capability) {
            return Ok(());
        }
        tracing::warn!(user = %self.session.user_id, role = %self.session.role, %capability, "catalog action denied");
        self.notifier.notify(Notice::warning(
            "Access Denied",
            format!(
                "You do not have permission to {capability} documents. Only Project Owners and Project Managers can {capability} documents."
            ),
        ));
        Err(CatalogError::PermissionDenied(capability))
    }

    fn lookup(&self, document_id: &DocumentId) -> Result<&Document, CatalogError> {
        self.get(document_id)
            .ok_or_else(|| CatalogError::NotFound(document_id.to_string()))
    }

    /// Check that the user may open the edit surface for a document.
    pub fn request_edit(&self, document_id: &DocumentId) -> Result<&Document, CatalogError> {
        self.require(Capability::Edit)?;
        self.lookup(document_id)
    }

    /// Rename and/or recategorize a catalog entry.
    pub async fn edit_info<S>(
        &mut self,
        store: &S,
        document_id: &DocumentId,
        name: Option<&str>,
        category: Option<Category>,
    ) -> Result<Option<&Document>, CatalogError>
    where
        S: DocumentStore + ?Sized,
    {
        let current = self.lookup(document_id)?;
        let mut edit = InfoEdit::new(current);
        if let Some(name) = name {
            edit = edit.rename(name);
        }
        if let Some(category) = category {
            edit = edit.recategorize(category);
        }

        let updated = edit
            .submit(store, &self.notifier, &self.session, self.timeout)
            .await?;
        match updated {
            Some(document) => {
                self.patch(document);
                Ok(self.get(document_id))
            }
            None => Ok(None),
        }
    }

    /// Delete a document after the user typed `DELETE <document name>`.
    pub async fn delete<S>(
        &mut self,
        store: &S,
        document_id: &DocumentId,
        confirmation: &str,
    ) -> Result<Document, CatalogError>
    where
        S: DocumentStore + ?Sized,
    {
        self.require(Capability::Delete)?;
        let expected = delete_phrase(self.lookup(document_id)?);
        if confirmation != expected {
            self.notifier.notify(Notice::warning(
                "Confirmation Required",
                format!("Please type \"{expected}\" to confirm deletion"),
            ));
            return Err(CatalogError::ConfirmationMismatch { expected });
        }

        tracing::info!(document = %document_id, "deleting document");
        if let Err(err) = bounded(self.timeout, store.delete(document_id)).await {
            self.notifier.notify(Notice::error("Delete Failed", err.to_string()));
            return Err(err.into());
        }

        let index = self
            .documents
            .iter()
            .position(|d| &d.document_id == document_id)
            .ok_or_else(|| CatalogError::NotFound(document_id.to_string()))?;
        let removed = self.documents.remove(index);
        self.notifier.notify(Notice::success(
            "Document Deleted",
            format!("\"{}\" has been deleted successfully", removed.display_name()),
        ));
        Ok(removed)
    }

    /// Make sure the version history of an entry is loaded and return it.
    pub async fn history<S>(
        &mut self,
        store: &S,
        document_id: &DocumentId,
    ) -> Result<VersionHistory<'_>, CatalogError>
    where
        S: DocumentStore + ?Sized,
    {
        self.require(Capability::View)?;
        let loaded = self.lookup(document_id)?.versions.is_some();
        if !loaded {
            match bounded(self.timeout, store.info(document_id)).await {
                Ok(document) => self.patch(document),
                Err(err) => {
                    self.notifier
                        .notify(Notice::error("Version History Error", err.to_string()));
                    return Err(err.into());
                }
            }
        }
        Ok(VersionHistory::of(self.lookup(document_id)?))
    }
}

fn matches_query(document: &Document, query: &str) -> bool {
    document.document_name.to_lowercase().contains(query)
        || document
            .document_category
            .is_some_and(|c| c.as_str().to_lowercase().contains(query))
}

fn newest_first(a: &Document, b: &Document) -> Ordering {
    match (a.last_modified_date, b.last_modified_date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Undated documents still sort last.
fn oldest_first(a: &Document, b: &Document) -> Ordering {
    match (a.last_modified_date, b.last_modified_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

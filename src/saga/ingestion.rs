use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::lease::EditLease;
use super::state::{
    CommitKind, CommitOutcome, IngestTarget, PendingIngestion, SagaEvent, SagaState,
};
use crate::classify::ClassificationClient;
use crate::commit::{default_doc_name, DocumentPatch, NewDocumentRequest, ReplaceRequest};
use crate::config::IngestConfig;
use crate::document::{Document, Project};
use crate::error::{SagaError, StoreError, ValidationError};
use crate::notify::{Notice, Notifier};
use crate::session::Session;
use crate::store::{bounded, DocumentStore, StoreReceipt};
use crate::types::category::Category;
use crate::types::identifiers::{DocumentId, ProjectId};
use crate::validation::{format_size, normalize_name, FileValidator, SelectedFile};

enum CommitPlan<'a> {
    Create(NewDocumentRequest),
    Replace(ReplaceRequest<'a>),
}

/// Drives one Validate → Classify → Confirm → Commit run.
///
/// Every remote call is awaited to completion before the next step may start,
/// and every failure lands the saga back in a retryable state. Cancellation
/// requested through [`cancel_handle`](Self::cancel_handle) is honoured at
/// the next state boundary; a call already in flight completes and its result
/// is discarded.
pub struct IngestionSaga<S: ?Sized, N> {
    store: Arc<S>,
    classifier: ClassificationClient<S>,
    notifier: N,
    session: Session,
    validator: FileValidator,
    timeout: Duration,
    staging_ttl: chrono::Duration,
    target: IngestTarget,
    state: SagaState,
    projects: Vec<Project>,
    cancel: CancellationToken,
    lease: Option<EditLease>,
}

impl<S, N> IngestionSaga<S, N>
where
    S: DocumentStore + ?Sized,
    N: Notifier,
{
    /// Saga that creates a new document in a project chosen later.
    pub fn new_document(store: Arc<S>, notifier: N, session: Session, config: &IngestConfig) -> Self {
        Self::with_target(store, notifier, session, config, IngestTarget::NewDocument { project_id: None })
    }

    /// Saga that appends a version to `document`.
    pub fn replace(
        store: Arc<S>,
        notifier: N,
        session: Session,
        config: &IngestConfig,
        document: Document,
    ) -> Self {
        let target = IngestTarget::Replace {
            document: Box::new(document),
        };
        Self::with_target(store, notifier, session, config, target)
    }

    fn with_target(
        store: Arc<S>,
        notifier: N,
        session: Session,
        config: &IngestConfig,
        target: IngestTarget,
    ) -> Self {
        Self {
            classifier: ClassificationClient::new(Arc::clone(&store), config),
            store,
            notifier,
            session,
            validator: FileValidator::new(config.validation.clone()),
            timeout: config.request_timeout(),
            staging_ttl: config.staging_ttl(),
            target,
            state: SagaState::Idle,
            projects: Vec::new(),
            cancel: CancellationToken::new(),
            lease: None,
        }
    }

    /// Hold `lease` until the saga finishes or is dropped.
    pub fn with_lease(mut self, lease: EditLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn state(&self) -> &SagaState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingIngestion> {
        self.state.pending()
    }

    pub fn target(&self) -> &IngestTarget {
        &self.target
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn outcome(&self) -> Option<&CommitOutcome> {
        match &self.state {
            SagaState::Done(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn holds_lease(&self) -> bool {
        self.lease.is_some()
    }

    /// Token another task can use to cancel this saga.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn apply(&mut self, event: SagaEvent) -> Result<(), SagaError> {
        let result = self.state.apply(event, self.session.capabilities());
        if self.state.is_terminal() {
            self.lease = None;
        }
        result
    }

    /// Surface `err` to the user and hand it back.
    fn refuse(&self, err: SagaError) -> SagaError {
        if let SagaError::PermissionDenied(capability) = &err {
            tracing::warn!(
                user = %self.session.user_id,
                role = %self.session.role,
                %capability,
                "permission denied before contacting the store"
            );
        }
        self.notifier.notify(notice_for(&err, &self.target));
        err
    }

    fn observe_cancel(&mut self) -> Result<(), SagaError> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        if !self.state.is_terminal() {
            self.apply(SagaEvent::Cancel)?;
        }
        Err(SagaError::Cancelled)
    }

    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), SagaError> {
        self.observe_cancel()?;

        let kind = match self.validator.accept(&file.descriptor) {
            Ok(kind) => kind,
            Err(err) => {
                tracing::info!(file = %file.name(), size = file.descriptor.size, error = %err, "file rejected");
                return Err(self.refuse(err.into()));
            }
        };

        let name = file.name().to_string();
        let digest = file.digest.clone();
        let pending = PendingIngestion::new(file, kind, self.target.clone());
        self.apply(SagaEvent::Select(pending))
            .map_err(|e| self.refuse(e))?;

        tracing::info!(file = %name, %kind, %digest, "file selected");
        self.notifier
            .notify(Notice::success("File Selected", format!("Selected file: {name}")));
        Ok(())
    }

    /// Choose the project a new document goes into.
    pub fn choose_project(&mut self, project_id: ProjectId) -> Result<(), SagaError> {
        if matches!(self.target, IngestTarget::Replace { .. }) || self.state.is_terminal() {
            let err = SagaError::InvalidTransition {
                state: self.state.name(),
                event: "choose a project",
            };
            return Err(self.refuse(err));
        }

        let target = IngestTarget::NewDocument {
            project_id: Some(project_id),
        };
        if self.state.pending().is_some() {
            self.apply(SagaEvent::SetTarget(target.clone()))
                .map_err(|e| self.refuse(e))?;
        }
        self.target = target;
        Ok(())
    }

    /// Fetch the projects the user may upload into. A single project is
    /// chosen automatically.
    pub async fn load_projects(&mut self) -> Result<&[Project], SagaError> {
        let call = self
            .store
            .list_projects(&self.session.user_id, self.session.role);
        let projects = match bounded(self.timeout, call).await {
            Ok(projects) => projects,
            Err(err) => return Err(self.refuse(SagaError::Lookup(err))),
        };

        tracing::debug!(count = projects.len(), "projects loaded");
        self.notifier.notify(Notice::info(
            "Projects Loaded",
            format!("Found {} assigned projects", projects.len()),
        ));

        let unchosen = matches!(self.target, IngestTarget::NewDocument { project_id: None });
        if let [only] = projects.as_slice() {
            if unchosen && !self.state.is_terminal() {
                let project_id = only.project_id.clone();
                self.choose_project(project_id)?;
            }
        }

        self.projects = projects;
        Ok(&self.projects)
    }

    pub fn set_display_name(&mut self, raw: &str) -> Result<(), SagaError> {
        let name = normalize_name(raw).map_err(|e| self.refuse(e.into()))?;
        self.apply(SagaEvent::SetName(Some(name)))
            .map_err(|e| self.refuse(e))
    }

    pub fn clear_display_name(&mut self) -> Result<(), SagaError> {
        self.apply(SagaEvent::SetName(None))
            .map_err(|e| self.refuse(e))
    }

    /// Override the predicted category.
    pub fn set_category(&mut self, category: Category) -> Result<(), SagaError> {
        self.apply(SagaEvent::SetCategory(category))
            .map_err(|e| self.refuse(e))
    }

    /// Selected → Classifying → Confirming.
    ///
    /// If an earlier classification of the same file is still held (after a
    /// failed commit), it is reused and nothing is sent.
    pub async fn classify(&mut self) -> Result<(), SagaError> {
        self.observe_cancel()?;
        self.apply(SagaEvent::BeginClassify)
            .map_err(|e| self.refuse(e))?;

        let now = Utc::now();
        let previous = self
            .state
            .pending()
            .and_then(|p| p.classification.clone())
            .filter(|c| !c.is_expired(self.staging_ttl, now));
        let result = match previous {
            Some(previous) => {
                tracing::debug!(staging_handle = %previous.staging_handle, "reusing staged file");
                Ok(previous)
            }
            None => match self.state.pending() {
                Some(pending) => self.classifier.classify(&pending.file).await,
                None => Err(StoreError::Decode("no file to classify".into())),
            },
        };

        if self.cancel.is_cancelled() {
            tracing::info!("classification finished after cancellation; result discarded");
            self.apply(SagaEvent::Cancel)?;
            return Err(SagaError::Cancelled);
        }

        match result {
            Ok(classification) => {
                self.apply(SagaEvent::Classified(classification))?;
                self.notifier.notify(Notice::info(
                    "Classification Complete",
                    "Please confirm the document category.",
                ));
                Ok(())
            }
            Err(err) => {
                self.apply(SagaEvent::ClassificationFailed)?;
                Err(self.refuse(SagaError::Classification(err)))
            }
        }
    }

    /// Confirming → Committing → Done.
    pub async fn commit(&mut self) -> Result<&CommitOutcome, SagaError> {
        self.observe_cancel()?;
        self.apply(SagaEvent::BeginCommit)
            .map_err(|e| self.refuse(e))?;

        let now = Utc::now();
        let expired = self
            .state
            .pending()
            .and_then(|p| p.classification.as_ref())
            .map_or(true, |c| c.is_expired(self.staging_ttl, now));
        if expired {
            tracing::info!("staged file expired before commit");
            self.apply(SagaEvent::StagingExpired)?;
            return Err(self.refuse(SagaError::StagingExpired));
        }

        let sent = match self.state.pending() {
            Some(pending) => match plan(pending, &self.session) {
                Ok(plan) => Ok(self.send(plan).await),
                Err(err) => Err(err),
            },
            None => Err(SagaError::InvalidTransition {
                state: self.state.name(),
                event: "commit",
            }),
        };
        let result = match sent {
            Ok(result) => result,
            Err(err) => {
                self.apply(SagaEvent::CommitFailed)?;
                return Err(self.refuse(err));
            }
        };

        let outcome = match result {
            Ok((kind, receipt)) => Ok(self.complete(kind, receipt).await),
            Err(err) => Err(err),
        };

        if self.cancel.is_cancelled() {
            tracing::warn!("commit finished after cancellation; result discarded");
            self.apply(SagaEvent::Cancel)?;
            return Err(SagaError::Cancelled);
        }

        match outcome {
            Ok(outcome) => {
                self.notifier.notify(self.success_notice(&outcome));
                self.apply(SagaEvent::Committed(outcome))?;
                self.outcome().ok_or(SagaError::InvalidTransition {
                    state: self.state.name(),
                    event: "finish a commit",
                })
            }
            Err(err) => {
                self.apply(SagaEvent::CommitFailed)?;
                Err(self.refuse(SagaError::Commit(err)))
            }
        }
    }

    /// Abort the run. The staged file, if any, is left to server-side expiry.
    pub fn cancel(&mut self) -> Result<(), SagaError> {
        let staged = self
            .state
            .pending()
            .and_then(|p| p.classification.as_ref())
            .map(|c| c.staging_handle.clone());

        self.apply(SagaEvent::Cancel)
            .map_err(|e| self.refuse(e))?;
        self.cancel.cancel();

        if let Some(handle) = staged {
            tracing::info!(staging_handle = %handle, "saga cancelled with a staged file");
        }
        self.notifier
            .notify(Notice::info("Upload Cancelled", "The upload was cancelled."));
        Ok(())
    }

    async fn send(&self, plan: CommitPlan<'_>) -> Result<(CommitKind, StoreReceipt), StoreError> {
        match plan {
            CommitPlan::Create(request) => {
                tracing::info!(
                    project = %request.project_id,
                    category = %request.confirmed_category,
                    staging_handle = %request.staging_handle,
                    "committing new document"
                );
                let receipt = bounded(self.timeout, self.store.upload(&request)).await?;
                Ok((CommitKind::Created, receipt))
            }
            CommitPlan::Replace(request) => {
                tracing::info!(
                    document = %request.document_id,
                    category = %request.confirmed_category,
                    rename = request.patch.new_name.is_some(),
                    recategorize = request.patch.new_category.is_some(),
                    "committing replacement version"
                );
                let receipt = bounded(self.timeout, self.store.replace_file(&request)).await?;
                Ok((CommitKind::VersionAppended, receipt))
            }
        }
    }

    /// Build the outcome, fetching the document if the store did not echo it.
    async fn complete(&self, kind: CommitKind, receipt: StoreReceipt) -> CommitOutcome {
        let document = match receipt.document {
            Some(document) => Some(document),
            None => self.fetch(&receipt.document_id).await,
        };
        CommitOutcome {
            kind,
            document_id: receipt.document_id,
            document,
        }
    }

    async fn fetch(&self, document_id: &DocumentId) -> Option<Document> {
        match bounded(self.timeout, self.store.info(document_id)).await {
            Ok(document) => Some(document),
            Err(err) => {
                tracing::warn!(document = %document_id, error = %err, "committed document could not be fetched");
                None
            }
        }
    }

    fn success_notice(&self, outcome: &CommitOutcome) -> Notice {
        match outcome.kind {
            CommitKind::Created => {
                let project = match &self.target {
                    IngestTarget::NewDocument {
                        project_id: Some(id),
                    } => self
                        .projects
                        .iter()
                        .find(|p| &p.project_id == id)
                        .map(|p| p.project_name.clone())
                        .unwrap_or_else(|| id.to_string()),
                    _ => String::new(),
                };
                Notice::success(
                    "Upload Successful",
                    format!("Document uploaded to \"{project}\" project successfully!"),
                )
            }
            CommitKind::VersionAppended => {
                let pending = self.state.pending();
                let category = pending
                    .and_then(|p| p.confirmed_category)
                    .map(|c| c.as_str())
                    .unwrap_or_default();
                let renamed = match (pending, &self.target) {
                    (Some(p), IngestTarget::Replace { document }) => p
                        .display_name
                        .as_deref()
                        .filter(|name| *name != document.document_name),
                    _ => None,
                };
                let message = match renamed {
                    Some(name) => format!("Category: {category} | Name updated to: \"{name}\""),
                    None => format!("Category: {category}"),
                };
                Notice::success("File Replaced", message)
            }
        }
    }
}

fn plan<'a>(pending: &'a PendingIngestion, session: &Session) -> Result<CommitPlan<'a>, SagaError> {
    let classification = pending
        .classification
        .as_ref()
        .ok_or(SagaError::StagingExpired)?;
    let category = pending
        .confirmed_category
        .ok_or(ValidationError::MissingCategory)?;

    match &pending.target {
        IngestTarget::NewDocument { project_id } => {
            let project_id = project_id.clone().ok_or(ValidationError::MissingProject)?;
            let doc_name = pending
                .display_name
                .clone()
                .unwrap_or_else(|| default_doc_name(&classification.original_filename));
            let idempotency_key = format!("{}:{}", pending.file.digest, project_id);
            Ok(CommitPlan::Create(NewDocumentRequest {
                project_id,
                doc_name,
                confirmed_category: category,
                staging_handle: classification.staging_handle.clone(),
                original_filename: classification.original_filename.clone(),
                uploader_id: session.user_id.clone(),
                idempotency_key,
            }))
        }
        IngestTarget::Replace { document } => {
            let patch = DocumentPatch::diff(document, pending.display_name.as_deref(), Some(category));
            let idempotency_key = format!("{}:{}", pending.file.digest, document.document_id);
            Ok(CommitPlan::Replace(ReplaceRequest {
                document_id: document.document_id.clone(),
                file: &pending.file,
                confirmed_category: category,
                uploader_id: session.user_id.clone(),
                patch,
                idempotency_key,
            }))
        }
    }
}

/// The user-facing notice for a refused step.
pub fn notice_for(err: &SagaError, target: &IngestTarget) -> Notice {
    match err {
        SagaError::Validation(ValidationError::InvalidType { .. }) => Notice::warning(
            "Invalid File Type",
            "Please select a valid PDF, DOCX, or Excel file.",
        ),
        SagaError::Validation(ValidationError::TooLarge { max, .. }) => Notice::warning(
            "File Too Large",
            format!("File size must be less than {}", format_size(*max)),
        ),
        SagaError::Validation(ValidationError::MissingProject) => {
            Notice::warning("Project Required", "Please select a project first.")
        }
        SagaError::Validation(ValidationError::MissingFile) => {
            Notice::warning("No File", "Please select a file first.")
        }
        SagaError::Validation(other) => Notice::warning("Validation Error", other.to_string()),
        SagaError::PermissionDenied(capability) => Notice::warning(
            "Access Denied",
            format!(
                "You do not have permission to {capability} documents. Only Project Owners and Project Managers can {capability} documents."
            ),
        ),
        SagaError::Classification(_) => Notice::error(
            "Classification Error",
            "Could not classify the document. Please try again.",
        ),
        SagaError::Commit(store) => {
            let title = match target {
                IngestTarget::NewDocument { .. } => "Upload Failed",
                IngestTarget::Replace { .. } => "File Replace Failed",
            };
            Notice::error(title, store.to_string())
        }
        SagaError::Lookup(_) => Notice::error(
            "Projects Loading Error",
            "Failed to load your assigned projects.",
        ),
        SagaError::StagingExpired => Notice::warning(
            "Classification Expired",
            "The staged file has expired. Please classify the document again.",
        ),
        SagaError::InvalidTransition { .. } => Notice::warning("Not Available", err.to_string()),
        SagaError::Busy(_) => Notice::warning("Already Open", err.to_string()),
        SagaError::Cancelled => Notice::info("Upload Cancelled", err.to_string()),
    }
}

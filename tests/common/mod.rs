#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use docstage_core::classify::ClassificationResult;
use docstage_core::commit::{DocumentPatch, NewDocumentRequest, ReplaceRequest};
use docstage_core::document::{Document, Project, Version};
use docstage_core::error::StoreError;
use docstage_core::notify::{Notice, Notifier};
use docstage_core::permissions::ActorRole;
use docstage_core::session::Session;
use docstage_core::store::{CatalogScope, DocumentStore, StoreReceipt};
use docstage_core::types::{Category, DocumentId, FileDigest, ProjectId, StagingHandle, UserId};
use docstage_core::validation::SelectedFile;
use docstage_core::IngestConfig;

pub const MIB: usize = 1024 * 1024;
pub const PDF: &str = "application/pdf";

pub fn pdf(name: &str, size: usize) -> SelectedFile {
    SelectedFile::new(name, PDF, vec![b'%'; size])
}

pub fn session(role: ActorRole) -> Session {
    Session::new("user-1", role)
}

pub fn config() -> IngestConfig {
    IngestConfig {
        request_timeout_ms: 2_000,
        ..IngestConfig::default()
    }
}

pub fn version(number: u32, size: u64) -> Version {
    Version {
        version_number: number,
        uploaded_by: "alice".to_string(),
        upload_date: Utc.with_ymd_and_hms(2024, 3, number, 9, 0, 0).single(),
        original_filename: format!("plan-v{number}.pdf"),
        file_type: "pdf".to_string(),
        file_size: size,
        page_count: Some(4),
        document_link: format!("/view/{number}"),
        download_link: format!("/download/{number}"),
    }
}

pub fn document(id: &str, name: &str, category: Category, versions: u32) -> Document {
    Document {
        document_id: DocumentId::new(id),
        document_name: name.to_string(),
        document_category: Some(category),
        project_id: Some(ProjectId::new("proj-1")),
        last_modified_date: Utc.with_ymd_and_hms(2024, 3, versions.max(1), 9, 0, 0).single(),
        document_link: None,
        download_link: None,
        versions: Some((1..=versions).map(|n| version(n, 1_000 * n as u64)).collect()),
    }
}

pub fn project(id: &str, name: &str) -> Project {
    Project {
        project_id: ProjectId::new(id),
        project_name: name.to_string(),
        project_description: String::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calls {
    pub classify: usize,
    pub upload: usize,
    pub update_info: usize,
    pub replace_file: usize,
    pub info: usize,
    pub delete: usize,
    pub list_documents: usize,
    pub list_projects: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.classify
            + self.upload
            + self.update_info
            + self.replace_file
            + self.info
            + self.delete
            + self.list_documents
            + self.list_projects
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReplace {
    pub document_id: DocumentId,
    pub confirmed_category: Category,
    pub uploader_id: UserId,
    pub patch: DocumentPatch,
    pub idempotency_key: String,
    pub digest: FileDigest,
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<DocumentId, Document>,
    projects: Vec<Project>,
    staged: HashMap<StagingHandle, u64>,
    prediction: Option<Category>,
    classify_failures: VecDeque<StoreError>,
    commit_failures: VecDeque<StoreError>,
    classify_delay: Option<Duration>,
    commit_delay: Option<Duration>,
    info_unavailable: bool,
    omit_document: bool,
    next_id: u32,
    calls: Calls,
    uploads: Vec<NewDocumentRequest>,
    replaces: Vec<RecordedReplace>,
    info_updates: Vec<(DocumentId, DocumentPatch)>,
}

/// In-memory `DocumentStore` that records every request.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, document: Document) -> Self {
        self.inner
            .lock()
            .unwrap()
            .documents
            .insert(document.document_id.clone(), document);
        self
    }

    pub fn with_projects(self, projects: Vec<Project>) -> Self {
        self.inner.lock().unwrap().projects = projects;
        self
    }

    pub fn predicting(self, category: Category) -> Self {
        self.inner.lock().unwrap().prediction = Some(category);
        self
    }

    /// Write receipts carry only the id, as some endpoints do.
    pub fn without_document_echo(self) -> Self {
        self.inner.lock().unwrap().omit_document = true;
        self
    }

    pub fn fail_next_classify(&self, err: StoreError) {
        self.inner.lock().unwrap().classify_failures.push_back(err);
    }

    pub fn fail_next_commit(&self, err: StoreError) {
        self.inner.lock().unwrap().commit_failures.push_back(err);
    }

    pub fn delay_classify(&self, delay: Duration) {
        self.inner.lock().unwrap().classify_delay = Some(delay);
    }

    pub fn delay_commit(&self, delay: Duration) {
        self.inner.lock().unwrap().commit_delay = Some(delay);
    }

    pub fn make_info_unavailable(&self) {
        self.inner.lock().unwrap().info_unavailable = true;
    }

    pub fn calls(&self) -> Calls {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn uploads(&self) -> Vec<NewDocumentRequest> {
        self.inner.lock().unwrap().uploads.clone()
    }

    pub fn replaces(&self) -> Vec<RecordedReplace> {
        self.inner.lock().unwrap().replaces.clone()
    }

    pub fn info_updates(&self) -> Vec<(DocumentId, DocumentPatch)> {
        self.inner.lock().unwrap().info_updates.clone()
    }

    pub fn stored(&self, id: &str) -> Option<Document> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(&DocumentId::new(id))
            .cloned()
    }

    fn not_found(id: &DocumentId) -> StoreError {
        StoreError::Server {
            status: 404,
            detail: format!("Document {id} not found"),
        }
    }

    fn receipt(&self, document: Document) -> StoreReceipt {
        let omit = self.inner.lock().unwrap().omit_document;
        StoreReceipt {
            document_id: document.document_id.clone(),
            document: if omit { None } else { Some(document) },
        }
    }

    async fn pause(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn classify(&self, file: &SelectedFile) -> Result<ClassificationResult, StoreError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.classify += 1;
            inner.classify_delay
        };
        Self::pause(delay).await;

        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.classify_failures.pop_front() {
            return Err(err);
        }
        let handle = StagingHandle::new(format!("staged/{}/{}", inner.staged.len() + 1, file.name()));
        inner.staged.insert(handle.clone(), file.bytes.len() as u64);
        Ok(ClassificationResult {
            predicted_category: inner.prediction.unwrap_or(Category::Other),
            staging_handle: handle,
            original_filename: file.name().to_string(),
            staged_at: Utc::now(),
        })
    }

    async fn upload(&self, request: &NewDocumentRequest) -> Result<StoreReceipt, StoreError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.upload += 1;
            inner.uploads.push(request.clone());
            inner.commit_delay
        };
        Self::pause(delay).await;

        let document = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(err) = inner.commit_failures.pop_front() {
                return Err(err);
            }
            let size = inner
                .staged
                .remove(&request.staging_handle)
                .ok_or_else(|| StoreError::Server {
                    status: 400,
                    detail: "Staged file not found".into(),
                })?;
            inner.next_id += 1;
            let now = Utc::now();
            let document = Document {
                document_id: DocumentId::new(format!("doc-{}", inner.next_id)),
                document_name: request.doc_name.clone(),
                document_category: Some(request.confirmed_category),
                project_id: Some(request.project_id.clone()),
                last_modified_date: Some(now),
                document_link: None,
                download_link: None,
                versions: Some(vec![Version {
                    version_number: 1,
                    uploaded_by: request.uploader_id.to_string(),
                    upload_date: Some(now),
                    original_filename: request.original_filename.clone(),
                    file_type: "pdf".into(),
                    file_size: size,
                    page_count: None,
                    document_link: String::new(),
                    download_link: String::new(),
                }]),
            };
            inner
                .documents
                .insert(document.document_id.clone(), document.clone());
            document
        };
        Ok(self.receipt(document))
    }

    async fn update_info(
        &self,
        document_id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<StoreReceipt, StoreError> {
        let document = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.update_info += 1;
            inner.info_updates.push((document_id.clone(), patch.clone()));
            let document = inner
                .documents
                .get_mut(document_id)
                .ok_or_else(|| Self::not_found(document_id))?;
            if let Some(name) = &patch.new_name {
                document.document_name = name.clone();
            }
            if let Some(category) = patch.new_category {
                document.document_category = Some(category);
            }
            document.clone()
        };
        Ok(self.receipt(document))
    }

    async fn replace_file(&self, request: &ReplaceRequest<'_>) -> Result<StoreReceipt, StoreError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.replace_file += 1;
            inner.replaces.push(RecordedReplace {
                document_id: request.document_id.clone(),
                confirmed_category: request.confirmed_category,
                uploader_id: request.uploader_id.clone(),
                patch: request.patch.clone(),
                idempotency_key: request.idempotency_key.clone(),
                digest: request.file.digest.clone(),
            });
            inner.commit_delay
        };
        Self::pause(delay).await;

        let document = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(err) = inner.commit_failures.pop_front() {
                return Err(err);
            }
            let document = inner
                .documents
                .get_mut(&request.document_id)
                .ok_or_else(|| Self::not_found(&request.document_id))?;
            let versions = document.versions.get_or_insert_with(Vec::new);
            let now = Utc::now();
            versions.push(Version {
                version_number: versions.len() as u32 + 1,
                uploaded_by: request.uploader_id.to_string(),
                upload_date: Some(now),
                original_filename: request.file.name().to_string(),
                file_type: "pdf".into(),
                file_size: request.file.bytes.len() as u64,
                page_count: None,
                document_link: String::new(),
                download_link: String::new(),
            });
            if let Some(name) = &request.patch.new_name {
                document.document_name = name.clone();
            }
            document.document_category = Some(request.confirmed_category);
            document.last_modified_date = Some(now);
            document.clone()
        };
        Ok(self.receipt(document))
    }

    async fn info(&self, document_id: &DocumentId) -> Result<Document, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.info += 1;
        if inner.info_unavailable {
            return Err(StoreError::Transport("connection reset".into()));
        }
        inner
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| Self::not_found(document_id))
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.delete += 1;
        inner
            .documents
            .remove(document_id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(document_id))
    }

    async fn list_documents(
        &self,
        _user_id: &UserId,
        _scope: CatalogScope,
    ) -> Result<Vec<Document>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.list_documents += 1;
        // Listings leave the version history out.
        Ok(inner
            .documents
            .values()
            .cloned()
            .map(|mut d| {
                d.versions = None;
                d
            })
            .collect())
    }

    async fn list_projects(&self, _user_id: &UserId, _role: ActorRole) -> Result<Vec<Project>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.list_projects += 1;
        Ok(inner.projects.clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.title).collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

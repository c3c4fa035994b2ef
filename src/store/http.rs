//! `DocumentStore` over HTTP.
//!
//! Document endpoints live under `{base_url}/api/doc`, project listings under
//! `{base_url}/staff`. Uploads are multipart forms; the info-only update is a
//! JSON body.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{CatalogScope, DocumentStore, StoreReceipt};
use crate::classify::ClassificationResult;
use crate::commit::{DocumentPatch, NewDocumentRequest, ReplaceRequest};
use crate::config::IngestConfig;
use crate::document::{Document, Project};
use crate::error::StoreError;
use crate::permissions::ActorRole;
use crate::types::category::Category;
use crate::types::identifiers::{DocumentId, StagingHandle, UserId};
use crate::validation::SelectedFile;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    predicted_category: Category,
    #[serde(alias = "temp_file_path")]
    staging_handle: StagingHandle,
    original_filename: String,
}

#[derive(Debug, Deserialize)]
struct ReceiptBody {
    #[serde(default)]
    document_id: Option<DocumentId>,
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    document: Document,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    recent_documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    #[serde(default)]
    projects: Vec<Project>,
}

pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpDocumentStore {
    pub fn new(config: &IngestConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.request_timeout_ms,
        })
    }

    fn doc_url(&self, path: &str) -> String {
        format!("{}/api/doc/{}", self.base_url, path)
    }

    fn map_err(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout_ms)
        } else if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| self.map_err(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "document store rejected request");
        Err(StoreError::Server {
            status: status.as_u16(),
            detail: error_detail(status.as_u16(), &body),
        })
    }

    /// Decode a 2xx body, honouring an in-band `"status": "error"`.
    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, StoreError> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| self.map_err(e))?;
        let envelope: Status =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Some(state) = envelope.status.as_deref() {
            if state != "success" {
                return Err(StoreError::Server {
                    status,
                    detail: envelope.message.unwrap_or_else(|| format!("Request failed: {state}")),
                });
            }
        }
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn file_part(file: &SelectedFile) -> Result<Part, StoreError> {
        let part = Part::bytes(file.bytes.clone()).file_name(file.descriptor.name.clone());
        if file.descriptor.content_type.is_empty() {
            return Ok(part);
        }
        part.mime_str(&file.descriptor.content_type)
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    fn receipt(fallback_id: Option<&DocumentId>, body: ReceiptBody) -> Result<StoreReceipt, StoreError> {
        let document = body.document.map(Document::normalized);
        let document_id = body
            .document_id
            .or_else(|| document.as_ref().map(|d| d.document_id.clone()))
            .or_else(|| fallback_id.cloned())
            .ok_or_else(|| StoreError::Decode("response carries no document_id".into()))?;
        Ok(StoreReceipt {
            document_id,
            document,
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn classify(&self, file: &SelectedFile) -> Result<ClassificationResult, StoreError> {
        let form = Form::new().part("file", Self::file_part(file)?);
        let request = self.client.post(self.doc_url("classify")).multipart(form);
        let response = self.send(request).await?;
        let body: ClassifyResponse = self.decode(response).await?;

        Ok(ClassificationResult {
            predicted_category: body.predicted_category,
            staging_handle: body.staging_handle,
            original_filename: body.original_filename,
            staged_at: Utc::now(),
        })
    }

    async fn upload(&self, request: &NewDocumentRequest) -> Result<StoreReceipt, StoreError> {
        let form = Form::new()
            .text("proj_id", request.project_id.as_str().to_string())
            .text("doc_name", request.doc_name.clone())
            .text("confirmed_category", request.confirmed_category.as_str())
            .text("temp_file_path", request.staging_handle.as_str().to_string())
            .text("original_filename", request.original_filename.clone())
            .text("user_id", request.uploader_id.as_str().to_string());
        let builder = self
            .client
            .post(self.doc_url("upload"))
            .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
            .multipart(form);
        let response = self.send(builder).await?;
        let body: ReceiptBody = self.decode(response).await?;
        Self::receipt(None, body)
    }

    async fn update_info(
        &self,
        document_id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<StoreReceipt, StoreError> {
        let url = self.doc_url(&format!("update/{}", document_id.as_str()));
        let response = self.send(self.client.put(url).json(patch)).await?;
        let body: ReceiptBody = self.decode(response).await?;
        Self::receipt(Some(document_id), body)
    }

    async fn replace_file(&self, request: &ReplaceRequest<'_>) -> Result<StoreReceipt, StoreError> {
        let mut form = Form::new()
            .part("file", Self::file_part(request.file)?)
            .text("confirmed_category", request.confirmed_category.as_str())
            .text("user_id", request.uploader_id.as_str().to_string());
        if let Some(name) = &request.patch.new_name {
            form = form.text("new_name", name.clone());
        }
        if let Some(category) = request.patch.new_category {
            form = form.text("new_category", category.as_str());
        }
        let url = self.doc_url(&format!("update/{}/file", request.document_id.as_str()));
        let builder = self
            .client
            .put(url)
            .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
            .multipart(form);
        let response = self.send(builder).await?;
        let body: ReceiptBody = self.decode(response).await?;
        Self::receipt(Some(&request.document_id), body)
    }

    async fn info(&self, document_id: &DocumentId) -> Result<Document, StoreError> {
        let url = self.doc_url(&format!("info/{}", document_id.as_str()));
        let response = self.send(self.client.get(url)).await?;
        let body: InfoResponse = self.decode(response).await?;
        Ok(body.document.normalized())
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<(), StoreError> {
        let url = self.doc_url(&format!("delete/{}", document_id.as_str()));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn list_documents(
        &self,
        user_id: &UserId,
        scope: CatalogScope,
    ) -> Result<Vec<Document>, StoreError> {
        let suffix = match scope {
            CatalogScope::Project => "project-documents",
            CatalogScope::Own => "documents",
        };
        let url = self.doc_url(&format!("user/{}/{}", user_id.as_str(), suffix));
        let response = self.send(self.client.get(url)).await?;
        let body: ListResponse = self.decode(response).await?;
        Ok(body
            .recent_documents
            .into_iter()
            .filter_map(listed_document)
            .collect())
    }

    async fn list_projects(&self, user_id: &UserId, role: ActorRole) -> Result<Vec<Project>, StoreError> {
        let audience = if role.is_project_lead() { "owner" } else { "user" };
        let url = format!("{}/staff/{}/{}/projects", self.base_url, audience, user_id.as_str());
        let response = self.send(self.client.get(url)).await?;
        let body: ProjectsResponse = self.decode(response).await?;
        Ok(body.projects)
    }
}

/// Decode one listing entry. A malformed entry is logged and skipped.
fn listed_document(entry: Value) -> Option<Document> {
    let id = entry.get("document_id").and_then(Value::as_str).map(str::to_string);
    match serde_json::from_value::<Document>(entry) {
        Ok(document) => Some(document.normalized()),
        Err(err) => {
            tracing::warn!(document = ?id, error = %err, "skipping undecodable listing entry");
            None
        }
    }
}

/// Turn an error body into a readable message.
///
/// Understands `{"detail": "..."}`, validation arrays `{"detail": [{"msg": ..}]}`,
/// `{"detail": {"message": ..}}` and `{"message": ..}`.
pub fn error_detail(status: u16, body: &str) -> String {
    let fallback = format!("HTTP error! Status: {status}");
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback;
    };

    match value.get("detail") {
        Some(Value::String(detail)) => return detail.clone(),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return messages.join(", ");
            }
        }
        Some(detail @ Value::Object(_)) => {
            return detail
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| detail.to_string());
        }
        _ => {}
    }

    match &value {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(fallback),
        Value::String(message) => message.clone(),
        _ => fallback,
    }
}

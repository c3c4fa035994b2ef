use docstage_core::commit::{DocumentPatch, NewDocumentRequest, ReplaceRequest};
use docstage_core::error::StoreError;
use docstage_core::permissions::ActorRole;
use docstage_core::store::{CatalogScope, DocumentStore, HttpDocumentStore};
use docstage_core::types::{Category, DocumentId, ProjectId, StagingHandle, UserId};
use docstage_core::validation::SelectedFile;
use docstage_core::IngestConfig;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn store_for(server: &MockServer) -> HttpDocumentStore {
    let config = IngestConfig {
        base_url: server.uri(),
        request_timeout_ms: 5_000,
        ..IngestConfig::default()
    };
    HttpDocumentStore::new(&config).unwrap()
}

fn file() -> SelectedFile {
    SelectedFile::new("plan.pdf", "application/pdf", b"%PDF-1.7 test".to_vec())
}

async fn only_request_body(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    String::from_utf8_lossy(&requests[0].body).into_owned()
}

#[tokio::test]
async fn classify_decodes_the_staging_handle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/doc/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "predicted_category": "Drawings and Plans",
            "temp_file_path": "/tmp/uploads/abc123.pdf",
            "original_filename": "plan.pdf"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let result = store.classify(&file()).await.unwrap();

    assert_eq!(result.predicted_category, Category::DrawingsAndPlans);
    assert_eq!(result.staging_handle.as_str(), "/tmp/uploads/abc123.pdf");
    assert_eq!(result.original_filename, "plan.pdf");

    let body = only_request_body(&server).await;
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("%PDF-1.7 test"));
}

#[tokio::test]
async fn upload_sends_form_fields_and_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/doc/upload"))
        .and(header("Idempotency-Key", "sha256:abc:p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "document_id": "doc-42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let request = NewDocumentRequest {
        project_id: ProjectId::new("p1"),
        doc_name: "Tender Pack".into(),
        confirmed_category: Category::TenderDocuments,
        staging_handle: StagingHandle::new("/tmp/uploads/abc123.pdf"),
        original_filename: "tender.pdf".into(),
        uploader_id: UserId::new("u-1"),
        idempotency_key: "sha256:abc:p1".into(),
    };
    let receipt = store.upload(&request).await.unwrap();

    assert_eq!(receipt.document_id, DocumentId::new("doc-42"));
    assert!(receipt.document.is_none());

    let body = only_request_body(&server).await;
    for field in [
        "proj_id",
        "doc_name",
        "confirmed_category",
        "temp_file_path",
        "original_filename",
        "user_id",
    ] {
        assert!(body.contains(&format!("name=\"{field}\"")), "missing {field}");
    }
    assert!(body.contains("Tender Documents"));
}

#[tokio::test]
async fn replace_omits_unchanged_name() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/doc/update/doc-7/file"))
        .and(header_exists("Idempotency-Key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "document": {
                "document_id": "doc-7",
                "document_name": "Site Plan",
                "document_category": "Final Reports",
                "versions": [
                    {"version": 1, "uploaded_by": "a", "document_size": 10},
                    {"uploaded_by": "b", "document_size": 20}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let selected = file();
    let request = ReplaceRequest {
        document_id: DocumentId::new("doc-7"),
        file: &selected,
        confirmed_category: Category::FinalReports,
        uploader_id: UserId::new("u-1"),
        patch: DocumentPatch {
            new_name: None,
            new_category: Some(Category::FinalReports),
        },
        idempotency_key: format!("{}:doc-7", selected.digest),
    };
    let receipt = store.replace_file(&request).await.unwrap();

    let document = receipt.document.unwrap();
    let numbers: Vec<u32> = document.versions.unwrap().iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![1, 2]);

    let body = only_request_body(&server).await;
    assert!(body.contains("name=\"new_category\""));
    assert!(!body.contains("name=\"new_name\""));
}

#[tokio::test]
async fn info_update_is_json() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/doc/update/doc-7"))
        .and(body_json(json!({"new_name": "Site Plan B"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let patch = DocumentPatch {
        new_name: Some("Site Plan B".into()),
        new_category: None,
    };
    let receipt = store.update_info(&DocumentId::new("doc-7"), &patch).await.unwrap();

    assert_eq!(receipt.document_id, DocumentId::new("doc-7"));
}

#[tokio::test]
async fn error_details_are_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/doc/info/doc-1"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{"msg": "document_id is malformed"}]
        })))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let err = store.info(&DocumentId::new("doc-1")).await.unwrap_err();

    assert_eq!(
        err,
        StoreError::Server {
            status: 422,
            detail: "document_id is malformed".into(),
        }
    );
    assert!(!err.is_transient());
}

#[tokio::test]
async fn in_band_failure_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/doc/info/doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "Document not found"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let err = store.info(&DocumentId::new("doc-1")).await.unwrap_err();

    assert_eq!(
        err,
        StoreError::Server {
            status: 200,
            detail: "Document not found".into(),
        }
    );
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/doc/delete/doc-1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let err = store.delete(&DocumentId::new("doc-1")).await.unwrap_err();

    assert_eq!(
        err,
        StoreError::Server {
            status: 503,
            detail: "HTTP error! Status: 503".into(),
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn listings_use_scope_and_role_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/doc/user/u-1/project-documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "recent_documents": [
                {"document_id": "doc-1", "document_name": "A", "document_category": "Other"},
                {"document_id": "doc-2", "document_name": "B", "document_category": ""}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/doc/user/u-1/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/staff/owner/u-1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "projects": [{"project_id": "p1", "project_name": "Depot"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/staff/user/u-1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"projects": []})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let user = UserId::new("u-1");

    let project_docs = store.list_documents(&user, CatalogScope::Project).await.unwrap();
    assert_eq!(project_docs.len(), 2);
    assert_eq!(project_docs[1].document_category, None);
    assert!(store.list_documents(&user, CatalogScope::Own).await.unwrap().is_empty());

    let owned = store.list_projects(&user, ActorRole::ProjectOwner).await.unwrap();
    assert_eq!(owned[0].project_name, "Depot");
    assert!(store.list_projects(&user, ActorRole::Subcontractor).await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_survives_unrecognised_categories_and_bad_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/doc/user/u-1/project-documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "recent_documents": [
                {"document_id": "doc-1", "document_name": "A", "document_category": "Other"},
                {"document_id": "doc-2", "document_name": "B", "document_category": "Site Photos"},
                {"document_name": "no id"},
                {"document_id": "doc-4", "document_name": "D", "versions": [
                    {"uploaded_by": null, "document_size": null, "download_link": null}
                ]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let documents = store
        .list_documents(&UserId::new("u-1"), CatalogScope::Project)
        .await
        .unwrap();

    let ids: Vec<&str> = documents.iter().map(|d| d.document_id.as_str()).collect();
    assert_eq!(ids, vec!["doc-1", "doc-2", "doc-4"]);
    assert_eq!(documents[0].document_category, Some(Category::Other));
    assert_eq!(documents[1].document_category, None);
    assert_eq!(documents[1].category_label(), "Uncategorized");

    let version = &documents[2].versions.as_ref().unwrap()[0];
    assert_eq!(version.version_number, 1);
    assert_eq!(version.uploaded_by, "Unknown");
    assert_eq!(version.file_size, 0);
}

#[tokio::test]
async fn info_tolerates_unrecognised_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/doc/info/doc-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "document": {
                "document_id": "doc-2",
                "document_name": "B",
                "document_category": "Site Photos",
                "versions": [{"version": 1, "uploaded_by": "a", "document_link": null}]
            }
        })))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let document = store.info(&DocumentId::new("doc-2")).await.unwrap();

    assert_eq!(document.document_category, None);
    assert_eq!(document.version_count(), Some(1));
}

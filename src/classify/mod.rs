use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::error::StoreError;
use crate::store::DocumentStore;
use crate::types::category::Category;
use crate::types::identifiers::StagingHandle;
use crate::validation::SelectedFile;

/// What the classifier said about a file, plus where it staged it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_category: Category,
    pub staging_handle: StagingHandle,
    pub original_filename: String,
    /// Client-side receipt time, used to judge whether the staged file may
    /// have been evicted.
    pub staged_at: DateTime<Utc>,
}

impl ClassificationResult {
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.staged_at > ttl
    }
}

/// Sends files to the remote classifier.
///
/// Each attempt is bounded by the request timeout. Transient failures are
/// retried up to `retries` extra times; classification only stages a file, so
/// repeating it is harmless.
pub struct ClassificationClient<S: ?Sized> {
    store: Arc<S>,
    timeout: Duration,
    retries: u32,
}

impl<S> ClassificationClient<S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: &IngestConfig) -> Self {
        Self {
            store,
            timeout: config.request_timeout(),
            retries: config.classify_retries,
        }
    }

    pub async fn classify(&self, file: &SelectedFile) -> Result<ClassificationResult, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(file = %file.name(), digest = %file.digest, attempt, "classifying document");

            let outcome = match tokio::time::timeout(self.timeout, self.store.classify(file)).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        file = %file.name(),
                        category = %result.predicted_category,
                        staging_handle = %result.staging_handle,
                        "document classified"
                    );
                    return Ok(result);
                }
                Err(err) if err.is_transient() && attempt <= self.retries => {
                    tracing::warn!(file = %file.name(), attempt, error = %err, "classification attempt failed, retrying");
                }
                Err(err) => {
                    tracing::warn!(file = %file.name(), attempt, error = %err, "classification failed");
                    return Err(err);
                }
            }
        }
    }
}

use thiserror::Error;

use crate::permissions::Capability;
use crate::saga::lease::EditContext;

/// Local checks that block a transition before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file type for {name:?} ({content_type:?}); expected PDF, Word or Excel")]
    InvalidType { name: String, content_type: String },
    #[error("File is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },
    #[error("No project selected")]
    MissingProject,
    #[error("No document category confirmed")]
    MissingCategory,
    #[error("No file selected")]
    MissingFile,
    #[error("Document name {0:?} must be at least 3 characters")]
    InvalidName(String),
}

/// Failure talking to the remote document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Request timed out after {0}ms")]
    Timeout(u64),
    #[error("{detail}")]
    Server { status: u16, detail: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Timeout(_) => true,
            StoreError::Server { status, .. } => *status >= 500,
            StoreError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SagaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Permission denied: {0} is not allowed for this role")]
    PermissionDenied(Capability),
    #[error("Classification failed: {0}")]
    Classification(StoreError),
    #[error("Commit failed: {0}")]
    Commit(StoreError),
    #[error("Could not load projects: {0}")]
    Lookup(StoreError),
    #[error("Staged file has expired; classify the document again")]
    StagingExpired,
    #[error("The upload was cancelled")]
    Cancelled,
    #[error("Cannot {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("Another upload or edit is already open for {0}")]
    Busy(EditContext),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Permission denied: {0} is not allowed for this role")]
    PermissionDenied(Capability),
    #[error("Confirmation text does not match; type {expected:?} exactly")]
    ConfirmationMismatch { expected: String },
    #[error("Document {0} is not in the catalog")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::SagaError;
use crate::types::identifiers::DocumentId;

/// A surface on which at most one saga may be open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EditContext {
    /// The new-document upload surface.
    Upload,
    /// The edit/replace surface of one document.
    Document(DocumentId),
}

impl fmt::Display for EditContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditContext::Upload => f.write_str("the upload surface"),
            EditContext::Document(id) => write!(f, "document {id}"),
        }
    }
}

/// Registry of open edit contexts.
#[derive(Debug, Clone, Default)]
pub struct EditContexts {
    open: Arc<Mutex<HashSet<EditContext>>>,
}

impl EditContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, context: EditContext) -> Result<EditLease, SagaError> {
        let mut open = lock(&self.open);
        if !open.insert(context.clone()) {
            tracing::debug!(%context, "edit context already open");
            return Err(SagaError::Busy(context));
        }
        Ok(EditLease {
            context,
            open: Arc::clone(&self.open),
        })
    }

    pub fn is_open(&self, context: &EditContext) -> bool {
        lock(&self.open).contains(context)
    }
}

/// Holds an edit context open until dropped.
#[derive(Debug)]
pub struct EditLease {
    context: EditContext,
    open: Arc<Mutex<HashSet<EditContext>>>,
}

impl EditLease {
    pub fn context(&self) -> &EditContext {
        &self.context
    }
}

impl Drop for EditLease {
    fn drop(&mut self) {
        lock(&self.open).remove(&self.context);
    }
}

// The set holds no invariant a panicking holder could break.
fn lock(open: &Mutex<HashSet<EditContext>>) -> MutexGuard<'_, HashSet<EditContext>> {
    open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

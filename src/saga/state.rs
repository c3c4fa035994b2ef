//! The ingestion state machine, free of any I/O.
//!
//! ```text
//! Idle -> Selected -> Classifying -> Confirming -> Committing -> Done
//!            ^             |                           |
//!            +---- fail ---+---------- fail -----------+
//! any non-terminal state -> Cancelled
//! ```
//!
//! [`SagaState::apply`] is the only way to move between states. A refused
//! event leaves the state untouched.

use crate::classify::ClassificationResult;
use crate::document::Document;
use crate::error::{SagaError, ValidationError};
use crate::permissions::{Capability, CapabilitySet};
use crate::types::category::Category;
use crate::types::identifiers::{DocumentId, ProjectId};
use crate::validation::{DocumentKind, SelectedFile};

/// Where a commit will land.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestTarget {
    /// Create a new document. The project must be chosen before classifying.
    NewDocument { project_id: Option<ProjectId> },
    /// Append a version to this document, as last persisted.
    Replace { document: Box<Document> },
}

impl IngestTarget {
    pub fn required_capability(&self) -> Capability {
        match self {
            IngestTarget::NewDocument { .. } => Capability::Upload,
            IngestTarget::Replace { .. } => Capability::Edit,
        }
    }

    fn check(&self, capabilities: CapabilitySet) -> Result<(), SagaError> {
        let required = self.required_capability();
        if !capabilities.contains(required) {
            return Err(SagaError::PermissionDenied(required));
        }
        if let IngestTarget::NewDocument { project_id: None } = self {
            return Err(ValidationError::MissingProject.into());
        }
        Ok(())
    }
}

/// Everything gathered during one saga run. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingIngestion {
    pub file: SelectedFile,
    /// Kind the validator accepted the file as.
    pub kind: DocumentKind,
    pub target: IngestTarget,
    pub classification: Option<ClassificationResult>,
    pub confirmed_category: Option<Category>,
    /// User-supplied name; new documents fall back to the filename stem and
    /// replacements to the current name.
    pub display_name: Option<String>,
}

impl PendingIngestion {
    pub fn new(file: SelectedFile, kind: DocumentKind, target: IngestTarget) -> Self {
        PendingIngestion {
            file,
            kind,
            target,
            classification: None,
            confirmed_category: None,
            display_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Created,
    VersionAppended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub kind: CommitKind,
    pub document_id: DocumentId,
    /// The committed document, when the store returned it or a follow-up
    /// `info` fetch succeeded.
    pub document: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SagaState {
    #[default]
    Idle,
    Selected(PendingIngestion),
    Classifying(PendingIngestion),
    Confirming(PendingIngestion),
    Committing(PendingIngestion),
    Done(CommitOutcome),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SagaEvent {
    Select(PendingIngestion),
    SetTarget(IngestTarget),
    SetName(Option<String>),
    BeginClassify,
    Classified(ClassificationResult),
    ClassificationFailed,
    SetCategory(Category),
    BeginCommit,
    Committed(CommitOutcome),
    CommitFailed,
    /// The staged file is too old to commit; classification must be redone.
    StagingExpired,
    Cancel,
}

impl SagaEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SagaEvent::Select(_) => "select a file",
            SagaEvent::SetTarget(_) => "change the target",
            SagaEvent::SetName(_) => "rename",
            SagaEvent::BeginClassify => "classify",
            SagaEvent::Classified(_) => "accept a classification",
            SagaEvent::ClassificationFailed => "fail classification",
            SagaEvent::SetCategory(_) => "set the category",
            SagaEvent::BeginCommit => "commit",
            SagaEvent::Committed(_) => "finish a commit",
            SagaEvent::CommitFailed => "fail a commit",
            SagaEvent::StagingExpired => "expire the staged file",
            SagaEvent::Cancel => "cancel",
        }
    }
}

impl SagaState {
    pub fn name(&self) -> &'static str {
        match self {
            SagaState::Idle => "idle",
            SagaState::Selected(_) => "selected",
            SagaState::Classifying(_) => "classifying",
            SagaState::Confirming(_) => "confirming",
            SagaState::Committing(_) => "committing",
            SagaState::Done(_) => "done",
            SagaState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Done(_) | SagaState::Cancelled)
    }

    pub fn pending(&self) -> Option<&PendingIngestion> {
        match self {
            SagaState::Selected(p)
            | SagaState::Classifying(p)
            | SagaState::Confirming(p)
            | SagaState::Committing(p) => Some(p),
            _ => None,
        }
    }

    /// Apply one event. On error the state is left exactly as it was.
    pub fn apply(&mut self, event: SagaEvent, capabilities: CapabilitySet) -> Result<(), SagaError> {
        let from = self.name();
        let event_name = event.name();
        let current = std::mem::take(self);

        match transition(current, event, capabilities) {
            Ok(next) => {
                tracing::debug!(from, to = next.name(), event = event_name, "saga transition");
                *self = next;
                Ok(())
            }
            Err((unchanged, err)) => {
                tracing::debug!(state = from, event = event_name, error = %err, "saga transition refused");
                *self = unchanged;
                Err(err)
            }
        }
    }
}

type Step = Result<SagaState, (SagaState, SagaError)>;

fn refuse(state: SagaState, event: &'static str) -> Step {
    let err = SagaError::InvalidTransition {
        state: state.name(),
        event,
    };
    Err((state, err))
}

fn transition(state: SagaState, event: SagaEvent, capabilities: CapabilitySet) -> Step {
    use SagaEvent as E;
    use SagaState as S;

    let event_name = event.name();
    match (state, event) {
        (S::Idle | S::Selected(_) | S::Confirming(_), E::Select(pending)) => Ok(S::Selected(pending)),

        (S::Selected(mut p), E::SetTarget(target)) => {
            p.target = target;
            Ok(S::Selected(p))
        }
        (S::Confirming(mut p), E::SetTarget(target)) => {
            p.target = target;
            Ok(S::Confirming(p))
        }

        (S::Selected(mut p), E::SetName(name)) => {
            p.display_name = name;
            Ok(S::Selected(p))
        }
        (S::Confirming(mut p), E::SetName(name)) => {
            p.display_name = name;
            Ok(S::Confirming(p))
        }

        (S::Selected(p), E::BeginClassify) => match p.target.check(capabilities) {
            Ok(()) => Ok(S::Classifying(p)),
            Err(err) => Err((S::Selected(p), err)),
        },

        (S::Classifying(mut p), E::Classified(result)) => {
            // A category the user already confirmed survives re-entry.
            if p.confirmed_category.is_none() {
                p.confirmed_category = Some(result.predicted_category);
            }
            p.classification = Some(result);
            Ok(S::Confirming(p))
        }
        (S::Classifying(mut p), E::ClassificationFailed) => {
            p.classification = None;
            Ok(S::Selected(p))
        }

        (S::Confirming(mut p), E::SetCategory(category)) => {
            p.confirmed_category = Some(category);
            Ok(S::Confirming(p))
        }

        (S::Confirming(p), E::BeginCommit) => {
            if p.confirmed_category.is_none() {
                return Err((S::Confirming(p), ValidationError::MissingCategory.into()));
            }
            match p.target.check(capabilities) {
                Ok(()) => Ok(S::Committing(p)),
                Err(err) => Err((S::Confirming(p), err)),
            }
        }

        (S::Committing(_), E::Committed(outcome)) => Ok(S::Done(outcome)),
        (S::Committing(p), E::CommitFailed) => Ok(S::Selected(p)),
        (S::Committing(mut p), E::StagingExpired) => {
            p.classification = None;
            Ok(S::Selected(p))
        }

        (state, E::Cancel) if !state.is_terminal() => Ok(S::Cancelled),

        (state, _) => refuse(state, event_name),
    }
}

//! Local file checks run before anything is sent to the store.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::identifiers::FileDigest;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Human-readable size: `MB` from 1 MiB up, `KB` from 1 KiB, bytes below.
/// At most one decimal place, truncated, and dropped when it is zero.
pub fn format_size(bytes: u64) -> String {
    let (unit, suffix) = match bytes {
        b if b >= MIB => (MIB, "MB"),
        b if b >= KIB => (KIB, "KB"),
        b => return format!("{b}B"),
    };
    let tenths = u128::from(bytes) * 10 / u128::from(unit);
    match tenths % 10 {
        0 => format!("{}{suffix}", tenths / 10),
        fraction => format!("{}.{fraction}{suffix}", tenths / 10),
    }
}

/// Document formats the store can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Pdf,
        DocumentKind::Doc,
        DocumentKind::Docx,
        DocumentKind::Xls,
        DocumentKind::Xlsx,
    ];

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Doc => "application/msword",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::Xls => "application/vnd.ms-excel",
            DocumentKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Doc => "doc",
            DocumentKind::Docx => "docx",
            DocumentKind::Xls => "xls",
            DocumentKind::Xlsx => "xlsx",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim();
        DocumentKind::ALL
            .iter()
            .copied()
            .find(|k| k.mime_type().eq_ignore_ascii_case(mime))
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        DocumentKind::ALL
            .iter()
            .copied()
            .find(|k| k.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What the validator sees of a candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    /// Declared MIME type, possibly empty.
    pub content_type: String,
    pub size: u64,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        FileDescriptor {
            name: name.into(),
            content_type: content_type.into(),
            size,
        }
    }
}

/// A user-selected file: its descriptor plus the raw bytes.
///
/// The bytes are kept for the lifetime of a saga run because a replace commit
/// uploads them again.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub descriptor: FileDescriptor,
    pub bytes: Vec<u8>,
    pub digest: FileDigest,
}

impl SelectedFile {
    /// The descriptor size is taken from the bytes, not from the caller.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let descriptor = FileDescriptor::new(name, content_type, bytes.len() as u64);
        let digest = FileDigest::from_bytes(&bytes);
        SelectedFile {
            descriptor,
            bytes,
            digest,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("descriptor", &self.descriptor)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    InvalidType,
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub max_file_size: u64,
    pub allowed_kinds: BTreeSet<DocumentKind>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_kinds: [
                DocumentKind::Pdf,
                DocumentKind::Docx,
                DocumentKind::Xls,
                DocumentKind::Xlsx,
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// Type and size policy check. Pure; no I/O.
#[derive(Debug, Clone, Default)]
pub struct FileValidator {
    policy: ValidationPolicy,
}

impl FileValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Kind of the file as far as the allow-list is concerned: the declared
    /// MIME type wins, the extension is the fallback.
    pub fn allowed_kind(&self, file: &FileDescriptor) -> Option<DocumentKind> {
        [
            DocumentKind::from_mime(&file.content_type),
            DocumentKind::from_filename(&file.name),
        ]
        .into_iter()
        .flatten()
        .find(|kind| self.policy.allowed_kinds.contains(kind))
    }

    /// Type is checked before size.
    pub fn validate(&self, file: &FileDescriptor) -> Verdict {
        if self.allowed_kind(file).is_none() {
            return Verdict::Rejected(RejectReason::InvalidType);
        }
        if file.size > self.policy.max_file_size {
            return Verdict::Rejected(RejectReason::TooLarge);
        }
        Verdict::Accepted
    }

    /// Like [`validate`](Self::validate), but yields the accepted kind or the
    /// matching [`ValidationError`].
    pub fn accept(&self, file: &FileDescriptor) -> Result<DocumentKind, ValidationError> {
        let invalid_type = || ValidationError::InvalidType {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
        };
        match self.validate(file) {
            Verdict::Accepted => self.allowed_kind(file).ok_or_else(invalid_type),
            Verdict::Rejected(RejectReason::InvalidType) => Err(invalid_type()),
            Verdict::Rejected(RejectReason::TooLarge) => Err(ValidationError::TooLarge {
                size: file.size,
                max: self.policy.max_file_size,
            }),
        }
    }
}

pub const MIN_NAME_LEN: usize = 3;

/// Trim a user-supplied document name and enforce the minimum length.
pub fn normalize_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_NAME_LEN {
        return Err(ValidationError::InvalidName(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

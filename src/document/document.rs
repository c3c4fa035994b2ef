use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::timestamp;
use crate::types::category::{self, Category};
use crate::types::identifiers::{DocumentId, ProjectId};

pub const UNKNOWN_UPLOADER: &str = "Unknown";
pub const UNTITLED: &str = "Untitled";
pub const UNCATEGORIZED: &str = "Uncategorized";

fn unknown_uploader() -> String {
    UNKNOWN_UPLOADER.to_string()
}

/// An explicit `null` decodes like a missing key.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_uploader<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|name| !name.trim().is_empty()).unwrap_or_else(unknown_uploader))
}

/// One immutable upload of a document's file.
///
/// Versions are created by the store on a successful commit and never edited
/// afterwards. The client only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// 1-based, monotonic within a document. `0` on the wire means "not
    /// reported"; [`Document::normalize`] replaces it with the position.
    #[serde(rename = "version", default, deserialize_with = "null_default")]
    pub version_number: u32,
    #[serde(default = "unknown_uploader", deserialize_with = "null_uploader")]
    pub uploaded_by: String,
    #[serde(default, with = "timestamp")]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_default")]
    pub original_filename: String,
    #[serde(default, deserialize_with = "null_default")]
    pub file_type: String,
    #[serde(
        rename = "document_size",
        alias = "file_size",
        default,
        deserialize_with = "null_default"
    )]
    pub file_size: u64,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default, deserialize_with = "null_default")]
    pub document_link: String,
    #[serde(default, deserialize_with = "null_default")]
    pub download_link: String,
}

/// A versioned document owned by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    #[serde(default, deserialize_with = "null_default")]
    pub document_name: String,
    /// `None` while classification is pending.
    #[serde(default, with = "category::pending")]
    pub document_category: Option<Category>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default, with = "timestamp")]
    pub last_modified_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub document_link: Option<String>,
    #[serde(default)]
    pub download_link: Option<String>,
    /// Oldest first. `None` when the listing endpoint did not include the
    /// history; fetch `info` to load it.
    #[serde(default)]
    pub versions: Option<Vec<Version>>,
}

impl Document {
    /// Fill in version numbers the store left out, by position.
    pub fn normalize(&mut self) {
        if let Some(versions) = self.versions.as_mut() {
            for (index, version) in versions.iter_mut().enumerate() {
                if version.version_number == 0 {
                    version.version_number = index as u32 + 1;
                }
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Latest version, if the history is loaded and non-empty.
    pub fn current_version(&self) -> Option<&Version> {
        self.versions.as_ref().and_then(|v| v.last())
    }

    pub fn version_count(&self) -> Option<usize> {
        self.versions.as_ref().map(Vec::len)
    }

    pub fn display_name(&self) -> &str {
        if self.document_name.trim().is_empty() {
            UNTITLED
        } else {
            &self.document_name
        }
    }

    pub fn category_label(&self) -> &str {
        self.document_category.map(|c| c.as_str()).unwrap_or(UNCATEGORIZED)
    }
}

/// A project the current user may upload into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: ProjectId,
    #[serde(default, deserialize_with = "null_default")]
    pub project_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub project_description: String,
}

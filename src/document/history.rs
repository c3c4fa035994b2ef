use chrono::{DateTime, Utc};
use serde::Serialize;

use super::document::{Document, Version, UNKNOWN_UPLOADER};

/// Summary of the newest version, or a placeholder when the history has not
/// been loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestVersion {
    pub version_number: u32,
    pub uploaded_by: String,
    pub upload_date: Option<DateTime<Utc>>,
    pub file_type: String,
    pub file_size: u64,
    pub page_count: Option<u32>,
    pub original_filename: String,
    /// `false` for the placeholder.
    pub loaded: bool,
}

impl LatestVersion {
    fn placeholder() -> Self {
        LatestVersion {
            version_number: 1,
            uploaded_by: UNKNOWN_UPLOADER.to_string(),
            upload_date: None,
            file_type: String::new(),
            file_size: 0,
            page_count: None,
            original_filename: String::new(),
            loaded: false,
        }
    }

    fn from_version(version: &Version) -> Self {
        LatestVersion {
            version_number: version.version_number,
            uploaded_by: version.uploaded_by.clone(),
            upload_date: version.upload_date,
            file_type: version.file_type.clone(),
            file_size: version.file_size,
            page_count: version.page_count,
            original_filename: version.original_filename.clone(),
            loaded: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionEntry<'a> {
    pub version: &'a Version,
    pub is_latest: bool,
}

/// Facts derived from a document's version list.
///
/// Pure and total: a document whose versions are not loaded yields
/// `total_versions == 0`, `total_size == 0` and a placeholder latest version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionHistory<'a> {
    pub total_versions: usize,
    pub total_size: u64,
    pub latest_version: LatestVersion,
    pub entries: Vec<VersionEntry<'a>>,
}

impl<'a> VersionHistory<'a> {
    pub fn of(document: &'a Document) -> Self {
        Self::from_versions(document.versions.as_deref())
    }

    pub fn from_versions(versions: Option<&'a [Version]>) -> Self {
        let versions = match versions {
            Some(v) if !v.is_empty() => v,
            _ => {
                return VersionHistory {
                    total_versions: 0,
                    total_size: 0,
                    latest_version: LatestVersion::placeholder(),
                    entries: Vec::new(),
                }
            }
        };

        let last = versions.len() - 1;
        let entries = versions
            .iter()
            .enumerate()
            .map(|(index, version)| VersionEntry {
                version,
                is_latest: index == last,
            })
            .collect();

        VersionHistory {
            total_versions: versions.len(),
            total_size: versions.iter().map(|v| v.file_size).sum(),
            latest_version: LatestVersion::from_version(&versions[last]),
            entries,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.latest_version.loaded
    }
}

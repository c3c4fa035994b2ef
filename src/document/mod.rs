pub mod document;
pub mod history;
pub mod timestamp;

pub use crate::types::identifiers::{DocumentId, ProjectId};
pub use document::{Document, Project, Version};
pub use history::{LatestVersion, VersionEntry, VersionHistory};

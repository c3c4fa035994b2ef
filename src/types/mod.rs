pub mod category;
pub mod identifiers;

pub use category::{Category, UnknownCategory};
pub use identifiers::{DocumentId, FileDigest, ProjectId, StagingHandle, UserId};

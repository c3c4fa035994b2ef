//! Role to capability mapping.
//!
//! This is a client-side mirror of the store's policy. It exists so the
//! workflow can refuse early with a clear notice; the store enforces the same
//! rules on its own and remains the authority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    #[serde(rename = "Project Owner")]
    ProjectOwner,
    #[serde(rename = "Project Manager")]
    ProjectManager,
    #[serde(rename = "Site Engineer")]
    SiteEngineer,
    #[serde(rename = "Quantity Surveyor")]
    QuantitySurveyor,
    #[serde(rename = "Supervisor")]
    Supervisor,
    #[serde(rename = "Subcontractor")]
    Subcontractor,
    #[serde(rename = "Team Member")]
    TeamMember,
    #[serde(rename = "Viewer")]
    Viewer,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl ActorRole {
    pub const ALL: [ActorRole; 8] = [
        ActorRole::ProjectOwner,
        ActorRole::ProjectManager,
        ActorRole::SiteEngineer,
        ActorRole::QuantitySurveyor,
        ActorRole::Supervisor,
        ActorRole::Subcontractor,
        ActorRole::TeamMember,
        ActorRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::ProjectOwner => "Project Owner",
            ActorRole::ProjectManager => "Project Manager",
            ActorRole::SiteEngineer => "Site Engineer",
            ActorRole::QuantitySurveyor => "Quantity Surveyor",
            ActorRole::Supervisor => "Supervisor",
            ActorRole::Subcontractor => "Subcontractor",
            ActorRole::TeamMember => "Team Member",
            ActorRole::Viewer => "Viewer",
        }
    }

    /// Owners and managers see every project they own or manage; other roles
    /// only the projects they are assigned to.
    pub fn is_project_lead(&self) -> bool {
        matches!(self, ActorRole::ProjectOwner | ActorRole::ProjectManager)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActorRole::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Upload,
    /// Covers both info edits and version replacement.
    Edit,
    Delete,
    View,
    Download,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Upload,
        Capability::Edit,
        Capability::Delete,
        Capability::View,
        Capability::Download,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Upload => 1 << 0,
            Capability::Edit => 1 << 1,
            Capability::Delete => 1 << 2,
            Capability::View => 1 << 3,
            Capability::Download => 1 << 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Upload => "upload",
            Capability::Edit => "edit",
            Capability::Delete => "delete",
            Capability::View => "view",
            Capability::Download => "download",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub fn empty() -> Self {
        CapabilitySet(0)
    }

    pub fn with(self, capability: Capability) -> Self {
        CapabilitySet(self.0 | capability.bit())
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(CapabilitySet::empty(), CapabilitySet::with)
    }
}

pub struct PermissionGate;

impl PermissionGate {
    pub fn capabilities(role: ActorRole) -> CapabilitySet {
        let base: CapabilitySet = [Capability::Upload, Capability::View, Capability::Download]
            .into_iter()
            .collect();
        if role.is_project_lead() {
            base.with(Capability::Edit).with(Capability::Delete)
        } else {
            base
        }
    }

    pub fn allows(role: ActorRole, capability: Capability) -> bool {
        Self::capabilities(role).contains(capability)
    }
}

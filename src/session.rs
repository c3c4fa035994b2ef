use serde::{Deserialize, Serialize};

use crate::permissions::{ActorRole, Capability, CapabilitySet, PermissionGate};
use crate::types::identifiers::UserId;

/// The signed-in user, as supplied by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    #[serde(rename = "user_role")]
    pub role: ActorRole,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: String,
}

impl Session {
    pub fn new(user_id: impl Into<UserId>, role: ActorRole) -> Self {
        Session {
            user_id: user_id.into(),
            role,
            first_name: String::new(),
            username: String::new(),
        }
    }

    pub fn capabilities(&self) -> CapabilitySet {
        PermissionGate::capabilities(self.role)
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }
}

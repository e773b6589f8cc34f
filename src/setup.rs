//! Platform preconditions for screening.
//!
//! The host must hold the call-screening role and the permissions below
//! before any call event reaches the engine. Nothing here negotiates them;
//! the host reports what it has and this module describes what is missing.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadContacts,
    ReadPhoneState,
    AnswerPhoneCalls,
    /// Only required where the platform gates notifications.
    PostNotifications,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::ReadContacts,
        Permission::ReadPhoneState,
        Permission::AnswerPhoneCalls,
        Permission::PostNotifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadContacts => "read_contacts",
            Permission::ReadPhoneState => "read_phone_state",
            Permission::AnswerPhoneCalls => "answer_phone_calls",
            Permission::PostNotifications => "post_notifications",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permissions the host must grant, given whether notifications are gated.
pub fn required_permissions(notifications_gated: bool) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| notifications_gated || *p != Permission::PostNotifications)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtectionState {
    NeedsPermissions,
    NeedsScreeningRole,
    Active,
}

impl ProtectionState {
    pub fn is_active(&self) -> bool {
        matches!(self, ProtectionState::Active)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ProtectionState::NeedsPermissions => {
                "Permissions required: grant them to enable call screening"
            }
            ProtectionState::NeedsScreeningRole => {
                "Not the call-screening app: set it as the default to enable screening"
            }
            ProtectionState::Active => "Protection active: only saved contacts can call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupStatus {
    #[serde(default)]
    pub granted_permissions: Vec<Permission>,
    #[serde(default)]
    pub screening_role_held: bool,
    #[serde(default = "default_notifications_gated")]
    pub notifications_gated: bool,
}

fn default_notifications_gated() -> bool {
    true
}

impl Default for SetupStatus {
    fn default() -> Self {
        Self {
            granted_permissions: Vec::new(),
            screening_role_held: false,
            notifications_gated: default_notifications_gated(),
        }
    }
}

impl SetupStatus {
    pub fn has_permissions(&self) -> bool {
        self.missing_permissions().is_empty()
    }

    pub fn missing_permissions(&self) -> Vec<Permission> {
        required_permissions(self.notifications_gated)
            .into_iter()
            .filter(|p| !self.granted_permissions.contains(p))
            .collect()
    }

    /// Permissions come first: the role is only worth requesting once they
    /// are all granted.
    pub fn state(&self) -> ProtectionState {
        if !self.has_permissions() {
            ProtectionState::NeedsPermissions
        } else if !self.screening_role_held {
            ProtectionState::NeedsScreeningRole
        } else {
            ProtectionState::Active
        }
    }
}

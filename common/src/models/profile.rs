// common/src/models/profile.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application metadata about an identity, stored in the `profiles` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same value as the owning identity's id
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "full_name")]
    pub display_name: Option<String>,
    #[serde(rename = "avatar_url")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row inserted once, right after the identity is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "full_name")]
    pub display_name: Option<String>,
}

/// Partial profile write.
///
/// `None` leaves a field untouched. For the nullable columns
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "full_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<Option<String>>,
    #[serde(
        rename = "avatar_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<Option<String>>,
}

impl ProfileUpdate {
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(Some(name.into())),
            ..Self::default()
        }
    }

    pub fn avatar(avatar: impl Into<String>) -> Self {
        Self {
            avatar: Some(Some(avatar.into())),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none() && self.avatar.is_none()
    }
}

impl Profile {
    /// Build the stored row for a freshly inserted profile
    pub fn from_new(row: NewProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the fields present in `update`, keeping everything else
    pub fn merge(&mut self, update: &ProfileUpdate) {
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(display_name) = &update.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(avatar) = &update.avatar {
            self.avatar = avatar.clone();
        }
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Reader,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("moderator") => UserRole::Moderator,
            Some("admin") => UserRole::Admin,
            _ => UserRole::Reader,
        }
    }

    pub fn can_moderate(self) -> bool {
        matches!(self, UserRole::Moderator | UserRole::Admin)
    }
}

/// Caller identity resolved from a Supabase access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
}

impl AuthUser {
    pub fn reader(id: Uuid) -> Self {
        Self {
            id,
            email: None,
            role: UserRole::Reader,
        }
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role stored on `profiles.role`. It is the only authorization attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Student ("Mahasiswa"), self-registered.
    User,
    /// Program admin, created by a super admin.
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "Student",
            Role::Admin => "Admin",
            Role::SuperAdmin => "Super Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive; stored roles are not always normalised.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Row of the `profiles` table. `id` equals the auth user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(deserialize_with = "deserialize_role")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: Uuid, full_name: Option<String>, email: Option<String>, role: Role) -> Self {
        Self {
            id,
            full_name,
            email,
            role,
            created_at: Utc::now(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Unnamed user")
    }
}

fn deserialize_role<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// JWT claims carried by a Supabase access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// subject / user id
    pub sub: String,
    pub aud: Option<String>,
    pub exp: usize,
    pub iat: Option<usize>,
    pub role: Option<String>, // postgres role ("authenticated"), not the profile role
    pub email: Option<String>,
}

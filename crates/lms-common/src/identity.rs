//! The identity record kept under the durable `user` key.
//!
//! Both the session store and the request dispatcher decode the entry
//! through [`load_identity`], so they agree on which records count.

use crate::storage::{keys, load_json, DurableStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of principal roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
    Organization,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
            Role::Organization => "organization",
            Role::Manager => "manager",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            "organization" => Ok(Role::Organization),
            "manager" => Ok(Role::Manager),
            other => Err(format!(
                "unknown role '{}' (expected student, instructor, admin, organization or manager)",
                other
            )),
        }
    }
}

/// The authenticated principal as returned by the API.
///
/// Fields the client does not model are kept in `extra` so the record
/// survives a write/read cycle through durable storage unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Bearer credential. Never persisted when empty.
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Role-specific details (instructor bio, organization info, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identity {
    pub fn has_credential(&self) -> bool {
        !self.token.is_empty()
    }
}

/// Read the stored identity.
///
/// A record missing `_id`, `name`, `email` or a known `role` is treated as
/// absent, exactly like undecodable JSON.
pub fn load_identity(store: &dyn DurableStore) -> anyhow::Result<Option<Identity>> {
    load_json(store, keys::USER)
}

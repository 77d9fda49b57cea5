//! Backend abstraction consumed by the reconciler
//!
//! Records mirror the identity backend's JSON representations; the trait
//! groups the client lookup, role CRUD and composite membership calls.

use crate::error::BackendResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute key tagging roles owned by this tool
pub const MARKER_ATTRIBUTE: &str = "mergeTool";

/// Attribute value of [`MARKER_ATTRIBUTE`] on managed roles
pub const MARKER_VALUE: &str = "true";

/// Role namespace on the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeId {
    Realm,
    /// Client scope, keyed by the backend's opaque client id
    Client(String),
}

impl ScopeId {
    pub fn client(id: impl Into<String>) -> Self {
        Self::Client(id.into())
    }

    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Realm => None,
            Self::Client(id) => Some(id),
        }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Realm => write!(f, "realm"),
            Self::Client(id) => write!(f, "client {}", id),
        }
    }
}

/// Client as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    /// Opaque backend key
    pub id: String,
    /// Human-facing client identifier
    pub client_id: String,
}

impl ClientRecord {
    pub fn new(id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
        }
    }
}

/// Role as stored on the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRole {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Reported by the backend once at least one member is attached
    #[serde(default)]
    pub composite: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_role: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl RemoteRole {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Representation used for the create call: name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_marker(mut self) -> Self {
        self.attributes.insert(
            MARKER_ATTRIBUTE.to_string(),
            vec![MARKER_VALUE.to_string()],
        );
        self
    }

    /// Whether this role carries the ownership marker
    pub fn is_managed(&self) -> bool {
        self.attributes
            .get(MARKER_ATTRIBUTE)
            .map(|values| values.iter().any(|v| v == MARKER_VALUE))
            .unwrap_or(false)
    }
}

/// Capabilities of an authenticated identity backend
#[async_trait]
pub trait RoleBackend: Send + Sync {
    /// All clients of the realm
    async fn list_clients(&self) -> BackendResult<Vec<ClientRecord>>;

    /// Clients whose client identifier equals `client_id`
    async fn find_clients(&self, client_id: &str) -> BackendResult<Vec<ClientRecord>>;

    /// All roles of a scope, with attributes
    async fn list_roles(&self, scope: &ScopeId) -> BackendResult<Vec<RemoteRole>>;

    async fn get_role(&self, scope: &ScopeId, name: &str) -> BackendResult<RemoteRole>;

    async fn create_role(&self, scope: &ScopeId, role: &RemoteRole) -> BackendResult<()>;

    async fn update_role(&self, scope: &ScopeId, name: &str, role: &RemoteRole)
        -> BackendResult<()>;

    async fn delete_role(&self, scope: &ScopeId, name: &str) -> BackendResult<()>;

    /// Direct composite members of a role
    async fn get_composites(&self, scope: &ScopeId, name: &str) -> BackendResult<Vec<RemoteRole>>;

    async fn add_composites(
        &self,
        scope: &ScopeId,
        name: &str,
        members: &[RemoteRole],
    ) -> BackendResult<()>;

    async fn remove_composites(
        &self,
        scope: &ScopeId,
        name: &str,
        members: &[RemoteRole],
    ) -> BackendResult<()>;
}

/// Roles of `scope` carrying the ownership marker
pub async fn list_managed_roles(
    backend: &dyn RoleBackend,
    scope: &ScopeId,
) -> BackendResult<Vec<RemoteRole>> {
    let roles = backend.list_roles(scope).await?;
    Ok(roles.into_iter().filter(RemoteRole::is_managed).collect())
}

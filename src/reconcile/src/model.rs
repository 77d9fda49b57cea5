//! Declaration model
//!
//! The desired state: an ordered list of scopes, each holding a tree of role
//! members. A member is decided once at parse time to be either a leaf
//! reference or a composite node with its own members.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved scope name for realm-level roles
pub const REALM_SCOPE: &str = "realm";

/// A declared role node
///
/// A node with members is a composite; a node without members is a plain role
/// that only carries metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleNode {
    pub name: String,

    #[serde(rename = "roles", alias = "members", default)]
    pub members: Vec<MemberRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl RoleNode {
    pub fn new(name: impl Into<String>, members: Vec<MemberRef>) -> Self {
        Self {
            name: name.into(),
            members,
            description: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.attributes.insert(key.into(), values);
        self
    }

    /// True when the node asserts composite membership
    pub fn is_composite(&self) -> bool {
        !self.members.is_empty()
    }

    /// Names of the direct members, in declaration order
    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name().to_string()).collect()
    }
}

/// A member of a role tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    /// Bare reference, possibly qualified (`<client>name`)
    Leaf(String),
    /// Structured node
    Composite(RoleNode),
}

impl MemberRef {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::Leaf(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(name) => name,
            Self::Composite(node) => &node.name,
        }
    }
}

impl From<&str> for MemberRef {
    fn from(name: &str) -> Self {
        Self::Leaf(name.to_string())
    }
}

impl From<RoleNode> for MemberRef {
    fn from(node: RoleNode) -> Self {
        Self::Composite(node)
    }
}

/// Declared roles of one scope (a client or the realm)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDeclaration {
    /// Scope name as written in the declaration
    pub name: String,
    pub members: Vec<MemberRef>,
}

impl ScopeDeclaration {
    pub fn new(name: impl Into<String>, members: Vec<MemberRef>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Lowercased lookup key
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn is_realm(&self) -> bool {
        self.name.eq_ignore_ascii_case(REALM_SCOPE)
    }
}

/// The complete desired state, scopes in the order they were given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
    pub scopes: Vec<ScopeDeclaration>,
}

impl Declaration {
    pub fn new(scopes: Vec<ScopeDeclaration>) -> Self {
        Self { scopes }
    }

    /// Scopes in processing order: realm entries last, others as given
    pub fn processing_order(&self) -> Vec<&ScopeDeclaration> {
        let mut ordered: Vec<&ScopeDeclaration> = self.scopes.iter().collect();
        // sort_by_key is stable
        ordered.sort_by_key(|scope| scope.is_realm());
        ordered
    }
}

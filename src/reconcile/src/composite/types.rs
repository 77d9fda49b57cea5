//! Composite assertion type

use crate::reference::is_qualified;
use serde::{Deserialize, Serialize};

/// A composite-membership assertion: `name` must have exactly `members`
/// as direct members (given as role references)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAssertion {
    pub name: String,
    pub members: Vec<String>,
}

impl CompositeAssertion {
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Members that refer to roles of the owning scope
    pub fn local_members(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .map(String::as_str)
            .filter(|m| !is_qualified(m))
    }

    /// Check the assertion is well formed
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Composite role name cannot be empty".to_string());
        }

        if self.members.is_empty() {
            return Err(format!("Composite role '{}' has no members", self.name));
        }

        if self.members.iter().any(String::is_empty) {
            return Err(format!("Composite role '{}' has an empty member", self.name));
        }

        Ok(())
    }
}

//! Declaration file loading
//!
//! ```yaml
//! profiles:
//!   default:
//!     baseUrl: http://localhost:8080
//!     realm: demo
//!     grant: { client_id: admin-cli, username: admin, password: <env::KC_PASSWORD> }
//! roles:
//!   billing:
//!     - viewer
//!     - name: admin
//!       roles: [viewer, <realm>offline_access]
//!   realm:
//!     - name: staff
//!       roles: [<billing>admin]
//! ```

use crate::error::{ConfigError, Result};
use rolemerge_reconcile::{Declaration, MemberRef, ScopeDeclaration};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

/// Parsed declaration file
#[derive(Debug, Clone)]
pub struct DeclarationFile {
    /// Raw profiles; resolved on demand
    pub profiles: Mapping,
    /// Scopes in file order
    pub declaration: Declaration,
}

impl DeclarationFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded declaration file {}", path.display());
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(text)?;

        let profiles = match document.get("profiles") {
            Some(Value::Mapping(profiles)) => profiles.clone(),
            _ => {
                return Err(ConfigError::Configuration(
                    "No profiles found in file".to_string(),
                ))
            }
        };

        let roles = match document.get("roles") {
            Some(Value::Mapping(roles)) => roles,
            _ => {
                return Err(ConfigError::Configuration(
                    "No roles found in file".to_string(),
                ))
            }
        };

        let mut scopes = Vec::with_capacity(roles.len());
        for (key, members) in roles {
            let name = scope_name(key)?;
            let members: Vec<MemberRef> = match members {
                Value::Null => Vec::new(),
                other => serde_yaml::from_value(other.clone())?,
            };
            scopes.push(ScopeDeclaration::new(name, members));
        }

        Ok(Self {
            profiles,
            declaration: Declaration::new(scopes),
        })
    }

    pub fn profile(&self, name: &str) -> Option<&Value> {
        self.profiles.get(name)
    }
}

fn scope_name(key: &Value) -> Result<String> {
    match key {
        Value::String(name) => Ok(name.clone()),
        other => Err(ConfigError::Configuration(format!(
            "Scope name must be a string, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
profiles:
  default:
    baseUrl: http://localhost:8080
    realm: demo
    grant:
      client_id: admin-cli
roles:
  zeta:
    - viewer
  realm:
    - name: staff
      roles: ["<zeta>viewer"]
  alpha:
    - name: admin
      description: Full access
      roles:
        - viewer
        - name: editor
          members: [viewer]
  empty:
"#;

    #[test]
    fn test_parse_preserves_scope_order() {
        let file = DeclarationFile::parse(SAMPLE).unwrap();
        let names: Vec<&str> = file
            .declaration
            .scopes
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "realm", "alpha", "empty"]);
        assert!(file.declaration.scopes[3].members.is_empty());
    }

    #[test]
    fn test_parse_nodes_and_leaves() {
        let file = DeclarationFile::parse(SAMPLE).unwrap();
        let alpha = &file.declaration.scopes[2];
        match &alpha.members[0] {
            MemberRef::Composite(node) => {
                assert_eq!(node.name, "admin");
                assert_eq!(node.description.as_deref(), Some("Full access"));
                assert_eq!(node.member_names(), vec!["viewer", "editor"]);
            }
            other => panic!("expected a node, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_sections() {
        let err = DeclarationFile::parse("roles: {}\n").unwrap_err();
        assert_eq!(err.to_string(), "No profiles found in file");

        let err = DeclarationFile::parse("profiles: {default: {}}\n").unwrap_err();
        assert_eq!(err.to_string(), "No roles found in file");
    }

    #[test]
    fn test_malformed_yaml() {
        let err = DeclarationFile::parse("profiles: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = DeclarationFile::load("/nonexistent/roles.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! Role reference parsing
//!
//! A reference is either a bare role name, resolved against the owning scope,
//! or `<scope>name`, resolved against another client or the realm.

use crate::model::REALM_SCOPE;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static QUALIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([A-Za-z0-9\-_]+)>(.+)$").expect("valid reference pattern"));

/// Parsed role reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleRef {
    /// Role owned by the current scope
    Local(String),
    /// Role owned by the named client
    Client { client_id: String, name: String },
    /// Realm-level role
    Realm(String),
}

impl RoleRef {
    pub fn parse(raw: &str) -> Self {
        match QUALIFIED.captures(raw) {
            Some(caps) => {
                let scope = caps[1].to_string();
                let name = caps[2].to_string();
                if scope.eq_ignore_ascii_case(REALM_SCOPE) {
                    Self::Realm(name)
                } else {
                    Self::Client {
                        client_id: scope,
                        name,
                    }
                }
            }
            None => Self::Local(raw.to_string()),
        }
    }

    /// Bare role name without the scope qualifier
    pub fn name(&self) -> &str {
        match self {
            Self::Local(name) | Self::Realm(name) => name,
            Self::Client { name, .. } => name,
        }
    }

    pub fn is_qualified(&self) -> bool {
        !matches!(self, Self::Local(_))
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => write!(f, "{}", name),
            Self::Client { client_id, name } => write!(f, "<{}>{}", client_id, name),
            Self::Realm(name) => write!(f, "<{}>{}", REALM_SCOPE, name),
        }
    }
}

/// Lexical check for the `<scope>name` form
pub fn is_qualified(raw: &str) -> bool {
    QUALIFIED.is_match(raw)
}

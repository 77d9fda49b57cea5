//! Profile resolution
//!
//! A profile names the server, realm and grant. Any string value of the form
//! `<env::NAME>` is replaced with the variable's value; `<env::NAME:fallback>`
//! supplies a fallback for an unset variable.

use crate::declaration::DeclarationFile;
use crate::error::{ConfigError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rolemerge_keycloak::ConnectionSettings;
use serde_yaml::{Mapping, Value};
use tracing::warn;

/// Environment variable overriding the selected profile
pub const PROFILE_ENV: &str = "PROFILE";

static ENV_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<env::([_0-9A-Za-z]+)(?::([^>]*))?>$").expect("valid env token regex")
});

/// `PROFILE` when set and non-empty, else `requested`
pub fn select_profile_name(requested: &str) -> String {
    match std::env::var(PROFILE_ENV) {
        Ok(name) if !name.is_empty() => name,
        _ => requested.to_string(),
    }
}

/// Resolve a profile against the process environment
pub fn resolve(file: &DeclarationFile, name: &str) -> Result<ConnectionSettings> {
    resolve_with(file, name, |var| std::env::var(var).ok())
}

/// Resolve a profile with an explicit variable lookup
pub fn resolve_with<F>(file: &DeclarationFile, name: &str, lookup: F) -> Result<ConnectionSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = file
        .profile(name)
        .ok_or_else(|| ConfigError::Reference(format!("Not found {} profile", name)))?;

    for issue in validate(raw) {
        warn!("Profile {}", issue);
    }

    let substituted = substitute(raw.clone(), &lookup)?;
    serde_yaml::from_value(substituted)
        .map_err(|e| ConfigError::Configuration(format!("Profile {}: {}", name, e)))
}

/// Advisory shape check; problems are reported, never fatal
pub fn validate(profile: &Value) -> Vec<String> {
    let Value::Mapping(fields) = profile else {
        return vec!["is not an object".to_string()];
    };

    let mut issues = Vec::new();
    for key in ["baseUrl", "realm"] {
        match fields.get(key) {
            None => issues.push(format!("requires property \"{}\"", key)),
            Some(Value::String(_)) => {}
            Some(_) => issues.push(format!("{} is not of a type(s) string", key)),
        }
    }

    match fields.get("grant") {
        None => issues.push("requires property \"grant\"".to_string()),
        Some(Value::Mapping(grant)) => {
            if let Some(client_id) = grant.get("client_id") {
                if !client_id.is_string() {
                    issues.push("grant.client_id is not of a type(s) string".to_string());
                }
            }
        }
        Some(_) => issues.push("grant is not of a type(s) object".to_string()),
    }

    issues
}

/// Replace env tokens in every string, at any depth
pub fn substitute<F>(value: Value, lookup: &F) -> Result<Value>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => substitute_str(text, lookup).map(Value::String),
        Value::Mapping(fields) => {
            let mut resolved = Mapping::with_capacity(fields.len());
            for (key, field) in fields {
                resolved.insert(key, substitute(field, lookup)?);
            }
            Ok(Value::Mapping(resolved))
        }
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| substitute(item, lookup))
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        other => Ok(other),
    }
}

fn substitute_str<F>(text: String, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(captures) = ENV_TOKEN.captures(&text) else {
        return Ok(text);
    };

    let var = &captures[1];
    match lookup(var).filter(|value| !value.is_empty()) {
        Some(value) => Ok(value),
        None => captures
            .get(2)
            .map(|fallback| fallback.as_str().to_string())
            .ok_or_else(|| {
                ConfigError::Reference(format!("Environment variable {} not found.", var))
            }),
    }
}

//! Connection settings, as resolved from a profile

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and how to authenticate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    /// Server root, e.g. `https://sso.example.com` or `https://host/auth`
    pub base_url: String,
    pub realm: String,
    pub grant: Grant,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ConnectionSettings {
    pub fn new(base_url: impl Into<String>, realm: impl Into<String>, grant: Grant) -> Self {
        Self {
            base_url: base_url.into(),
            realm: realm.into(),
            grant,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// OAuth2 grant parameters sent to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Any other form field, passed through as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Grant {
    /// Resource-owner password grant for a public client
    pub fn password(
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            grant_type: Some("password".to_string()),
            username: Some(username.into()),
            password: Some(password.into()),
            client_secret: None,
            extra: BTreeMap::new(),
        }
    }

    /// Explicit grant type, else `password` when a username is given,
    /// else `client_credentials`
    pub fn grant_type(&self) -> &str {
        match (&self.grant_type, &self.username) {
            (Some(explicit), _) => explicit.as_str(),
            (None, Some(_)) => "password",
            (None, None) => "client_credentials",
        }
    }

    /// Form fields for the token request
    pub fn form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("grant_type".to_string(), self.grant_type().to_string()),
            ("client_id".to_string(), self.client_id.clone()),
        ];
        let optional = [
            ("username", &self.username),
            ("password", &self.password),
            ("client_secret", &self.client_secret),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                form.push((key.to_string(), value.clone()));
            }
        }
        form.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        form
    }

    /// Client-authenticating fields for refresh requests
    pub fn client_form(&self) -> Vec<(String, String)> {
        let mut form = vec![("client_id".to_string(), self.client_id.clone())];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret".to_string(), secret.clone()));
        }
        form
    }
}

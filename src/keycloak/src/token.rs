//! OpenID Connect token acquisition and background refresh
//!
//! The token set lives in a [`Credentials`] cell with a single writer, the
//! refresher task. Request senders read a snapshot per call.

use crate::error::{KeycloakError, Result};
use crate::settings::Grant;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Fallback lifetime when the server reports none
const DEFAULT_LIFETIME_SECS: u64 = 60;

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default)]
    pub expires_in: Option<u64>,

    /// Lifetime of the refresh token; `0` for offline tokens
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,

    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Current credential
#[derive(Debug, Clone)]
pub struct TokenSet {
    access_token: String,
    token_type: String,
    expires_in: Option<u64>,
    refresh_expires_in: Option<u64>,
    refresh_token: Option<String>,
}

impl TokenSet {
    pub fn from_response(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_expires_in: response.refresh_expires_in,
            refresh_token: response.refresh_token,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// `Authorization` header value
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Wait before the next refresh: 80% of the shorter of the access and
    /// refresh token lifetimes, ignoring absent or zero values
    pub fn refresh_delay(&self) -> Duration {
        let lifetime = [self.expires_in, self.refresh_expires_in]
            .into_iter()
            .flatten()
            .filter(|secs| *secs > 0)
            .min()
            .unwrap_or(DEFAULT_LIFETIME_SECS);
        Duration::from_millis(lifetime * 800)
    }
}

/// Shared credential cell
#[derive(Debug, Clone)]
pub struct Credentials {
    inner: Arc<RwLock<TokenSet>>,
}

impl Credentials {
    pub fn new(tokens: TokenSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tokens)),
        }
    }

    pub fn snapshot(&self) -> TokenSet {
        self.inner.read().clone()
    }

    pub fn authorization(&self) -> String {
        self.inner.read().authorization()
    }

    pub fn replace(&self, tokens: TokenSet) {
        *self.inner.write() = tokens;
    }
}

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    token_endpoint: String,
}

/// Token endpoint client for one realm
#[derive(Debug, Clone)]
pub struct OidcClient {
    http: Client,
    token_endpoint: String,
    grant: Grant,
}

impl OidcClient {
    /// Locate the realm's token endpoint via OpenID discovery
    pub async fn discover(http: &Client, base_url: &str, realm: &str, grant: Grant) -> Result<Self> {
        let url = format!(
            "{}/realms/{}/.well-known/openid-configuration",
            base_url.trim_end_matches('/'),
            realm
        );
        debug!("Discovering issuer at {}", url);

        let response = http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KeycloakError::Discovery {
                url,
                reason: format!("status {}", status.as_u16()),
            });
        }

        let metadata: ProviderMetadata =
            response
                .json()
                .await
                .map_err(|e| KeycloakError::Discovery {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            http: http.clone(),
            token_endpoint: metadata.token_endpoint,
            grant,
        })
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Run the configured grant
    pub async fn grant(&self) -> Result<TokenSet> {
        self.request_token(self.grant.form()).await
    }

    /// Exchange a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let mut form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ];
        form.extend(self.grant.client_form());
        self.request_token(form).await
    }

    async fn request_token(&self, form: Vec<(String, String)>) -> Result<TokenSet> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeycloakError::Token {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenResponse = response.json().await?;
        Ok(TokenSet::from_response(tokens))
    }
}

/// Keep `credentials` fresh until `cancel` fires
///
/// A failed refresh falls back to a full grant. A failed grant keeps the old
/// token and retries after the same delay.
pub fn spawn_refresher(
    oidc: OidcClient,
    credentials: Credentials,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let current = credentials.snapshot();
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Token refresh stopped");
                    break;
                }
                _ = tokio::time::sleep(current.refresh_delay()) => {}
            }

            let refreshed = match current.refresh_token() {
                Some(token) => oidc.refresh(token).await,
                None => Err(KeycloakError::MissingRefreshToken),
            };

            let renewed = match refreshed {
                Ok(tokens) => Ok(tokens),
                Err(e) => {
                    warn!("Token refresh failed: {}, running grant again", e);
                    oidc.grant().await
                }
            };

            match renewed {
                Ok(tokens) => {
                    credentials.replace(tokens);
                    debug!("Token refreshed");
                }
                Err(e) => error!("Token grant failed: {}", e),
            }
        }
    })
}

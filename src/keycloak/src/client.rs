//! Admin REST client implementing [`RoleBackend`]

use crate::error::{KeycloakError, Result};
use crate::settings::ConnectionSettings;
use crate::token::{spawn_refresher, Credentials, OidcClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response};
use rolemerge_reconcile::{
    BackendError, BackendResult, ClientRecord, RemoteRole, RoleBackend, ScopeId,
};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Authenticated connection to one realm
///
/// Holds the background token refresher; it stops on [`shutdown`](Self::shutdown)
/// or when the client is dropped.
pub struct KeycloakClient {
    http: Client,
    admin_base: Url,
    credentials: Credentials,
    cancel: CancellationToken,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl KeycloakClient {
    /// Discover the realm, run the grant and start refreshing
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let http = Client::builder().timeout(settings.timeout()).build()?;
        let admin_base = admin_base(&settings.base_url, &settings.realm)?;

        let oidc = OidcClient::discover(
            &http,
            &settings.base_url,
            &settings.realm,
            settings.grant.clone(),
        )
        .await?;
        let tokens = oidc.grant().await?;
        info!("Authenticated on realm {}", settings.realm);

        let credentials = Credentials::new(tokens);
        let cancel = CancellationToken::new();
        let refresher = spawn_refresher(oidc, credentials.clone(), cancel.clone());

        Ok(Self {
            http,
            admin_base,
            credentials,
            cancel,
            refresher: Mutex::new(Some(refresher)),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Stop the token refresher and wait for it to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.refresher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.admin_base.clone();
        // admin_base is checked to be a base URL on construction
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    fn roles_url(&self, scope: &ScopeId, tail: &[&str]) -> Url {
        let mut segments: Vec<&str> = match scope {
            ScopeId::Realm => Vec::new(),
            ScopeId::Client(id) => vec!["clients", id.as_str()],
        };
        segments.push("roles");
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, self.credentials.authorization())
    }

    async fn execute(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let request = builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let method = request.method().to_string();
        let url = request.url().to_string();
        debug!("{} {}", method, url);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                method,
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResult<T> {
        self.execute(builder)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

impl Drop for KeycloakClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// `{base_url}/admin/realms/{realm}`
fn admin_base(base_url: &str, realm: &str) -> Result<Url> {
    let invalid = |reason: String| KeycloakError::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("not a base URL".to_string()))?
        .pop_if_empty()
        .extend(["admin", "realms", realm]);
    Ok(url)
}

#[async_trait]
impl RoleBackend for KeycloakClient {
    async fn list_clients(&self) -> BackendResult<Vec<ClientRecord>> {
        self.fetch(self.request(Method::GET, self.url(&["clients"])))
            .await
    }

    async fn find_clients(&self, client_id: &str) -> BackendResult<Vec<ClientRecord>> {
        let builder = self
            .request(Method::GET, self.url(&["clients"]))
            .query(&[("clientId", client_id)]);
        self.fetch(builder).await
    }

    async fn list_roles(&self, scope: &ScopeId) -> BackendResult<Vec<RemoteRole>> {
        let builder = self
            .request(Method::GET, self.roles_url(scope, &[]))
            .query(&[("briefRepresentation", "false")]);
        self.fetch(builder).await
    }

    async fn get_role(&self, scope: &ScopeId, name: &str) -> BackendResult<RemoteRole> {
        self.fetch(self.request(Method::GET, self.roles_url(scope, &[name])))
            .await
    }

    async fn create_role(&self, scope: &ScopeId, role: &RemoteRole) -> BackendResult<()> {
        let builder = self
            .request(Method::POST, self.roles_url(scope, &[]))
            .json(role);
        self.execute(builder).await.map(|_| ())
    }

    async fn update_role(
        &self,
        scope: &ScopeId,
        name: &str,
        role: &RemoteRole,
    ) -> BackendResult<()> {
        let builder = self
            .request(Method::PUT, self.roles_url(scope, &[name]))
            .json(role);
        self.execute(builder).await.map(|_| ())
    }

    async fn delete_role(&self, scope: &ScopeId, name: &str) -> BackendResult<()> {
        let builder = self.request(Method::DELETE, self.roles_url(scope, &[name]));
        self.execute(builder).await.map(|_| ())
    }

    async fn get_composites(&self, scope: &ScopeId, name: &str) -> BackendResult<Vec<RemoteRole>> {
        self.fetch(self.request(Method::GET, self.roles_url(scope, &[name, "composites"])))
            .await
    }

    async fn add_composites(
        &self,
        scope: &ScopeId,
        name: &str,
        members: &[RemoteRole],
    ) -> BackendResult<()> {
        let builder = self
            .request(Method::POST, self.roles_url(scope, &[name, "composites"]))
            .json(members);
        self.execute(builder).await.map(|_| ())
    }

    async fn remove_composites(
        &self,
        scope: &ScopeId,
        name: &str,
        members: &[RemoteRole],
    ) -> BackendResult<()> {
        let builder = self
            .request(Method::DELETE, self.roles_url(scope, &[name, "composites"]))
            .json(members);
        self.execute(builder).await.map(|_| ())
    }
}

//! Reference resolution
//!
//! Turns a role reference from the declaration into the concrete remote role
//! it names, loading the target scope into the [`RoleIndex`] on first use.
//!
//! Roles of the owning scope are restricted to managed roles. Roles of other
//! scopes are taken unfiltered: a composite may legitimately include roles
//! that another client manages through its own declaration, or that nobody
//! manages at all.

use crate::backend::{list_managed_roles, RemoteRole, RoleBackend, ScopeId};
use crate::error::{ReconcileError, Result};
use crate::index::{index_roles, RoleIndex, RoleTable};
use crate::reference::RoleRef;
use std::sync::Arc;
use tracing::debug;

/// Resolves references on behalf of one owning scope
pub struct ReferenceResolver<'a> {
    backend: &'a dyn RoleBackend,
    index: &'a RoleIndex,
    owner: &'a ScopeId,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(backend: &'a dyn RoleBackend, index: &'a RoleIndex, owner: &'a ScopeId) -> Self {
        Self {
            backend,
            index,
            owner,
        }
    }

    /// Resolve `raw` to a remote role
    ///
    /// # Errors
    ///
    /// - `Reference("Not found client <id>")` if a qualified client does not exist
    /// - `Reference("Not found [<raw>] role")` if the role is absent after loading
    /// - `Backend` if loading the target scope fails
    pub async fn resolve(&self, raw: &str) -> Result<RemoteRole> {
        let reference = RoleRef::parse(raw);

        let table = match &reference {
            RoleRef::Local(_) => self.owner_table().await?,
            RoleRef::Realm(_) => self.scope_table(ScopeId::Realm).await?,
            RoleRef::Client { client_id, .. } => {
                let scope = self.client_scope(client_id).await?;
                self.scope_table(scope).await?
            }
        };

        table
            .get(reference.name())
            .cloned()
            .ok_or_else(|| ReconcileError::role_not_found(raw))
    }

    /// Resolve every reference, in order
    pub async fn resolve_all(&self, refs: &[String]) -> Result<Vec<RemoteRole>> {
        let lookups = refs.iter().map(|raw| self.resolve(raw));
        futures::future::try_join_all(lookups).await
    }

    /// Managed roles of the owning scope
    pub async fn owner_table(&self) -> Result<Arc<RoleTable>> {
        let backend = self.backend;
        let owner = self.owner;
        self.index
            .table_or_load(owner, || async move {
                debug!("Loading managed roles of {}", owner);
                let roles = list_managed_roles(backend, owner).await?;
                Ok::<_, ReconcileError>(index_roles(roles))
            })
            .await
    }

    async fn scope_table(&self, scope: ScopeId) -> Result<Arc<RoleTable>> {
        if &scope == self.owner {
            return self.owner_table().await;
        }

        let backend = self.backend;
        self.index
            .table_or_load(&scope, || async {
                debug!("Loading roles of {}", scope);
                let roles = backend.list_roles(&scope).await?;
                Ok::<_, ReconcileError>(index_roles(roles))
            })
            .await
    }

    async fn client_scope(&self, client_id: &str) -> Result<ScopeId> {
        let backend = self.backend;
        self.index
            .client_or_lookup(client_id, || async move {
                let clients = backend.find_clients(client_id).await?;
                clients
                    .into_iter()
                    .next()
                    .map(|client| ScopeId::Client(client.id))
                    .ok_or_else(|| ReconcileError::client_not_found(client_id))
            })
            .await
    }
}

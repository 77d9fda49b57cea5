//! In-process backend
//!
//! Keeps clients, roles and composite membership in memory and records every
//! call, so reconciliation runs can be asserted without a live server.

use crate::backend::{ClientRecord, RemoteRole, RoleBackend, ScopeId};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Kind of backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListClients,
    FindClients,
    ListRoles,
    GetRole,
    CreateRole,
    UpdateRole,
    DeleteRole,
    GetComposites,
    AddComposites,
    RemoveComposites,
}

impl Operation {
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::CreateRole
                | Self::UpdateRole
                | Self::DeleteRole
                | Self::AddComposites
                | Self::RemoveComposites
        )
    }
}

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub scope: Option<ScopeId>,
    /// Role name or client identifier the call targeted
    pub target: String,
    /// Names of composite members sent, if any
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredRole {
    role: RemoteRole,
    /// Ids of direct composite members
    composites: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    clients: Vec<ClientRecord>,
    roles: HashMap<ScopeId, BTreeMap<String, StoredRole>>,
    next_id: u64,
}

impl State {
    fn scope_roles(&self, scope: &ScopeId) -> BackendResult<&BTreeMap<String, StoredRole>> {
        self.roles
            .get(scope)
            .ok_or_else(|| BackendError::NotFound(format!("{}", scope)))
    }

    fn scope_roles_mut(
        &mut self,
        scope: &ScopeId,
    ) -> BackendResult<&mut BTreeMap<String, StoredRole>> {
        self.roles
            .get_mut(scope)
            .ok_or_else(|| BackendError::NotFound(format!("{}", scope)))
    }

    fn stored_mut(&mut self, scope: &ScopeId, name: &str) -> BackendResult<&mut StoredRole> {
        self.scope_roles_mut(scope)?
            .get_mut(name)
            .ok_or_else(|| BackendError::NotFound(format!("role {} in {}", name, scope)))
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("role-{}", self.next_id)
    }

    fn find_by_id(&self, id: &str) -> Option<RemoteRole> {
        self.roles
            .values()
            .flat_map(|roles| roles.values())
            .find(|stored| stored.role.id == id)
            .map(|stored| self.snapshot(stored))
    }

    fn snapshot(&self, stored: &StoredRole) -> RemoteRole {
        let mut role = stored.role.clone();
        role.composite = !stored.composites.is_empty();
        role
    }
}

/// In-memory [`RoleBackend`]
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashSet<(Operation, String)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.state.lock().roles.insert(ScopeId::Realm, BTreeMap::new());
        backend
    }

    /// Register a client; returns its scope
    pub fn add_client(&self, id: &str, client_id: &str) -> ScopeId {
        let mut state = self.state.lock();
        state.clients.push(ClientRecord::new(id, client_id));
        let scope = ScopeId::client(id);
        state.roles.entry(scope.clone()).or_default();
        scope
    }

    /// Store a role as-is, allocating an id when missing
    pub fn seed_role(&self, scope: &ScopeId, mut role: RemoteRole) -> RemoteRole {
        let mut state = self.state.lock();
        if role.id.is_empty() {
            role.id = state.allocate_id();
        }
        role.composite = false;
        state.roles.entry(scope.clone()).or_default().insert(
            role.name.clone(),
            StoredRole {
                role: role.clone(),
                composites: Vec::new(),
            },
        );
        role
    }

    /// Store a role carrying the ownership marker
    pub fn seed_managed(&self, scope: &ScopeId, name: &str) -> RemoteRole {
        self.seed_role(scope, RemoteRole::named(name).with_marker())
    }

    /// Replace the composite members of a stored role
    pub fn seed_composites(&self, scope: &ScopeId, name: &str, members: &[(ScopeId, &str)]) {
        let mut state = self.state.lock();
        let ids: Vec<String> = members
            .iter()
            .filter_map(|(member_scope, member)| {
                state
                    .roles
                    .get(member_scope)
                    .and_then(|roles| roles.get(*member))
                    .map(|stored| stored.role.id.clone())
            })
            .collect();
        if let Ok(stored) = state.stored_mut(scope, name) {
            stored.composites = ids;
        }
    }

    /// Make every future call of `operation` against `target` fail
    pub fn fail_on(&self, operation: Operation, target: &str) {
        self.failures.lock().insert((operation, target.to_string()));
    }

    pub fn role(&self, scope: &ScopeId, name: &str) -> Option<RemoteRole> {
        let state = self.state.lock();
        state
            .roles
            .get(scope)
            .and_then(|roles| roles.get(name))
            .map(|stored| state.snapshot(stored))
    }

    pub fn role_names(&self, scope: &ScopeId) -> BTreeSet<String> {
        self.state
            .lock()
            .roles
            .get(scope)
            .map(|roles| roles.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of the direct composite members of a role, sorted
    pub fn composite_names(&self, scope: &ScopeId, name: &str) -> Vec<String> {
        let state = self.state.lock();
        let ids = state
            .roles
            .get(scope)
            .and_then(|roles| roles.get(name))
            .map(|stored| stored.composites.clone())
            .unwrap_or_default();
        let mut names: Vec<String> = ids
            .iter()
            .filter_map(|id| state.find_by_id(id))
            .map(|role| role.name)
            .collect();
        names.sort();
        names
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, operation: Operation) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation.is_mutation())
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(
        &self,
        operation: Operation,
        scope: Option<&ScopeId>,
        target: &str,
        members: &[RemoteRole],
    ) -> BackendResult<()> {
        self.calls.lock().push(Call {
            operation,
            scope: scope.cloned(),
            target: target.to_string(),
            members: members.iter().map(|m| m.name.clone()).collect(),
        });

        if self.failures.lock().contains(&(operation, target.to_string())) {
            return Err(BackendError::Status {
                method: format!("{:?}", operation),
                url: target.to_string(),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RoleBackend for MemoryBackend {
    async fn list_clients(&self) -> BackendResult<Vec<ClientRecord>> {
        self.record(Operation::ListClients, None, "", &[])?;
        Ok(self.state.lock().clients.clone())
    }

    async fn find_clients(&self, client_id: &str) -> BackendResult<Vec<ClientRecord>> {
        self.record(Operation::FindClients, None, client_id, &[])?;
        Ok(self
            .state
            .lock()
            .clients
            .iter()
            .filter(|client| client.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn list_roles(&self, scope: &ScopeId) -> BackendResult<Vec<RemoteRole>> {
        self.record(Operation::ListRoles, Some(scope), "", &[])?;
        let state = self.state.lock();
        let roles = state.scope_roles(scope)?;
        let listed = roles.values().map(|stored| state.snapshot(stored)).collect();
        Ok(listed)
    }

    async fn get_role(&self, scope: &ScopeId, name: &str) -> BackendResult<RemoteRole> {
        self.record(Operation::GetRole, Some(scope), name, &[])?;
        self.role(scope, name)
            .ok_or_else(|| BackendError::NotFound(format!("role {} in {}", name, scope)))
    }

    async fn create_role(&self, scope: &ScopeId, role: &RemoteRole) -> BackendResult<()> {
        self.record(Operation::CreateRole, Some(scope), &role.name, &[])?;
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let roles = state.scope_roles_mut(scope)?;
        if roles.contains_key(&role.name) {
            return Err(BackendError::Status {
                method: "POST".to_string(),
                url: role.name.clone(),
                status: 409,
                body: "Role with name already exists".to_string(),
            });
        }
        let mut created = role.clone();
        created.id = id;
        created.composite = false;
        roles.insert(
            role.name.clone(),
            StoredRole {
                role: created,
                composites: Vec::new(),
            },
        );
        Ok(())
    }

    async fn update_role(
        &self,
        scope: &ScopeId,
        name: &str,
        role: &RemoteRole,
    ) -> BackendResult<()> {
        self.record(Operation::UpdateRole, Some(scope), name, &[])?;
        let mut state = self.state.lock();
        let stored = state.stored_mut(scope, name)?;
        stored.role.description = role.description.clone();
        stored.role.attributes = role.attributes.clone();
        Ok(())
    }

    async fn delete_role(&self, scope: &ScopeId, name: &str) -> BackendResult<()> {
        self.record(Operation::DeleteRole, Some(scope), name, &[])?;
        let mut state = self.state.lock();
        let removed = state
            .scope_roles_mut(scope)?
            .remove(name)
            .ok_or_else(|| BackendError::NotFound(format!("role {} in {}", name, scope)))?;
        for roles in state.roles.values_mut() {
            for stored in roles.values_mut() {
                stored.composites.retain(|id| id != &removed.role.id);
            }
        }
        Ok(())
    }

    async fn get_composites(&self, scope: &ScopeId, name: &str) -> BackendResult<Vec<RemoteRole>> {
        self.record(Operation::GetComposites, Some(scope), name, &[])?;
        let mut state = self.state.lock();
        let ids = state.stored_mut(scope, name)?.composites.clone();
        Ok(ids.iter().filter_map(|id| state.find_by_id(id)).collect())
    }

    async fn add_composites(
        &self,
        scope: &ScopeId,
        name: &str,
        members: &[RemoteRole],
    ) -> BackendResult<()> {
        self.record(Operation::AddComposites, Some(scope), name, members)?;
        let mut state = self.state.lock();
        for member in members {
            if state.find_by_id(&member.id).is_none() {
                return Err(BackendError::NotFound(format!("role id {}", member.id)));
            }
        }
        let stored = state.stored_mut(scope, name)?;
        for member in members {
            if !stored.composites.contains(&member.id) {
                stored.composites.push(member.id.clone());
            }
        }
        Ok(())
    }

    async fn remove_composites(
        &self,
        scope: &ScopeId,
        name: &str,
        members: &[RemoteRole],
    ) -> BackendResult<()> {
        self.record(Operation::RemoveComposites, Some(scope), name, members)?;
        let mut state = self.state.lock();
        let stored = state.stored_mut(scope, name)?;
        stored
            .composites
            .retain(|id| !members.iter().any(|member| &member.id == id));
        Ok(())
    }
}

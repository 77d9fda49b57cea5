//! Client reconciler
//!
//! Converges one scope: `Idle -> [Purging] -> Syncing -> [Compositing] -> Done`.
//!
//! - **Purging** runs under reset or drop mode and deletes the scope's managed
//!   roles (every role under force-drop). Any failure aborts the scope.
//! - **Syncing** inserts missing declared roles and removes managed roles no
//!   longer declared. Individual failures are logged and counted, not fatal.
//! - **Compositing** applies composite membership batch by batch, nested
//!   composites first. Unresolvable members abort the scope.

use crate::backend::{list_managed_roles, RemoteRole, RoleBackend, ScopeId};
use crate::composite::CompositePlan;
use crate::composite::CompositeAssertion;
use crate::diff::{diff, diff_owned, ById};
use crate::error::{BackendResult, ReconcileError, Result};
use crate::flatten::{flatten_composites, flatten_declared, RoleSpec};
use crate::index::{RoleIndex, RoleTable};
use crate::model::ScopeDeclaration;
use crate::resolver::ReferenceResolver;
use futures::future::{join_all, try_join_all};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Which roles Purging deletes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PurgeFilter {
    /// Only roles carrying the ownership marker
    #[default]
    Managed,
    /// Every role of the scope, managed or not
    All,
}

/// Run-wide mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Purge managed roles, then resync
    pub reset: bool,
    /// Purge managed roles and stop
    pub drop: bool,
    /// Purge every role of the scope and stop
    pub force_drop: bool,
}

impl ReconcileOptions {
    pub fn purges(&self) -> bool {
        self.reset || self.drop || self.force_drop
    }

    pub fn drops(&self) -> bool {
        self.drop || self.force_drop
    }

    pub fn purge_filter(&self) -> PurgeFilter {
        if self.force_drop {
            PurgeFilter::All
        } else {
            PurgeFilter::Managed
        }
    }
}

/// Reconciler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Purging,
    Syncing,
    Compositing,
    Done,
}

/// Result of the Syncing phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub inserted: usize,
    pub removed: usize,
    pub errored: usize,
    /// Whether the diff was non-empty, failures included
    pub changed: bool,
}

/// Result of reconciling one scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeOutcome {
    pub scope: String,
    pub purged: usize,
    pub inserted: usize,
    pub removed: usize,
    pub errored: usize,
    pub composites_updated: usize,
    /// Stopped after Purging
    pub dropped: bool,
    /// Syncing or Compositing changed anything
    pub changed: bool,
}

/// Converges a single scope against the backend
pub struct ClientReconciler<'a> {
    backend: &'a dyn RoleBackend,
    declaration: &'a ScopeDeclaration,
    scope: ScopeId,
    options: ReconcileOptions,
    phase: Phase,
}

impl<'a> ClientReconciler<'a> {
    pub fn new(
        backend: &'a dyn RoleBackend,
        declaration: &'a ScopeDeclaration,
        scope: ScopeId,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            backend,
            declaration,
            scope,
            options,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Run all phases to completion
    ///
    /// The composite plan is validated before the backend is touched, so a
    /// cyclic declaration fails without side effects.
    pub async fn run(&mut self) -> Result<ScopeOutcome> {
        let mut outcome = ScopeOutcome {
            scope: self.declaration.name.clone(),
            ..Default::default()
        };

        let plan = if self.options.drops() {
            CompositePlan::default()
        } else {
            self.plan()?
        };

        if self.options.purges() {
            self.enter(Phase::Purging);
            info!("Deleting all: {}", self.declaration.name);
            outcome.purged = self.purge().await?;
        }

        if self.options.drops() {
            self.enter(Phase::Done);
            outcome.dropped = true;
            return Ok(outcome);
        }

        self.enter(Phase::Syncing);
        let stats = self.sync().await?;
        outcome.inserted = stats.inserted;
        outcome.removed = stats.removed;
        outcome.errored = stats.errored;

        self.enter(Phase::Compositing);
        outcome.composites_updated = self.apply_composites(&plan).await?;

        self.enter(Phase::Done);
        outcome.changed = stats.changed || outcome.composites_updated > 0;
        Ok(outcome)
    }

    /// Composite plan for the declared tree
    pub fn plan(&self) -> Result<CompositePlan> {
        CompositePlan::build(flatten_composites(&self.declaration.members))
            .map_err(|e| ReconcileError::Configuration(format!("{} in scope {}", e, self.declaration.name)))
    }

    /// Delete the scope's roles per the purge filter; returns the count
    pub async fn purge(&self) -> Result<usize> {
        let roles = match self.options.purge_filter() {
            PurgeFilter::Managed => list_managed_roles(self.backend, &self.scope).await?,
            PurgeFilter::All => {
                warn!("Force drop: deleting unmanaged roles of {}", self.declaration.name);
                self.backend.list_roles(&self.scope).await?
            }
        };

        let deletes = roles
            .iter()
            .map(|role| self.backend.delete_role(&self.scope, &role.name));
        try_join_all(deletes).await?;

        Ok(roles.len())
    }

    /// Insert missing declared roles, remove undeclared managed roles
    pub async fn sync(&self) -> Result<SyncStats> {
        let local: Vec<RoleSpec> = flatten_declared(&self.declaration.members)
            .into_values()
            .collect();
        let remote = list_managed_roles(self.backend, &self.scope).await?;
        let plan = diff_owned(&local, &remote);

        let removals = join_all(plan.to_remove.iter().map(|role| async move {
            match self.backend.delete_role(&self.scope, &role.name).await {
                Ok(()) => {
                    info!("Deleted role {} with success", role.name);
                    true
                }
                Err(e) => {
                    error!("Deleted role {} with error: {}", role.name, e);
                    false
                }
            }
        }))
        .await;

        let inserts = join_all(plan.to_insert.iter().map(|spec| async move {
            match self.insert_role(spec).await {
                Ok(()) => {
                    info!("Inserted role {} with success", spec.name);
                    true
                }
                Err(e) => {
                    error!("Inserted role {} with error: {}", spec.name, e);
                    false
                }
            }
        }))
        .await;

        let removed = removals.iter().filter(|ok| **ok).count();
        let inserted = inserts.iter().filter(|ok| **ok).count();

        Ok(SyncStats {
            inserted,
            removed,
            errored: (removals.len() - removed) + (inserts.len() - inserted),
            changed: !plan.is_empty(),
        })
    }

    /// Two-step insert: create by name, then attach marker and metadata
    async fn insert_role(&self, spec: &RoleSpec) -> BackendResult<()> {
        self.backend
            .create_role(&self.scope, &RemoteRole::named(spec.name.as_str()))
            .await?;

        let mut role = RemoteRole::named(spec.name.as_str());
        role.description = spec.description.clone();
        role.attributes = spec.attributes.clone();
        let role = role.with_marker();

        self.backend.update_role(&self.scope, &spec.name, &role).await
    }

    /// Apply every assertion of the plan; returns how many composites changed
    pub async fn apply_composites(&self, plan: &CompositePlan) -> Result<usize> {
        if plan.is_empty() {
            return Ok(0);
        }

        // fresh index: Syncing has just changed this scope
        let index = RoleIndex::new();
        let resolver = ReferenceResolver::new(self.backend, &index, &self.scope);
        let owner = resolver.owner_table().await?;

        let mut updated = 0;
        for (depth, batch) in plan.batches().into_iter().enumerate() {
            debug!("Applying {} composites at depth {}", batch.len(), depth);
            let applied = try_join_all(
                batch
                    .into_iter()
                    .map(|assertion| self.apply_composite(assertion, &resolver, &owner)),
            )
            .await?;
            updated += applied.into_iter().filter(|changed| *changed).count();
        }

        Ok(updated)
    }

    async fn apply_composite(
        &self,
        assertion: &CompositeAssertion,
        resolver: &ReferenceResolver<'_>,
        owner: &RoleTable,
    ) -> Result<bool> {
        let members = dedup_by_id(resolver.resolve_all(&assertion.members).await?);

        let target = owner
            .get(&assertion.name)
            .ok_or_else(|| ReconcileError::role_not_found(&assertion.name))?;

        if !target.composite {
            self.backend
                .add_composites(&self.scope, &assertion.name, &members)
                .await?;
            info!("Added composite {} with {} members", assertion.name, members.len());
            return Ok(true);
        }

        let remote = self
            .backend
            .get_composites(&self.scope, &assertion.name)
            .await?;

        let local_ids: Vec<ById> = members.iter().map(ById).collect();
        let remote_ids: Vec<ById> = remote.iter().map(ById).collect();
        // every undeclared member goes, whatever scope it lives in
        let changes = diff(&local_ids, &remote_ids);

        if changes.is_empty() {
            return Ok(false);
        }

        if !changes.to_insert.is_empty() {
            let to_add: Vec<RemoteRole> = changes.to_insert.iter().map(|m| m.0.clone()).collect();
            info!(
                "Adding Composite in {}: {}",
                assertion.name,
                names(&to_add)
            );
            self.backend
                .add_composites(&self.scope, &assertion.name, &to_add)
                .await?;
        }

        if !changes.to_remove.is_empty() {
            let to_drop: Vec<RemoteRole> = changes.to_remove.iter().map(|m| m.0.clone()).collect();
            warn!(
                "Removing Composite in {}: {}",
                assertion.name,
                names(&to_drop)
            );
            self.backend
                .remove_composites(&self.scope, &assertion.name, &to_drop)
                .await?;
        }

        Ok(true)
    }
}

fn dedup_by_id(roles: Vec<RemoteRole>) -> Vec<RemoteRole> {
    let mut seen = HashSet::new();
    roles
        .into_iter()
        .filter(|role| seen.insert(role.id.clone()))
        .collect()
}

fn names(roles: &[RemoteRole]) -> String {
    roles
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

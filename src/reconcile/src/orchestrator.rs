//! Run orchestrator
//!
//! Maps declared scopes to backend scopes and drives one [`ClientReconciler`]
//! per scope, sequentially, with the realm scope last.

use crate::backend::{RoleBackend, ScopeId};
use crate::error::{ReconcileError, Result};
use crate::model::Declaration;
use crate::reconciler::{ClientReconciler, ReconcileOptions, ScopeOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

/// Outcomes of a whole run, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub scopes: Vec<ScopeOutcome>,
}

impl RunReport {
    pub fn changed(&self) -> bool {
        self.scopes.iter().any(|s| s.changed)
    }

    /// Tolerated per-role failures across all scopes
    pub fn errored(&self) -> usize {
        self.scopes.iter().map(|s| s.errored).sum()
    }

    pub fn scope(&self, name: &str) -> Option<&ScopeOutcome> {
        self.scopes.iter().find(|s| s.scope == name)
    }
}

/// Drives a full reconciliation run
pub struct RunOrchestrator {
    backend: Arc<dyn RoleBackend>,
}

impl RunOrchestrator {
    pub fn new(backend: Arc<dyn RoleBackend>) -> Self {
        Self { backend }
    }

    /// Reconcile every declared scope
    ///
    /// Stops at the first scope that fails; scopes already processed keep
    /// their changes.
    pub async fn run(&self, declaration: &Declaration, options: ReconcileOptions) -> Result<RunReport> {
        let clients = self.client_directory().await?;
        let mut report = RunReport::default();

        for declared in declaration.processing_order() {
            let scope = if declared.is_realm() {
                ScopeId::Realm
            } else {
                clients
                    .get(&declared.key())
                    .cloned()
                    .map(ScopeId::Client)
                    .ok_or_else(|| ReconcileError::client_not_found(&declared.name))?
            };

            let span = info_span!("scope", name = %declared.name);
            let mut reconciler =
                ClientReconciler::new(self.backend.as_ref(), declared, scope, options);

            let outcome = match reconciler.run().instrument(span.clone()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(parent: &span, "Failed: {}", e);
                    return Err(e);
                }
            };

            if outcome.dropped {
                info!(parent: &span, "Dropped {} roles", outcome.purged);
            } else if outcome.changed {
                info!(parent: &span, "All updated!");
            } else {
                info!(parent: &span, "Nothing to do");
            }
            report.scopes.push(outcome);
        }

        Ok(report)
    }

    /// Lowercased clientId to internal id
    async fn client_directory(&self) -> Result<HashMap<String, String>> {
        let clients = self.backend.list_clients().await?;
        Ok(clients
            .into_iter()
            .map(|c| (c.client_id.to_lowercase(), c.id))
            .collect())
    }
}

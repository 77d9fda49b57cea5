//! One reconciliation run, file to report

use crate::args::Cli;
use crate::declaration::DeclarationFile;
use crate::profile::{resolve, select_profile_name};
use anyhow::{Context, Result};
use rolemerge_keycloak::KeycloakClient;
use rolemerge_reconcile::{RoleBackend, RunOrchestrator, RunReport};
use std::sync::Arc;
use tracing::{info, warn};

/// Load, connect, reconcile
///
/// The token refresher is stopped whether or not the run succeeds.
pub async fn run(cli: &Cli) -> Result<RunReport> {
    let file = DeclarationFile::load(&cli.file)
        .with_context(|| format!("Failed to load {}", cli.file.display()))?;

    let profile = select_profile_name(&cli.profile);
    let settings = resolve(&file, &profile)?;
    info!("Using profile {} on {}", profile, settings.base_url);

    let client = Arc::new(
        KeycloakClient::connect(&settings)
            .await
            .with_context(|| format!("Failed to connect to {}", settings.base_url))?,
    );

    let backend: Arc<dyn RoleBackend> = client.clone();
    let outcome = RunOrchestrator::new(backend)
        .run(&file.declaration, cli.options())
        .await;
    client.shutdown().await;

    let report = outcome?;
    log_summary(&report);
    Ok(report)
}

/// Per-scope counts, then a warning if anything was tolerated
pub fn log_summary(report: &RunReport) {
    for scope in &report.scopes {
        if scope.dropped {
            info!(scope = %scope.scope, purged = scope.purged, "Dropped");
        } else {
            info!(
                scope = %scope.scope,
                purged = scope.purged,
                inserted = scope.inserted,
                removed = scope.removed,
                composites = scope.composites_updated,
                errored = scope.errored,
                "Finished"
            );
        }
    }

    let errored = report.errored();
    if errored > 0 {
        warn!("{} role operations failed; run again to converge", errored);
    }
}

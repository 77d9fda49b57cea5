use clap::Parser;
use rolemerge_reconcile::ReconcileOptions;
use std::path::PathBuf;

/// Reconcile declared roles onto a Keycloak realm
#[derive(Debug, Parser)]
#[command(name = "rolemerge")]
#[command(about = "Declarative role and composite role sync for Keycloak")]
#[command(version)]
pub struct Cli {
    /// Declaration file in YAML
    #[arg(short, long)]
    pub file: PathBuf,

    /// Profile to connect with (the PROFILE variable takes precedence)
    #[arg(short, long, default_value = "default")]
    pub profile: String,

    /// Delete all managed roles, then sync again
    #[arg(short, long)]
    pub reset: bool,

    /// Delete all managed roles and stop
    #[arg(long)]
    pub drop: bool,

    /// Delete every role of each declared scope, managed or not, and stop
    #[arg(long)]
    pub force_drop: bool,

    /// Debug logging and full error detail
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            reset: self.reset,
            drop: self.drop,
            force_drop: self.force_drop,
        }
    }
}

//! # Rolemerge
//!
//! Command-line front end: reads a YAML declaration, resolves a connection
//! profile and runs the reconciliation engine against Keycloak.

pub mod app;
pub mod args;
pub mod declaration;
pub mod error;
pub mod profile;

pub use app::run;
pub use args::Cli;
pub use declaration::DeclarationFile;
pub use error::{ConfigError, Result};

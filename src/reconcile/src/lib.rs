//! # Rolemerge Reconciliation Engine
//!
//! Converges a declared tree of roles, composites included, onto an identity
//! backend while leaving every role it does not own untouched.
//!
//! ## Features
//!
//! - **Ownership marker** (`mergeTool: "true"`) scopes every diff and purge
//! - **Nested composites** applied bottom-up in dependency batches
//! - **Cross-client references** of the form `<clientId>role` or `<realm>role`
//! - **Memoized role index** so each scope is fetched at most once per phase
//! - **Pluggable backend** via the [`RoleBackend`] trait
//!
//! ## Example
//!
//! ```rust
//! use rolemerge_reconcile::{
//!     Declaration, MemberRef, MemoryBackend, ReconcileOptions, RoleNode, RunOrchestrator,
//!     ScopeDeclaration,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(MemoryBackend::new());
//!     let scope = backend.add_client("7f1c", "billing");
//!
//!     let declaration = Declaration::new(vec![ScopeDeclaration::new(
//!         "billing",
//!         vec![RoleNode::new("admin", vec![MemberRef::leaf("viewer")]).into()],
//!     )]);
//!
//!     let report = RunOrchestrator::new(backend.clone())
//!         .run(&declaration, ReconcileOptions::default())
//!         .await?;
//!
//!     assert!(report.changed());
//!     assert_eq!(backend.composite_names(&scope, "admin"), vec!["viewer"]);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod composite;
pub mod diff;
pub mod error;
pub mod flatten;
pub mod index;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod reconciler;
pub mod reference;
pub mod resolver;

// Re-export commonly used types
pub use backend::{
    list_managed_roles, ClientRecord, RemoteRole, RoleBackend, ScopeId, MARKER_ATTRIBUTE,
    MARKER_VALUE,
};
pub use composite::{CompositeAssertion, CompositePlan, GraphError};
pub use diff::{diff, diff_owned, ById, Diff, Keyed};
pub use error::{BackendError, BackendResult, ReconcileError, Result};
pub use flatten::{flatten_composites, flatten_declared, flatten_names, RoleSpec};
pub use index::{RoleIndex, RoleTable};
pub use memory::{Call, MemoryBackend, Operation};
pub use model::{Declaration, MemberRef, RoleNode, ScopeDeclaration, REALM_SCOPE};
pub use orchestrator::{RunOrchestrator, RunReport};
pub use reconciler::{ClientReconciler, Phase, PurgeFilter, ReconcileOptions, ScopeOutcome, SyncStats};
pub use reference::RoleRef;
pub use resolver::ReferenceResolver;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

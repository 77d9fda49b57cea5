//! Composite roles
//!
//! Turns the post-order composite assertions of a scope into an explicit
//! dependency plan: assertions are grouped into batches by dependency depth
//! so nested composites are populated before the composites containing them.
//!
//! # Example
//!
//! ```rust
//! use rolemerge_reconcile::composite::{CompositeAssertion, CompositePlan};
//!
//! let editor = CompositeAssertion::new("editor", vec!["viewer".to_string()]);
//! let admin = CompositeAssertion::new("admin", vec!["editor".to_string()]);
//!
//! let plan = CompositePlan::build(vec![editor, admin]).unwrap();
//! let batches = plan.batches();
//! assert_eq!(batches[0][0].name, "editor");
//! assert_eq!(batches[1][0].name, "admin");
//! ```

pub mod graph;
pub mod types;


pub use graph::{CompositePlan, GraphError};
pub use types::CompositeAssertion;

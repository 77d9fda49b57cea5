//! Flattening of declared role trees
//!
//! Pure functions turning a scope's member tree into the flat collections the
//! diff and composite phases work on.

use crate::composite::CompositeAssertion;
use crate::model::{MemberRef, RoleNode};
use std::collections::{BTreeMap, BTreeSet};

/// A role that must exist in the owning scope, with its declared metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub description: Option<String>,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl RoleSpec {
    fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            attributes: BTreeMap::new(),
        }
    }

    fn from_node(node: &RoleNode) -> Self {
        Self {
            name: node.name.clone(),
            description: node.description.clone(),
            attributes: node.attributes.clone(),
        }
    }
}

/// Every name appearing anywhere in the tree, composite and leaf alike
pub fn flatten_names(members: &[MemberRef]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_names(members, &mut names);
    names
}

fn collect_names(members: &[MemberRef], names: &mut BTreeSet<String>) {
    for member in members {
        match member {
            MemberRef::Leaf(name) => {
                names.insert(name.clone());
            }
            MemberRef::Composite(node) => {
                names.insert(node.name.clone());
                collect_names(&node.members, names);
            }
        }
    }
}

/// Same name set as [`flatten_names`], carrying node metadata.
///
/// When a name is declared as a node more than once, the last node in document
/// order supplies the metadata. Bare references never overwrite a node.
pub fn flatten_declared(members: &[MemberRef]) -> BTreeMap<String, RoleSpec> {
    let mut specs = BTreeMap::new();
    collect_declared(members, &mut specs);
    specs
}

fn collect_declared(members: &[MemberRef], specs: &mut BTreeMap<String, RoleSpec>) {
    for member in members {
        match member {
            MemberRef::Leaf(name) => {
                specs
                    .entry(name.clone())
                    .or_insert_with(|| RoleSpec::bare(name));
            }
            MemberRef::Composite(node) => {
                specs.insert(node.name.clone(), RoleSpec::from_node(node));
                collect_declared(&node.members, specs);
            }
        }
    }
}

/// One assertion per composite node, post-order.
///
/// A nested composite's assertion precedes its parent's. Each assertion lists
/// only the direct members' names.
pub fn flatten_composites(members: &[MemberRef]) -> Vec<CompositeAssertion> {
    let mut assertions = Vec::new();
    collect_composites(members, &mut assertions);
    assertions
}

fn collect_composites(members: &[MemberRef], assertions: &mut Vec<CompositeAssertion>) {
    for member in members {
        if let MemberRef::Composite(node) = member {
            collect_composites(&node.members, assertions);
            if node.is_composite() {
                assertions.push(CompositeAssertion::new(node.name.clone(), node.member_names()));
            }
        }
    }
}

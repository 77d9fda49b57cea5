//! Set difference between declared and remote collections
//!
//! Items are compared by key only. [`diff_owned`] additionally drops entries
//! written as qualified references: those point at roles owned by another
//! scope and are never created or deleted as plain roles of this one.

use crate::backend::RemoteRole;
use crate::flatten::RoleSpec;
use crate::reference::is_qualified;
use std::collections::HashSet;

/// Anything compared by a string key
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for String {
    fn key(&self) -> &str {
        self
    }
}

impl Keyed for RoleSpec {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for RemoteRole {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Remote role keyed by backend id instead of name.
///
/// Composite members can come from several scopes, where names may collide.
#[derive(Debug, Clone, Copy)]
pub struct ById<'a>(pub &'a RemoteRole);

impl Keyed for ById<'_> {
    fn key(&self) -> &str {
        &self.0.id
    }
}

/// Insert/remove sets
#[derive(Debug)]
pub struct Diff<'l, 'r, L, R> {
    /// Local items absent remotely
    pub to_insert: Vec<&'l L>,
    /// Remote items absent locally
    pub to_remove: Vec<&'r R>,
}

impl<L, R> Diff<'_, '_, L, R> {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_remove.is_empty()
    }
}

/// Symmetric difference keyed by [`Keyed::key`], input order preserved
pub fn diff<'l, 'r, L: Keyed, R: Keyed>(local: &'l [L], remote: &'r [R]) -> Diff<'l, 'r, L, R> {
    let local_keys: HashSet<&str> = local.iter().map(Keyed::key).collect();
    let remote_keys: HashSet<&str> = remote.iter().map(Keyed::key).collect();

    Diff {
        to_insert: local
            .iter()
            .filter(|item| !remote_keys.contains(item.key()))
            .collect(),
        to_remove: remote
            .iter()
            .filter(|item| !local_keys.contains(item.key()))
            .collect(),
    }
}

/// [`diff`] restricted to roles owned by the scope itself
pub fn diff_owned<'l, 'r, L: Keyed, R: Keyed>(
    local: &'l [L],
    remote: &'r [R],
) -> Diff<'l, 'r, L, R> {
    let mut result = diff(local, remote);
    result.to_insert.retain(|item| !is_qualified(item.key()));
    result.to_remove.retain(|item| !is_qualified(item.key()));
    result
}

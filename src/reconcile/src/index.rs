//! Remote role index
//!
//! Per-scope tables of remote roles keyed by name, plus client lookups, each
//! loaded at most once. Concurrent callers asking for the same missing entry
//! wait on a single in-flight fetch instead of issuing their own.

use crate::backend::{RemoteRole, ScopeId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Roles of one scope by name
pub type RoleTable = HashMap<String, RemoteRole>;

/// Index roles by name; a later duplicate replaces an earlier one
pub fn index_roles(roles: Vec<RemoteRole>) -> RoleTable {
    roles.into_iter().map(|role| (role.name.clone(), role)).collect()
}

type Cells<K, V> = DashMap<K, Arc<OnceCell<V>>>;

/// Memoizing cache of scope role tables and client lookups
#[derive(Debug, Clone, Default)]
pub struct RoleIndex {
    tables: Arc<Cells<ScopeId, Arc<RoleTable>>>,
    clients: Arc<Cells<String, ScopeId>>,
}

impl RoleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for `scope`, running `load` only if no fetch happened or is running
    pub async fn table_or_load<F, Fut, E>(
        &self,
        scope: &ScopeId,
        load: F,
    ) -> Result<Arc<RoleTable>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RoleTable, E>>,
    {
        memoized(&self.tables, scope, || async move { load().await.map(Arc::new) }).await
    }

    /// Scope of the client named `client_id`, running `lookup` at most once
    pub async fn client_or_lookup<F, Fut, E>(
        &self,
        client_id: &str,
        lookup: F,
    ) -> Result<ScopeId, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ScopeId, E>>,
    {
        memoized(&self.clients, &client_id.to_string(), lookup).await
    }

    /// Already loaded table, if any
    pub fn table(&self, scope: &ScopeId) -> Option<Arc<RoleTable>> {
        self.tables
            .get(scope)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of scopes with a loaded table
    pub fn loaded_scopes(&self) -> usize {
        self.tables
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }
}

async fn memoized<K, V, F, Fut, E>(cells: &Cells<K, V>, key: &K, init: F) -> Result<V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    // clone the cell out so no map guard is held across the await
    let cell = cells.entry(key.clone()).or_default().clone();
    cell.get_or_try_init(init).await.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_loads_once() {
        let index = RoleIndex::new();
        let loads = AtomicUsize::new(0);
        let scope = ScopeId::client("c-1");

        for _ in 0..3 {
            let table = index
                .table_or_load(&scope, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(index_roles(vec![RemoteRole::new("1", "viewer")]))
                })
                .await
                .unwrap();
            assert!(table.contains_key("viewer"));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(index.loaded_scopes(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let index = RoleIndex::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let scope = ScopeId::Realm;

        let lookups = (0..8).map(|_| {
            let loads = loads.clone();
            let index = index.clone();
            let scope = scope.clone();
            async move {
                index
                    .table_or_load(&scope, || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, ()>(RoleTable::new())
                    })
                    .await
            }
        });
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let index = RoleIndex::new();
        let scope = ScopeId::Realm;

        let first = index
            .table_or_load(&scope, || async { Err::<RoleTable, _>("boom") })
            .await;
        assert!(first.is_err());
        assert!(index.table(&scope).is_none());

        let second = index
            .table_or_load(&scope, || async { Ok::<_, &str>(RoleTable::new()) })
            .await;
        assert!(second.is_ok());
        assert!(index.table(&scope).is_some());
    }

    #[tokio::test]
    async fn test_client_lookup_memoized() {
        let index = RoleIndex::new();
        let lookups = AtomicUsize::new(0);

        for _ in 0..2 {
            let scope = index
                .client_or_lookup("clients", || async {
                    lookups.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(ScopeId::client("c-9"))
                })
                .await
                .unwrap();
            assert_eq!(scope, ScopeId::client("c-9"));
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_index_roles_by_name() {
        let table = index_roles(vec![RemoteRole::new("1", "a"), RemoteRole::new("2", "b")]);
        assert_eq!(table["b"].id, "2");
    }
}

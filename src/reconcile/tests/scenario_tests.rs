//! End-to-end runs against the in-memory backend

use rolemerge_reconcile::*;
use std::sync::Arc;

fn backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

async fn run(
    backend: &Arc<MemoryBackend>,
    declaration: &Declaration,
    options: ReconcileOptions,
) -> Result<RunReport> {
    RunOrchestrator::new(backend.clone())
        .run(declaration, options)
        .await
}

fn composite(name: &str, members: Vec<MemberRef>) -> MemberRef {
    RoleNode::new(name, members).into()
}

#[tokio::test]
async fn test_fresh_scope_gets_roles_and_single_add() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    let declaration = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![composite("b", vec!["a".into()])],
    )]);

    let report = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    let outcome = report.scope("apps").unwrap();
    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.composites_updated, 1);
    assert!(outcome.changed);

    let adds = backend.calls_of(Operation::AddComposites);
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].target, "b");
    assert_eq!(adds[0].members, vec!["a"]);
    assert!(backend.calls_of(Operation::GetComposites).is_empty());
    assert_eq!(backend.composite_names(&scope, "b"), vec!["a"]);
}

#[tokio::test]
async fn test_undeclared_managed_removed_unmanaged_kept() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    backend.seed_managed(&scope, "c");
    backend.seed_role(&scope, RemoteRole::named("d"));
    let declaration = Declaration::new(vec![ScopeDeclaration::new("apps", vec!["a".into()])]);

    let report = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    assert_eq!(report.scope("apps").unwrap().removed, 1);
    let names = backend.role_names(&scope);
    assert!(names.contains("a"));
    assert!(names.contains("d"));
    assert!(!names.contains("c"));
}

#[tokio::test]
async fn test_unmanaged_name_collision_is_not_touched() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    backend.seed_role(&scope, RemoteRole::named("a"));
    let declaration = Declaration::new(vec![ScopeDeclaration::new("apps", vec!["a".into()])]);

    let report = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    // the insert collides with the unmanaged role and is tolerated
    let outcome = report.scope("apps").unwrap();
    assert_eq!(outcome.errored, 1);
    assert!(backend.calls_of(Operation::DeleteRole).is_empty());
    assert!(backend.calls_of(Operation::UpdateRole).is_empty());
    assert!(!backend.role(&scope, "a").unwrap().is_managed());
}

#[tokio::test]
async fn test_drop_purges_managed_and_stops() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    backend.seed_managed(&scope, "a");
    backend.seed_managed(&scope, "b");
    backend.seed_role(&scope, RemoteRole::named("manual"));
    let declaration = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![composite("b", vec!["a".into()])],
    )]);
    let options = ReconcileOptions {
        drop: true,
        ..Default::default()
    };

    let report = run(&backend, &declaration, options).await.unwrap();

    let outcome = report.scope("apps").unwrap();
    assert!(outcome.dropped);
    assert_eq!(outcome.purged, 2);
    assert!(!outcome.changed);
    assert_eq!(backend.role_names(&scope).into_iter().collect::<Vec<_>>(), vec!["manual"]);
    assert!(backend.calls_of(Operation::CreateRole).is_empty());
    assert!(backend.calls_of(Operation::AddComposites).is_empty());
}

#[tokio::test]
async fn test_force_drop_purges_unmanaged_too() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    backend.seed_managed(&scope, "a");
    backend.seed_role(&scope, RemoteRole::named("manual"));
    let declaration = Declaration::new(vec![ScopeDeclaration::new("apps", vec!["a".into()])]);
    let options = ReconcileOptions {
        force_drop: true,
        ..Default::default()
    };

    let report = run(&backend, &declaration, options).await.unwrap();

    assert_eq!(report.scope("apps").unwrap().purged, 2);
    assert!(backend.role_names(&scope).is_empty());
}

#[tokio::test]
async fn test_reset_purges_then_resyncs() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    let old = backend.seed_managed(&scope, "a");
    let declaration = Declaration::new(vec![ScopeDeclaration::new("apps", vec!["a".into()])]);
    let options = ReconcileOptions {
        reset: true,
        ..Default::default()
    };

    let report = run(&backend, &declaration, options).await.unwrap();

    let outcome = report.scope("apps").unwrap();
    assert_eq!(outcome.purged, 1);
    assert_eq!(outcome.inserted, 1);
    let recreated = backend.role(&scope, "a").unwrap();
    assert!(recreated.is_managed());
    assert_ne!(recreated.id, old.id);
}

#[tokio::test]
async fn test_cross_client_reference_resolves() {
    let backend = backend();
    let apps = backend.add_client("c-apps", "apps");
    let clients = backend.add_client("c-clients", "clients");
    backend.seed_managed(&clients, "admin");
    let declaration = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![composite("operator", vec!["<clients>admin".into()])],
    )]);

    run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    assert_eq!(backend.composite_names(&apps, "operator"), vec!["admin"]);
    // the qualified name is never created locally
    assert!(!backend.role_names(&apps).contains("<clients>admin"));
    let finds = backend.calls_of(Operation::FindClients);
    assert_eq!(finds.len(), 1);
    assert_eq!(finds[0].target, "clients");
}

#[tokio::test]
async fn test_missing_referenced_client_fails() {
    let backend = backend();
    backend.add_client("c-apps", "apps");
    let declaration = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![composite("operator", vec!["<clients>admin".into()])],
    )]);

    let err = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Reference(_)));
    assert_eq!(err.to_string(), "Not found client clients");
}

#[tokio::test]
async fn test_realm_after_clients_in_given_order() {
    let backend = backend();
    backend.add_client("c-one", "one");
    backend.add_client("c-two", "two");
    let declaration = Declaration::new(vec![
        ScopeDeclaration::new("realm", vec![composite("everyone", vec!["<two>user".into()])]),
        ScopeDeclaration::new("two", vec!["user".into()]),
        ScopeDeclaration::new("one", vec!["user".into()]),
    ]);

    let report = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    let order: Vec<&str> = report.scopes.iter().map(|s| s.scope.as_str()).collect();
    assert_eq!(order, vec!["two", "one", "realm"]);
    assert_eq!(backend.composite_names(&ScopeId::Realm, "everyone"), vec!["user"]);
}

#[tokio::test]
async fn test_second_run_is_noop() {
    let backend = backend();
    backend.add_client("c-apps", "apps");
    backend.add_client("c-clients", "clients");
    let declaration = Declaration::new(vec![
        ScopeDeclaration::new("clients", vec!["admin".into()]),
        ScopeDeclaration::new(
            "apps",
            vec![composite(
                "owner",
                vec![
                    composite("editor", vec!["viewer".into(), "<clients>admin".into()]),
                    "viewer".into(),
                ],
            )],
        ),
        ScopeDeclaration::new("realm", vec![composite("staff", vec!["<apps>owner".into()])]),
    ]);

    let first = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();
    assert!(first.changed());

    backend.clear_calls();
    let second = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    assert!(!second.changed());
    assert_eq!(backend.mutation_count(), 0);
}

#[tokio::test]
async fn test_composite_membership_converges() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    for name in ["admin", "viewer", "editor", "legacy"] {
        backend.seed_managed(&scope, name);
    }
    backend.seed_composites(
        &scope,
        "admin",
        &[(scope.clone(), "viewer"), (scope.clone(), "legacy")],
    );
    let declaration = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![
            composite("admin", vec!["viewer".into(), "editor".into()]),
            "legacy".into(),
        ],
    )]);

    let report = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    assert_eq!(report.scope("apps").unwrap().composites_updated, 1);
    assert_eq!(backend.composite_names(&scope, "admin"), vec!["editor", "viewer"]);
    let removes = backend.calls_of(Operation::RemoveComposites);
    assert_eq!(removes.len(), 1);
    assert_eq!(removes[0].members, vec!["legacy"]);
}

#[tokio::test]
async fn test_dropped_realm_member_is_detached() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    backend.seed_role(&ScopeId::Realm, RemoteRole::named("offline_access"));

    let with_realm = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![composite(
            "admin",
            vec!["viewer".into(), "<realm>offline_access".into()],
        )],
    )]);
    run(&backend, &with_realm, ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(
        backend.composite_names(&scope, "admin"),
        vec!["offline_access", "viewer"]
    );

    let without_realm = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![composite("admin", vec!["viewer".into()])],
    )]);
    let report = run(&backend, &without_realm, ReconcileOptions::default())
        .await
        .unwrap();
    assert!(report.changed());
    assert_eq!(backend.composite_names(&scope, "admin"), vec!["viewer"]);
    // the realm role itself is untouched
    assert!(backend.role(&ScopeId::Realm, "offline_access").is_some());

    backend.clear_calls();
    let report = run(&backend, &without_realm, ReconcileOptions::default())
        .await
        .unwrap();
    assert!(!report.changed());
    assert_eq!(backend.mutation_count(), 0);
}

#[tokio::test]
async fn test_nested_composite_applied_before_parent() {
    let backend = backend();
    let scope = backend.add_client("c-apps", "apps");
    let declaration = Declaration::new(vec![ScopeDeclaration::new(
        "apps",
        vec![composite(
            "admin",
            vec![composite("editor", vec!["viewer".into()])],
        )],
    )]);

    run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap();

    let targets: Vec<String> = backend
        .calls_of(Operation::AddComposites)
        .into_iter()
        .map(|c| c.target)
        .collect();
    assert_eq!(targets, vec!["editor", "admin"]);
    assert_eq!(backend.composite_names(&scope, "admin"), vec!["editor"]);
}

#[tokio::test]
async fn test_unresolvable_member_aborts_run() {
    let backend = backend();
    backend.add_client("c-apps", "apps");
    backend.add_client("c-later", "later");
    let declaration = Declaration::new(vec![
        ScopeDeclaration::new("apps", vec![composite("admin", vec!["<realm>ghost".into()])]),
        ScopeDeclaration::new("later", vec!["x".into()]),
    ]);

    let err = run(&backend, &declaration, ReconcileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Not found [<realm>ghost] role");
    // the first scope's sync stays applied, the second scope never ran
    assert!(backend
        .calls_of(Operation::CreateRole)
        .iter()
        .all(|c| c.target != "x"));
}

//! End-to-end scenarios for `SchemaDispatcher`, exercising the
//! reconciliation rules between a backend and the entity store: managed
//! catalogs never touch the store, unmanaged catalogs round-trip an
//! identity tag, a schema renamed behind the dispatcher's back is
//! re-imported under its new name, two catalogs cannot both claim the same
//! stable id, and a drop is authoritative over a store hiccup.

use std::collections::HashMap;
use std::sync::Arc;

use schema_dispatcher::config::DispatcherConfig;
use schema_dispatcher::ident::{NameIdent, Namespace};
use schema_dispatcher::identity::IDENTITY_TAG_KEY;
use schema_dispatcher::idgen::AtomicIdGenerator;
use schema_dispatcher::schema::{Schema, SchemaChange};
use schema_dispatcher::testing::{FakeCatalogHandle, FakeCatalogRouter, FakePrincipal, InMemoryEntityStore};
use schema_dispatcher::SchemaDispatcher;

fn dispatcher(router: FakeCatalogRouter, store: InMemoryEntityStore, start_id: u64, principal: FakePrincipal) -> SchemaDispatcher {
    SchemaDispatcher::new(
        Arc::new(router),
        Arc::new(store),
        Arc::new(AtomicIdGenerator::starting_at(start_id)),
        Arc::new(principal),
        DispatcherConfig::default(),
    )
}

#[tokio::test]
async fn managed_catalog_create_never_writes_the_store() {
    let router = FakeCatalogRouter::with_managed("lake", "iceberg");
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 1, FakePrincipal::new("alice"));
    let ident = NameIdent::schema("lake", "iceberg", "s1");

    let combined = dispatcher.create_schema(&ident, None, HashMap::new()).await.unwrap();

    assert!(combined.entity.is_none());
    assert!(!combined.imported);
    assert_eq!(combined.backend.name, "s1");

    // A managed catalog's subsequent load is also store-free and reports
    // imported unconditionally.
    let loaded = dispatcher.load_schema(&ident).await.unwrap();
    assert!(loaded.entity.is_none());
    assert!(loaded.imported);
}

#[tokio::test]
async fn unmanaged_create_then_load_round_trips_through_the_identity_tag() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 100, FakePrincipal::new("alice"));
    let ident = NameIdent::schema("lake", "pg", "s1");

    let created = dispatcher.create_schema(&ident, Some("a schema"), HashMap::new()).await.unwrap();
    let entity = created.entity.clone().expect("unmanaged create writes a store entity");
    assert_eq!(entity.id, 100);
    assert_eq!(entity.name, "s1");
    assert_eq!(entity.audit.creator, "alice");

    let loaded = dispatcher.load_schema(&ident).await.unwrap();
    assert!(loaded.imported);
    assert_eq!(loaded.entity.clone().unwrap().id, 100);
    assert_eq!(loaded.backend.comment.as_deref(), Some("a schema"));
    // The tag survives on the raw backend view; the presentable view strips it.
    assert!(loaded.backend.properties.contains_key(IDENTITY_TAG_KEY));
    assert!(!loaded.presentable_properties().contains_key(IDENTITY_TAG_KEY));
}

#[tokio::test]
async fn loading_an_already_imported_schema_twice_does_not_rewrite_the_store() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 1, FakePrincipal::new("alice"));
    let ident = NameIdent::schema("lake", "pg", "s1");

    let created = dispatcher.create_schema(&ident, None, HashMap::new()).await.unwrap();
    let id = created.entity.unwrap().id;

    let first = dispatcher.load_schema(&ident).await.unwrap();
    assert!(first.imported);
    let second = dispatcher.load_schema(&ident).await.unwrap();
    assert!(second.imported);
    assert_eq!(second.entity.unwrap().id, id);
}

#[tokio::test]
async fn list_schemas_reports_everything_created_in_the_namespace() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 1, FakePrincipal::new("alice"));
    let ns = Namespace::new(vec!["lake".into(), "pg".into()]);

    dispatcher.create_schema(&ns.child("s1"), None, HashMap::new()).await.unwrap();
    dispatcher.create_schema(&ns.child("s2"), None, HashMap::new()).await.unwrap();

    let mut listed = dispatcher.list_schemas(&ns).await.unwrap();
    listed.sort_by_key(|i| i.leaf().to_string());
    assert_eq!(listed, vec![ns.child("s1"), ns.child("s2")]);
}

#[tokio::test]
async fn load_after_an_external_rename_re_imports_the_store_row_under_the_new_name() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let handle = router.handle("pg");
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 1, FakePrincipal::new("alice"));
    let old_ident = NameIdent::schema("lake", "pg", "s1");
    let new_ident = NameIdent::schema("lake", "pg", "s2");

    let created = dispatcher.create_schema(&old_ident, None, HashMap::new()).await.unwrap();
    let original_id = created.entity.unwrap().id;

    handle.backend().rename_externally(&old_ident, &new_ident);

    let loaded = dispatcher.load_schema(&new_ident).await.unwrap();
    assert!(loaded.imported);
    let entity = loaded.entity.expect("import re-establishes the store entity");
    assert_eq!(entity.id, original_id);
    assert_eq!(entity.name, "s2");

    // The old name no longer resolves against the backend at all.
    assert!(dispatcher.load_schema(&old_ident).await.is_err());
}

#[tokio::test]
async fn two_catalogs_claiming_the_same_identity_tag_is_rejected() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg").register("pg2", FakeCatalogHandle::unmanaged());
    let handle_b = router.handle("pg2");
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 7, FakePrincipal::new("alice"));

    let ident_a = NameIdent::schema("lake", "pg", "s1");
    let created = dispatcher.create_schema(&ident_a, None, HashMap::new()).await.unwrap();
    let claimed_id = created.entity.unwrap().id;
    let tag_value = created
        .backend
        .properties
        .get(IDENTITY_TAG_KEY)
        .cloned()
        .expect("create_schema injects the identity tag");

    // A second, independent catalog's backend already carries the same
    // out-of-band identity tag under a different name — as if two catalogs
    // were pointed at overlapping storage.
    let ident_b = NameIdent::schema("lake", "pg2", "s9");
    handle_b
        .backend()
        .seed(&ident_b, Schema::new("s9", None, HashMap::from([(IDENTITY_TAG_KEY.to_string(), tag_value)])));

    let err = dispatcher.load_schema(&ident_b).await.unwrap_err();
    assert_eq!(err.code(), "MultipleCatalogsManageSchema");

    // The original row is untouched.
    let still_there = dispatcher.load_schema(&ident_a).await.unwrap();
    assert_eq!(still_there.entity.unwrap().id, claimed_id);
}

#[tokio::test]
async fn drop_succeeds_even_when_the_store_entry_is_already_gone() {
    // A backend-authoritative schema with no corresponding store row at
    // all (the store hiccupped on a prior create, or this genuinely is the
    // row's first drop after an import never ran). The backend drop must
    // still win even though `store.delete` has nothing to remove.
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let handle = router.handle("pg");
    let ident = NameIdent::schema("lake", "pg", "s1");
    handle.backend().seed(&ident, Schema::new("s1", None, HashMap::new()));

    let dispatcher = dispatcher(router, InMemoryEntityStore::new(), 1, FakePrincipal::new("alice"));

    let dropped = dispatcher.drop_schema(&ident, false).await.unwrap();
    assert!(dropped);
}

#[tokio::test]
async fn drop_of_a_non_empty_schema_without_cascade_fails() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let handle = router.handle("pg");
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 1, FakePrincipal::new("alice"));
    let ident = NameIdent::schema("lake", "pg", "s1");

    dispatcher.create_schema(&ident, None, HashMap::new()).await.unwrap();
    handle.backend().mark_non_empty(&ident);

    let err = dispatcher.drop_schema(&ident, false).await.unwrap_err();
    assert_eq!(err.code(), "NonEmptySchema");
}

#[tokio::test]
async fn alter_schema_updates_properties_and_stamps_the_audit_trail() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let store = InMemoryEntityStore::new();
    let principal = FakePrincipal::new("alice");
    let dispatcher = dispatcher(router, store, 1, principal);
    let ident = NameIdent::schema("lake", "pg", "s1");

    dispatcher.create_schema(&ident, None, HashMap::new()).await.unwrap();

    let altered = dispatcher
        .alter_schema(&ident, &[SchemaChange::SetProperty { key: "owner".into(), value: "bob".into() }])
        .await
        .unwrap();

    assert_eq!(altered.backend.properties.get("owner"), Some(&"bob".to_string()));
    let entity = altered.entity.expect("unmanaged alter updates the store entity");
    assert_eq!(entity.audit.last_modifier.as_deref(), Some("alice"));
    assert!(entity.audit.last_modified_time.is_some());
}

#[tokio::test]
async fn concurrent_alters_on_the_same_schema_are_serialized_not_interleaved() {
    let router = FakeCatalogRouter::with_unmanaged("lake", "pg");
    let store = InMemoryEntityStore::new();
    let dispatcher = Arc::new(dispatcher(router, store, 1, FakePrincipal::new("alice")));
    let ident = NameIdent::schema("lake", "pg", "s1");

    dispatcher.create_schema(&ident, None, HashMap::new()).await.unwrap();

    let d1 = dispatcher.clone();
    let ident1 = ident.clone();
    let d2 = dispatcher.clone();
    let ident2 = ident.clone();

    let (r1, r2) = tokio::join!(
        tokio::spawn(async move {
            d1.alter_schema(&ident1, &[SchemaChange::SetProperty { key: "owner".into(), value: "left".into() }]).await
        }),
        tokio::spawn(async move {
            d2.alter_schema(&ident2, &[SchemaChange::SetProperty { key: "owner".into(), value: "right".into() }]).await
        }),
    );
    r1.unwrap().unwrap();
    r2.unwrap().unwrap();

    // Whichever write landed last, the final value is exactly one of the two
    // — never a mix, and never lost entirely — because the write lock
    // totally orders the two alters.
    let final_view = dispatcher.load_schema(&ident).await.unwrap();
    let owner = final_view.backend.properties.get("owner").cloned();
    assert!(owner == Some("left".to_string()) || owner == Some("right".to_string()));
}

#[tokio::test]
async fn alter_schema_rejects_unknown_properties_before_touching_the_backend() {
    use schema_dispatcher::testing::FakePropertiesMetadata;

    let router = FakeCatalogRouter::new().register(
        "pg",
        FakeCatalogHandle::unmanaged().with_properties_metadata(FakePropertiesMetadata::new().disallow("secret")),
    );
    let store = InMemoryEntityStore::new();
    let dispatcher = dispatcher(router, store, 1, FakePrincipal::new("alice"));
    let ident = NameIdent::schema("lake", "pg", "s1");

    dispatcher.create_schema(&ident, None, HashMap::new()).await.unwrap();

    let err = dispatcher
        .alter_schema(&ident, &[SchemaChange::SetProperty { key: "secret".into(), value: "x".into() }])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "IllegalArgument");
}

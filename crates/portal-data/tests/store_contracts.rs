//! RecordStore contract tests against the in-memory store.
//!
//! Covers create/update through `StoreContext`, related-record queries,
//! seeding the cache from a JSON:API document, and transport failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use portal_data::fakes::MemoryRecordStore;
use portal_data::jsonapi::ResourceDocument;
use portal_data::{
    AttributeValue, NotificationListener, QueryExpression, QueryResult, Record, RecordOptions,
    RecordStore, RecordType, RelationshipSpec, RequestOptions, ResourceRef, StoreConfig,
    StoreContext, StoreError, StoreResult, TransformOperation,
};
use tokio::sync::mpsc;

fn context() -> StoreContext {
    StoreContext::portal(StoreConfig::default()).unwrap()
}

fn seeded_store(context: &StoreContext) -> MemoryRecordStore {
    let document: ResourceDocument = serde_json::from_value(serde_json::json!({
        "data": [
            {
                "type": "projects",
                "id": "10",
                "attributes": {"name": "Genesis"},
                "relationships": {
                    "owner": {"data": {"type": "users", "id": "1"}},
                    "products": {"data": [
                        {"type": "products", "id": "20"},
                        {"type": "products", "id": "21"},
                        {"type": "products", "id": "99"}
                    ]},
                    "group": {"data": null}
                }
            }
        ],
        "included": [
            {"type": "users", "id": "1", "attributes": {"name": "Ada"}},
            {"type": "products", "id": "20", "attributes": {"version-built": "1.0"}},
            {"type": "products", "id": "21", "attributes": {"version-built": "1.1"}}
        ]
    }))
    .unwrap();

    let store = MemoryRecordStore::new(context.identities().clone());
    assert_eq!(store.seed(context.schema(), &document).unwrap(), 4);
    store
}

// ===========================================================================
// create / update
// ===========================================================================

#[tokio::test]
async fn create_returns_cached_record_with_server_id() {
    let context = context();
    let store = MemoryRecordStore::new(context.identities().clone()).with_remote_assignment(500);

    let created = context
        .create(
            &store,
            RecordType::Project,
            RecordOptions::new()
                .attribute("name", "My First Project")
                .relationship("owner", RelationshipSpec::One(ResourceRef::new("users", "1"))),
        )
        .await
        .unwrap();

    assert_eq!(created.identity.remote_id(), Some("500"));
    assert_eq!(
        context.identities().resolve_local_id(RecordType::Project, "500"),
        created.identity.id
    );
    assert_eq!(
        created.attribute("name"),
        Some(&AttributeValue::from("My First Project"))
    );
}

#[tokio::test]
async fn create_rejects_unknown_relationship_before_touching_store() {
    let context = context();
    let store = MemoryRecordStore::new(context.identities().clone());

    let err = context
        .create(
            &store,
            RecordType::Project,
            RecordOptions::new()
                .relationship("sponsor", RelationshipSpec::One(ResourceRef::new("users", "1"))),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Schema(_)));
    assert!(store.is_empty());
}

#[tokio::test]
async fn update_replaces_only_supplied_members() {
    let context = context();
    let store = seeded_store(&context);
    let project = context.identities().build_identity("10", RecordType::Project);

    context
        .update(
            &store,
            &project,
            RecordOptions::new()
                .attribute("isPublic", true)
                .relationship("group", RelationshipSpec::One(ResourceRef::new("groups", "3"))),
        )
        .await
        .unwrap();

    let stored = store.get(&project).unwrap();
    assert_eq!(stored.attribute("name"), Some(&AttributeValue::from("Genesis")));
    assert_eq!(stored.attribute("isPublic"), Some(&AttributeValue::Bool(true)));
    let group = stored
        .related("group")
        .and_then(|g| g.as_one())
        .unwrap();
    assert_eq!(context.identities().remote_id_of(group), "3");
}

#[tokio::test]
async fn update_missing_record_fails() {
    let context = context();
    let store = MemoryRecordStore::new(context.identities().clone());
    let ghost = context.identities().build_identity("404", RecordType::Role);

    let err = context
        .update(&store, &ghost, RecordOptions::new().attribute("name", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound { ref id, .. } if id == "404"));
}

// ===========================================================================
// queries
// ===========================================================================

#[tokio::test]
async fn find_record_by_remote_id() {
    let context = context();
    let store = seeded_store(&context);

    let user = store
        .query(
            context.find_record(RecordType::User, "1"),
            &context.default_options(),
        )
        .await
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(user.attribute("name"), Some(&AttributeValue::from("Ada")));
}

#[tokio::test]
async fn find_record_not_found() {
    let context = context();
    let store = seeded_store(&context);

    let err = store
        .query(
            context.find_record(RecordType::User, "2"),
            &context.default_options(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound { .. }));
}

#[tokio::test]
async fn find_related_record_follows_owner() {
    let context = context();
    let store = seeded_store(&context);
    let project = context.identities().build_identity("10", RecordType::Project);

    let owner = store
        .query(
            context.query().find_related_record(&project, "owner").unwrap(),
            &context.default_options(),
        )
        .await
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(owner.identity.remote_id(), Some("1"));

    let group = store
        .query(
            context.query().find_related_record(&project, "group").unwrap(),
            &context.default_options(),
        )
        .await
        .unwrap()
        .into_record();
    assert!(group.is_none());
}

#[tokio::test]
async fn find_related_records_keeps_order_and_skips_unloaded() {
    let context = context();
    let store = seeded_store(&context);
    let project = context.identities().build_identity("10", RecordType::Project);

    let products = store
        .query(
            context.query().find_related_records(&project, "products").unwrap(),
            &context.default_options(),
        )
        .await
        .unwrap()
        .into_records();

    let remote: Vec<_> = products
        .iter()
        .map(|p| context.identities().remote_id_of(&p.identity))
        .collect();
    assert_eq!(remote, vec!["20", "21"]);
}

#[tokio::test]
async fn find_records_by_type() {
    let context = context();
    let store = seeded_store(&context);

    let products = store
        .query(
            QueryExpression::FindRecords {
                record_type: RecordType::Product,
            },
            &context.default_options(),
        )
        .await
        .unwrap()
        .into_records();
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn store_is_usable_as_trait_object() {
    let context = context();
    let store: Arc<dyn RecordStore> = Arc::new(seeded_store(&context));

    let created = context
        .create(
            store.as_ref(),
            RecordType::Reviewer,
            RecordOptions::new().attribute("email", "rev@example.org"),
        )
        .await
        .unwrap();
    // plain store: no server id assigned, remote id falls back to local id
    assert_eq!(
        context.identities().remote_id_of(&created.identity),
        created.identity.id.as_str()
    );
}

// ===========================================================================
// transport failures
// ===========================================================================

/// Store whose first `failures` calls fail with a transport error.
struct FlakyStore {
    inner: MemoryRecordStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    fn new(inner: MemoryRecordStore, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }

    fn offline(inner: MemoryRecordStore) -> Self {
        Self::new(inner, usize::MAX)
    }

    fn check(&self) -> StoreResult<()> {
        let left = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match left {
            Ok(_) => Err(StoreError::Transport("connection reset by peer".into())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn query(
        &self,
        expression: QueryExpression,
        options: &RequestOptions,
    ) -> StoreResult<QueryResult> {
        self.check()?;
        self.inner.query(expression, options).await
    }

    async fn update(
        &self,
        operation: TransformOperation,
        options: &RequestOptions,
    ) -> StoreResult<()> {
        self.check()?;
        self.inner.update(operation, options).await
    }
}

#[tokio::test]
async fn create_surfaces_transport_error_unchanged() {
    let context = context();
    let store = FlakyStore::offline(MemoryRecordStore::new(context.identities().clone()));

    let err = context
        .create(
            &store,
            RecordType::Project,
            RecordOptions::new().attribute("name", "Offline"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Transport(ref msg) if msg == "connection reset by peer"));
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn update_surfaces_transport_error_unchanged() {
    let context = context();
    let store = FlakyStore::new(seeded_store(&context), 1);
    let project = context.identities().build_identity("10", RecordType::Project);

    let err = context
        .update(&store, &project, RecordOptions::new().attribute("name", "Exodus"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Transport(ref msg) if msg == "connection reset by peer"));
    assert_eq!(
        store.inner.get(&project).unwrap().attribute("name"),
        Some(&AttributeValue::from("Genesis"))
    );

    // no retry inside the store: the next call goes through
    context
        .update(&store, &project, RecordOptions::new().attribute("name", "Exodus"))
        .await
        .unwrap();
    assert_eq!(
        store.inner.get(&project).unwrap().attribute("name"),
        Some(&AttributeValue::from("Exodus"))
    );
}

#[tokio::test]
async fn listener_keeps_draining_after_transport_error() {
    let context = Arc::new(context());
    let inner = MemoryRecordStore::new(context.identities().clone());
    let mut notification = Record::new(
        context
            .identities()
            .build_identity("7", RecordType::Notification),
    );
    notification
        .attributes
        .insert("title".into(), AttributeValue::from("Build finished"));
    inner.insert(notification);

    let store = Arc::new(FlakyStore::new(inner, 1));
    let listener = NotificationListener::new(context, store);
    let (tx, rx) = mpsc::channel(4);
    tx.send(7).await.unwrap();
    tx.send(7).await.unwrap();
    drop(tx);

    assert_eq!(listener.run(rx).await, 1);
}

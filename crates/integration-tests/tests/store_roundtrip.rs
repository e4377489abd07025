//! Live-database tests for the document store.
//!
//! These tests require a running Postgres reachable via
//! `MARULA_TEST_DATABASE_URI`; they pass silently when it is unset.

use serde_json::json;
use uuid::Uuid;

use marula_core::{CollectionName, DocumentId, GlobalSlug};
use marula_db::{DbError, Filter, FindOptions};
use marula_integration_tests::test_store;

/// A collection name no other test (or run) is using.
fn scratch_collection() -> CollectionName {
    CollectionName::parse(&format!("it-{}", Uuid::new_v4().simple()))
        .expect("generated collection name is a valid slug")
}

#[tokio::test]
async fn test_document_crud_roundtrip() {
    let Some(store) = test_store().await else {
        return;
    };
    let collection = scratch_collection();

    let created = store
        .create(&collection, json!({"title": "Mango", "status": "draft"}))
        .await
        .expect("create failed");
    assert_eq!(created.collection, collection);
    assert_eq!(created.data.get("title"), Some(&json!("Mango")));

    let fetched = store
        .find_by_id(&collection, created.id)
        .await
        .expect("find_by_id failed");
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.data, created.data);

    let updated = store
        .update(&collection, created.id, json!({"title": "Mango", "status": "published"}))
        .await
        .expect("update failed");
    assert_eq!(updated.data.get("status"), Some(&json!("published")));
    assert!(updated.updated_at >= created.updated_at);

    let deleted = store
        .delete(&collection, created.id)
        .await
        .expect("delete failed");
    assert_eq!(deleted.id, created.id);

    let missing = store.find_by_id(&collection, created.id).await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}

#[tokio::test]
async fn test_find_with_filter_and_count() {
    let Some(store) = test_store().await else {
        return;
    };
    let collection = scratch_collection();

    for (title, status) in [
        ("Mango", "published"),
        ("Papaya", "published"),
        ("Durian", "draft"),
    ] {
        store
            .create(&collection, json!({"title": title, "status": status}))
            .await
            .expect("create failed");
    }

    let published = Filter::new().field("status", "published");
    let found = store
        .find(&collection, &published, &FindOptions::default())
        .await
        .expect("find failed");
    assert_eq!(found.len(), 2);
    assert!(
        found
            .iter()
            .all(|doc| doc.data.get("status") == Some(&json!("published")))
    );

    let count = store
        .count(&collection, &published)
        .await
        .expect("count failed");
    assert_eq!(count, 2);

    let total = store
        .count(&collection, &Filter::new())
        .await
        .expect("count failed");
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_find_pagination_orders_newest_first() {
    let Some(store) = test_store().await else {
        return;
    };
    let collection = scratch_collection();

    for n in 0..5 {
        store
            .create(&collection, json!({"n": n}))
            .await
            .expect("create failed");
    }

    let options = FindOptions {
        limit: Some(2),
        offset: Some(0),
        ..FindOptions::default()
    };
    let page = store
        .find(&collection, &Filter::new(), &options)
        .await
        .expect("find failed");
    assert_eq!(page.len(), 2);
    // default sort is created_at descending
    assert!(page.first().expect("page is non-empty").created_at
        >= page.last().expect("page is non-empty").created_at);
}

#[tokio::test]
async fn test_create_with_duplicate_id_conflicts() {
    let Some(store) = test_store().await else {
        return;
    };
    let collection = scratch_collection();
    let id = DocumentId::generate();

    store
        .create_with_id(&collection, id, json!({"title": "original"}))
        .await
        .expect("first create failed");

    let duplicate = store
        .create_with_id(&collection, id, json!({"title": "duplicate"}))
        .await;
    assert!(matches!(duplicate, Err(DbError::Conflict(_))));
}

#[tokio::test]
async fn test_global_upsert_roundtrip() {
    let Some(store) = test_store().await else {
        return;
    };
    let slug = GlobalSlug::parse(&format!("it-{}", Uuid::new_v4().simple()))
        .expect("generated slug is valid");

    let absent = store.find_global(&slug).await.expect("find_global failed");
    assert!(absent.is_none());

    let first = store
        .update_global(&slug, json!({"nav": ["home"]}))
        .await
        .expect("first upsert failed");
    assert_eq!(first.data.get("nav"), Some(&json!(["home"])));

    let second = store
        .update_global(&slug, json!({"nav": ["home", "shop"]}))
        .await
        .expect("second upsert failed");
    assert_eq!(second.data.get("nav"), Some(&json!(["home", "shop"])));
    assert!(second.updated_at >= first.updated_at);

    let fetched = store
        .find_global(&slug)
        .await
        .expect("find_global failed")
        .expect("global exists after upsert");
    assert_eq!(fetched.data, second.data);
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let Some(store) = test_store().await else {
        return;
    };
    let collection = scratch_collection();

    let result = store
        .update(&collection, DocumentId::generate(), json!({"title": "ghost"}))
        .await;
    assert!(matches!(result, Err(DbError::NotFound)));

    let result = store.delete(&collection, DocumentId::generate()).await;
    assert!(matches!(result, Err(DbError::NotFound)));
}

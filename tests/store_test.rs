//! Integration tests for the SQLite-backed store.

use forum_feed_cache::cache::PostCache;
use forum_feed_cache::models::Post;
use forum_feed_cache::store::{KeyValueStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_store() -> (SqliteStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = SqliteStore::open(&temp_dir.path().join("test.sqlite"))
        .await
        .expect("Failed to open store");
    (store, temp_dir)
}

#[tokio::test]
async fn test_set_get_overwrite_remove() {
    let (store, _temp_dir) = setup_store().await;

    assert_eq!(store.get("lastPull:Gaming").await.unwrap(), None);

    store.set("lastPull:Gaming", "100").await.unwrap();
    assert_eq!(
        store.get("lastPull:Gaming").await.unwrap().as_deref(),
        Some("100")
    );

    store.set("lastPull:Gaming", "200").await.unwrap();
    assert_eq!(
        store.get("lastPull:Gaming").await.unwrap().as_deref(),
        Some("200")
    );

    store.remove("lastPull:Gaming").await.unwrap();
    assert_eq!(store.get("lastPull:Gaming").await.unwrap(), None);

    // Removing a missing key is fine.
    store.remove("lastPull:Gaming").await.unwrap();
}

#[tokio::test]
async fn test_values_survive_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("test.sqlite");

    {
        let store = SqliteStore::open(&path).await.unwrap();
        store.set("feedMeta:Home", "g1:20").await.unwrap();
    }

    // Opening again re-runs migrations without touching existing data.
    let store = SqliteStore::open(&path).await.unwrap();
    assert_eq!(
        store.get("feedMeta:Home").await.unwrap().as_deref(),
        Some("g1:20")
    );
}

#[tokio::test]
async fn test_post_cache_on_sqlite() {
    let (store, _temp_dir) = setup_store().await;
    let cache = PostCache::new(Arc::new(store.clone()));

    let batch: Vec<Post> = [12, 4, 4]
        .into_iter()
        .map(|id| Post {
            id: Some(id),
            title: format!("post {id}"),
            ..Post::default()
        })
        .collect();
    let merged = cache.merge("Fashion", &batch).await.unwrap();
    assert_eq!(merged.admitted.len(), 2);

    let raw = store.get("posts:Fashion").await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["4"]["title"], "post 4");
    assert_eq!(value["12"]["id"], 12);

    cache.clear("Fashion").await.unwrap();
    assert_eq!(store.get("posts:Fashion").await.unwrap(), None);
}

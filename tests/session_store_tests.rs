use blog_api::session::{InMemorySessionStore, SESSION_TOKEN_KEY, SessionError, SessionStore};
use chrono::Duration;
use std::{collections::HashSet, sync::Arc};

fn store() -> Arc<InMemorySessionStore> {
    Arc::new(InMemorySessionStore::new(Duration::hours(1)))
}

#[tokio::test]
async fn test_new_session_is_empty() {
    let store = store();
    let id = store.create().await.unwrap();

    assert!(!store.exists(&id, SESSION_TOKEN_KEY).await.unwrap());
    assert_eq!(
        store.get(&id, SESSION_TOKEN_KEY).await,
        Err(SessionError::NotFound)
    );
}

#[tokio::test]
async fn test_put_then_get_returns_latest_value() {
    let store = store();
    let id = store.create().await.unwrap();

    store.put(&id, SESSION_TOKEN_KEY, "first".into()).await.unwrap();
    store.put(&id, SESSION_TOKEN_KEY, "second".into()).await.unwrap();

    assert!(store.exists(&id, SESSION_TOKEN_KEY).await.unwrap());
    assert_eq!(store.get(&id, SESSION_TOKEN_KEY).await.unwrap(), "second");
}

#[tokio::test]
async fn test_unknown_id_resolves_to_nothing() {
    let store = store();

    assert!(!store.exists("forged-id", SESSION_TOKEN_KEY).await.unwrap());
    assert_eq!(
        store.put("forged-id", SESSION_TOKEN_KEY, "x".into()).await,
        Err(SessionError::NotFound)
    );
}

#[tokio::test]
async fn test_destroy_is_terminal_and_idempotent() {
    let store = store();
    let id = store.create().await.unwrap();
    store.put(&id, SESSION_TOKEN_KEY, "token".into()).await.unwrap();

    store.destroy(&id).await.unwrap();
    store.destroy(&id).await.unwrap();

    assert!(!store.exists(&id, SESSION_TOKEN_KEY).await.unwrap());
    assert_eq!(
        store.get(&id, SESSION_TOKEN_KEY).await,
        Err(SessionError::NotFound)
    );
    // A late write must not bring the session back.
    assert_eq!(
        store.put(&id, SESSION_TOKEN_KEY, "late".into()).await,
        Err(SessionError::NotFound)
    );
    assert!(store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_never_collide() {
    let store = store();

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let id = store.create().await.unwrap();
                store
                    .put(&id, SESSION_TOKEN_KEY, format!("token-{i}"))
                    .await
                    .unwrap();
                (id, i)
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let (id, i) = handle.await.unwrap();
        assert_eq!(
            store.get(&id, SESSION_TOKEN_KEY).await.unwrap(),
            format!("token-{i}")
        );
        assert!(ids.insert(id), "duplicate session id");
    }
    assert_eq!(store.len(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_destroy_racing_put_leaves_consistent_state() {
    for _ in 0..50 {
        let store = store();
        let id = store.create().await.unwrap();
        store.put(&id, SESSION_TOKEN_KEY, "original".into()).await.unwrap();

        let writer = {
            let (store, id) = (store.clone(), id.clone());
            tokio::spawn(async move { store.put(&id, SESSION_TOKEN_KEY, "raced".into()).await })
        };
        let destroyer = {
            let (store, id) = (store.clone(), id.clone());
            tokio::spawn(async move { store.destroy(&id).await })
        };

        let put_result = writer.await.unwrap();
        destroyer.await.unwrap().unwrap();

        // Whichever order the two ran in, destroy has completed: the session is gone.
        assert!(matches!(put_result, Ok(()) | Err(SessionError::NotFound)));
        assert!(!store.exists(&id, SESSION_TOKEN_KEY).await.unwrap());
        assert_eq!(
            store.get(&id, SESSION_TOKEN_KEY).await,
            Err(SessionError::NotFound)
        );
    }
}

#[tokio::test]
async fn test_expired_session_reads_as_absent() {
    let store = InMemorySessionStore::new(Duration::milliseconds(50));
    let id = store.create().await.unwrap();
    store.put(&id, SESSION_TOKEN_KEY, "token".into()).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(120)).await;

    assert!(!store.exists(&id, SESSION_TOKEN_KEY).await.unwrap());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_reads_do_not_extend_the_session() {
    let store = InMemorySessionStore::new(Duration::milliseconds(200));
    let id = store.create().await.unwrap();
    store.put(&id, SESSION_TOKEN_KEY, "token".into()).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    assert_eq!(store.get(&id, SESSION_TOKEN_KEY).await.unwrap(), "token");

    // Only the write started the clock, so the read above bought no extra time.
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    assert!(!store.exists(&id, SESSION_TOKEN_KEY).await.unwrap());
}

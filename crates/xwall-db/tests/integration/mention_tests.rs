use xwall_core::models::{MentionStatus, NewMention};
use xwall_core::traits::{MentionStore, PersistOutcome};
use xwall_db::{Database, MentionRepository};

use crate::integration::common::setup_test_db;

fn mention(id: &str) -> NewMention {
    NewMention {
        source_id: format!("https://x.com/alice/status/{id}"),
        content: format!("Loving @replit #{id}"),
        author_name: "Alice".into(),
        author_handle: "alice".into(),
        avatar_url: Some("https://pbs.twimg.com/profile_images/alice.jpg".into()),
        media_url: None,
        platform: "twitter".into(),
        status: MentionStatus::Pending,
    }
}

#[tokio::test]
async fn insert_and_retrieve_mention() {
    let (pool, _container) = setup_test_db().await;
    let repo = MentionRepository::new(pool);

    let outcome = repo.insert(&mention("1")).await.unwrap();
    let PersistOutcome::Inserted(Some(id)) = outcome else {
        panic!("expected insert with an id, got {outcome:?}");
    };

    let stored = repo
        .get_by_source_id("https://x.com/alice/status/1")
        .await
        .unwrap()
        .expect("Should find the mention");

    assert_eq!(stored.id, id);
    assert_eq!(stored.author_handle, "alice");
    assert_eq!(stored.platform, "twitter");
    assert_eq!(stored.status, MentionStatus::Pending);
    assert_eq!(stored.media_url, None);
}

#[tokio::test]
async fn second_insert_with_same_source_id_is_duplicate() {
    let (pool, _container) = setup_test_db().await;
    let repo = MentionRepository::new(pool.clone());

    let first = repo.insert(&mention("1")).await.unwrap();
    assert!(matches!(first, PersistOutcome::Inserted(_)));

    let mut changed = mention("1");
    changed.content = "edited text".into();
    let second = repo.insert(&changed).await.unwrap();
    assert_eq!(second, PersistOutcome::Duplicate);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM xwall")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    // Ignore-duplicate, not update.
    let stored = repo
        .get_by_source_id("https://x.com/alice/status/1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.content, "Loving @replit #1");
}

#[tokio::test]
async fn list_recent_filters_by_status_newest_first() {
    let (pool, _container) = setup_test_db().await;
    let repo = MentionRepository::new(pool.clone());

    for i in 0..4 {
        repo.insert(&mention(&i.to_string())).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    sqlx::query("UPDATE xwall SET status = 'APPROVED' WHERE source_id = $1")
        .bind("https://x.com/alice/status/0")
        .execute(&pool)
        .await
        .unwrap();

    let pending = repo
        .list_recent(Some(MentionStatus::Pending), 2)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].source_id, "https://x.com/alice/status/3");
    assert_eq!(pending[1].source_id, "https://x.com/alice/status/2");

    let all = repo.list_recent(None, 10).await.unwrap();
    assert_eq!(all.len(), 4);

    assert_eq!(repo.count_by_status(MentionStatus::Pending).await.unwrap(), 3);
    assert_eq!(repo.count_by_status(MentionStatus::Approved).await.unwrap(), 1);
}

#[tokio::test]
async fn get_by_source_id_returns_none_for_unknown() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).mention_repo();

    let result = repo
        .get_by_source_id("https://x.com/nobody/status/0")
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;
    let repo = MentionRepository::new(pool);

    repo.health_check().await.unwrap();
}

/// Exercises the repository only through the store abstraction the poller uses.
async fn insert_twice_through_store<S: MentionStore>(
    store: &S,
    mention: &NewMention,
) -> (PersistOutcome, PersistOutcome) {
    let first = store.insert(mention).await.unwrap();
    let second = store.insert(mention).await.unwrap();
    (first, second)
}

#[tokio::test]
async fn repository_behaves_as_mention_store() {
    let (pool, _container) = setup_test_db().await;
    let repo = MentionRepository::new(pool);

    let (first, second) = insert_twice_through_store(&repo, &mention("7")).await;

    assert!(matches!(first, PersistOutcome::Inserted(Some(_))));
    assert_eq!(second, PersistOutcome::Duplicate);
    assert_eq!(
        MentionStore::count_by_status(&repo, MentionStatus::Pending)
            .await
            .unwrap(),
        1
    );
    MentionStore::health_check(&repo).await.unwrap();
    let recent = MentionStore::list_recent(&repo, None, 5).await.unwrap();
    assert_eq!(recent[0].source_id, "https://x.com/alice/status/7");
}

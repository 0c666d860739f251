mod common;

use chrono::{Duration, Utc};
use common::{pictogram, InMemoryPreferences, SlowPreferences};
use pictolink_core::{PreferenceKind, PreferenceRecord, PreferenceStore, SessionContext, RECENT_CAPACITY};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

async fn started_store() -> (PreferenceStore, Arc<InMemoryPreferences>, SessionContext) {
    let repo = Arc::new(InMemoryPreferences::default());
    let store = PreferenceStore::new(repo.clone());
    let session = SessionContext::new(Uuid::new_v4());
    store.start_session(session).await;
    (store, repo, session)
}

fn ids(pictograms: &[pictolink_core::Pictogram]) -> Vec<u32> {
    pictograms.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_recent_list_is_capped_and_evicts_least_recent() {
    let (store, repo, _) = started_store().await;

    for id in 1..=21 {
        store.add_recent(&pictogram(id, "p")).await;
    }

    let recent = store.recent_pictograms();
    assert_eq!(recent.len(), RECENT_CAPACITY);
    assert_eq!(recent[0].id, 21);
    assert!(!ids(&recent).contains(&1));
    assert_eq!(ids(&recent), (2..=21).rev().collect::<Vec<_>>());

    let persisted = repo.rows(PreferenceKind::Recent);
    assert_eq!(persisted.len(), RECENT_CAPACITY);
    assert!(persisted.iter().all(|r| r.pictogram_id != 1));
}

#[tokio::test]
async fn test_reusing_a_pictogram_moves_it_to_the_front() {
    let (store, repo, _) = started_store().await;

    store.add_recent(&pictogram(1, "uno")).await;
    store.add_recent(&pictogram(2, "dos")).await;
    store.add_recent(&pictogram(1, "uno")).await;

    assert_eq!(ids(&store.recent_pictograms()), vec![1, 2]);
    assert_eq!(repo.rows(PreferenceKind::Recent).len(), 2);
}

#[tokio::test]
async fn test_favorite_toggle_is_idempotent_in_pairs() {
    let (store, repo, _) = started_store().await;
    let p = pictogram(2349, "comer");

    assert!(store.toggle_favorite(&p).await);
    assert!(store.is_favorite(2349));
    assert_eq!(repo.rows(PreferenceKind::Favorite).len(), 1);

    assert!(!store.toggle_favorite(&p).await);
    assert!(!store.is_favorite(2349));
    assert!(store.favorite_pictograms().is_empty());
    assert!(repo.rows(PreferenceKind::Favorite).is_empty());
}

#[tokio::test]
async fn test_storage_failure_keeps_optimistic_state() {
    let (store, repo, _) = started_store().await;
    repo.fail.store(true, Ordering::SeqCst);

    store.add_recent(&pictogram(5, "cinco")).await;
    assert!(store.toggle_favorite(&pictogram(5, "cinco")).await);

    assert_eq!(ids(&store.recent_pictograms()), vec![5]);
    assert!(store.is_favorite(5));
}

#[tokio::test]
async fn test_ending_the_session_clears_lists_and_stops_recording() {
    let (store, repo, _) = started_store().await;
    store.add_recent(&pictogram(1, "uno")).await;
    store.toggle_favorite(&pictogram(1, "uno")).await;

    store.end_session();
    assert!(store.recent_pictograms().is_empty());
    assert!(store.favorite_pictograms().is_empty());

    store.add_recent(&pictogram(2, "dos")).await;
    assert!(store.recent_pictograms().is_empty());
    assert_eq!(repo.rows(PreferenceKind::Recent).len(), 1);
}

#[tokio::test]
async fn test_start_session_loads_persisted_lists_in_order() {
    let repo = Arc::new(InMemoryPreferences::default());
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    for (id, minutes_ago) in [(10u32, 30i64), (11, 5), (12, 60)] {
        let at = now - Duration::minutes(minutes_ago);
        repo.seed(PreferenceRecord {
            id: Uuid::new_v4(),
            user_id,
            kind: PreferenceKind::Recent,
            pictogram_id: id,
            snapshot: pictogram(id, "p"),
            last_used_at: Some(at),
            created_at: at,
        });
    }
    repo.seed(PreferenceRecord {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        kind: PreferenceKind::Recent,
        pictogram_id: 99,
        snapshot: pictogram(99, "ajeno"),
        last_used_at: Some(now),
        created_at: now,
    });

    let store = PreferenceStore::new(repo);
    store.start_session(SessionContext::new(user_id)).await;

    assert_eq!(ids(&store.recent_pictograms()), vec![11, 10, 12]);
}

#[tokio::test]
async fn test_subscribers_see_optimistic_updates() {
    let (store, _, _) = started_store().await;
    let mut updates = store.subscribe();

    store.toggle_favorite(&pictogram(3, "tres")).await;

    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().is_favorite(3));
}

#[tokio::test(start_paused = true)]
async fn test_favorite_toggled_during_initial_load_survives_it() {
    let user_id = Uuid::new_v4();
    let inner = InMemoryPreferences::default();
    let at = Utc::now() - Duration::minutes(1);
    inner.seed(PreferenceRecord {
        id: Uuid::new_v4(),
        user_id,
        kind: PreferenceKind::Favorite,
        pictogram_id: 5,
        snapshot: pictogram(5, "casa"),
        last_used_at: None,
        created_at: at,
    });
    let repo = Arc::new(SlowPreferences {
        inner,
        delay: std::time::Duration::from_millis(100),
    });
    let store = PreferenceStore::new(repo.clone());
    let session = SessionContext::new(user_id);

    let ((), toggled) = tokio::join!(store.start_session(session), async {
        tokio::task::yield_now().await;
        store.toggle_favorite(&pictogram(7, "agua")).await
    });

    assert!(toggled);
    assert!(store.is_favorite(7));
    assert!(store.is_favorite(5));
    assert_eq!(ids(&store.favorite_pictograms()), vec![7, 5]);
    assert_eq!(repo.inner.rows(PreferenceKind::Favorite).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recent_added_during_initial_load_survives_it() {
    let repo = Arc::new(SlowPreferences {
        inner: InMemoryPreferences::default(),
        delay: std::time::Duration::from_millis(100),
    });
    let store = PreferenceStore::new(repo.clone());
    let session = SessionContext::new(Uuid::new_v4());
    store.bind_session(session);

    let comer = pictogram(11, "comer");
    tokio::join!(
        store.load_session(session),
        store.add_recent(&comer)
    );

    assert_eq!(ids(&store.recent_pictograms()), vec![11]);
    assert_eq!(repo.inner.rows(PreferenceKind::Recent).len(), 1);
}

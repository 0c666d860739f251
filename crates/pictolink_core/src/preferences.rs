//! crates/pictolink_core/src/preferences.rs
//!
//! The per-user store of recent and favorite pictograms.
//!
//! The in-memory lists are the single source of truth for the running session.
//! Every mutation is applied to them synchronously, published to subscribers,
//! and only then persisted; persistence failures are logged and never undo the
//! in-memory change. Mutations issued while a session is loading wait for the
//! load to land first.

use crate::domain::{Pictogram, PreferenceKind, PreferenceRecord, SessionContext};
use crate::ports::{PortResult, PreferenceRepository};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

/// Maximum number of recent pictograms kept per user, in memory and in storage.
pub const RECENT_CAPACITY: usize = 20;

/// The lists as exposed to readers.
#[derive(Debug, Clone, Default)]
pub struct PreferenceSnapshot {
    /// Most recently used first.
    pub recent: Vec<Pictogram>,
    /// Most recently favorited first.
    pub favorites: Vec<Pictogram>,
}

impl PreferenceSnapshot {
    pub fn is_favorite(&self, pictogram_id: u32) -> bool {
        self.favorites.iter().any(|p| p.id == pictogram_id)
    }
}

pub struct PreferenceStore {
    repo: Arc<dyn PreferenceRepository>,
    session: Mutex<Option<SessionContext>>,
    state: watch::Sender<PreferenceSnapshot>,
    /// False while a bound session's lists are being fetched.
    loaded: watch::Sender<bool>,
}

impl PreferenceStore {
    pub fn new(repo: Arc<dyn PreferenceRepository>) -> Self {
        let (state, _) = watch::channel(PreferenceSnapshot::default());
        let (loaded, _) = watch::channel(true);
        Self {
            repo,
            session: Mutex::new(None),
            state,
            loaded,
        }
    }

    async fn loaded_user(&self) -> Option<Uuid> {
        let mut loaded = self.loaded.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = loaded.wait_for(|done| *done).await;
        self.current_user()
    }

    fn current_user(&self) -> Option<Uuid> {
        self.session
            .lock()
            .ok()
            .and_then(|session| session.map(|s| s.user_id))
    }

    /// Binds the store to a user and loads their persisted lists.
    pub async fn start_session(&self, session: SessionContext) {
        self.bind_session(session);
        self.load_session(session).await;
    }

    /// Binds the store to a user with empty lists. Mutations wait until the
    /// following `load_session` has completed.
    pub fn bind_session(&self, session: SessionContext) {
        if let Ok(mut current) = self.session.lock() {
            *current = Some(session);
        }
        self.loaded.send_replace(false);
        self.state.send_replace(PreferenceSnapshot::default());
    }

    /// Fetches the persisted lists of a session bound with `bind_session`.
    pub async fn load_session(&self, session: SessionContext) {
        match self.fetch(session).await {
            Ok(snapshot) => {
                info!(
                    "Loaded {} recent and {} favorite pictograms for user {}.",
                    snapshot.recent.len(),
                    snapshot.favorites.len(),
                    session.user_id
                );
                // The session may have ended while we were loading.
                if self.current_user() == Some(session.user_id) {
                    self.state.send_replace(snapshot);
                }
            }
            Err(e) => {
                error!(
                    "Error fetching pictogram preferences for user {}: {}",
                    session.user_id, e
                );
            }
        }
        if self.current_user() == Some(session.user_id) {
            self.loaded.send_replace(true);
        }
    }

    /// Forgets the user and empties both lists.
    pub fn end_session(&self) {
        if let Ok(mut current) = self.session.lock() {
            *current = None;
        }
        self.state.send_replace(PreferenceSnapshot::default());
        self.loaded.send_replace(true);
    }

    async fn fetch(&self, session: SessionContext) -> PortResult<PreferenceSnapshot> {
        let mut recents = self
            .repo
            .list_preferences(session.user_id, PreferenceKind::Recent)
            .await?;
        recents.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));

        let mut favorites = self
            .repo
            .list_preferences(session.user_id, PreferenceKind::Favorite)
            .await?;
        favorites.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(PreferenceSnapshot {
            recent: recents
                .into_iter()
                .take(RECENT_CAPACITY)
                .map(|r| r.snapshot)
                .collect(),
            favorites: favorites.into_iter().map(|r| r.snapshot).collect(),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<PreferenceSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> PreferenceSnapshot {
        self.state.borrow().clone()
    }

    pub fn recent_pictograms(&self) -> Vec<Pictogram> {
        self.state.borrow().recent.clone()
    }

    pub fn favorite_pictograms(&self) -> Vec<Pictogram> {
        self.state.borrow().favorites.clone()
    }

    pub fn is_favorite(&self, pictogram_id: u32) -> bool {
        self.state.borrow().is_favorite(pictogram_id)
    }

    /// Moves `pictogram` to the front of the recent list, then records the use.
    pub async fn add_recent(&self, pictogram: &Pictogram) {
        let Some(user_id) = self.loaded_user().await else {
            return;
        };

        self.state.send_modify(|state| {
            state.recent.retain(|p| p.id != pictogram.id);
            state.recent.insert(0, pictogram.clone());
            state.recent.truncate(RECENT_CAPACITY);
        });

        if let Err(e) = self.persist_recent(user_id, pictogram).await {
            error!("Error adding recent pictogram {}: {}", pictogram.id, e);
        }
    }

    async fn persist_recent(&self, user_id: Uuid, pictogram: &Pictogram) -> PortResult<()> {
        let now = Utc::now();
        let existing = self
            .repo
            .find_preference(user_id, pictogram.id, PreferenceKind::Recent)
            .await?;

        if let Some(record) = existing {
            return self.repo.touch_preference(record.id, pictogram, now).await;
        }

        self.repo
            .insert_preference(PreferenceRecord {
                id: Uuid::new_v4(),
                user_id,
                kind: PreferenceKind::Recent,
                pictogram_id: pictogram.id,
                snapshot: pictogram.clone(),
                last_used_at: Some(now),
                created_at: now,
            })
            .await?;

        let mut recents = self
            .repo
            .list_preferences(user_id, PreferenceKind::Recent)
            .await?;
        if recents.len() > RECENT_CAPACITY {
            recents.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
            let stale: Vec<Uuid> = recents[RECENT_CAPACITY..].iter().map(|r| r.id).collect();
            self.repo.delete_preferences(&stale).await?;
        }
        Ok(())
    }

    /// Flips the favorite state of `pictogram` and returns the new state.
    pub async fn toggle_favorite(&self, pictogram: &Pictogram) -> bool {
        let Some(user_id) = self.loaded_user().await else {
            return self.is_favorite(pictogram.id);
        };

        let mut was_favorite = false;
        self.state.send_modify(|state| {
            was_favorite = state.is_favorite(pictogram.id);
            if was_favorite {
                state.favorites.retain(|p| p.id != pictogram.id);
            } else {
                state.favorites.insert(0, pictogram.clone());
            }
        });

        let persisted = if was_favorite {
            self.repo
                .delete_preference(user_id, pictogram.id, PreferenceKind::Favorite)
                .await
        } else {
            let now = Utc::now();
            self.repo
                .insert_preference(PreferenceRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    kind: PreferenceKind::Favorite,
                    pictogram_id: pictogram.id,
                    snapshot: pictogram.clone(),
                    last_used_at: None,
                    created_at: now,
                })
                .await
        };
        if let Err(e) = persisted {
            error!("Error toggling favorite pictogram {}: {}", pictogram.id, e);
        }

        !was_favorite
    }
}

//! services/api/src/web/state.rs
//!
//! Defines the application's shared and conversation-specific states.

use crate::config::Config;
use pictolink_core::ports::{
    AuthSessionService, MessageTransport, PreferenceRepository, SpeechToTextService,
    TextToSpeechService,
};
use pictolink_core::{
    Composer, ComposerServices, Dictation, PictogramCatalog, PreferenceStore, SessionContext,
    SuggestionClient, SuggestionPipeline,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthSessionService>,
    pub transport: Arc<dyn MessageTransport>,
    pub catalog: Arc<PictogramCatalog>,
    pub suggestions: Arc<SuggestionClient>,
    pub composer_services: ComposerServices,
    pub preferences: Arc<PreferenceRegistry>,
    /// Absent when no OpenAI key is configured; audio dictation is then refused.
    pub sst_adapter: Option<Arc<dyn SpeechToTextService>>,
    /// Absent when no OpenAI key is configured; auto-read then stays silent.
    pub tts_adapter: Option<Arc<dyn TextToSpeechService>>,
}

//=========================================================================================
// PreferenceRegistry
//=========================================================================================

/// One preference store per logged-in user, shared by all of that user's
/// connections and REST calls.
pub struct PreferenceRegistry {
    repo: Arc<dyn PreferenceRepository>,
    stores: Mutex<HashMap<Uuid, Arc<PreferenceStore>>>,
}

impl PreferenceRegistry {
    pub fn new(repo: Arc<dyn PreferenceRepository>) -> Self {
        Self {
            repo,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// The user's store, started (and loaded) on first use.
    pub async fn store_for(&self, session: SessionContext) -> Arc<PreferenceStore> {
        let store = {
            let mut stores = self.stores.lock().await;
            if let Some(store) = stores.get(&session.user_id) {
                return store.clone();
            }
            let store = Arc::new(PreferenceStore::new(self.repo.clone()));
            store.bind_session(session);
            stores.insert(session.user_id, store.clone());
            store
        };
        store.load_session(session).await;
        store
    }

    /// Empties and forgets the user's store; the next use fetches it again.
    pub async fn end_session(&self, user_id: Uuid) {
        if let Some(store) = self.stores.lock().await.remove(&user_id) {
            store.end_session();
            info!("Preference session ended for user {}.", user_id);
        }
    }
}

//=========================================================================================
// ConversationSession (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active conversation WebSocket.
pub struct ConversationSession {
    pub session: SessionContext,
    pub composer: Composer,
    pub dictation: Dictation,
    /// PCM frames received while dictating.
    pub audio_buffer: Vec<u8>,
    pub suggestions: SuggestionPipeline,
    pub preferences: Arc<PreferenceStore>,
    /// Read by the inbox task as messages arrive.
    pub auto_read: Arc<AtomicBool>,
    /// Cancels the inbox task of the currently open contact.
    pub inbox_token: CancellationToken,
}

impl ConversationSession {
    pub async fn new(
        app_state: &AppState,
        session: SessionContext,
    ) -> (Self, mpsc::UnboundedReceiver<pictolink_core::suggest::SuggestionUpdate>) {
        let composer = Composer::new(
            session,
            app_state.composer_services.clone(),
            app_state.config.composer_config(),
        );
        let (suggestions, updates) = SuggestionPipeline::new(
            app_state.suggestions.clone(),
            app_state.config.suggest_debounce,
        );
        let preferences = app_state.preferences.store_for(session).await;

        (
            Self {
                session,
                composer,
                dictation: Dictation::new(),
                audio_buffer: Vec::new(),
                suggestions,
                preferences,
                auto_read: Arc::new(AtomicBool::new(false)),
                inbox_token: CancellationToken::new(),
            },
            updates,
        )
    }
}

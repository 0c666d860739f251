//! crates/pictolink_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the catalog host, the NLP endpoints, the message store and the
//! speech engines.

use crate::domain::{ChatMessage, Pictogram, PreferenceKind, PreferenceRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Timed out: {0}")]
    Timeout(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Inbound chat messages, as delivered by a transport.
pub type MessageStream = Pin<Box<dyn Stream<Item = PortResult<ChatMessage>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Returns the raw line-delimited JSON catalog.
    async fn fetch_catalog(&self) -> PortResult<String>;
}

#[async_trait]
pub trait TextToPictogramService: Send + Sync {
    /// Converts a sentence into the pictograms that represent it.
    async fn text_to_pictograms(&self, text: &str) -> PortResult<Vec<Pictogram>>;
}

#[async_trait]
pub trait GlossService: Send + Sync {
    /// Produces a natural-language sentence for a pictogram sequence.
    async fn pictograms_to_text(&self, pictograms: &[Pictogram]) -> PortResult<String>;
}

#[async_trait]
pub trait AutocompleteService: Send + Sync {
    async fn suggest(&self, query: &str) -> PortResult<Vec<String>>;
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Persists and delivers a message, returning it with its id and timestamp.
    async fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage>;

    /// Both directions of a conversation, oldest first.
    async fn get_conversation(&self, user_id: Uuid, contact_id: Uuid)
        -> PortResult<Vec<ChatMessage>>;

    /// Messages from `contact_id` to `user_id` as they arrive after `since`.
    /// Without `since`, delivery starts at the transport's own current time.
    async fn subscribe_inbound(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> PortResult<MessageStream>;

    async fn mark_read(&self, message_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn list_preferences(
        &self,
        user_id: Uuid,
        kind: PreferenceKind,
    ) -> PortResult<Vec<PreferenceRecord>>;

    async fn find_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<Option<PreferenceRecord>>;

    async fn insert_preference(&self, record: PreferenceRecord) -> PortResult<()>;

    /// Refreshes `last_used_at` and the snapshot of an existing record.
    async fn touch_preference(
        &self,
        record_id: Uuid,
        snapshot: &Pictogram,
        last_used_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn delete_preferences(&self, record_ids: &[Uuid]) -> PortResult<()>;

    async fn delete_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<()>;
}

#[async_trait]
pub trait AuthSessionService: Send + Sync {
    /// Resolves an auth-session cookie value to the owning user.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes a slice of audio data into text.
    async fn transcribe_audio(&self, audio_data: &[u8]) -> PortResult<String>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

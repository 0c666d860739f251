//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for one conversation.

use chrono::{DateTime, Utc};
use pictolink_core::codec::{decode, RenderedPictogram, WireMessage};
use pictolink_core::composition::Draft;
use pictolink_core::dictation::{Dictation, DictationPhase, TranscriptSegment};
use pictolink_core::{ChatMessage, DraftMode, Pictogram, PreferenceSnapshot};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Dictation audio is sent as raw Binary frames, not as part of this enum.
//=========================================================================================

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a conversation with `contact_id`. The first message on the
    /// connection must be an `Init`; later ones switch conversations.
    Init { contact_id: Uuid },

    TypeText { text: String },
    ClearText,
    AcceptSuggestion { suggestion: String },

    PickPictogram { pictogram: Pictogram },
    RemovePictogram { index: usize },
    RemoveLastPictogram,
    ClearPictograms,
    ToggleFavorite { pictogram: Pictogram },

    /// Sends the current draft.
    Send,
    /// Sends one pictogram on its own, bypassing the draft.
    SendPictogram { pictogram: Pictogram },

    /// The microphone opened. Audio frames, if any, follow as binary messages.
    DictationStarted,
    /// Results from a client-side recognizer.
    Transcript { segments: Vec<TranscriptSegment> },
    /// The user asked to stop; late transcripts may still follow.
    DictationStopped,
    /// The recognizer has ended.
    DictationEnded,
    /// The recognizer failed with a code such as `not-allowed` or `no-speech`.
    DictationFailed { error: String },

    SetAutoRead { enabled: bool },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// NOTE: Auto-read audio is sent as raw Binary frames.
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConversationOpened {
        contact_id: Uuid,
        history: Vec<MessageView>,
    },
    DraftUpdated {
        mode: DraftMode,
        text: String,
        pictograms: Vec<Pictogram>,
    },
    Suggestions {
        query: String,
        suggestions: Vec<String>,
    },
    MessageSent {
        message: MessageView,
    },
    MessageReceived {
        message: MessageView,
    },
    PreferencesUpdated {
        recent: Vec<Pictogram>,
        favorites: Vec<Pictogram>,
    },
    DictationStatus {
        phase: DictationPhase,
        transcript: String,
        error: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn draft(draft: &Draft) -> Self {
        ServerMessage::DraftUpdated {
            mode: draft.mode(),
            text: draft.text().to_string(),
            pictograms: draft.pictograms().to_vec(),
        }
    }

    pub fn dictation(dictation: &Dictation) -> Self {
        ServerMessage::DictationStatus {
            phase: dictation.phase(),
            transcript: dictation.transcript().to_string(),
            error: dictation.last_error().map(ToString::to_string),
        }
    }

    pub fn preferences(snapshot: PreferenceSnapshot) -> Self {
        ServerMessage::PreferencesUpdated {
            recent: snapshot.recent,
            favorites: snapshot.favorites,
        }
    }
}

/// A stored chat message together with its decoded form.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct MessageView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    /// The raw wire-encoded content.
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub decoded: WireMessage,
    #[schema(value_type = Vec<Object>)]
    pub pictograms: Vec<RenderedPictogram>,
    /// What auto-read would say for this message.
    pub speakable_text: String,
}

impl From<ChatMessage> for MessageView {
    fn from(message: ChatMessage) -> Self {
        let decoded = decode(&message.content);
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            pictograms: decoded.pictograms(),
            speakable_text: decoded.speakable_text(),
            decoded,
            content: message.content,
            read: message.read,
            created_at: message.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_client_messages_use_snake_case_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"remove_pictogram","index":2}"#).unwrap();
        assert_matches!(msg, ClientMessage::RemovePictogram { index: 2 });

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"pick_pictogram","pictogram":{"id":2349,"labels":{"es":"comer"}}}"#,
        )
        .unwrap();
        assert_matches!(msg, ClientMessage::PickPictogram { pictogram } if pictogram.id == 2349);

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"transcript","segments":[{"text":"hola","is_final":true}]}"#,
        )
        .unwrap();
        assert_matches!(msg, ClientMessage::Transcript { segments } if segments.len() == 1);
    }

    #[test]
    fn test_message_view_decodes_content() {
        let view = MessageView::from(ChatMessage {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: "[pictograms:2349,2494:comer manzana|quiero comer una manzana]".to_string(),
            read: false,
            created_at: Utc::now(),
        });

        assert_eq!(view.pictograms.len(), 2);
        assert_eq!(view.speakable_text, "quiero comer una manzana");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["decoded"]["kind"], "pictogram_sequence");
    }
}

//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a conversation WebSocket.
//! It owns the draft for the open conversation and runs three helper tasks:
//! inbound delivery, suggestion forwarding and preference forwarding. Each
//! send is delivered by its own task so the loop keeps reading input.

use crate::web::{
    protocol::{ClientMessage, MessageView, ServerMessage},
    state::{AppState, ConversationSession},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::{DateTime, Utc};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use pictolink_core::dictation::assemble_transcript;
use pictolink_core::ports::MessageStream;
use pictolink_core::suggest::{accept_suggestion, SuggestionUpdate};
use pictolink_core::{
    ChatMessage, DraftMode, PendingSend, PreferenceSnapshot, SessionContext, SpeechError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;
type SharedConversation = Arc<Mutex<ConversationSession>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, session))
}

/// Serializes and sends one server message. Returns `false` once the client is gone.
async fn send_server_message(ws_sender: &WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws_sender
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .is_ok(),
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

async fn send_all(ws_sender: &WsSender, replies: Vec<ServerMessage>) {
    for reply in &replies {
        if !send_server_message(ws_sender, reply).await {
            warn!("Client went away while replying.");
            return;
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, session: SessionContext) {
    info!("New WebSocket connection established for user: {}", session.user_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let contact_id = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(&init_json) {
                Ok(ClientMessage::Init { contact_id }) => contact_id,
                _ => {
                    error!("First message was not a valid Init message.");
                    let err_msg = ServerMessage::Error {
                        message: "The first message must open a conversation.".to_string(),
                    };
                    send_server_message(&ws_sender, &err_msg).await;
                    return;
                }
            }
        }
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    let (conversation, suggestion_updates) = ConversationSession::new(&app_state, session).await;
    let preference_updates = conversation.preferences.subscribe();
    let conversation: SharedConversation = Arc::new(Mutex::new(conversation));

    // Every helper task hangs off this token and stops with the connection.
    let connection_token = CancellationToken::new();
    tokio::spawn(forward_suggestions(
        suggestion_updates,
        ws_sender.clone(),
        connection_token.clone(),
    ));
    tokio::spawn(forward_preferences(
        preference_updates,
        ws_sender.clone(),
        connection_token.clone(),
    ));

    open_conversation(
        &app_state,
        &conversation,
        &ws_sender,
        &connection_token,
        contact_id,
    )
    .await;

    // --- 2. Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(
                    text.as_str(),
                    &app_state,
                    &conversation,
                    &ws_sender,
                    &connection_token,
                )
                .await;
            }
            Some(Ok(Message::Binary(data))) => {
                let mut conversation = conversation.lock().await;
                if conversation.dictation.is_listening() {
                    conversation.audio_buffer.extend_from_slice(&data);
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive failed: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    {
        let mut conversation = conversation.lock().await;
        conversation.suggestions.cancel();
        conversation.composer.close_conversation();
    }
    connection_token.cancel();
    info!("WebSocket connection closed for user: {}", session.user_id);
}

/// Switches the connection to `contact_id`: fresh draft, history, and a new
/// inbound subscription replacing the previous one.
async fn open_conversation(
    app_state: &Arc<AppState>,
    conversation_lock: &SharedConversation,
    ws_sender: &WsSender,
    connection_token: &CancellationToken,
    contact_id: Uuid,
) {
    let (session, auto_read, inbox_token, draft) = {
        let mut conversation = conversation_lock.lock().await;
        conversation.inbox_token.cancel();
        conversation.suggestions.cancel();
        conversation.dictation.finish();
        conversation.audio_buffer.clear();
        conversation.composer.open_conversation(contact_id);
        conversation.inbox_token = connection_token.child_token();
        (
            conversation.session,
            conversation.auto_read.clone(),
            conversation.inbox_token.clone(),
            ServerMessage::draft(conversation.composer.draft()),
        )
    };
    info!("User {} opened conversation with {}.", session.user_id, contact_id);

    let history = match app_state
        .transport
        .get_conversation(session.user_id, contact_id)
        .await
    {
        Ok(history) => history,
        Err(e) => {
            error!("Failed to load conversation with {}: {:?}", contact_id, e);
            Vec::new()
        }
    };
    let since = inbox_start(&history);
    mark_history_read(app_state, &history, session.user_id).await;

    send_all(
        ws_sender,
        vec![
            ServerMessage::ConversationOpened {
                contact_id,
                history: history.into_iter().map(MessageView::from).collect(),
            },
            draft,
        ],
    )
    .await;

    match app_state
        .transport
        .subscribe_inbound(session.user_id, contact_id, since)
        .await
    {
        Ok(stream) => {
            tokio::spawn(inbox_process(
                app_state.clone(),
                stream,
                ws_sender.clone(),
                auto_read,
                inbox_token,
            ));
        }
        Err(e) => error!("Failed to subscribe to messages from {}: {:?}", contact_id, e),
    }
}

/// Where inbound delivery resumes: after the newest loaded message, or at the
/// transport's own clock when there is no history.
fn inbox_start(history: &[ChatMessage]) -> Option<DateTime<Utc>> {
    history.iter().map(|m| m.created_at).max()
}

async fn mark_history_read(app_state: &AppState, history: &[ChatMessage], user_id: Uuid) {
    for message in history.iter().filter(|m| m.receiver_id == user_id && !m.read) {
        if let Err(e) = app_state.transport.mark_read(message.id).await {
            warn!("Failed to mark message {} as read: {}", message.id, e);
        }
    }
}

//=========================================================================================
// Helper Tasks
//=========================================================================================

/// Pushes messages from the contact to the client as they arrive, reading
/// them aloud when auto-read is on.
async fn inbox_process(
    app_state: Arc<AppState>,
    mut inbound: MessageStream,
    ws_sender: WsSender,
    auto_read: Arc<AtomicBool>,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = inbound.next() => next,
        };
        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!("Inbound message poll failed: {}", e);
                continue;
            }
            None => break,
        };

        if let Err(e) = app_state.transport.mark_read(message.id).await {
            warn!("Failed to mark message {} as read: {}", message.id, e);
        }
        let view = MessageView::from(message);
        let speakable = view.speakable_text.clone();
        if !send_server_message(&ws_sender, &ServerMessage::MessageReceived { message: view }).await {
            break;
        }

        if !auto_read.load(Ordering::Relaxed) {
            continue;
        }
        let Some(tts) = &app_state.tts_adapter else {
            continue;
        };
        match tts.generate_audio(&speakable).await {
            Ok(audio) if !audio.is_empty() => {
                if ws_sender
                    .lock()
                    .await
                    .send(Message::Binary(audio.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => error!("Failed to synthesize auto-read audio: {:?}", e),
        }
    }
}

async fn forward_suggestions(
    mut updates: mpsc::UnboundedReceiver<SuggestionUpdate>,
    ws_sender: WsSender,
    token: CancellationToken,
) {
    loop {
        let update = tokio::select! {
            _ = token.cancelled() => break,
            update = updates.recv() => match update {
                Some(update) => update,
                None => break,
            },
        };
        let msg = ServerMessage::Suggestions {
            query: update.query,
            suggestions: update.suggestions,
        };
        if !send_server_message(&ws_sender, &msg).await {
            break;
        }
    }
}

async fn forward_preferences(
    mut updates: watch::Receiver<PreferenceSnapshot>,
    ws_sender: WsSender,
    token: CancellationToken,
) {
    loop {
        let snapshot = updates.borrow_and_update().clone();
        if !send_server_message(&ws_sender, &ServerMessage::preferences(snapshot)).await {
            break;
        }
        tokio::select! {
            _ = token.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

//=========================================================================================
// Client Message Dispatch
//=========================================================================================

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    conversation_lock: &SharedConversation,
    ws_sender: &WsSender,
    connection_token: &CancellationToken,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => client_msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    let replies = match client_msg {
        ClientMessage::Init { contact_id } => {
            open_conversation(
                app_state,
                conversation_lock,
                ws_sender,
                connection_token,
                contact_id,
            )
            .await;
            Vec::new()
        }

        // --- Text composition ---
        ClientMessage::TypeText { text } => {
            let mut conversation = conversation_lock.lock().await;
            if conversation.composer.set_text(&text) {
                conversation.suggestions.on_input(&text);
            }
            vec![ServerMessage::draft(conversation.composer.draft())]
        }
        ClientMessage::ClearText => {
            let mut conversation = conversation_lock.lock().await;
            conversation.composer.clear_text();
            conversation.suggestions.on_input("");
            vec![ServerMessage::draft(conversation.composer.draft())]
        }
        ClientMessage::AcceptSuggestion { suggestion } => {
            let mut conversation = conversation_lock.lock().await;
            if conversation.composer.mode() != DraftMode::ComposingPictograms {
                let text = accept_suggestion(conversation.composer.draft().text(), &suggestion);
                conversation.composer.set_text(&text);
                conversation.suggestions.on_input(&text);
            }
            vec![ServerMessage::draft(conversation.composer.draft())]
        }

        // --- Pictogram composition ---
        ClientMessage::PickPictogram { pictogram } => {
            let (store, draft) = {
                let mut conversation = conversation_lock.lock().await;
                conversation.composer.add_pictogram(pictogram.clone());
                conversation.suggestions.on_input("");
                (
                    conversation.preferences.clone(),
                    ServerMessage::draft(conversation.composer.draft()),
                )
            };
            send_all(ws_sender, vec![draft]).await;
            store.add_recent(&pictogram).await;
            Vec::new()
        }
        ClientMessage::RemovePictogram { index } => {
            let mut conversation = conversation_lock.lock().await;
            conversation.composer.remove_pictogram(index);
            vec![ServerMessage::draft(conversation.composer.draft())]
        }
        ClientMessage::RemoveLastPictogram => {
            let mut conversation = conversation_lock.lock().await;
            conversation.composer.remove_last_pictogram();
            vec![ServerMessage::draft(conversation.composer.draft())]
        }
        ClientMessage::ClearPictograms => {
            let mut conversation = conversation_lock.lock().await;
            conversation.composer.clear_pictograms();
            vec![ServerMessage::draft(conversation.composer.draft())]
        }
        ClientMessage::ToggleFavorite { pictogram } => {
            let store = conversation_lock.lock().await.preferences.clone();
            store.toggle_favorite(&pictogram).await;
            Vec::new()
        }

        // --- Sending ---
        ClientMessage::Send => {
            let pending = {
                let mut conversation = conversation_lock.lock().await;
                conversation.suggestions.cancel();
                conversation.composer.begin_send()
            };
            if let Some(pending) = pending {
                tokio::spawn(deliver_draft(
                    pending,
                    conversation_lock.clone(),
                    ws_sender.clone(),
                ));
            }
            Vec::new()
        }
        ClientMessage::SendPictogram { pictogram } => {
            let (result, store, draft) = {
                let mut conversation = conversation_lock.lock().await;
                let result = conversation.composer.send_single(&pictogram).await;
                (
                    result,
                    conversation.preferences.clone(),
                    ServerMessage::draft(conversation.composer.draft()),
                )
            };
            store.add_recent(&pictogram).await;
            let mut replies = send_outcome(result);
            replies.push(draft);
            replies
        }

        // --- Dictation ---
        ClientMessage::DictationStarted => {
            let mut conversation = conversation_lock.lock().await;
            if conversation.dictation.start() {
                conversation.audio_buffer.clear();
            }
            vec![ServerMessage::dictation(&conversation.dictation)]
        }
        ClientMessage::Transcript { segments } => {
            let mut conversation = conversation_lock.lock().await;
            let transcript = assemble_transcript(&segments);
            let mut replies: Vec<ServerMessage> =
                apply_transcript(&mut conversation, &transcript).into_iter().collect();
            replies.push(ServerMessage::dictation(&conversation.dictation));
            replies
        }
        ClientMessage::DictationStopped => {
            stop_dictation(app_state, conversation_lock).await
        }
        ClientMessage::DictationEnded => {
            let mut conversation = conversation_lock.lock().await;
            conversation.dictation.finish();
            vec![ServerMessage::dictation(&conversation.dictation)]
        }
        ClientMessage::DictationFailed { error } => {
            let mut conversation = conversation_lock.lock().await;
            let error = SpeechError::from_code(&error);
            warn!("Dictation failed: {}", error);
            conversation.dictation.fail(error);
            conversation.audio_buffer.clear();
            vec![ServerMessage::dictation(&conversation.dictation)]
        }

        ClientMessage::SetAutoRead { enabled } => {
            let conversation = conversation_lock.lock().await;
            conversation.auto_read.store(enabled, Ordering::Relaxed);
            Vec::new()
        }
    };

    send_all(ws_sender, replies).await;
}

/// Delivers a captured draft off the receive loop, then reports the outcome
/// and the resulting draft.
async fn deliver_draft(pending: PendingSend, conversation_lock: SharedConversation, ws_sender: WsSender) {
    let result = pending.deliver().await;
    let draft = {
        let mut conversation = conversation_lock.lock().await;
        conversation.composer.finish_send(&pending, result.is_ok());
        ServerMessage::draft(conversation.composer.draft())
    };
    let mut replies = send_outcome(result.map(Some));
    replies.push(draft);
    send_all(&ws_sender, replies).await;
}

fn send_outcome(
    result: Result<Option<ChatMessage>, pictolink_core::ComposeError>,
) -> Vec<ServerMessage> {
    match result {
        Ok(Some(message)) => vec![ServerMessage::MessageSent {
            message: MessageView::from(message),
        }],
        Ok(None) => Vec::new(),
        Err(e) => {
            error!("Send failed: {}", e);
            vec![ServerMessage::Error {
                message: e.to_string(),
            }]
        }
    }
}

/// Records a transcript update and, while a session is active, writes it to
/// the draft under the typing rules. Returns the new draft when it was applied.
fn apply_transcript(conversation: &mut ConversationSession, transcript: &str) -> Option<ServerMessage> {
    let text = conversation.dictation.on_transcript(transcript)?;
    if conversation.composer.apply_transcript(&text) {
        conversation.suggestions.on_input(&text);
    }
    Some(ServerMessage::draft(conversation.composer.draft()))
}

/// Handles a stop request. Buffered audio is transcribed here and ends the
/// session; without audio, the client recognizer's late transcripts are still
/// accepted until `DictationEnded`.
async fn stop_dictation(
    app_state: &Arc<AppState>,
    conversation_lock: &SharedConversation,
) -> Vec<ServerMessage> {
    let audio = {
        let mut conversation = conversation_lock.lock().await;
        if let Some(text) = conversation.dictation.stop() {
            if conversation.composer.apply_transcript(&text) {
                conversation.suggestions.on_input(&text);
            }
        }
        std::mem::take(&mut conversation.audio_buffer)
    };

    if audio.is_empty() {
        let conversation = conversation_lock.lock().await;
        return vec![
            ServerMessage::draft(conversation.composer.draft()),
            ServerMessage::dictation(&conversation.dictation),
        ];
    }

    let transcribed = match &app_state.sst_adapter {
        Some(sst) => sst
            .transcribe_audio(&audio)
            .await
            .map_err(|e| SpeechError::Other(e.to_string())),
        None => Err(SpeechError::Unsupported),
    };

    let mut conversation = conversation_lock.lock().await;
    match transcribed {
        Ok(text) if text.trim().is_empty() => {
            conversation.dictation.fail(SpeechError::NoSpeech);
            vec![ServerMessage::dictation(&conversation.dictation)]
        }
        Ok(text) => {
            let mut replies: Vec<ServerMessage> =
                apply_transcript(&mut conversation, &text).into_iter().collect();
            conversation.dictation.finish();
            replies.push(ServerMessage::dictation(&conversation.dictation));
            replies
        }
        Err(e) => {
            error!("Dictation transcription failed: {}", e);
            conversation.dictation.fail(e);
            vec![ServerMessage::dictation(&conversation.dictation)]
        }
    }
}

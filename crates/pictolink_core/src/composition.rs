//! crates/pictolink_core/src/composition.rs
//!
//! The draft of the next outgoing message and the rules for turning it into
//! wire text.
//!
//! A draft holds either typed text or a pictogram sequence, never both:
//! picking a pictogram clears the text, and typing is ignored while a sequence
//! exists. On send, a sequence is glossed (best effort) and encoded; typed text
//! is translated to pictograms under a time bound and falls back to plain text.
//!
//! Delivery runs detached from the composer (`begin_send`, `PendingSend::deliver`,
//! `finish_send`), so the draft stays editable while the network calls are in
//! flight. Only one send is in flight per conversation.

use crate::codec;
use crate::domain::{ChatMessage, Language, Pictogram, SessionContext};
use crate::ports::{GlossService, MessageTransport, PortError, TextToPictogramService};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_TRANSLATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced to the user at the send action.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("The message could not be delivered: {0}")]
    Transport(#[from] PortError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftMode {
    Empty,
    ComposingText,
    ComposingPictograms,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Draft {
    text: String,
    pictograms: Vec<Pictogram>,
}

impl Draft {
    pub fn mode(&self) -> DraftMode {
        if !self.pictograms.is_empty() {
            DraftMode::ComposingPictograms
        } else if !self.text.trim().is_empty() {
            DraftMode::ComposingText
        } else {
            DraftMode::Empty
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pictograms(&self) -> &[Pictogram] {
        &self.pictograms
    }
}

#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Upper bound on the text-to-pictogram call made when sending typed text.
    pub translation_timeout: Duration,
    /// Language of the labels captured into outgoing messages.
    pub label_language: Language,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            translation_timeout: DEFAULT_TRANSLATION_TIMEOUT,
            label_language: Language::Es,
        }
    }
}

/// The collaborators a composer hands work to.
#[derive(Clone)]
pub struct ComposerServices {
    pub translator: Arc<dyn TextToPictogramService>,
    pub glosser: Arc<dyn GlossService>,
    pub transport: Arc<dyn MessageTransport>,
}

/// Owns the draft for one open conversation.
pub struct Composer {
    session: SessionContext,
    contact_id: Option<Uuid>,
    draft: Draft,
    services: ComposerServices,
    config: ComposerConfig,
    next_ticket: u64,
    in_flight: Option<u64>,
}

impl Composer {
    pub fn new(session: SessionContext, services: ComposerServices, config: ComposerConfig) -> Self {
        Self {
            session,
            contact_id: None,
            draft: Draft::default(),
            services,
            config,
            next_ticket: 0,
            in_flight: None,
        }
    }

    /// Switches to a conversation with a fresh, empty draft.
    pub fn open_conversation(&mut self, contact_id: Uuid) {
        self.contact_id = Some(contact_id);
        self.draft = Draft::default();
        self.in_flight = None;
    }

    pub fn close_conversation(&mut self) {
        self.contact_id = None;
        self.draft = Draft::default();
        self.in_flight = None;
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn contact_id(&self) -> Option<Uuid> {
        self.contact_id
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn mode(&self) -> DraftMode {
        self.draft.mode()
    }

    /// The typing path. Ignored while a pictogram sequence exists; returns
    /// whether the buffer changed.
    pub fn set_text(&mut self, text: &str) -> bool {
        if self.mode() == DraftMode::ComposingPictograms {
            return false;
        }
        self.draft.text = text.to_string();
        true
    }

    pub fn clear_text(&mut self) {
        self.draft.text.clear();
    }

    /// Applies a dictation transcript under the same rule as typing.
    pub fn apply_transcript(&mut self, transcript: &str) -> bool {
        self.set_text(transcript)
    }

    /// Appends a pictogram (repeats allowed) and clears the text buffer.
    pub fn add_pictogram(&mut self, pictogram: Pictogram) {
        self.draft.text.clear();
        self.draft.pictograms.push(pictogram);
    }

    pub fn remove_pictogram(&mut self, index: usize) -> Option<Pictogram> {
        (index < self.draft.pictograms.len()).then(|| self.draft.pictograms.remove(index))
    }

    pub fn remove_last_pictogram(&mut self) -> Option<Pictogram> {
        self.draft.pictograms.pop()
    }

    pub fn clear_pictograms(&mut self) {
        self.draft.pictograms.clear();
    }

    /// Encodes the draft and hands it to the transport.
    ///
    /// Returns `Ok(None)` without doing anything when the draft is empty, no
    /// conversation is open, or a send is already in flight. The draft is reset
    /// only after the transport accepted the message.
    pub async fn send(&mut self) -> Result<Option<ChatMessage>, ComposeError> {
        let Some(pending) = self.begin_send() else {
            return Ok(None);
        };
        let result = pending.deliver().await;
        self.finish_send(&pending, result.is_ok());
        result.map(Some)
    }

    /// Captures the current draft for delivery.
    pub fn begin_send(&mut self) -> Option<PendingSend> {
        let contact_id = self.contact_id?;
        if self.in_flight.is_some() || self.mode() == DraftMode::Empty {
            return None;
        }
        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        Some(PendingSend {
            ticket: self.next_ticket,
            sender_id: self.session.user_id,
            contact_id,
            draft: self.draft.clone(),
            services: self.services.clone(),
            config: self.config.clone(),
        })
    }

    /// Settles a send started with `begin_send`.
    ///
    /// A delivered draft is cleared unless it was edited in the meantime. The
    /// outcome of a send started before the last conversation switch is ignored.
    pub fn finish_send(&mut self, pending: &PendingSend, delivered: bool) {
        if self.in_flight != Some(pending.ticket) {
            return;
        }
        self.in_flight = None;
        if delivered && self.draft == pending.draft {
            self.draft = Draft::default();
        }
    }

    /// Sends one pictogram on its own, leaving the sequence untouched.
    pub async fn send_single(&mut self, pictogram: &Pictogram) -> Result<Option<ChatMessage>, ComposeError> {
        let Some(contact_id) = self.contact_id else {
            return Ok(None);
        };
        let content = codec::encode_single(
            pictogram.id,
            pictogram.display_label(self.config.label_language),
        );
        let message = self
            .services
            .transport
            .send_message(self.session.user_id, contact_id, &content)
            .await?;
        self.draft.text.clear();
        Ok(Some(message))
    }
}

/// A draft on its way to the transport, detached from its composer.
pub struct PendingSend {
    ticket: u64,
    sender_id: Uuid,
    contact_id: Uuid,
    draft: Draft,
    services: ComposerServices,
    config: ComposerConfig,
}

impl PendingSend {
    pub fn contact_id(&self) -> Uuid {
        self.contact_id
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Encodes the captured draft and hands it to the transport.
    pub async fn deliver(&self) -> Result<ChatMessage, ComposeError> {
        let content = match self.draft.mode() {
            DraftMode::ComposingPictograms => self.encode_pictograms().await,
            _ => self.encode_text().await,
        };

        let message = self
            .services
            .transport
            .send_message(self.sender_id, self.contact_id, &content)
            .await?;
        info!("Message {} sent to {}.", message.id, self.contact_id);
        Ok(message)
    }

    async fn encode_pictograms(&self) -> String {
        let pictograms = &self.draft.pictograms;
        let glossed = tokio::time::timeout(
            self.config.translation_timeout,
            self.services.glosser.pictograms_to_text(pictograms),
        )
        .await;

        let gloss = match glossed {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!("Gloss generation failed, sending without it: {}", e);
                None
            }
            Err(_) => {
                warn!("Gloss generation timed out, sending without it.");
                None
            }
        };
        self.encode_sequence(pictograms, gloss.as_deref())
    }

    async fn encode_text(&self) -> String {
        let text = self.draft.text.trim();
        let translated = tokio::time::timeout(
            self.config.translation_timeout,
            self.services.translator.text_to_pictograms(text),
        )
        .await;

        match translated {
            Ok(Ok(pictograms)) if !pictograms.is_empty() => {
                self.encode_sequence(&pictograms, Some(text))
            }
            Ok(Ok(_)) => text.to_string(),
            Ok(Err(e)) => {
                warn!("Text-to-pictogram conversion failed, sending plain text: {}", e);
                text.to_string()
            }
            Err(_) => {
                warn!(
                    "Text-to-pictogram conversion timed out after {:?}, sending plain text.",
                    self.config.translation_timeout
                );
                text.to_string()
            }
        }
    }

    fn encode_sequence(&self, pictograms: &[Pictogram], gloss: Option<&str>) -> String {
        let lang = self.config.label_language;
        let ids: Vec<u32> = pictograms.iter().map(|p| p.id).collect();
        let labels: Vec<&str> = pictograms.iter().map(|p| p.display_label(lang)).collect();
        codec::encode(&ids, &labels, gloss)
    }
}

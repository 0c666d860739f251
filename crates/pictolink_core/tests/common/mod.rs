//! In-memory stand-ins for the core's ports.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pictolink_core::domain::{ChatMessage, Pictogram, PictogramLabels, PreferenceKind, PreferenceRecord};
use pictolink_core::ports::{
    AutocompleteService, GlossService, MessageStream, MessageTransport, PortError, PortResult,
    PreferenceRepository, TextToPictogramService,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn pictogram(id: u32, es: &str) -> Pictogram {
    let mut p = Pictogram::placeholder(id);
    p.labels = PictogramLabels {
        es: es.to_string(),
        en: String::new(),
    };
    p
}

//=========================================================================================
// Transport
//=========================================================================================

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<ChatMessage>>,
    pub reject: AtomicBool,
}

impl RecordingTransport {
    pub fn contents(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.content.clone()).collect()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("insert rejected".to_string()));
        }
        let message = ChatMessage {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            read: false,
            created_at: Utc::now(),
        };
        self.sent.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn get_conversation(
        &self,
        _user_id: Uuid,
        _contact_id: Uuid,
    ) -> PortResult<Vec<ChatMessage>> {
        Ok(self.sent.lock().unwrap().clone())
    }

    async fn subscribe_inbound(
        &self,
        _user_id: Uuid,
        _contact_id: Uuid,
        _since: Option<DateTime<Utc>>,
    ) -> PortResult<MessageStream> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn mark_read(&self, _message_id: Uuid) -> PortResult<()> {
        Ok(())
    }
}

//=========================================================================================
// NLP endpoints
//=========================================================================================

pub enum Reply<T> {
    Value(T),
    Fail,
    Hang,
}

pub struct ScriptedTranslator {
    pub reply: Reply<Vec<Pictogram>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedTranslator {
    pub fn new(reply: Reply<Vec<Pictogram>>) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextToPictogramService for ScriptedTranslator {
    async fn text_to_pictograms(&self, text: &str) -> PortResult<Vec<Pictogram>> {
        self.calls.lock().unwrap().push(text.to_string());
        match &self.reply {
            Reply::Value(pictograms) => Ok(pictograms.clone()),
            Reply::Fail => Err(PortError::Unexpected("503".to_string())),
            Reply::Hang => futures::future::pending().await,
        }
    }
}

pub struct ScriptedGlosser {
    pub reply: Reply<String>,
}

#[async_trait]
impl GlossService for ScriptedGlosser {
    async fn pictograms_to_text(&self, _pictograms: &[Pictogram]) -> PortResult<String> {
        match &self.reply {
            Reply::Value(text) => Ok(text.clone()),
            Reply::Fail => Err(PortError::Unexpected("503".to_string())),
            Reply::Hang => futures::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct RecordingAutocomplete {
    queries: Mutex<Vec<String>>,
}

impl RecordingAutocomplete {
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutocompleteService for RecordingAutocomplete {
    async fn suggest(&self, query: &str) -> PortResult<Vec<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![format!("{}r", query), format!("{}s", query)])
    }
}

//=========================================================================================
// Preferences
//=========================================================================================

/// Rows are listed newest-first, the way the SQL adapter orders them.
#[derive(Default)]
pub struct InMemoryPreferences {
    rows: Mutex<Vec<PreferenceRecord>>,
    pub fail: AtomicBool,
}

impl InMemoryPreferences {
    pub fn rows(&self, kind: PreferenceKind) -> Vec<PreferenceRecord> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn seed(&self, record: PreferenceRecord) {
        self.rows.lock().unwrap().push(record);
    }

    fn check(&self) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PortError::Unexpected("storage offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryPreferences {
    async fn list_preferences(
        &self,
        user_id: Uuid,
        kind: PreferenceKind,
    ) -> PortResult<Vec<PreferenceRecord>> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id && r.kind == kind)
            .cloned()
            .collect())
    }

    async fn find_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<Option<PreferenceRecord>> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user_id == user_id && r.pictogram_id == pictogram_id && r.kind == kind)
            .cloned())
    }

    async fn insert_preference(&self, record: PreferenceRecord) -> PortResult<()> {
        self.check()?;
        self.rows.lock().unwrap().push(record);
        Ok(())
    }

    async fn touch_preference(
        &self,
        record_id: Uuid,
        snapshot: &Pictogram,
        last_used_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let index = rows
            .iter()
            .position(|r| r.id == record_id)
            .ok_or_else(|| PortError::NotFound(record_id.to_string()))?;
        let mut record = rows.remove(index);
        record.snapshot = snapshot.clone();
        record.last_used_at = Some(last_used_at);
        rows.push(record);
        Ok(())
    }

    async fn delete_preferences(&self, record_ids: &[Uuid]) -> PortResult<()> {
        self.check()?;
        self.rows
            .lock()
            .unwrap()
            .retain(|r| !record_ids.contains(&r.id));
        Ok(())
    }

    async fn delete_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<()> {
        self.check()?;
        self.rows
            .lock()
            .unwrap()
            .retain(|r| !(r.user_id == user_id && r.pictogram_id == pictogram_id && r.kind == kind));
        Ok(())
    }
}

/// Delays every listing by `delay`, so loads stay pending across other calls.
pub struct SlowPreferences {
    pub inner: InMemoryPreferences,
    pub delay: std::time::Duration,
}

#[async_trait]
impl PreferenceRepository for SlowPreferences {
    async fn list_preferences(
        &self,
        user_id: Uuid,
        kind: PreferenceKind,
    ) -> PortResult<Vec<PreferenceRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_preferences(user_id, kind).await
    }

    async fn find_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<Option<PreferenceRecord>> {
        self.inner.find_preference(user_id, pictogram_id, kind).await
    }

    async fn insert_preference(&self, record: PreferenceRecord) -> PortResult<()> {
        self.inner.insert_preference(record).await
    }

    async fn touch_preference(
        &self,
        record_id: Uuid,
        snapshot: &Pictogram,
        last_used_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner.touch_preference(record_id, snapshot, last_used_at).await
    }

    async fn delete_preferences(&self, record_ids: &[Uuid]) -> PortResult<()> {
        self.inner.delete_preferences(record_ids).await
    }

    async fn delete_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<()> {
        self.inner.delete_preference(user_id, pictogram_id, kind).await
    }
}

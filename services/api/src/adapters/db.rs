//! services/api/src/adapters/db.rs
//!
//! The PostgreSQL adapter. It implements the `PreferenceRepository`,
//! `MessageTransport` and `AuthSessionService` ports from the `core` crate
//! using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pictolink_core::domain::{ChatMessage, Pictogram, PreferenceKind, PreferenceRecord};
use pictolink_core::ports::{
    AuthSessionService, MessageStream, MessageTransport, PortError, PortResult,
    PreferenceRepository,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use uuid::Uuid;

const DEFAULT_INBOX_POLL: Duration = Duration::from_secs(2);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    inbox_poll: Duration,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            inbox_poll: DEFAULT_INBOX_POLL,
        }
    }

    /// How often inbound subscriptions look for new messages.
    pub fn with_inbox_poll(mut self, inbox_poll: Duration) -> Self {
        self.inbox_poll = inbox_poll;
        self
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PreferenceRow {
    id: Uuid,
    user_id: Uuid,
    pictogram_id: i32,
    #[sqlx(rename = "type")]
    kind: String,
    data: Json<Pictogram>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl PreferenceRow {
    fn to_domain(self) -> PortResult<PreferenceRecord> {
        let kind = self.kind.parse::<PreferenceKind>().map_err(PortError::Unexpected)?;
        let pictogram_id = u32::try_from(self.pictogram_id).map_err(|_| {
            PortError::Unexpected(format!("Invalid pictogram id {}", self.pictogram_id))
        })?;
        Ok(PreferenceRecord {
            id: self.id,
            user_id: self.user_id,
            kind,
            pictogram_id,
            snapshot: self.data.0,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            read: self.read,
            created_at: self.created_at,
        }
    }
}

const PREFERENCE_COLUMNS: &str =
    "id, user_id, pictogram_id, type, data, last_used_at, created_at";
const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, read, created_at";

fn pictogram_id_param(pictogram_id: u32) -> PortResult<i32> {
    i32::try_from(pictogram_id)
        .map_err(|_| PortError::Unexpected(format!("Pictogram id {} out of range", pictogram_id)))
}

//=========================================================================================
// `PreferenceRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl PreferenceRepository for DbAdapter {
    async fn list_preferences(
        &self,
        user_id: Uuid,
        kind: PreferenceKind,
    ) -> PortResult<Vec<PreferenceRecord>> {
        let order = match kind {
            PreferenceKind::Recent => "last_used_at DESC NULLS LAST",
            PreferenceKind::Favorite => "created_at DESC",
        };
        let sql = format!(
            "SELECT {} FROM user_pictograms WHERE user_id = $1 AND type = $2 ORDER BY {}",
            PREFERENCE_COLUMNS, order
        );
        let rows = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(user_id)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        rows.into_iter().map(PreferenceRow::to_domain).collect()
    }

    async fn find_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<Option<PreferenceRecord>> {
        let sql = format!(
            "SELECT {} FROM user_pictograms WHERE user_id = $1 AND pictogram_id = $2 AND type = $3",
            PREFERENCE_COLUMNS
        );
        let row = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(user_id)
            .bind(pictogram_id_param(pictogram_id)?)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        row.map(PreferenceRow::to_domain).transpose()
    }

    async fn insert_preference(&self, record: PreferenceRecord) -> PortResult<()> {
        // A concurrent session may have written the same key; refresh it instead.
        sqlx::query(
            "INSERT INTO user_pictograms (id, user_id, pictogram_id, type, data, last_used_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, pictogram_id, type) \
             DO UPDATE SET data = EXCLUDED.data, last_used_at = EXCLUDED.last_used_at",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(pictogram_id_param(record.pictogram_id)?)
        .bind(record.kind.as_str())
        .bind(Json(&record.snapshot))
        .bind(record.last_used_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn touch_preference(
        &self,
        record_id: Uuid,
        snapshot: &Pictogram,
        last_used_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_pictograms SET last_used_at = $1, data = $2 WHERE id = $3",
        )
        .bind(last_used_at)
        .bind(Json(snapshot))
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Preference {} not found", record_id)));
        }
        Ok(())
    }

    async fn delete_preferences(&self, record_ids: &[Uuid]) -> PortResult<()> {
        if record_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("DELETE FROM user_pictograms WHERE id = ANY($1)")
            .bind(record_ids)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_preference(
        &self,
        user_id: Uuid,
        pictogram_id: u32,
        kind: PreferenceKind,
    ) -> PortResult<()> {
        sqlx::query(
            "DELETE FROM user_pictograms WHERE user_id = $1 AND pictogram_id = $2 AND type = $3",
        )
        .bind(user_id)
        .bind(pictogram_id_param(pictogram_id)?)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `MessageTransport` Trait Implementation
//=========================================================================================

/// State carried between polls of one inbound subscription.
struct InboxCursor {
    pool: PgPool,
    user_id: Uuid,
    contact_id: Uuid,
    since: DateTime<Utc>,
    ticker: Interval,
    pending: VecDeque<ChatMessage>,
}

impl InboxCursor {
    async fn poll(&mut self) -> PortResult<()> {
        let sql = format!(
            "SELECT {} FROM messages \
             WHERE sender_id = $1 AND receiver_id = $2 AND created_at > $3 \
             ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(self.contact_id)
            .bind(self.user_id)
            .bind(self.since)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        for row in rows {
            let message = row.to_domain();
            self.since = self.since.max(message.created_at);
            self.pending.push_back(message);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageTransport for DbAdapter {
    async fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage> {
        let sql = format!(
            "INSERT INTO messages (id, sender_id, receiver_id, content) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(sender_id)
            .bind(receiver_id)
            .bind(content)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(row.to_domain())
    }

    async fn get_conversation(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> PortResult<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT {} FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(user_id)
            .bind(contact_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(rows.into_iter().map(MessageRow::to_domain).collect())
    }

    async fn subscribe_inbound(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> PortResult<MessageStream> {
        // Rows are stamped with the database clock.
        let since = match since {
            Some(since) => since,
            None => sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()")
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?,
        };
        let mut ticker = interval(self.inbox_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cursor = InboxCursor {
            pool: self.pool.clone(),
            user_id,
            contact_id,
            since,
            ticker,
            pending: VecDeque::new(),
        };

        let stream = futures::stream::unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(message) = cursor.pending.pop_front() {
                    return Some((Ok(message), cursor));
                }
                cursor.ticker.tick().await;
                if let Err(e) = cursor.poll().await {
                    return Some((Err(e), cursor));
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn mark_read(&self, message_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE messages SET read = TRUE WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `AuthSessionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthSessionService for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

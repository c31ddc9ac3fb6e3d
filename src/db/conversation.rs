//! Conversation and message repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{parse_datetime, DbPool};
use crate::{Error, Result};

/// A logical exchange thread tied to a session
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    /// External thread id; the upsert key together with the session
    pub external_thread_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message in a conversation
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub source: MessageSource,
    pub created_at: DateTime<Utc>,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// Where a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// Spoken, from the device transcript
    Transcript,
    /// Typed in a companion app
    Typed,
    /// Generated by the system
    System,
}

impl MessageSource {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::Typed => "typed",
            Self::System => "system",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "transcript" => Some(Self::Transcript),
            "typed" => Some(Self::Typed),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Conversation repository
#[derive(Clone)]
pub struct ConversationRepo {
    pool: DbPool,
}

impl ConversationRepo {
    /// Create a new conversation repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upsert a conversation keyed by `(session_id, external_thread_id)`
    ///
    /// Retried deliveries never create duplicate threads.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(
        &self,
        session_id: &str,
        external_thread_id: &str,
        user_id: Option<&str>,
    ) -> Result<Conversation> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now_str = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO conversations (id, session_id, user_id, external_thread_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(session_id, external_thread_id) DO UPDATE SET
                 user_id = COALESCE(excluded.user_id, conversations.user_id),
                 updated_at = excluded.updated_at",
            rusqlite::params![&id, session_id, user_id, external_thread_id, &now_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id, session_id, user_id, external_thread_id, created_at, updated_at
             FROM conversations WHERE session_id = ?1 AND external_thread_id = ?2",
            [session_id, external_thread_id],
            |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    user_id: row.get(2)?,
                    external_thread_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    updated_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Insert a message with a caller-chosen id; a duplicate id is a no-op
    ///
    /// Used by the background queue: deterministic ids make redelivered
    /// jobs idempotent.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        role: MessageRole,
        source: MessageSource,
        content: &str,
    ) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let now_str = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO NOTHING",
            rusqlite::params![id, conversation_id, role.as_str(), content, source.as_str(), &now_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            [&now_str, conversation_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Add a message to a conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        source: MessageSource,
        content: &str,
    ) -> Result<Message> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![&id, conversation_id, role.as_str(), content, source.as_str(), &now_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            [&now_str, conversation_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            source,
            created_at: now,
        })
    }

    /// Get recent messages in chronological order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, source, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        #[allow(clippy::cast_possible_wrap)]
        let messages: Vec<Message> = stmt
            .query_map(rusqlite::params![conversation_id, limit as i64], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role: MessageRole::from_str(&row.get::<_, String>(2)?)
                        .unwrap_or(MessageRole::User),
                    content: row.get(3)?,
                    source: MessageSource::from_str(&row.get::<_, String>(4)?)
                        .unwrap_or(MessageSource::System),
                    created_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(messages.into_iter().rev().collect())
    }
}

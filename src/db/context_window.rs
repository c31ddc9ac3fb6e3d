//! Context window repository
//!
//! A context window is a single slot per user naming the currently active
//! conversation thread.

use chrono::Utc;

use super::DbPool;
use crate::{Error, Result};

/// Context window repository
#[derive(Clone)]
pub struct ContextWindowRepo {
    pool: DbPool,
}

impl ContextWindowRepo {
    /// Create a new context window repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Point a user's context window at a conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(&self, user_id: &str, conversation_id: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO context_windows (user_id, conversation_id, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 conversation_id = excluded.conversation_id,
                 updated_at = excluded.updated_at",
            [user_id, conversation_id, &Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// The conversation a user's context window points at, if any
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let conversation_id = conn
            .query_row(
                "SELECT conversation_id FROM context_windows WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .ok();

        Ok(conversation_id)
    }
}

//! Memory repository for long-term memory storage

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{parse_datetime, DbPool};
use crate::{Error, Result};

/// A remembered fact about a user
#[derive(Debug, Clone)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Memory repository
#[derive(Clone)]
pub struct MemoryRepo {
    pool: DbPool,
}

impl MemoryRepo {
    /// Create a new memory repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a memory with exactly this content created since the cutoff
    ///
    /// Dedup is deliberately exact-text within the window, not fuzzy.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_recent(
        &self,
        user_id: &str,
        content: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Memory>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let memory = conn
            .query_row(
                "SELECT id, user_id, content, created_at FROM memories
                 WHERE user_id = ?1 AND content = ?2 AND created_at >= ?3
                 LIMIT 1",
                [user_id, content, &since.to_rfc3339()],
                |row| {
                    Ok(Memory {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        content: row.get(2)?,
                        created_at: parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .ok();

        Ok(memory)
    }

    /// Create a memory row
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self, user_id: &str, content: &str) -> Result<Memory> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO memories (id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            [&id, user_id, content, &now.to_rfc3339()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Memory {
            id,
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Most recent memories for a user, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Memory>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, content, created_at FROM memories
                 WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        #[allow(clippy::cast_possible_wrap)]
        let memories = stmt
            .query_map(rusqlite::params![user_id, limit as i64], |row| {
                Ok(Memory {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    content: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(memories)
    }
}

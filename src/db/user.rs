//! User repository

use chrono::{DateTime, Utc};

use super::{parse_datetime, DbPool};
use crate::{Error, Result};

/// A known user
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new user repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a user by external id, creating the row on first sight
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_or_create(&self, user_id: &str) -> Result<User> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let existing: Option<User> = conn
            .query_row(
                "SELECT id, created_at, updated_at FROM users WHERE id = ?1",
                [user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        created_at: parse_datetime(&row.get::<_, String>(1)?),
                        updated_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .ok();

        if let Some(user) = existing {
            return Ok(user);
        }

        let now = Utc::now();
        let now_str = now.to_rfc3339();
        conn.execute(
            "INSERT INTO users (id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO NOTHING",
            [user_id, &now_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(User {
            id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}

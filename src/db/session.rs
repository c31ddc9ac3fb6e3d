//! Device session repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{parse_datetime, DbPool};
use crate::{Error, Result};

const SESSION_COLUMNS: &str = "id, session_key, user_id, thread_ref, last_seen_at, created_at";

/// One physical device/transcription stream
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// External key the device sends with every webhook call
    pub session_key: String,
    pub user_id: Option<String>,
    /// External completion-thread reference, when one has been opened
    pub thread_ref: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        session_key: row.get(1)?,
        user_id: row.get(2)?,
        thread_ref: row.get(3)?,
        last_seen_at: parse_datetime(&row.get::<_, String>(4)?),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

/// Session repository
#[derive(Clone)]
pub struct SessionRepo {
    pool: DbPool,
}

impl SessionRepo {
    /// Create a new session repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up a session by its external key
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_key(&self, session_key: &str) -> Result<Option<Session>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_key = ?1"),
                [session_key],
                row_to_session,
            )
            .ok();

        Ok(session)
    }

    /// Upsert a session: create on first sight, touch `last_seen_at` always
    ///
    /// A user link or thread reference is only ever added, never cleared, so
    /// retried deliveries with missing fields cannot erase earlier state.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(
        &self,
        session_key: &str,
        user_id: Option<&str>,
        thread_ref: Option<&str>,
    ) -> Result<Session> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now_str = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO sessions (id, session_key, user_id, thread_ref, last_seen_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(session_key) DO UPDATE SET
                 last_seen_at = excluded.last_seen_at,
                 user_id = COALESCE(excluded.user_id, sessions.user_id),
                 thread_ref = COALESCE(excluded.thread_ref, sessions.thread_ref)",
            rusqlite::params![&id, session_key, user_id, thread_ref, &now_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_key = ?1"),
            [session_key],
            row_to_session,
        )
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Delete sessions idle since before the cutoff, returning their keys
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn sweep_inactive(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let cutoff_str = cutoff.to_rfc3339();

        let mut stmt = conn
            .prepare("SELECT session_key FROM sessions WHERE last_seen_at < ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let keys: Vec<String> = stmt
            .query_map([&cutoff_str], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        conn.execute(
            "DELETE FROM sessions WHERE last_seen_at < ?1",
            [&cutoff_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> SessionRepo {
        SessionRepo::new(init_memory().unwrap())
    }

    #[test]
    fn upsert_creates_then_reuses_row() {
        let repo = setup();

        let first = repo.upsert("dev-1", None, None).unwrap();
        let second = repo.upsert("dev-1", None, None).unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.last_seen_at >= first.last_seen_at);
    }

    #[test]
    fn upsert_adds_but_never_clears_user_link() {
        let repo = setup();

        repo.upsert("dev-1", Some("user-1"), None).unwrap();
        let touched = repo.upsert("dev-1", None, None).unwrap();

        assert_eq!(touched.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn find_by_key_misses_unknown_sessions() {
        let repo = setup();
        assert!(repo.find_by_key("nope").unwrap().is_none());
    }

    #[test]
    fn sweep_removes_only_idle_sessions() {
        let repo = setup();

        repo.upsert("dev-old", None, None).unwrap();
        repo.upsert("dev-new", None, None).unwrap();

        // Everything is newer than a cutoff in the past
        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(repo.sweep_inactive(past).unwrap().is_empty());

        // Everything is older than a cutoff in the future
        let future = Utc::now() + chrono::Duration::hours(1);
        let swept = repo.sweep_inactive(future).unwrap();
        assert_eq!(swept.len(), 2);
        assert!(repo.find_by_key("dev-old").unwrap().is_none());
    }
}

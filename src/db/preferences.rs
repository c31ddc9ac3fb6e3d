//! Preference record repository

use chrono::Utc;
use uuid::Uuid;

use super::DbPool;
use crate::prefs::{ListenMode, PreferenceRecord};
use crate::{Error, Result};

/// Which entity a preference record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefScope {
    User,
    Session,
}

impl PrefScope {
    const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Session => "session",
        }
    }
}

/// Preference record repository
#[derive(Clone)]
pub struct PreferenceRepo {
    pool: DbPool,
}

impl PreferenceRepo {
    /// Create a new preference repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch the partial record for an owner, if any
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, scope: PrefScope, owner_id: &str) -> Result<Option<PreferenceRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let record = conn
            .query_row(
                "SELECT listen_mode, followup_window_ms, muted, quiet_start, quiet_end,
                        activation_pattern, inject_memories, meeting_transcribe
                 FROM preferences WHERE scope = ?1 AND owner_id = ?2",
                [scope.as_str(), owner_id],
                |row| {
                    Ok(PreferenceRecord {
                        listen_mode: row
                            .get::<_, Option<String>>(0)?
                            .as_deref()
                            .and_then(ListenMode::from_str_value),
                        followup_window_ms: row.get::<_, Option<i64>>(1)?.and_then(|v| u64::try_from(v).ok()),
                        muted: row.get::<_, Option<bool>>(2)?,
                        quiet_start: row.get::<_, Option<i64>>(3)?.and_then(|v| u16::try_from(v).ok()),
                        quiet_end: row.get::<_, Option<i64>>(4)?.and_then(|v| u16::try_from(v).ok()),
                        activation_pattern: row.get(5)?,
                        inject_memories: row.get::<_, Option<bool>>(6)?,
                        meeting_transcribe: row.get::<_, Option<bool>>(7)?,
                    })
                },
            )
            .ok();

        Ok(record)
    }

    /// Upsert a partial record; set fields overwrite, unset fields are kept
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(
        &self,
        scope: PrefScope,
        owner_id: &str,
        record: &PreferenceRecord,
    ) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now_str = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO preferences (id, scope, owner_id, listen_mode, followup_window_ms,
                                      muted, quiet_start, quiet_end, activation_pattern,
                                      inject_memories, meeting_transcribe, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(scope, owner_id) DO UPDATE SET
                 listen_mode = COALESCE(excluded.listen_mode, preferences.listen_mode),
                 followup_window_ms = COALESCE(excluded.followup_window_ms, preferences.followup_window_ms),
                 muted = COALESCE(excluded.muted, preferences.muted),
                 quiet_start = COALESCE(excluded.quiet_start, preferences.quiet_start),
                 quiet_end = COALESCE(excluded.quiet_end, preferences.quiet_end),
                 activation_pattern = COALESCE(excluded.activation_pattern, preferences.activation_pattern),
                 inject_memories = COALESCE(excluded.inject_memories, preferences.inject_memories),
                 meeting_transcribe = COALESCE(excluded.meeting_transcribe, preferences.meeting_transcribe),
                 updated_at = excluded.updated_at",
            rusqlite::params![
                &id,
                scope.as_str(),
                owner_id,
                record.listen_mode.map(ListenMode::as_str),
                record.followup_window_ms.and_then(|v| i64::try_from(v).ok()),
                record.muted,
                record.quiet_start.map(i64::from),
                record.quiet_end.map(i64::from),
                record.activation_pattern.as_deref(),
                record.inject_memories,
                record.meeting_transcribe,
                &now_str,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}

//! Transcript segment repository

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{parse_datetime, DbPool};
use crate::activation::Segment;
use crate::{Error, Result};

/// Segments written per transaction, to bound lock scope
const UPSERT_CHUNK_SIZE: usize = 25;

/// A persisted transcript segment
#[derive(Debug, Clone)]
pub struct TranscriptSegmentRow {
    pub id: String,
    pub session_id: String,
    pub external_id: String,
    pub text: String,
    pub speaker: Option<String>,
    pub speaker_id: Option<i64>,
    pub is_user: bool,
    pub start_offset: Option<f64>,
    pub end_offset: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stable fallback id for segments the firmware sent without one
#[must_use]
pub fn fallback_segment_id(segment: &Segment) -> String {
    let mut hasher = Sha256::new();
    hasher.update(segment.text.as_bytes());
    if let Some(start) = segment.start {
        hasher.update(start.to_le_bytes());
    }
    if let Some(end) = segment.end {
        hasher.update(end.to_le_bytes());
    }
    let digest = hasher.finalize();
    format!("seg-{}", &hex::encode(digest)[..16])
}

/// Transcript segment repository
#[derive(Clone)]
pub struct TranscriptRepo {
    pool: DbPool,
}

impl TranscriptRepo {
    /// Create a new transcript repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upsert a batch of segments for a session
    ///
    /// Each segment is keyed by `(session_id, external_id)`; redelivery
    /// updates fields in place and never duplicates rows. Segments are
    /// written in sub-chunks, one transaction per chunk.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert_batch(&self, session_id: &str, segments: &[Segment]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut written = 0;
        for chunk in segments.chunks(UPSERT_CHUNK_SIZE) {
            let tx = conn
                .transaction()
                .map_err(|e| Error::Database(e.to_string()))?;

            for segment in chunk {
                let external_id = segment
                    .external_id()
                    .map_or_else(|| fallback_segment_id(segment), ToString::to_string);
                let id = Uuid::new_v4().to_string();
                let now_str = Utc::now().to_rfc3339();

                tx.execute(
                    "INSERT INTO transcript_segments
                         (id, session_id, external_id, text, speaker, speaker_id, is_user,
                          start_offset, end_offset, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                     ON CONFLICT(session_id, external_id) DO UPDATE SET
                         text = excluded.text,
                         speaker = excluded.speaker,
                         speaker_id = excluded.speaker_id,
                         is_user = excluded.is_user,
                         start_offset = excluded.start_offset,
                         end_offset = excluded.end_offset,
                         updated_at = excluded.updated_at",
                    rusqlite::params![
                        &id,
                        session_id,
                        &external_id,
                        &segment.text,
                        segment.speaker.as_deref(),
                        segment.speaker_id,
                        segment.is_user.unwrap_or(false),
                        segment.start,
                        segment.end,
                        &now_str,
                    ],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                written += 1;
            }

            tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        }

        Ok(written)
    }

    /// List segments for a session in insertion order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_session(&self, session_id: &str) -> Result<Vec<TranscriptSegmentRow>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, external_id, text, speaker, speaker_id, is_user,
                        start_offset, end_offset, created_at, updated_at
                 FROM transcript_segments WHERE session_id = ?1 ORDER BY created_at, external_id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let rows = stmt
            .query_map([session_id], |row| {
                Ok(TranscriptSegmentRow {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    external_id: row.get(2)?,
                    text: row.get(3)?,
                    speaker: row.get(4)?,
                    speaker_id: row.get(5)?,
                    is_user: row.get(6)?,
                    start_offset: row.get(7)?,
                    end_offset: row.get(8)?,
                    created_at: parse_datetime(&row.get::<_, String>(9)?),
                    updated_at: parse_datetime(&row.get::<_, String>(10)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(rows)
    }
}

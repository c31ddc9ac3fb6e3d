//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Users table
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Device transcription sessions
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            session_key TEXT NOT NULL UNIQUE,
            user_id TEXT REFERENCES users(id),
            thread_ref TEXT,
            last_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_last_seen ON sessions(last_seen_at);

        -- Partial preference records, per user or per session
        CREATE TABLE IF NOT EXISTS preferences (
            id TEXT PRIMARY KEY,
            scope TEXT NOT NULL CHECK(scope IN ('user', 'session')),
            owner_id TEXT NOT NULL,
            listen_mode TEXT CHECK(listen_mode IN ('trigger', 'followup', 'always')),
            followup_window_ms INTEGER,
            muted INTEGER,
            quiet_start INTEGER,
            quiet_end INTEGER,
            activation_pattern TEXT,
            inject_memories INTEGER,
            meeting_transcribe INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope, owner_id)
        );

        -- Transcript segments, idempotently upserted per session
        CREATE TABLE IF NOT EXISTS transcript_segments (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            external_id TEXT NOT NULL,
            text TEXT NOT NULL,
            speaker TEXT,
            speaker_id INTEGER,
            is_user INTEGER NOT NULL DEFAULT 0,
            start_offset REAL,
            end_offset REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(session_id, external_id)
        );

        CREATE INDEX IF NOT EXISTS idx_segments_session ON transcript_segments(session_id);

        -- Conversations, keyed by session and external thread
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            user_id TEXT,
            external_thread_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(session_id, external_thread_id)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id);

        -- Messages table
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            role TEXT NOT NULL CHECK(role IN ('user', 'assistant', 'system', 'tool')),
            content TEXT NOT NULL,
            source TEXT NOT NULL CHECK(source IN ('transcript', 'typed', 'system')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);

        -- Memories table
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
        CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

        -- One active conversation slot per user
        CREATE TABLE IF NOT EXISTS context_windows (
            user_id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

//! Job handlers: dispatch by job type to idempotent repository operations

use chrono::{Duration, Utc};

use super::{ExecuteJob, Job};
use crate::activation::Segment;
use crate::db::{
    ContextWindowRepo, ConversationRepo, DbPool, MemoryRepo, MessageRole, MessageSource,
    SessionRepo, TranscriptRepo, UserRepo,
};
use crate::Result;

/// Rolling window within which an identical memory is a duplicate
const MEMORY_DEDUPE_WINDOW_HOURS: i64 = 12;

/// Executes background jobs against the repositories
#[derive(Clone)]
pub struct JobExecutor {
    users: UserRepo,
    sessions: SessionRepo,
    transcripts: TranscriptRepo,
    conversations: ConversationRepo,
    memories: MemoryRepo,
    context_windows: ContextWindowRepo,
}

impl JobExecutor {
    /// Create an executor over a database pool
    #[must_use]
    pub fn new(pool: &DbPool) -> Self {
        Self {
            users: UserRepo::new(pool.clone()),
            sessions: SessionRepo::new(pool.clone()),
            transcripts: TranscriptRepo::new(pool.clone()),
            conversations: ConversationRepo::new(pool.clone()),
            memories: MemoryRepo::new(pool.clone()),
            context_windows: ContextWindowRepo::new(pool.clone()),
        }
    }

    fn session_update(
        &self,
        session_key: &str,
        user_id: Option<&str>,
        thread_ref: Option<&str>,
    ) -> Result<()> {
        if let Some(uid) = user_id {
            self.users.find_or_create(uid)?;
        }
        self.sessions.upsert(session_key, user_id, thread_ref)?;
        Ok(())
    }

    fn transcript_batch(&self, session_key: &str, segments: &[Segment]) -> Result<()> {
        let session = self.sessions.upsert(session_key, None, None)?;
        let written = self.transcripts.upsert_batch(&session.id, segments)?;
        tracing::debug!(session = %session_key, segments = written, "transcript batch persisted");
        Ok(())
    }

    fn conversation_save(
        &self,
        session_key: &str,
        user_id: Option<&str>,
        external_thread_id: &str,
        exchange_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<()> {
        if let Some(uid) = user_id {
            self.users.find_or_create(uid)?;
        }
        let session = self.sessions.upsert(session_key, user_id, None)?;
        let conversation = self
            .conversations
            .upsert(&session.id, external_thread_id, user_id)?;

        self.conversations.insert_message(
            &format!("{exchange_id}-user"),
            &conversation.id,
            MessageRole::User,
            MessageSource::Transcript,
            question,
        )?;
        self.conversations.insert_message(
            &format!("{exchange_id}-assistant"),
            &conversation.id,
            MessageRole::Assistant,
            MessageSource::System,
            answer,
        )?;
        Ok(())
    }

    fn memory_save(&self, user_id: &str, content: &str) -> Result<()> {
        self.users.find_or_create(user_id)?;

        let since = Utc::now() - Duration::hours(MEMORY_DEDUPE_WINDOW_HOURS);
        if self.memories.find_recent(user_id, content, since)?.is_some() {
            tracing::debug!(user = %user_id, "duplicate memory skipped");
            return Ok(());
        }

        self.memories.create(user_id, content)?;
        Ok(())
    }

    fn context_window_update(
        &self,
        user_id: &str,
        session_key: &str,
        external_thread_id: &str,
    ) -> Result<()> {
        self.users.find_or_create(user_id)?;
        let session = self.sessions.upsert(session_key, Some(user_id), None)?;
        let conversation =
            self.conversations
                .upsert(&session.id, external_thread_id, Some(user_id))?;
        self.context_windows.upsert(user_id, &conversation.id)?;
        Ok(())
    }
}

impl ExecuteJob for JobExecutor {
    fn execute(&self, job: &Job) -> Result<()> {
        match job {
            Job::SessionUpdate {
                session_key,
                user_id,
                thread_ref,
            } => self.session_update(session_key, user_id.as_deref(), thread_ref.as_deref()),
            Job::TranscriptBatch {
                session_key,
                segments,
            } => self.transcript_batch(session_key, segments),
            Job::ConversationSave {
                session_key,
                user_id,
                external_thread_id,
                exchange_id,
                question,
                answer,
            } => self.conversation_save(
                session_key,
                user_id.as_deref(),
                external_thread_id,
                exchange_id,
                question,
                answer,
            ),
            Job::MemorySave { user_id, content } => self.memory_save(user_id, content),
            Job::ContextWindowUpdate {
                user_id,
                session_key,
                external_thread_id,
            } => self.context_window_update(user_id, session_key, external_thread_id),
        }
    }
}

//! Preference model and session preference resolution
//!
//! Preferences come in partial records at two scopes. Resolution layers a
//! session record over the user record over hardcoded defaults, field by
//! field. The raw session-metadata lookup is cached for a short TTL; a cache
//! miss must produce an identical result to a hit.

pub mod cache;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationPattern;
use crate::db::{PrefScope, PreferenceRepo, Session, SessionRepo};
use crate::Result;

pub use cache::TtlCache;

/// How long a session-metadata lookup stays cached
const SESSION_CACHE_TTL: Duration = Duration::from_secs(300);

/// Session-metadata cache entry cap
const SESSION_CACHE_MAX_ENTRIES: usize = 1000;

/// When the assistant engages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenMode {
    /// Engage only on an explicit wake phrase
    Trigger,
    /// Engage on a wake phrase, or shortly after a previous accepted question
    Followup,
    /// Always try to extract a question
    Always,
}

impl ListenMode {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Followup => "followup",
            Self::Always => "always",
        }
    }

    pub(crate) fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "trigger" => Some(Self::Trigger),
            "followup" => Some(Self::Followup),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

/// Fully resolved activation preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub listen_mode: ListenMode,
    /// Follow-up acceptance window after an accepted question
    pub followup_window_ms: u64,
    pub muted: bool,
    /// Quiet-hours window start, minute of day
    pub quiet_start: Option<u16>,
    /// Quiet-hours window end, minute of day
    pub quiet_end: Option<u16>,
    /// Custom wake-phrase regex source
    pub activation_pattern: Option<String>,
    /// Fold recent memories into the completion context
    pub inject_memories: bool,
    /// Meeting mode: persist everything, respond only on the end signal
    pub meeting_transcribe: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            listen_mode: ListenMode::Trigger,
            followup_window_ms: 8000,
            muted: false,
            quiet_start: None,
            quiet_end: None,
            activation_pattern: None,
            inject_memories: false,
            meeting_transcribe: false,
        }
    }
}

impl Preferences {
    /// Merge partial records over the defaults, session scope winning
    #[must_use]
    pub fn resolve(user: Option<&PreferenceRecord>, session: Option<&PreferenceRecord>) -> Self {
        let mut prefs = Self::default();
        if let Some(record) = user {
            prefs.apply(record);
        }
        if let Some(record) = session {
            prefs.apply(record);
        }
        prefs
    }

    fn apply(&mut self, record: &PreferenceRecord) {
        if let Some(mode) = record.listen_mode {
            self.listen_mode = mode;
        }
        if let Some(window) = record.followup_window_ms {
            self.followup_window_ms = window;
        }
        if let Some(muted) = record.muted {
            self.muted = muted;
        }
        if let Some(start) = record.quiet_start {
            self.quiet_start = Some(start);
        }
        if let Some(end) = record.quiet_end {
            self.quiet_end = Some(end);
        }
        if let Some(pattern) = &record.activation_pattern {
            self.activation_pattern = Some(pattern.clone());
        }
        if let Some(inject) = record.inject_memories {
            self.inject_memories = inject;
        }
        if let Some(meeting) = record.meeting_transcribe {
            self.meeting_transcribe = meeting;
        }
    }
}

/// Partial preference record, as stored per user or per session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    #[serde(default)]
    pub listen_mode: Option<ListenMode>,
    #[serde(default)]
    pub followup_window_ms: Option<u64>,
    #[serde(default)]
    pub muted: Option<bool>,
    #[serde(default)]
    pub quiet_start: Option<u16>,
    #[serde(default)]
    pub quiet_end: Option<u16>,
    #[serde(default)]
    pub activation_pattern: Option<String>,
    #[serde(default)]
    pub inject_memories: Option<bool>,
    #[serde(default)]
    pub meeting_transcribe: Option<bool>,
}

/// Result of resolving preferences for one webhook call
#[derive(Debug, Clone)]
pub struct ResolvedPreferences {
    pub preferences: Preferences,
    pub pattern: ActivationPattern,
    /// User linked to the session, or the request-level uid hint
    pub user_id: Option<String>,
    /// Session row if one already exists for the key
    pub session: Option<Session>,
}

/// Resolves per-call preferences from session metadata and stored records
pub struct PreferenceResolver {
    sessions: SessionRepo,
    preferences: PreferenceRepo,
    session_cache: TtlCache<String, Option<Session>>,
}

impl PreferenceResolver {
    /// Create a resolver over the given repositories
    #[must_use]
    pub fn new(sessions: SessionRepo, preferences: PreferenceRepo) -> Self {
        Self {
            sessions,
            preferences,
            session_cache: TtlCache::new(SESSION_CACHE_TTL, SESSION_CACHE_MAX_ENTRIES),
        }
    }

    /// Resolve preferences and the activation pattern for a session
    ///
    /// # Errors
    ///
    /// Returns error if a repository lookup fails
    pub fn resolve(
        &self,
        session_key: &str,
        uid_hint: Option<&str>,
    ) -> Result<ResolvedPreferences> {
        let cache_key = format!("{session_key}:{}", uid_hint.unwrap_or_default());

        let session = if let Some(cached) = self.session_cache.get(&cache_key) {
            cached
        } else {
            let looked_up = self.sessions.find_by_key(session_key)?;
            self.session_cache.insert(cache_key, looked_up.clone());
            looked_up
        };

        let user_id = uid_hint
            .map(ToString::to_string)
            .or_else(|| session.as_ref().and_then(|s| s.user_id.clone()));

        let user_record = user_id
            .as_deref()
            .map(|uid| self.preferences.find(PrefScope::User, uid))
            .transpose()?
            .flatten();
        let session_record = self.preferences.find(PrefScope::Session, session_key)?;

        let preferences = Preferences::resolve(user_record.as_ref(), session_record.as_ref());
        let pattern = ActivationPattern::build(preferences.activation_pattern.as_deref());

        Ok(ResolvedPreferences {
            preferences,
            pattern,
            user_id,
            session,
        })
    }

    /// Drop cached metadata for a swept session key
    pub fn invalidate(&self, session_key: &str) {
        let prefix = format!("{session_key}:");
        self.session_cache.retain_keys(|k| !k.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_no_records_exist() {
        let prefs = Preferences::resolve(None, None);
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.listen_mode, ListenMode::Trigger);
        assert_eq!(prefs.followup_window_ms, 8000);
    }

    #[test]
    fn user_record_overrides_defaults() {
        let user = PreferenceRecord {
            listen_mode: Some(ListenMode::Always),
            muted: Some(true),
            ..PreferenceRecord::default()
        };

        let prefs = Preferences::resolve(Some(&user), None);
        assert_eq!(prefs.listen_mode, ListenMode::Always);
        assert!(prefs.muted);
        // Untouched fields stay at defaults
        assert_eq!(prefs.followup_window_ms, 8000);
    }

    #[test]
    fn session_record_wins_field_by_field() {
        let user = PreferenceRecord {
            listen_mode: Some(ListenMode::Always),
            followup_window_ms: Some(4000),
            quiet_start: Some(1320),
            quiet_end: Some(420),
            ..PreferenceRecord::default()
        };
        let session = PreferenceRecord {
            listen_mode: Some(ListenMode::Followup),
            ..PreferenceRecord::default()
        };

        let prefs = Preferences::resolve(Some(&user), Some(&session));
        // Session override wins
        assert_eq!(prefs.listen_mode, ListenMode::Followup);
        // Unset session fields fall back to user values
        assert_eq!(prefs.followup_window_ms, 4000);
        assert_eq!(prefs.quiet_start, Some(1320));
        assert_eq!(prefs.quiet_end, Some(420));
    }

    #[test]
    fn resolver_cache_hit_matches_miss() {
        let pool = crate::db::init_memory().unwrap();
        let sessions = SessionRepo::new(pool.clone());
        let records = PreferenceRepo::new(pool);

        sessions.upsert("dev-1", Some("user-1"), None).unwrap();
        records
            .upsert(
                PrefScope::User,
                "user-1",
                &PreferenceRecord {
                    listen_mode: Some(ListenMode::Always),
                    ..PreferenceRecord::default()
                },
            )
            .unwrap();

        let resolver = PreferenceResolver::new(sessions, records.clone());

        let miss = resolver.resolve("dev-1", None).unwrap();
        let hit = resolver.resolve("dev-1", None).unwrap();
        assert_eq!(miss.preferences, hit.preferences);
        assert_eq!(miss.user_id, hit.user_id);
        assert_eq!(hit.preferences.listen_mode, ListenMode::Always);

        // Preference rows are re-read on every resolve; only the session
        // metadata lookup is cached
        records
            .upsert(
                PrefScope::Session,
                "dev-1",
                &PreferenceRecord {
                    muted: Some(true),
                    ..PreferenceRecord::default()
                },
            )
            .unwrap();
        let updated = resolver.resolve("dev-1", None).unwrap();
        assert!(updated.preferences.muted);
    }

    #[test]
    fn listen_mode_round_trips_through_str() {
        for mode in [ListenMode::Trigger, ListenMode::Followup, ListenMode::Always] {
            assert_eq!(ListenMode::from_str_value(mode.as_str()), Some(mode));
        }
        assert_eq!(ListenMode::from_str_value("bogus"), None);
    }
}

//! Persistent session storage for the Minjo assistant
//!
//! One JSON document per session id:
//!
//! session/                            # resolved at startup
//! ├── <sessionId>.json                # { history: [...], done: bool }
//! └── ...
//!
//! Writes go through a `.tmp` staging file and an atomic rename so a reader
//! never observes a half-written record. If the directory cannot be created
//! or written, the store permanently downgrades to an in-memory map for the
//! rest of the process lifetime and keeps serving requests from there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Maximum messages retained per session (oldest evicted first).
pub const HISTORY_LIMIT: usize = 20;

/// Messages included when rendering a history snippet for the prompt.
const SNIPPET_LIMIT: usize = 10;

/// Characters of the last message shown in session listings.
const LAST_TEXT_PREVIEW: usize = 200;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Informational only; ordering relies on sequence position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// The persisted conversational state for one session id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub history: Vec<Message>,
    pub done: bool,
}

impl Session {
    /// True if no assistant turn has been stored yet.
    pub fn has_assistant_turn(&self) -> bool {
        self.history.iter().any(|m| m.role == Role::Assistant)
    }
}

/// Listing entry for one session (wire shape matches the HTTP API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub done: bool,
    pub last_role: Option<Role>,
    pub last_text: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-id failure in a bulk delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteError {
    pub session_id: String,
    pub message: String,
}

/// Outcome of a bulk delete; every requested id lands in exactly one list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
    pub errors: Vec<DeleteError>,
}

/// Resolve the session directory.
///
/// Priority: explicit override, a tmpdir on serverless runtimes (only /tmp is
/// writable there and it is cleared between cold starts), else ./session.
pub fn resolve_session_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }

    if std::env::var_os("VERCEL").is_some() || std::env::var_os("VERCEL_ENV").is_some() {
        return std::env::temp_dir().join("minjo-session");
    }

    PathBuf::from("session")
}

/// File-backed session store with a lazy in-memory fallback.
///
/// Constructed once at startup and shared behind an `Arc`; all conversation
/// state flows through it. `load` never fails the caller — read and parse
/// errors normalize to an empty session.
pub struct SessionStore {
    dir: PathBuf,
    dir_ready: AtomicBool,
    use_memory: AtomicBool,
    fallback: Mutex<HashMap<String, Session>>,
    fallback_meta: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dir_ready: AtomicBool::new(false),
            use_memory: AtomicBool::new(false),
            fallback: Mutex::new(HashMap::new()),
            fallback_meta: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True once the store has downgraded to memory-only mode.
    pub fn in_memory(&self) -> bool {
        self.use_memory.load(Ordering::Relaxed)
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    /// Lazily create the session directory, downgrading to memory on failure.
    fn ensure_dir(&self) {
        if self.use_memory.load(Ordering::Relaxed) || self.dir_ready.load(Ordering::Relaxed) {
            return;
        }

        match std::fs::create_dir_all(&self.dir) {
            Ok(()) => {
                self.dir_ready.store(true, Ordering::Relaxed);
                tracing::info!("session store using file storage: {}", self.dir.display());
            }
            Err(e) => {
                tracing::warn!("session store falling back to in-memory storage: {e}");
                self.use_memory.store(true, Ordering::Relaxed);
            }
        }
    }

    fn downgrade_to_memory(&self) {
        if !self.use_memory.swap(true, Ordering::Relaxed) {
            tracing::warn!("session store switching to in-memory storage after write failure");
        }
    }

    fn store_in_memory(&self, session_id: &str, session: &Session) {
        self.fallback
            .lock()
            .expect("session fallback map poisoned")
            .insert(session_id.to_string(), session.clone());
        self.fallback_meta
            .lock()
            .expect("session fallback meta poisoned")
            .insert(session_id.to_string(), Utc::now());
    }

    // ========== Load / Save ==========

    /// Load a session, normalizing any read or parse failure to an empty one.
    pub fn load(&self, session_id: &str) -> Session {
        self.ensure_dir();

        if self.in_memory() {
            return self
                .fallback
                .lock()
                .expect("session fallback map poisoned")
                .get(session_id)
                .cloned()
                .unwrap_or_default();
        }

        let path = self.session_path(session_id);
        if !path.exists() {
            return Session::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::error!("failed to parse session {session_id}: {e}");
                Session::default()
            }),
            Err(e) => {
                tracing::error!("failed to read session {session_id}: {e}");
                Session::default()
            }
        }
    }

    /// Persist a session record, overwriting any prior record for that id.
    pub fn save(&self, session_id: &str, session: &Session) {
        self.ensure_dir();

        if self.in_memory() {
            self.store_in_memory(session_id, session);
            return;
        }

        let path = self.session_path(session_id);
        if let Err(e) = self.write_atomic(&path, session) {
            tracing::error!("failed to save session {session_id}: {e}");
            self.downgrade_to_memory();
            self.store_in_memory(session_id, session);
        }
    }

    fn write_atomic(&self, path: &Path, session: &Session) -> std::io::Result<()> {
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)
    }

    /// Append one turn and truncate to the most recent [`HISTORY_LIMIT`].
    pub fn append_message(&self, session_id: &str, role: Role, text: &str) {
        let mut session = self.load(session_id);
        push_bounded(&mut session, role, text);
        self.save(session_id, &session);
    }

    /// Append the closing assistant turn and mark the session terminal.
    ///
    /// Goes through the same bounded push as [`append_message`](Self::append_message)
    /// so the history limit holds on the final turn too.
    pub fn finish_session(&self, session_id: &str, text: &str) {
        let mut session = self.load(session_id);
        session.done = true;
        push_bounded(&mut session, Role::Assistant, text);
        self.save(session_id, &session);
    }

    /// Render the last few turns as "User:"/"Assistant:" lines, oldest first.
    pub fn history_snippet(&self, session_id: &str) -> String {
        let session = self.load(session_id);
        let start = session.history.len().saturating_sub(SNIPPET_LIMIT);
        session.history[start..]
            .iter()
            .map(|m| match m.role {
                Role::User => format!("User: {}", m.text),
                Role::Assistant => format!("Assistant: {}", m.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ========== Listing / Deletion ==========

    /// Enumerate known sessions. Corrupt records are normalized, not fatal.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.ensure_dir();

        if self.in_memory() {
            let sessions = self.fallback.lock().expect("session fallback map poisoned");
            let meta = self
                .fallback_meta
                .lock()
                .expect("session fallback meta poisoned");
            return sessions
                .iter()
                .map(|(id, session)| summarize(id, session, meta.get(id).copied()))
                .collect();
        }

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("failed listing sessions: {e}");
                return Vec::new();
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "json") != Some(true) {
                continue;
            }
            let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let session = match std::fs::read_to_string(&path) {
                Ok(raw) => serde_json::from_str::<Session>(&raw).unwrap_or_else(|e| {
                    tracing::warn!("failed parsing session {session_id}: {e}");
                    Session::default()
                }),
                Err(e) => {
                    tracing::warn!("failed reading session {session_id}: {e}");
                    Session::default()
                }
            };

            let updated_at = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::from);

            summaries.push(summarize(session_id, &session, updated_at));
        }
        summaries
    }

    /// Delete the given ids, classifying each as deleted, missing, or errored.
    ///
    /// Input ids are trimmed and deduplicated; blanks are discarded. Partial
    /// failure is reported in the outcome, never raised.
    pub fn delete_sessions(&self, session_ids: &[String]) -> DeleteOutcome {
        self.ensure_dir();

        let mut seen = Vec::new();
        for id in session_ids {
            let id = id.trim();
            if !id.is_empty() && !seen.iter().any(|s| s == id) {
                seen.push(id.to_string());
            }
        }

        let mut outcome = DeleteOutcome::default();
        for session_id in seen {
            if self.in_memory() {
                let removed = self
                    .fallback
                    .lock()
                    .expect("session fallback map poisoned")
                    .remove(&session_id)
                    .is_some();
                if removed {
                    self.fallback_meta
                        .lock()
                        .expect("session fallback meta poisoned")
                        .remove(&session_id);
                    outcome.deleted.push(session_id);
                } else {
                    outcome.missing.push(session_id);
                }
                continue;
            }

            let path = self.session_path(&session_id);
            if !path.exists() {
                outcome.missing.push(session_id);
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => outcome.deleted.push(session_id),
                Err(e) => outcome.errors.push(DeleteError {
                    session_id,
                    message: e.to_string(),
                }),
            }
        }
        outcome
    }
}

fn push_bounded(session: &mut Session, role: Role, text: &str) {
    session.history.push(Message {
        role,
        text: text.to_string(),
        timestamp: Some(Utc::now()),
    });
    if session.history.len() > HISTORY_LIMIT {
        let excess = session.history.len() - HISTORY_LIMIT;
        session.history.drain(..excess);
    }
}

fn summarize(session_id: &str, session: &Session, updated_at: Option<DateTime<Utc>>) -> SessionSummary {
    let last = session.history.last();
    SessionSummary {
        session_id: session_id.to_string(),
        message_count: session.history.len(),
        done: session.done,
        last_role: last.map(|m| m.role),
        last_text: last.map(|m| m.text.chars().take(LAST_TEXT_PREVIEW).collect()),
        updated_at,
    }
}

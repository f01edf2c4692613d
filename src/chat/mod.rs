//! Chat orchestration
//!
//! One request flows: validate → lock session → load → done short-circuit →
//! reset handling → greeting eligibility → persist user turn → gather
//! time/holiday context → prompt → model call → shape → persist. Storage
//! failures are recovered by the store; model failures always surface as a
//! classified [`ChatError`].

use crate::context::{time_context, HolidayClient};
use crate::llm::{GenerativeModel, LlmError};
use crate::prompt::{build_prompt, PromptInput};
use crate::session::{Role, Session, SessionStore};
use crate::shaper::{shape_reply, TriggerConfig, CLOSING_MESSAGE};
use chrono::Local;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Question substring that wipes the session and starts over.
const RESET_PHRASE: &str = "mulai baru";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("sessionId is required")]
    MissingSessionId,

    #[error("question is required")]
    MissingQuestion,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// A successfully produced answer.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    /// The session was marked terminal by this turn (or already was).
    pub session_done: bool,
}

/// Composes store, model, and context providers for one `/chat` turn.
pub struct ChatService {
    store: Arc<SessionStore>,
    model: Arc<dyn GenerativeModel>,
    holidays: Arc<HolidayClient>,
    triggers: TriggerConfig,
    // Serializes turns per session id. Without this, two concurrent requests
    // for the same id interleave their load/modify/save and the last save wins.
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatService {
    pub fn new(
        store: Arc<SessionStore>,
        model: Arc<dyn GenerativeModel>,
        holidays: Arc<HolidayClient>,
    ) -> Self {
        Self {
            store,
            model,
            holidays,
            triggers: TriggerConfig::default(),
            session_locks: DashMap::new(),
        }
    }

    pub fn with_triggers(mut self, triggers: TriggerConfig) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Drop lock entries for sessions that were deleted, so the lock map does
    /// not accumulate ids for the process lifetime.
    pub fn release_locks(&self, session_ids: &[String]) {
        for id in session_ids {
            self.session_locks.remove(id);
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Handle one conversation turn.
    pub async fn handle(&self, session_id: &str, question: &str) -> Result<ChatOutcome, ChatError> {
        let session_id = session_id.trim();
        let question = question.trim();

        if session_id.is_empty() {
            return Err(ChatError::MissingSessionId);
        }
        if question.is_empty() {
            return Err(ChatError::MissingQuestion);
        }

        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self.store.load(session_id);

        if session.done {
            return Ok(ChatOutcome {
                answer: CLOSING_MESSAGE.to_string(),
                session_done: true,
            });
        }

        let is_reset = question.to_lowercase().contains(RESET_PHRASE);
        if is_reset {
            session = Session::default();
            self.store.save(session_id, &session);
            tracing::info!("session {session_id} reset by user");
        }

        let should_greet = is_reset || !session.has_assistant_turn();

        // Persist the user's turn before the model call so the record keeps
        // the turn even if generation fails.
        self.store.append_message(session_id, Role::User, question);

        let now = Local::now();
        let time = time_context(now);
        let holiday = self.holidays.holiday_for_date(now).await;

        let snippet = self.store.history_snippet(session_id);
        let prompt = build_prompt(&PromptInput {
            question,
            history_snippet: &snippet,
            time: &time,
            holiday: holiday.as_ref(),
            should_greet,
        });

        let raw = self.model.generate(&prompt).await.map_err(|e| {
            tracing::error!("model call failed for session {session_id}: {e}");
            e
        })?;

        let shaped = shape_reply(&raw, should_greet, &snippet, &self.triggers);

        if shaped.terminate {
            self.store.finish_session(session_id, &shaped.text);
            tracing::info!("session {session_id} marked done by termination trigger");
        } else {
            self.store
                .append_message(session_id, Role::Assistant, &shaped.text);
        }

        Ok(ChatOutcome {
            answer: shaped.text,
            session_done: shaped.terminate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Scripted model: pops replies in order, records received prompts.
    struct ScriptedModel {
        replies: StdMutex<Vec<Result<String, LlmError>>>,
        prompts: StdMutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: StdMutex::new(replies),
                prompts: StdMutex::new(Vec::new()),
            }
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok("baik, dicatat.".to_string())
            } else {
                replies.remove(0)
            }
        }
    }

    fn service(replies: Vec<Result<String, LlmError>>) -> (TempDir, Arc<ScriptedModel>, ChatService) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("sessions")));
        let model = Arc::new(ScriptedModel::new(replies));
        // Unreachable endpoint: holiday lookups degrade to None in tests.
        let holidays = Arc::new(HolidayClient::new("http://127.0.0.1:9/api"));
        let service = ChatService::new(store, model.clone(), holidays);
        (dir, model, service)
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected() {
        let (_dir, _model, service) = service(vec![]);
        assert!(matches!(
            service.handle("  ", "halo").await,
            Err(ChatError::MissingSessionId)
        ));
        assert!(matches!(
            service.handle("s1", "   ").await,
            Err(ChatError::MissingQuestion)
        ));
    }

    #[tokio::test]
    async fn first_turn_greets_and_second_does_not() {
        let (_dir, model, service) = service(vec![
            Ok("Selamat pagi! Ada project apa?".to_string()),
            Ok("Halo lagi!\nPlatformnya apa?".to_string()),
        ]);

        let first = service.handle("s1", "Halo").await.unwrap();
        assert!(model.last_prompt().contains("shouldGreet: true"));
        assert!(first.answer.starts_with("Selamat pagi"));

        let second = service.handle("s1", "lanjut").await.unwrap();
        assert!(model.last_prompt().contains("shouldGreet: false"));
        // The greeting line the model produced anyway must be stripped.
        assert_eq!(second.answer, "Platformnya apa?");
    }

    #[tokio::test]
    async fn user_turn_is_persisted_even_when_model_fails() {
        let (_dir, _model, service) =
            service(vec![Err(LlmError::ConnectionReset("reset".to_string()))]);

        let err = service.handle("s1", "halo").await.unwrap_err();
        assert!(matches!(err, ChatError::Llm(LlmError::ConnectionReset(_))));

        let session = service.store().load("s1");
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].role, Role::User);
        assert_eq!(session.history[0].text, "halo");
    }

    #[tokio::test]
    async fn termination_trigger_marks_session_done() {
        let (_dir, model, service) = service(vec![Ok(
            "Draft siap. Silakan isi form di website Jokipremium ya.".to_string(),
        )]);

        let outcome = service.handle("s1", "oke lanjut").await.unwrap();
        assert!(outcome.session_done);

        let session = service.store().load("s1");
        assert!(session.done);
        assert_eq!(session.history.last().unwrap().role, Role::Assistant);

        // A further turn short-circuits without touching the model.
        let calls_before = model.prompt_count();
        let closed = service.handle("s1", "masih ada?").await.unwrap();
        assert_eq!(closed.answer, CLOSING_MESSAGE);
        assert_eq!(model.prompt_count(), calls_before);
    }

    #[tokio::test]
    async fn termination_at_full_history_keeps_the_bound() {
        use crate::session::HISTORY_LIMIT;

        let (_dir, _model, service) = service(vec![Ok(
            "Draft siap. Silakan isi form di website Jokipremium ya.".to_string(),
        )]);

        for i in 0..HISTORY_LIMIT {
            service
                .store()
                .append_message("s1", Role::User, &format!("detail {i}"));
        }

        let outcome = service.handle("s1", "sudah lengkap").await.unwrap();
        assert!(outcome.session_done);

        let session = service.store().load("s1");
        assert!(session.done);
        assert_eq!(session.history.len(), HISTORY_LIMIT);
        assert_eq!(session.history.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn deleted_sessions_release_their_locks() {
        let (_dir, _model, service) = service(vec![Ok("Oke, dicatat.".to_string())]);
        service.handle("s1", "halo").await.unwrap();
        assert!(service.session_locks.contains_key("s1"));

        service.release_locks(&["s1".to_string()]);
        assert!(!service.session_locks.contains_key("s1"));
    }

    #[tokio::test]
    async fn reset_command_clears_state_and_regreets() {
        let (_dir, model, service) = service(vec![
            Ok("Selamat siang! Ada project apa?".to_string()),
            Ok("Oke.".to_string()),
            Ok("Selamat siang kembali!".to_string()),
        ]);

        service.handle("s1", "halo").await.unwrap();
        service.handle("s1", "aplikasi kasir").await.unwrap();
        assert!(service.store().load("s1").history.len() >= 4);

        service.handle("s1", "Mulai Baru dong").await.unwrap();
        assert!(model.last_prompt().contains("shouldGreet: true"));

        let session = service.store().load("s1");
        // Only the reset turn and its reply remain.
        assert_eq!(session.history.len(), 2);
        assert!(!session.done);
    }

    #[tokio::test]
    async fn whatsapp_trigger_appends_template_to_answer() {
        let (_dir, _model, service) = service(vec![Ok(
            "Untuk harga, silakan hubungi WhatsApp admin ya.".to_string(),
        )]);

        let outcome = service.handle("s1", "berapa harganya?").await.unwrap();
        assert!(!outcome.session_done);
        assert!(outcome.answer.contains("template pesan WhatsApp"));

        // The appended template is part of the stored assistant turn.
        let session = service.store().load("s1");
        assert!(session
            .history
            .last()
            .unwrap()
            .text
            .contains("template pesan WhatsApp"));
    }

    #[tokio::test]
    async fn empty_model_reply_falls_back() {
        let (_dir, _model, service) = service(vec![Ok("   ".to_string())]);
        let outcome = service.handle("s1", "halo").await.unwrap();
        // The fallback itself contains escalation wording, so the WhatsApp
        // template rides along with it.
        assert!(outcome.answer.starts_with(crate::shaper::FALLBACK_MESSAGE));
        assert!(outcome.answer.contains("template pesan WhatsApp"));
    }
}

use crate::agent::{Agent, StreamEvent, build_preamble};
use crate::chatlog::{LogStore, resolve_conversation_id};
use anyhow::Result;
use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// State of one chat conversation, passed explicitly to every call.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    is_admin: bool,
    conversation_id: Uuid,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            is_admin: false,
            conversation_id: Uuid::new_v4(),
        }
    }

    /// Continues `raw` when it is a valid identifier, otherwise starts fresh.
    pub fn resume(raw: Option<&str>) -> Self {
        Self {
            conversation_id: resolve_conversation_id(raw),
            ..Self::new()
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Grants admin rights when `password` matches. An unset `expected`
    /// password never matches.
    pub fn login(&mut self, password: &str, expected: Option<&str>) -> bool {
        self.is_admin = matches!(expected, Some(p) if !p.is_empty() && p == password);
        self.is_admin
    }

    pub fn logout(&mut self) {
        self.is_admin = false;
    }

    /// Drops the history and starts a new conversation.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.conversation_id = Uuid::new_v4();
    }

    fn render_prompt(&self, prompt: &str) -> String {
        let mut full_prompt = String::new();
        if !self.messages.is_empty() {
            full_prompt.push_str("# Conversation so far\n\n");
            for message in &self.messages {
                full_prompt.push_str(&format!("{}: {}\n", message.role, message.content));
            }
            full_prompt.push('\n');
        }
        full_prompt.push_str(&format!("User: {}", prompt));
        full_prompt
    }

    /// Streams the assistant's reply to `prompt` through `tx`, persists the
    /// finished turn and records both messages. A failed store write is
    /// logged and does not fail the turn.
    pub async fn respond(
        &mut self,
        prompt: &str,
        agent: &dyn Agent,
        store: &LogStore,
        instructions: Option<&str>,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String> {
        let preamble = build_preamble(instructions, store.timezone());
        let full_prompt = self.render_prompt(prompt);

        let response = agent.process_streaming(&preamble, &full_prompt, tx).await?;

        let conversation_id = self.conversation_id.to_string();
        if let Err(e) = store
            .insert(prompt, &response, Some(&conversation_id))
            .await
        {
            warn!("Chat turn not logged: {}", e);
        }

        self.messages.push(ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        });
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: response.clone(),
        });
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedAgent;
    use crate::db::sqlite_url;

    async fn test_store() -> (LogStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(sqlite_url(&dir.path().join("chat.db")), chrono_tz::UTC);
        store.ensure_schema().await.unwrap();
        (store, dir)
    }

    #[test]
    fn resume_keeps_valid_id_and_replaces_invalid() {
        let id = "3c9a7e21-5b4d-4f6a-9e8d-1a2b3c4d5e6f";
        assert_eq!(ChatSession::resume(Some(id)).conversation_id().to_string(), id);
        assert_ne!(
            ChatSession::resume(Some("conv-1")).conversation_id().to_string(),
            "conv-1"
        );
    }

    #[test]
    fn login_requires_configured_matching_password() {
        let mut session = ChatSession::new();
        assert!(!session.login("anything", None));
        assert!(!session.login("", Some("")));
        assert!(!session.login("wrong", Some("secret")));
        assert!(session.login("secret", Some("secret")));
        assert!(session.is_admin());
        session.logout();
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn respond_streams_persists_and_records_turn() {
        let (store, _dir) = test_store().await;
        let agent = ScriptedAgent::replying("Try dividing both sides.");
        let mut session = ChatSession::new();
        let (tx, mut rx) = mpsc::channel(64);

        let response = session
            .respond("How do I solve 2x = 4?", &agent, &store, None, tx)
            .await
            .unwrap();
        assert_eq!(response, "Try dividing both sides.");

        let mut streamed = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta(text) => streamed.push_str(&text),
                StreamEvent::Done => break,
                StreamEvent::Error(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(streamed, response);

        let rows = store.fetch_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prompt, "How do I solve 2x = 4?");
        assert_eq!(rows[0].response, response);
        assert_eq!(rows[0].conversation_id, session.conversation_id());
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn history_and_instructions_reach_the_agent() {
        let (store, _dir) = test_store().await;
        let agent = ScriptedAgent::replying("ok");
        let mut session = ChatSession::new();

        let (tx, _rx) = mpsc::channel(64);
        session
            .respond("first", &agent, &store, Some("Be Socratic."), tx)
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(64);
        session
            .respond("second", &agent, &store, Some("Be Socratic."), tx)
            .await
            .unwrap();

        let calls = agent.calls.lock().unwrap();
        assert!(calls[1].0.starts_with("Be Socratic."));
        assert_eq!(
            calls[1].1,
            "# Conversation so far\n\nUser: first\nAssistant: ok\n\nUser: second"
        );
    }

    #[tokio::test]
    async fn failed_completion_leaves_no_trace() {
        let (store, _dir) = test_store().await;
        let agent = ScriptedAgent::failing("upstream 529");
        let mut session = ChatSession::new();
        let (tx, _rx) = mpsc::channel(64);

        let err = session
            .respond("hello", &agent, &store, None, tx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upstream 529"));
        assert!(session.messages().is_empty());
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_does_not_fail_the_turn() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(
            sqlite_url(&dir.path().join("missing/dir/chat.db")),
            chrono_tz::UTC,
        );
        let agent = ScriptedAgent::replying("still here");
        let mut session = ChatSession::new();
        let (tx, _rx) = mpsc::channel(64);

        let response = session
            .respond("hello", &agent, &store, None, tx)
            .await
            .unwrap();
        assert_eq!(response, "still here");
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn reset_starts_a_new_conversation() {
        let mut session = ChatSession::new();
        let before = session.conversation_id();
        session.reset();
        assert_ne!(session.conversation_id(), before);
        assert!(session.messages().is_empty());
    }
}

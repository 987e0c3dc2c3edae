//! Session Coordination
//!
//! Binds a client-visible session id to the one entity it is currently
//! working on, together with the conversation used for follow-up turns.
//! Sessions are process-local by default; durable progress lives in the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{llm_client::ChatMessage, verification::VerificationSession};

pub type SessionId = String;

/// What a session is currently bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionMode {
    Learning {
        topic: String,
    },
    CodeAnalysis {
        project: String,
    },
    Curriculum {
        curriculum_id: i64,
        week_number: u32,
        topic: String,
    },
    Verification(VerificationSession),
}

impl SessionMode {
    pub fn name(&self) -> &'static str {
        match self {
            SessionMode::Learning { .. } => "learning",
            SessionMode::CodeAnalysis { .. } => "code_analysis",
            SessionMode::Curriculum { .. } => "curriculum",
            SessionMode::Verification(_) => "verification",
        }
    }

    /// The subject the tutor should talk about in this mode.
    pub fn topic(&self) -> &str {
        match self {
            SessionMode::Learning { topic } | SessionMode::Curriculum { topic, .. } => topic,
            SessionMode::CodeAnalysis { project } => project,
            SessionMode::Verification(run) => &run.agent.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub mode: SessionMode,
    pub history: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}

/// Storage for sessions. The default is a process-local map; a distributed
/// cache can be swapped in behind this trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<Session>;
    async fn set(&self, id: &str, session: Session);
    /// Returns whether a session was removed.
    async fn delete(&self, id: &str) -> bool;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn set(&self, id: &str, session: Session) {
        self.sessions.write().await.insert(id.to_string(), session);
    }

    async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }
}

/// The only entry point handlers use to read or change sessions.
#[derive(Clone)]
pub struct SessionCoordinator {
    store: Arc<dyn SessionStore>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::default()))
    }

    /// Binds `id` to `mode`, replacing whatever it was bound to before.
    ///
    /// The previous history is discarded, never merged.
    pub async fn bind(&self, id: &str, mode: SessionMode, history: Vec<ChatMessage>) -> Session {
        if let Some(previous) = self.store.get(id).await {
            debug!(session_id = %id, from = previous.mode.name(), to = mode.name(), "Rebinding session");
        }
        let session = Session {
            mode,
            history,
            updated_at: Utc::now(),
        };
        self.store.set(id, session.clone()).await;
        info!(session_id = %id, mode = session.mode.name(), "Session bound");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.store.get(id).await
    }

    /// Appends turns to an existing session's history. Returns `None` when
    /// the session does not exist.
    pub async fn append(&self, id: &str, turns: Vec<ChatMessage>) -> Option<Session> {
        let mut session = self.store.get(id).await?;
        session.history.extend(turns);
        session.updated_at = Utc::now();
        self.store.set(id, session.clone()).await;
        Some(session)
    }

    /// Replaces the verification run held by a verification session.
    /// Returns `false` if the session is missing or bound to another mode.
    pub async fn update_verification(&self, id: &str, run: VerificationSession) -> bool {
        match self.store.get(id).await {
            Some(mut session) if matches!(session.mode, SessionMode::Verification(_)) => {
                session.mode = SessionMode::Verification(run);
                session.updated_at = Utc::now();
                self.store.set(id, session).await;
                true
            }
            _ => false,
        }
    }

    pub async fn end(&self, id: &str) -> bool {
        self.store.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::{AgentDescriptor, StepPosition};

    fn learning(topic: &str) -> SessionMode {
        SessionMode::Learning {
            topic: topic.to_string(),
        }
    }

    fn run() -> VerificationSession {
        VerificationSession {
            agent: AgentDescriptor {
                name: "Digest".into(),
                pattern: "Router".into(),
                description: "Routes questions".into(),
            },
            position: StepPosition::Step(1),
            history: vec![],
        }
    }

    #[tokio::test]
    async fn test_bind_then_append() {
        let sessions = SessionCoordinator::in_memory();
        sessions
            .bind("s1", learning("Entropy"), vec![ChatMessage::assistant("map")])
            .await;

        let session = sessions
            .append("s1", vec![ChatMessage::user("why?"), ChatMessage::assistant("because")])
            .await
            .unwrap();
        assert_eq!(session.history.len(), 3);
        assert_eq!(session.mode.topic(), "Entropy");
    }

    #[tokio::test]
    async fn test_switching_mode_discards_history() {
        let sessions = SessionCoordinator::in_memory();
        sessions
            .bind("s1", learning("Entropy"), vec![ChatMessage::assistant("map")])
            .await;
        sessions.bind("s1", SessionMode::Verification(run()), vec![]).await;

        let session = sessions.get("s1").await.unwrap();
        assert_eq!(session.mode.name(), "verification");
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_append_to_missing_session_is_none() {
        let sessions = SessionCoordinator::in_memory();
        assert!(sessions.append("ghost", vec![]).await.is_none());
    }

    #[tokio::test]
    async fn test_update_verification_requires_verification_mode() {
        let sessions = SessionCoordinator::in_memory();
        sessions.bind("s1", learning("Entropy"), vec![]).await;
        assert!(!sessions.update_verification("s1", run()).await);

        sessions.bind("s2", SessionMode::Verification(run()), vec![]).await;
        let mut advanced = run();
        advanced.position = StepPosition::Step(2);
        assert!(sessions.update_verification("s2", advanced.clone()).await);
        assert_eq!(
            sessions.get("s2").await.unwrap().mode,
            SessionMode::Verification(advanced)
        );
    }

    #[tokio::test]
    async fn test_end_removes_session() {
        let sessions = SessionCoordinator::in_memory();
        sessions.bind("s1", learning("Entropy"), vec![]).await;
        assert!(sessions.end("s1").await);
        assert!(!sessions.end("s1").await);
        assert!(sessions.get("s1").await.is_none());
    }
}

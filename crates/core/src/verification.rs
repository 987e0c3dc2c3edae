//! Agent Verification Walkthrough
//!
//! A fixed seven-step Socratic review of one agent. The session only does the
//! index bookkeeping and history accumulation; every piece of step content is
//! produced by the text generator. A failed generation never moves the step.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::llm_client::{ChatMessage, ChatRole, GenerationError, TextGenerator};

pub const TOTAL_STEPS: u8 = 7;

/// How many trailing history entries feed the final summary.
const SUMMARY_HISTORY_WINDOW: usize = 20;

/// The subject under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub pattern: String,
    pub description: String,
}

/// Static template for one step. `{name}` and `{pattern}` are substituted.
#[derive(Debug, Clone, Copy)]
pub struct StepTemplate {
    pub number: u8,
    pub title: &'static str,
    question: &'static str,
    pub follow_up: &'static str,
    pub hint: &'static str,
}

impl StepTemplate {
    pub fn question_for(&self, agent: &AgentDescriptor) -> String {
        self.question
            .replace("{name}", &agent.name)
            .replace("{pattern}", &agent.pattern)
    }
}

pub const STEPS: [StepTemplate; TOTAL_STEPS as usize] = [
    StepTemplate {
        number: 1,
        title: "Component decomposition",
        question: "What are the core modules and components of the \"{name}\" agent? Explain the role of each.",
        follow_up: "Why did you split it this way? How else could it be decomposed?",
        hint: "Think about base model capability, tool selection and planning logic.",
    },
    StepTemplate {
        number: 2,
        title: "Success metrics",
        question: "How would you measure that the \"{name}\" agent worked successfully? Define at least three concrete metrics.",
        follow_up: "How do these metrics connect to the goal the agent serves?",
        hint: "Consider accuracy, latency, error rate and user satisfaction.",
    },
    StepTemplate {
        number: 3,
        title: "Code review checklist",
        question: "Review the code of the \"{name}\" agent:\n- Where is input validated?\n- How are errors handled?\n- Are secrets managed safely?",
        follow_up: "Did you find any weaknesses or improvements?",
        hint: "Check the OWASP Top 10, environment variable usage and error propagation.",
    },
    StepTemplate {
        number: 4,
        title: "Architecture pattern analysis",
        question: "\"{name}\" uses the \"{pattern}\" pattern.\n- Why was this pattern chosen?\n- Which alternatives (sequential, parallel, router, loop, hierarchical) exist?\n- What would the trade-offs of another pattern be?",
        follow_up: "Where is the bottleneck of the current pattern?",
        hint: "Compare against the common multi-agent orchestration patterns.",
    },
    StepTemplate {
        number: 5,
        title: "Dependency and fallback review",
        question: "List the external services the \"{name}\" agent depends on (APIs, databases, other agents):\n- What happens when each one fails?\n- Is there a fallback?\n- Are the timeouts appropriate?",
        follow_up: "Is there a single point of failure?",
        hint: "Consider circuit breakers, retries and graceful degradation.",
    },
    StepTemplate {
        number: 6,
        title: "Prompt quality review",
        question: "Evaluate the LLM prompts of the \"{name}\" agent:\n- Context: is there enough background?\n- Role: is the role clear?\n- Action: is the task specific?\n- Format: is the output format defined?\n- Tone: is the response style set?\n\nWhich elements are missing?",
        follow_up: "What would you add as a verification checklist?",
        hint: "If the agent has no prompt at all, ask why.",
    },
    StepTemplate {
        number: 7,
        title: "Improvement roadmap",
        question: "Based on the analysis so far, choose the top three improvements for the \"{name}\" agent.\nFor each give:\n- The problem\n- The fix\n- The expected effect\n- The difficulty (easy / medium / hard)",
        follow_up: "What is the one thing that must happen next quarter?",
        hint: "Prioritise with an impact versus technical-debt matrix.",
    },
];

/// Returns the template for step `number`, or `None` outside `1..=7`.
pub fn step(number: u8) -> Option<&'static StepTemplate> {
    number
        .checked_sub(1)
        .and_then(|index| STEPS.get(usize::from(index)))
}

/// Where a verification run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum StepPosition {
    Step(u8),
    Complete,
}

impl StepPosition {
    /// The position reached by advancing from `self`.
    pub fn next(self) -> Result<StepPosition, VerificationError> {
        match self {
            StepPosition::Step(n) if step(n).is_none() => {
                Err(VerificationError::StepOutOfRange(n.into()))
            }
            StepPosition::Step(n) if n < TOTAL_STEPS => Ok(StepPosition::Step(n + 1)),
            StepPosition::Step(_) => Ok(StepPosition::Complete),
            StepPosition::Complete => Err(VerificationError::AlreadyComplete),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("verification is already complete")]
    AlreadyComplete,
    #[error("step {0} is outside 1..=7")]
    StepOutOfRange(i64),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Content produced for entering a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContent {
    pub step: u8,
    pub total_steps: u8,
    pub title: String,
    pub response: String,
    pub hint: String,
    pub follow_up: String,
}

/// Result of an `advance` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advance {
    Step(StepContent),
    Complete { summary: String },
}

/// An in-memory verification run over one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSession {
    pub agent: AgentDescriptor,
    pub position: StepPosition,
    pub history: Vec<ChatMessage>,
}

impl VerificationSession {
    /// Opens a run at step 1 and generates its introduction.
    #[instrument(skip_all, fields(agent = %agent.name))]
    pub async fn start(
        agent: AgentDescriptor,
        llm: &dyn TextGenerator,
        instructions: &str,
    ) -> Result<(Self, StepContent), VerificationError> {
        let template = &STEPS[0];
        let prompt = format!(
            "[Agent under review]\n- Name: {}\n- Pattern: {}\n- Description: {}\n\n\
             [Step 1: {}]\n{}\n\n\
             The user built this agent. Begin the verification with Socratic questions \
             so the user analyses it on their own.",
            agent.name,
            agent.pattern,
            agent.description,
            template.title,
            template.question_for(&agent),
        );
        let response = llm.generate(&prompt, instructions).await?;
        info!("Verification started");

        let session = Self {
            agent,
            position: StepPosition::Step(1),
            history: vec![ChatMessage::assistant(response.clone())],
        };
        Ok((session, content(template, response)))
    }

    pub fn current_step(&self) -> Option<u8> {
        match self.position {
            StepPosition::Step(n) => Some(n),
            StepPosition::Complete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.position == StepPosition::Complete
    }

    /// Responds to the user's answer within the current step.
    pub async fn respond(
        &mut self,
        answer: &str,
        llm: &dyn TextGenerator,
        instructions: &str,
    ) -> Result<String, VerificationError> {
        let number = self.current_step().ok_or(VerificationError::AlreadyComplete)?;
        let template = step(number).ok_or(VerificationError::StepOutOfRange(number.into()))?;
        let prompt = format!(
            "[Agent under review: {} ({})]\n\n\
             [Current step: {number}/{TOTAL_STEPS} - {}]\n\n\
             [Conversation so far]\n{}\n\n\
             [User answer]\n{answer}\n\n\
             Respond Socratically:\n\
             1. Acknowledge what is good in the answer\n\
             2. Ask a follow-up about what is missing\n\
             3. Give a hint if needed: \"{}\"\n\
             4. If the answer is complete, ask whether to move on to the next step",
            self.agent.name,
            self.agent.pattern,
            template.title,
            transcript(&self.history),
            template.hint,
        );
        let response = llm.generate(&prompt, instructions).await?;
        self.history.push(ChatMessage::user(answer));
        self.history.push(ChatMessage::assistant(response.clone()));
        Ok(response)
    }

    /// Moves to the next step, or past step 7 into `Complete` with a summary.
    #[instrument(skip_all, fields(agent = %self.agent.name, from = ?self.position))]
    pub async fn advance(
        &mut self,
        llm: &dyn TextGenerator,
        instructions: &str,
    ) -> Result<Advance, VerificationError> {
        match self.position.next()? {
            StepPosition::Step(next) => {
                let content = self.enter_step(next, llm, instructions).await?;
                Ok(Advance::Step(content))
            }
            StepPosition::Complete => {
                let summary = self.summarize(llm, instructions).await?;
                self.history.push(ChatMessage::assistant(summary.clone()));
                self.position = StepPosition::Complete;
                info!("Verification complete");
                Ok(Advance::Complete { summary })
            }
        }
    }

    /// Jumps directly to `target` without touching history.
    pub async fn jump(
        &mut self,
        target: i64,
        llm: &dyn TextGenerator,
        instructions: &str,
    ) -> Result<StepContent, VerificationError> {
        if self.is_complete() {
            return Err(VerificationError::AlreadyComplete);
        }
        let number = u8::try_from(target)
            .ok()
            .filter(|n| step(*n).is_some())
            .ok_or(VerificationError::StepOutOfRange(target))?;
        self.enter_step(number, llm, instructions).await
    }

    async fn enter_step(
        &mut self,
        number: u8,
        llm: &dyn TextGenerator,
        instructions: &str,
    ) -> Result<StepContent, VerificationError> {
        let template = step(number).ok_or(VerificationError::StepOutOfRange(number.into()))?;
        let prompt = format!(
            "[Agent under review: {}]\n\n[Moving to step {number}: {}]\n\n{}\n\n\
             Open this step with a Socratic question.",
            self.agent.name,
            template.title,
            template.question_for(&self.agent),
        );
        let response = llm.generate(&prompt, instructions).await?;
        self.position = StepPosition::Step(number);
        self.history.push(ChatMessage::assistant(response.clone()));
        info!(step = number, "Entered verification step");
        Ok(content(template, response))
    }

    async fn summarize(
        &self,
        llm: &dyn TextGenerator,
        instructions: &str,
    ) -> Result<String, VerificationError> {
        let start = self.history.len().saturating_sub(SUMMARY_HISTORY_WINDOW);
        let prompt = format!(
            "[Verification complete: {}]\n\n\
             All seven verification steps are done. Summarise the whole conversation.\n\n\
             [Conversation]\n{}\n\n\
             Include:\n\
             1. Three strengths of this agent\n\
             2. Three areas that need improvement\n\
             3. One quick win that can be applied immediately\n\
             4. A long-term improvement roadmap\n\n\
             Close by recognising the user's learning journey.",
            self.agent.name,
            transcript(&self.history[start..]),
        );
        Ok(llm.generate(&prompt, instructions).await?)
    }
}

fn content(template: &StepTemplate, response: String) -> StepContent {
    StepContent {
        step: template.number,
        total_steps: TOTAL_STEPS,
        title: template.title.to_string(),
        response,
        hint: template.hint.to_string(),
        follow_up: template.follow_up.to_string(),
    }
}

fn transcript(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockTextGenerator;

    fn agent() -> AgentDescriptor {
        AgentDescriptor {
            name: "Stock Digest".into(),
            pattern: "Sequential".into(),
            description: "Summarises market news every morning".into(),
        }
    }

    fn echo_llm() -> MockTextGenerator {
        let mut llm = MockTextGenerator::new();
        llm.expect_generate()
            .returning(|prompt, _| Ok(format!("reply to: {}", prompt.len())));
        llm
    }

    fn failing_llm() -> MockTextGenerator {
        let mut llm = MockTextGenerator::new();
        llm.expect_generate()
            .returning(|_, _| Err(GenerationError::Provider("503".into())));
        llm
    }

    fn session_at(position: StepPosition) -> VerificationSession {
        VerificationSession {
            agent: agent(),
            position,
            history: vec![],
        }
    }

    #[test]
    fn test_catalog_is_ordered_one_to_seven() {
        for (index, template) in STEPS.iter().enumerate() {
            assert_eq!(usize::from(template.number), index + 1);
        }
        assert!(step(0).is_none());
        assert!(step(8).is_none());
        assert_eq!(step(4).unwrap().title, "Architecture pattern analysis");
    }

    #[test]
    fn test_question_substitutes_agent_fields() {
        let question = step(4).unwrap().question_for(&agent());
        assert!(question.contains("\"Stock Digest\""));
        assert!(question.contains("\"Sequential\""));
        assert!(!question.contains('{'));
    }

    #[test]
    fn test_next_is_monotonic_by_one_then_complete() {
        let mut position = StepPosition::Step(1);
        for expected in 2..=TOTAL_STEPS {
            position = position.next().unwrap();
            assert_eq!(position, StepPosition::Step(expected));
        }
        assert_eq!(position.next().unwrap(), StepPosition::Complete);
        assert_eq!(
            StepPosition::Complete.next(),
            Err(VerificationError::AlreadyComplete)
        );
    }

    #[tokio::test]
    async fn test_start_opens_step_one() {
        let llm = echo_llm();
        let (session, content) = VerificationSession::start(agent(), &llm, "mentor")
            .await
            .unwrap();
        assert_eq!(session.position, StepPosition::Step(1));
        assert_eq!(session.history.len(), 1);
        assert_eq!(content.step, 1);
        assert_eq!(content.total_steps, 7);
        assert_eq!(content.title, "Component decomposition");
    }

    #[tokio::test]
    async fn test_advance_walks_to_complete_with_one_summary() {
        let mut llm = MockTextGenerator::new();
        llm.expect_generate()
            .withf(|prompt, _| !prompt.starts_with("[Verification complete"))
            .times(6)
            .returning(|_, _| Ok("step".into()));
        llm.expect_generate()
            .withf(|prompt, _| prompt.starts_with("[Verification complete"))
            .times(1)
            .returning(|_, _| Ok("summary".into()));

        let mut session = session_at(StepPosition::Step(1));
        for expected in 2..=TOTAL_STEPS {
            match session.advance(&llm, "mentor").await.unwrap() {
                Advance::Step(content) => assert_eq!(content.step, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
        let last = session.advance(&llm, "mentor").await.unwrap();
        assert_eq!(
            last,
            Advance::Complete {
                summary: "summary".into()
            }
        );
        assert!(session.is_complete());

        let again = session.advance(&llm, "mentor").await;
        assert_eq!(again, Err(VerificationError::AlreadyComplete));
    }

    #[tokio::test]
    async fn test_failed_generation_does_not_move_step() {
        let llm = failing_llm();
        let mut session = session_at(StepPosition::Step(3));

        let err = session.advance(&llm, "mentor").await.unwrap_err();
        assert!(matches!(err, VerificationError::Generation(_)));
        assert_eq!(session.position, StepPosition::Step(3));
        assert!(session.history.is_empty());

        let mut last = session_at(StepPosition::Step(7));
        assert!(last.advance(&llm, "mentor").await.is_err());
        assert_eq!(last.position, StepPosition::Step(7));
    }

    #[tokio::test]
    async fn test_jump_keeps_history_and_rejects_out_of_range() {
        let llm = echo_llm();
        let mut session = session_at(StepPosition::Step(5));
        session.history.push(ChatMessage::user("earlier answer"));

        let content = session.jump(2, &llm, "mentor").await.unwrap();
        assert_eq!(content.step, 2);
        assert_eq!(session.position, StepPosition::Step(2));
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].content, "earlier answer");

        for target in [0, 8, -3, 300] {
            assert_eq!(
                session.jump(target, &llm, "mentor").await,
                Err(VerificationError::StepOutOfRange(target))
            );
        }
        assert_eq!(session.position, StepPosition::Step(2));
    }

    #[tokio::test]
    async fn test_jump_after_complete_is_rejected() {
        let llm = echo_llm();
        let mut session = session_at(StepPosition::Complete);
        assert_eq!(
            session.jump(1, &llm, "mentor").await,
            Err(VerificationError::AlreadyComplete)
        );
    }

    #[tokio::test]
    async fn test_respond_appends_both_turns() {
        let llm = echo_llm();
        let mut session = session_at(StepPosition::Step(2));
        session
            .respond("Latency under two seconds", &llm, "mentor")
            .await
            .unwrap();
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0], ChatMessage::user("Latency under two seconds"));
        assert_eq!(session.position, StepPosition::Step(2));

        let failing = failing_llm();
        assert!(session.respond("more", &failing, "mentor").await.is_err());
        assert_eq!(session.history.len(), 2);
    }

    #[tokio::test]
    async fn test_stored_position_outside_catalog_is_rejected() {
        let llm = MockTextGenerator::new();
        for raw in [0, 9] {
            let position: StepPosition =
                serde_json::from_value(serde_json::json!({"state": "step", "step": raw})).unwrap();
            let mut session = session_at(position);

            assert_eq!(
                session.respond("answer", &llm, "mentor").await,
                Err(VerificationError::StepOutOfRange(raw))
            );
            assert_eq!(
                session.advance(&llm, "mentor").await,
                Err(VerificationError::StepOutOfRange(raw))
            );
            assert_eq!(session.position, position);
            assert!(session.history.is_empty());
        }
    }

    #[test]
    fn test_position_serialization() {
        assert_eq!(
            serde_json::to_value(StepPosition::Step(3)).unwrap(),
            serde_json::json!({"state": "step", "step": 3})
        );
        assert_eq!(
            serde_json::to_value(StepPosition::Complete).unwrap(),
            serde_json::json!({"state": "complete"})
        );
    }
}

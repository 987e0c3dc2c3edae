//! Top-Down Learning Pipeline
//!
//! The four-stage introduction to a topic (first-principle map, Socratic
//! question, resources, practice mission), the tutor follow-up turn and the
//! end-of-session quiz. Each stage is one call to the text generator.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    llm_client::{ChatMessage, GenerationError, TextGenerator},
    prompts::Prompts,
};

/// Longest slice of any one history entry that is fed to the quiz prompt.
const QUIZ_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{0} must not be blank")]
    Blank(&'static str),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Everything produced when a topic is first opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPack {
    pub first_principle: String,
    pub question: String,
    pub resources: String,
    pub mission: String,
}

impl LearningPack {
    /// The turns a tutor conversation starts from.
    pub fn seed_history(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::assistant(self.first_principle.clone()),
            ChatMessage::assistant(self.question.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: usize,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Parses a model reply. Unparseable replies become an empty quiz and
    /// questions whose answer index is out of range are dropped.
    pub fn from_reply(reply: &str) -> Self {
        let cleaned = reply.replace("```json", "").replace("```", "");
        match serde_json::from_str::<Quiz>(cleaned.trim()) {
            Ok(quiz) => Quiz {
                questions: quiz
                    .questions
                    .into_iter()
                    .filter(|q| q.answer < q.options.len())
                    .collect(),
            },
            Err(e) => {
                warn!(error = %e, "Quiz reply was not valid JSON");
                Quiz::default()
            }
        }
    }
}

pub struct LearningPipeline {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<Prompts>,
}

impl LearningPipeline {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }

    /// Runs the four introduction stages in order. Later stages build on the
    /// first-principle map; any failure aborts the whole pack.
    #[instrument(skip(self))]
    pub async fn start(&self, topic: &str) -> Result<LearningPack, PipelineError> {
        let topic = non_blank(topic, "topic")?;

        info!("Extracting first principle");
        let first_principle = self
            .llm
            .generate(
                &format!(
                    "Topic: \"{topic}\"\n\nBuild the Mega Map for this topic.\n\
                     - What is the highest-level abstract principle?\n\
                     - Draw the whole map as [Input -> Core Logic -> Output/Value].\n\
                     - What fragmentation happens if details pile up without this map?"
                ),
                &self.prompts.abstractor,
            )
            .await?;

        info!("Posing Socratic question");
        let question = self
            .llm
            .generate(
                &format!(
                    "Topic: \"{topic}\"\nMega Map: {first_principle}\n\n\
                     Ask the Socratic question that pierces the core of this principle."
                ),
                &self.prompts.socratic,
            )
            .await?;

        info!("Curating resources");
        let resources = self
            .llm
            .generate(
                &format!("Topic: \"{topic}\"\nContext: {first_principle}\n\nRecommend resources."),
                &self.prompts.curator,
            )
            .await?;

        info!("Designing practice mission");
        let mission = self
            .llm
            .generate(
                &format!(
                    "Topic: \"{topic}\"\nCore principle: {first_principle}\n\nDesign one practice mission."
                ),
                &self.prompts.implementor,
            )
            .await?;

        Ok(LearningPack {
            first_principle,
            question,
            resources,
            mission,
        })
    }

    /// Curates further resources for a free-form query.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<String, PipelineError> {
        let query = non_blank(query, "query")?;
        Ok(self
            .llm
            .generate(
                &format!("Topic: \"{query}\"\n\nRecommend resources."),
                &self.prompts.curator,
            )
            .await?)
    }

    /// Produces the tutor's next turn for `message` on `topic`.
    pub async fn tutor_reply(
        &self,
        topic: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, PipelineError> {
        let message = non_blank(message, "message")?;
        let instructions = format!("{}\n\nCurrent topic: {topic}", self.prompts.tutor);
        Ok(self.llm.chat(history, message, &instructions).await?)
    }

    /// Generates a three-question quiz over what was studied.
    #[instrument(skip(self, history), fields(turns = history.len()))]
    pub async fn quiz(&self, topic: &str, history: &[ChatMessage]) -> Result<Quiz, PipelineError> {
        let topic = non_blank(topic, "topic")?;
        let notes = history
            .iter()
            .map(|m| {
                let excerpt: String = m.content.chars().take(QUIZ_EXCERPT_CHARS).collect();
                format!("{:?}: {excerpt}", m.role)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let reply = self
            .llm
            .generate(
                &format!(
                    "Topic: {topic}\n\nStudy notes:\n{notes}\n\n\
                     Write three quiz questions in the JSON format from these notes."
                ),
                &self.prompts.quiz,
            )
            .await?;
        Ok(Quiz::from_reply(&reply))
    }
}

fn non_blank<'a>(value: &'a str, field: &'static str) -> Result<&'a str, PipelineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PipelineError::Blank(field))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockTextGenerator;
    use mockall::Sequence;

    fn pipeline(llm: MockTextGenerator) -> LearningPipeline {
        LearningPipeline::new(Arc::new(llm), Arc::new(Prompts::default()))
    }

    #[tokio::test]
    async fn test_start_runs_four_stages_in_order() {
        let mut llm = MockTextGenerator::new();
        let mut seq = Sequence::new();
        for reply in ["map", "question", "resources", "mission"] {
            llm.expect_generate()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_, _| Ok(reply.to_string()));
        }

        let pack = pipeline(llm).start("Compilers").await.unwrap();
        assert_eq!(pack.first_principle, "map");
        assert_eq!(pack.question, "question");
        assert_eq!(pack.resources, "resources");
        assert_eq!(pack.mission, "mission");
        assert_eq!(
            pack.seed_history(),
            vec![ChatMessage::assistant("map"), ChatMessage::assistant("question")]
        );
    }

    #[tokio::test]
    async fn test_start_aborts_on_first_failure() {
        let mut llm = MockTextGenerator::new();
        llm.expect_generate()
            .times(1)
            .returning(|_, _| Err(GenerationError::Timeout(std::time::Duration::from_secs(1))));

        let err = pipeline(llm).start("Compilers").await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(GenerationError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_blank_inputs_never_reach_the_generator() {
        let llm = MockTextGenerator::new();
        let pipeline = pipeline(llm);
        assert_eq!(pipeline.start("  ").await, Err(PipelineError::Blank("topic")));
        assert_eq!(
            pipeline.tutor_reply("Compilers", &[], "").await,
            Err(PipelineError::Blank("message"))
        );
    }

    #[tokio::test]
    async fn test_tutor_reply_passes_history() {
        let mut llm = MockTextGenerator::new();
        llm.expect_chat()
            .withf(|history, message, instructions| {
                history.len() == 1 && message.to_string() == "why parse?" && instructions.contains("Compilers")
            })
            .returning(|_, _, _| Ok("Because text has structure.".into()));

        let reply = pipeline(llm)
            .tutor_reply("Compilers", &[ChatMessage::assistant("map")], "why parse?")
            .await
            .unwrap();
        assert_eq!(reply, "Because text has structure.");
    }

    #[tokio::test]
    async fn test_search_asks_the_curator() {
        let curator = Prompts::default().curator;
        let mut llm = MockTextGenerator::new();
        llm.expect_generate()
            .withf(move |prompt, instructions| {
                prompt.contains("\"lock-free queues\"") && instructions.to_string() == curator
            })
            .times(1)
            .returning(|_, _| Ok("1. The Art of Multiprocessor Programming".into()));

        let resources = pipeline(llm).search("  lock-free queues ").await.unwrap();
        assert_eq!(resources, "1. The Art of Multiprocessor Programming");
    }

    #[tokio::test]
    async fn test_blank_search_never_reaches_the_generator() {
        let llm = MockTextGenerator::new();
        assert_eq!(
            pipeline(llm).search("\n ").await,
            Err(PipelineError::Blank("query"))
        );
    }

    #[test]
    fn test_quiz_from_reply_drops_invalid_questions() {
        let reply = r#"```json
{"questions": [
  {"question": "Q1", "options": ["a", "b", "c", "d"], "answer": 2, "explanation": "c"},
  {"question": "Q2", "options": ["a", "b"], "answer": 5}
]}
```"#;
        let quiz = Quiz::from_reply(reply);
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].answer, 2);
    }

    #[test]
    fn test_quiz_from_garbage_is_empty() {
        assert_eq!(Quiz::from_reply("Sorry, I cannot do that."), Quiz::default());
    }
}

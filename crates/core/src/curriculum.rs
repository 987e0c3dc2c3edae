//! Curriculum Generation and Validation
//!
//! A curriculum is a topic decomposed into dependency-ordered weeks. The text
//! generator that proposes the decomposition is unreliable, so its output is
//! treated as untrusted JSON: it only becomes a `ValidatedCurriculum` once the
//! week set forms a well-numbered DAG.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    code_patterns::{self, PatternLevel},
    llm_client::{GenerationError, TextGenerator},
    prompts::Prompts,
    week::{self, NewWeek, Week},
};

/// Reasons a generated curriculum is rejected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedCurriculum {
    #[error("generator output is not valid curriculum JSON: {0}")]
    Unparseable(String),
    #[error("curriculum topic must not be blank")]
    BlankTopic,
    #[error("curriculum has no weeks")]
    NoWeeks,
    #[error("week number {0} is out of range")]
    InvalidWeekNumber(i64),
    #[error("week {0} appears more than once")]
    DuplicateWeek(u32),
    #[error("week {missing} is missing from a {total_weeks}-week curriculum")]
    MissingWeek { missing: u32, total_weeks: u32 },
    #[error("week 1 must not have prerequisites")]
    FirstWeekHasPrerequisites,
    #[error("week {week} lists prerequisite {prerequisite}, which is not an earlier week")]
    ForwardReference { week: u32, prerequisite: i64 },
    #[error("week {week} lists prerequisite {prerequisite} more than once")]
    DuplicatePrerequisite { week: u32, prerequisite: u32 },
    #[error("week {week} has a blank {field}")]
    BlankField { week: u32, field: &'static str },
}

/// Which flavour of curriculum to ask the generator for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurriculumVariant {
    #[default]
    Standard,
    /// Grounded in the static catalog of code patterns, beginner to advanced.
    FromCodePatterns,
}

/// The raw shape the generator is asked to produce.
#[derive(Debug, Clone, Deserialize)]
struct GeneratedCurriculum {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    weeks: Vec<GeneratedWeek>,
    #[serde(default, alias = "diagram")]
    mermaid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeneratedWeek {
    week: i64,
    title: String,
    #[serde(default)]
    objectives: Vec<String>,
    #[serde(default)]
    concepts: Vec<String>,
    #[serde(default)]
    prerequisites: Vec<i64>,
    topic_for_learning: String,
}

impl GeneratedWeek {
    fn into_new_week(self) -> Result<NewWeek, MalformedCurriculum> {
        let week_number = u32::try_from(self.week)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(MalformedCurriculum::InvalidWeekNumber(self.week))?;

        if self.title.trim().is_empty() {
            return Err(MalformedCurriculum::BlankField {
                week: week_number,
                field: "title",
            });
        }
        if self.topic_for_learning.trim().is_empty() {
            return Err(MalformedCurriculum::BlankField {
                week: week_number,
                field: "topic_for_learning",
            });
        }

        let prerequisites = self
            .prerequisites
            .into_iter()
            .map(|p| {
                u32::try_from(p)
                    .ok()
                    .filter(|p| *p >= 1 && *p < week_number)
                    .ok_or(MalformedCurriculum::ForwardReference {
                        week: week_number,
                        prerequisite: p,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewWeek {
            week_number,
            title: self.title,
            objectives: self.objectives,
            concepts: self.concepts,
            prerequisites,
            topic_for_learning: self.topic_for_learning,
        })
    }
}

/// Generator output that has passed every structural check and is safe to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCurriculum {
    topic: String,
    title: String,
    description: String,
    structure: Value,
    diagram: Option<String>,
    weeks: Vec<NewWeek>,
}

impl ValidatedCurriculum {
    /// Validates untrusted generator output for `topic`.
    ///
    /// Weeks are returned sorted by week number; the original payload is kept
    /// verbatim as the curriculum's structure.
    pub fn from_generator_output(topic: &str, output: Value) -> Result<Self, MalformedCurriculum> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(MalformedCurriculum::BlankTopic);
        }

        let generated: GeneratedCurriculum = serde_json::from_value(output.clone())
            .map_err(|e| MalformedCurriculum::Unparseable(e.to_string()))?;

        let mut weeks = generated
            .weeks
            .into_iter()
            .map(GeneratedWeek::into_new_week)
            .collect::<Result<Vec<_>, _>>()?;
        week::validate_week_set(&weeks)?;
        weeks.sort_by_key(|w| w.week_number);

        Ok(Self {
            topic: topic.to_string(),
            title: generated.title,
            description: generated.description,
            structure: output,
            diagram: generated.mermaid.filter(|d| !d.trim().is_empty()),
            weeks,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn structure(&self) -> &Value {
        &self.structure
    }

    pub fn diagram(&self) -> Option<&str> {
        self.diagram.as_deref()
    }

    pub fn weeks(&self) -> &[NewWeek] {
        &self.weeks
    }

    pub fn total_weeks(&self) -> u32 {
        self.weeks.len() as u32
    }
}

/// A persisted curriculum with all of its weeks, ordered by week number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curriculum {
    pub id: i64,
    pub topic: String,
    pub structure: Value,
    pub diagram: Option<String>,
    pub total_weeks: u32,
    pub created_at: DateTime<Utc>,
    pub weeks: Vec<Week>,
}

impl Curriculum {
    pub fn week(&self, week_number: u32) -> Option<&Week> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }

    pub fn completed_weeks(&self) -> u32 {
        self.weeks.iter().filter(|w| w.is_completed()).count() as u32
    }
}

/// The list view of a curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumSummary {
    pub id: i64,
    pub topic: String,
    pub total_weeks: u32,
    pub completed_weeks: u32,
    pub created_at: DateTime<Utc>,
}

/// Errors from asking a generator for a curriculum.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Malformed(#[from] MalformedCurriculum),
}

/// Defines the contract for any service that can propose a curriculum.
///
/// The returned JSON is untrusted; callers must pass it through
/// `ValidatedCurriculum::from_generator_output` before persisting it.
#[async_trait]
pub trait CurriculumGenerator: Send + Sync {
    async fn compose(&self, topic: &str, variant: CurriculumVariant) -> Result<Value, ComposeError>;
}

/// Extracts the outermost JSON object from a model reply, tolerating
/// Markdown code fences and surrounding prose.
pub fn parse_generator_reply(reply: &str) -> Result<Value, MalformedCurriculum> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    let (start, end) = cleaned
        .find('{')
        .zip(cleaned.rfind('}'))
        .filter(|(start, end)| start < end)
        .ok_or_else(|| MalformedCurriculum::Unparseable("no JSON object in reply".into()))?;
    serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| MalformedCurriculum::Unparseable(e.to_string()))
}

const OUTPUT_FORMAT: &str = r#"{
  "title": "Curriculum title",
  "description": "One-line description",
  "weeks": [
    {
      "week": 1,
      "title": "Week title",
      "objectives": ["Objective 1", "Objective 2"],
      "concepts": ["Concept 1", "Concept 2"],
      "prerequisites": [],
      "topic_for_learning": "The concrete topic this week explores"
    }
  ],
  "mermaid": "graph TD\n  W1[Week 1: title] --> W2[Week 2: title]"
}"#;

const REQUIREMENTS: &str = "- Week 1 has an empty prerequisites array\n\
- Every later week lists the numbers of earlier weeks it depends on in prerequisites\n\
- topic_for_learning is a concrete sentence used to seed a Socratic learning session\n\
- mermaid expresses the dependencies between weeks as graph TD";

/// Builds the user prompt sent to the text generator for `topic`.
pub fn build_compose_prompt(topic: &str, variant: CurriculumVariant) -> String {
    match variant {
        CurriculumVariant::Standard => format!(
            "Design a learning curriculum for the topic \"{topic}\".\n\n\
             Output only JSON with this structure:\n{OUTPUT_FORMAT}\n\n\
             Requirements:\n- 4 to 8 weeks\n{REQUIREMENTS}"
        ),
        CurriculumVariant::FromCodePatterns => {
            let section = |level: PatternLevel| {
                code_patterns::by_level(level)
                    .map(|p| format!("### {}\n{}\nSource: {}", p.name, p.description, p.source))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            };
            format!(
                "Design a code-based learning curriculum for the topic \"{topic}\".\n\n\
                 The learner has implemented the following patterns. Build a beginner to advanced path from them.\n\n\
                 ## Beginner patterns (weeks 1-3)\n{}\n\n\
                 ## Intermediate patterns (weeks 4-5)\n{}\n\n\
                 ## Advanced patterns (weeks 6-8)\n{}\n\n\
                 Output only JSON with this structure:\n{OUTPUT_FORMAT}\n\n\
                 Requirements:\n- 6 to 8 weeks\n\
                 - Each week's objectives name the code pattern it covers\n\
                 - topic_for_learning asks why the pattern is needed\n{REQUIREMENTS}",
                section(PatternLevel::Beginner),
                section(PatternLevel::Intermediate),
                section(PatternLevel::Advanced),
            )
        }
    }
}

/// A `CurriculumGenerator` backed by a text-generation service.
pub struct LlmCurriculumGenerator {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<Prompts>,
}

impl LlmCurriculumGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl CurriculumGenerator for LlmCurriculumGenerator {
    async fn compose(&self, topic: &str, variant: CurriculumVariant) -> Result<Value, ComposeError> {
        let instructions = match variant {
            CurriculumVariant::Standard => &self.prompts.curriculum,
            CurriculumVariant::FromCodePatterns => &self.prompts.curriculum_code,
        };
        info!(%topic, ?variant, "Composing curriculum");
        let reply = self
            .llm
            .generate(&build_compose_prompt(topic, variant), instructions)
            .await?;
        debug!(reply_len = reply.len(), "Curriculum reply received");
        Ok(parse_generator_reply(&reply)?)
    }
}

/// A deterministic `CurriculumGenerator` for development and tests.
///
/// Produces a three-week chain where each week depends on every earlier week.
pub struct MockCurriculumGenerator;

#[async_trait]
impl CurriculumGenerator for MockCurriculumGenerator {
    async fn compose(&self, topic: &str, _variant: CurriculumVariant) -> Result<Value, ComposeError> {
        Ok(serde_json::json!({
            "title": format!("{topic} from first principles"),
            "description": format!("A three-week path through {topic}"),
            "weeks": [
                {
                    "week": 1,
                    "title": format!("Why {topic} exists"),
                    "objectives": ["Name the problem it solves"],
                    "concepts": ["First principles"],
                    "prerequisites": [],
                    "topic_for_learning": format!("The fundamental problem behind {topic}")
                },
                {
                    "week": 2,
                    "title": "Core mechanisms",
                    "objectives": ["Explain the core mechanism"],
                    "concepts": ["Mechanism"],
                    "prerequisites": [1],
                    "topic_for_learning": format!("How {topic} works inside")
                },
                {
                    "week": 3,
                    "title": "Applying it",
                    "objectives": ["Build something small"],
                    "concepts": ["Practice"],
                    "prerequisites": [1, 2],
                    "topic_for_learning": format!("Using {topic} in a real project")
                }
            ],
            "mermaid": "graph TD\n  W1 --> W2\n  W1 --> W3\n  W2 --> W3"
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockTextGenerator;
    use serde_json::json;

    fn databases() -> Value {
        json!({
            "title": "Databases",
            "description": "Storage from the ground up",
            "weeks": [
                {"week": 2, "title": "Indexes", "objectives": ["B-trees"], "concepts": ["Index"],
                 "prerequisites": [1], "topic_for_learning": "Why indexes exist"},
                {"week": 1, "title": "Storage", "objectives": ["Pages"], "concepts": ["Page"],
                 "prerequisites": [], "topic_for_learning": "How data hits disk"},
                {"week": 3, "title": "Transactions", "objectives": ["ACID"], "concepts": ["WAL"],
                 "prerequisites": [1, 2], "topic_for_learning": "Why transactions matter"}
            ],
            "mermaid": "graph TD\n W1 --> W2"
        })
    }

    #[test]
    fn test_validated_curriculum_sorts_weeks_and_keeps_structure() {
        let output = databases();
        let validated = ValidatedCurriculum::from_generator_output("Databases", output.clone())
            .expect("valid curriculum");

        assert_eq!(validated.total_weeks(), 3);
        let numbers: Vec<u32> = validated.weeks().iter().map(|w| w.week_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(validated.weeks()[2].prerequisites, vec![1, 2]);
        assert_eq!(validated.structure(), &output);
        assert_eq!(validated.diagram(), Some("graph TD\n W1 --> W2"));
        assert_eq!(validated.title(), "Databases");
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let output = json!({
            "weeks": [
                {"week": 1, "title": "A", "prerequisites": [], "topic_for_learning": "a"},
                {"week": 2, "title": "B", "prerequisites": [3], "topic_for_learning": "b"},
                {"week": 3, "title": "C", "prerequisites": [1], "topic_for_learning": "c"}
            ]
        });
        assert_eq!(
            ValidatedCurriculum::from_generator_output("Databases", output),
            Err(MalformedCurriculum::ForwardReference {
                week: 2,
                prerequisite: 3
            })
        );
    }

    #[test]
    fn test_negative_prerequisite_is_rejected() {
        let output = json!({
            "weeks": [
                {"week": 1, "title": "A", "topic_for_learning": "a"},
                {"week": 2, "title": "B", "prerequisites": [-1], "topic_for_learning": "b"}
            ]
        });
        assert!(matches!(
            ValidatedCurriculum::from_generator_output("T", output),
            Err(MalformedCurriculum::ForwardReference {
                week: 2,
                prerequisite: -1
            })
        ));
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let output = json!({
            "weeks": [{"week": 1, "title": "Only", "topic_for_learning": "only"}],
            "diagram": "graph TD"
        });
        let validated = ValidatedCurriculum::from_generator_output("T", output).unwrap();
        assert!(validated.weeks()[0].objectives.is_empty());
        assert!(validated.weeks()[0].prerequisites.is_empty());
        assert_eq!(validated.diagram(), Some("graph TD"));
    }

    #[test]
    fn test_wrongly_typed_payload_is_unparseable() {
        let output = json!({"weeks": [{"week": "one", "title": "A", "topic_for_learning": "a"}]});
        assert!(matches!(
            ValidatedCurriculum::from_generator_output("T", output),
            Err(MalformedCurriculum::Unparseable(_))
        ));
        assert!(matches!(
            ValidatedCurriculum::from_generator_output("T", json!([1, 2, 3])),
            Err(MalformedCurriculum::Unparseable(_))
        ));
    }

    #[test]
    fn test_blank_topic_and_fields_are_rejected() {
        assert_eq!(
            ValidatedCurriculum::from_generator_output("  ", databases()),
            Err(MalformedCurriculum::BlankTopic)
        );

        let output = json!({"weeks": [{"week": 1, "title": " ", "topic_for_learning": "a"}]});
        assert_eq!(
            ValidatedCurriculum::from_generator_output("T", output),
            Err(MalformedCurriculum::BlankField {
                week: 1,
                field: "title"
            })
        );
    }

    #[test]
    fn test_zero_week_number_is_rejected() {
        let output = json!({"weeks": [{"week": 0, "title": "A", "topic_for_learning": "a"}]});
        assert_eq!(
            ValidatedCurriculum::from_generator_output("T", output),
            Err(MalformedCurriculum::InvalidWeekNumber(0))
        );
    }

    #[test]
    fn test_parse_generator_reply_strips_fences() {
        let reply = "Here you go:\n```json\n{\"weeks\": []}\n```\nEnjoy!";
        assert_eq!(parse_generator_reply(reply).unwrap(), json!({"weeks": []}));
        assert!(parse_generator_reply("no json here").is_err());
        assert!(parse_generator_reply("} backwards {").is_err());
    }

    #[test]
    fn test_code_variant_prompt_lists_patterns_by_level() {
        let prompt = build_compose_prompt("Agents", CurriculumVariant::FromCodePatterns);
        assert!(prompt.contains("## Beginner patterns"));
        assert!(prompt.contains("## Advanced patterns"));
        for pattern in code_patterns::CATALOG {
            assert!(prompt.contains(pattern.name));
        }
        let standard = build_compose_prompt("Agents", CurriculumVariant::Standard);
        assert!(!standard.contains("## Beginner patterns"));
        assert!(standard.contains("\"Agents\""));
    }

    #[tokio::test]
    async fn test_llm_generator_parses_reply() {
        let mut llm = MockTextGenerator::new();
        llm.expect_generate().times(1).returning(|_, _| {
            Ok("```json\n{\"title\": \"Rust\", \"weeks\": [{\"week\": 1, \"title\": \"Ownership\", \"topic_for_learning\": \"Why ownership\"}]}\n```".to_string())
        });
        let generator = LlmCurriculumGenerator::new(Arc::new(llm), Arc::new(Prompts::default()));

        let value = generator
            .compose("Rust", CurriculumVariant::Standard)
            .await
            .unwrap();
        assert_eq!(value["title"], "Rust");
    }

    #[tokio::test]
    async fn test_llm_generator_surfaces_generation_failure() {
        let mut llm = MockTextGenerator::new();
        llm.expect_generate()
            .returning(|_, _| Err(GenerationError::EmptyResponse));
        let generator = LlmCurriculumGenerator::new(Arc::new(llm), Arc::new(Prompts::default()));

        let err = generator
            .compose("Rust", CurriculumVariant::Standard)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Generation(GenerationError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_mock_generator_output_is_valid() {
        let value = MockCurriculumGenerator
            .compose("Databases", CurriculumVariant::Standard)
            .await
            .unwrap();
        let validated = ValidatedCurriculum::from_generator_output("Databases", value).unwrap();
        assert_eq!(validated.total_weeks(), 3);
    }
}

//! API and Database Models
//!
//! This module defines the request and response bodies of the HTTP API, the
//! rows read back with `sqlx`, and their OpenAPI schemas generated with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use topdown_core::{
    curriculum::{Curriculum, CurriculumSummary},
    code_analyzer::{ProjectAnalysis, ProjectEntry},
    pipeline::{LearningPack, Quiz},
    verification::{AgentDescriptor, StepContent, StepTemplate},
    week::{self, Week},
};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct WeekView {
    pub week_number: u32,
    pub title: String,
    pub objectives: Vec<String>,
    pub concepts: Vec<String>,
    pub prerequisites: Vec<u32>,
    pub topic_for_learning: String,
    #[schema(example = "in_progress")]
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub locked: bool,
    pub missing_prerequisites: Vec<u32>,
}

impl WeekView {
    pub fn new(week: &Week, all_weeks: &[Week]) -> Self {
        let missing_prerequisites = week::incomplete_prerequisites(week, all_weeks);
        Self {
            week_number: week.week_number,
            title: week.title.clone(),
            objectives: week.objectives.clone(),
            concepts: week.concepts.clone(),
            prerequisites: week.prerequisites.clone(),
            topic_for_learning: week.topic_for_learning.clone(),
            status: week.status.to_string(),
            completed_at: week.completed_at,
            locked: !missing_prerequisites.is_empty(),
            missing_prerequisites,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct CurriculumView {
    pub id: i64,
    pub topic: String,
    #[schema(value_type = Object)]
    pub structure: Value,
    pub diagram: Option<String>,
    pub total_weeks: u32,
    pub completed_weeks: u32,
    pub created_at: DateTime<Utc>,
    pub weeks: Vec<WeekView>,
}

impl From<&Curriculum> for CurriculumView {
    fn from(curriculum: &Curriculum) -> Self {
        Self {
            id: curriculum.id,
            topic: curriculum.topic.clone(),
            structure: curriculum.structure.clone(),
            diagram: curriculum.diagram.clone(),
            total_weeks: curriculum.total_weeks,
            completed_weeks: curriculum.completed_weeks(),
            created_at: curriculum.created_at,
            weeks: curriculum
                .weeks
                .iter()
                .map(|w| WeekView::new(w, &curriculum.weeks))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct CurriculumListItem {
    pub id: i64,
    pub topic: String,
    pub total_weeks: u32,
    pub completed_weeks: u32,
    pub created_at: DateTime<Utc>,
}

impl From<CurriculumSummary> for CurriculumListItem {
    fn from(summary: CurriculumSummary) -> Self {
        Self {
            id: summary.id,
            topic: summary.topic,
            total_weeks: summary.total_weeks,
            completed_weeks: summary.completed_weeks,
            created_at: summary.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCurriculumPayload {
    #[schema(example = "Distributed Systems")]
    pub topic: String,
    /// Build the curriculum from the code-pattern catalog.
    #[serde(default)]
    pub from_code: bool,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct StartWeekPayload {
    /// Binds this session to the started week when given.
    pub session_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct StartWeekResponse {
    pub week: WeekView,
    pub session_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LearnPayload {
    #[schema(example = "Operating Systems")]
    pub topic: String,
    pub session_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct LearnResponse {
    pub session_id: String,
    pub first_principle: String,
    pub question: String,
    pub resources: String,
    pub mission: String,
}

impl LearnResponse {
    pub fn new(session_id: String, pack: LearningPack) -> Self {
        Self {
            session_id,
            first_principle: pack.first_principle,
            question: pack.question,
            resources: pack.resources,
            mission: pack.mission,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AnalyzePayload {
    /// Directory on the server's disk.
    #[schema(example = "/home/me/projects/shop")]
    pub path: String,
    #[schema(example = "shop")]
    pub name: String,
    pub session_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct AnalyzeResponse {
    pub session_id: String,
    pub name: String,
    pub architecture: String,
    pub dependencies: Vec<String>,
    /// Directory tree, two levels below the root.
    #[schema(value_type = Vec<Object>)]
    pub structure: Vec<ProjectEntry>,
}

impl AnalyzeResponse {
    pub fn new(session_id: String, analysis: ProjectAnalysis) -> Self {
        Self {
            session_id,
            name: analysis.name,
            architecture: analysis.architecture,
            dependencies: analysis.dependencies,
            structure: analysis.structure,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SearchPayload {
    #[schema(example = "consensus algorithms beyond Raft")]
    pub query: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub resources: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChatPayload {
    pub session_id: String,
    #[schema(example = "Why does the kernel need a scheduler?")]
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
}

#[derive(Deserialize, ToSchema)]
pub struct QuizPayload {
    pub session_id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct QuizQuestionView {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub answer: usize,
    pub explanation: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct QuizView {
    pub questions: Vec<QuizQuestionView>,
}

impl From<Quiz> for QuizView {
    fn from(quiz: Quiz) -> Self {
        Self {
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuizQuestionView {
                    question: q.question,
                    options: q.options,
                    answer: q.answer,
                    explanation: q.explanation,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct NewQuizResult {
    pub curriculum_id: Option<i64>,
    pub week_number: Option<u32>,
    #[schema(example = 2)]
    pub score: i64,
    #[schema(example = 3)]
    pub total: i64,
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone, PartialEq)]
pub struct QuizResult {
    pub id: i64,
    pub curriculum_id: Option<i64>,
    pub week_number: Option<i64>,
    pub score: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct SharedMessage {
    #[schema(example = "First principle")]
    pub label: String,
    pub content: String,
    #[schema(example = "assistant")]
    pub role: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSharedSessionPayload {
    pub topic: String,
    pub mode: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<SharedMessage>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SharedSession {
    pub id: String,
    pub topic: String,
    pub mode: Option<String>,
    pub chat_history: Vec<SharedMessage>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SharedSessionCreated {
    #[schema(example = "aB3dE5fG7hJ9")]
    pub id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AgentPayload {
    #[schema(example = "Digest Agent")]
    pub name: String,
    #[schema(example = "Router")]
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

impl From<AgentPayload> for AgentDescriptor {
    fn from(payload: AgentPayload) -> Self {
        Self {
            name: payload.name,
            pattern: payload.pattern,
            description: payload.description,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct StartVerificationPayload {
    pub session_id: Option<String>,
    pub agent: AgentPayload,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct VerificationStepView {
    pub session_id: String,
    pub step: u8,
    pub total_steps: u8,
    pub title: String,
    pub response: String,
    pub hint: String,
    pub follow_up: String,
}

impl VerificationStepView {
    pub fn new(session_id: String, content: StepContent) -> Self {
        Self {
            session_id,
            step: content.step,
            total_steps: content.total_steps,
            title: content.title,
            response: content.response,
            hint: content.hint,
            follow_up: content.follow_up,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct VerificationAnswerPayload {
    pub answer: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct VerificationReply {
    pub step: u8,
    pub response: String,
}

/// Either the next step or, after step 7, the final summary.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct VerificationAdvanceResponse {
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<VerificationStepView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct JumpPayload {
    #[schema(example = 4)]
    pub step: i64,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct StepDescriptor {
    pub number: u8,
    pub title: String,
    pub hint: String,
    pub follow_up: String,
}

impl From<&StepTemplate> for StepDescriptor {
    fn from(template: &StepTemplate) -> Self {
        Self {
            number: template.number,
            title: template.title.to_string(),
            hint: template.hint.to_string(),
            follow_up: template.follow_up.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_prerequisites: Option<Vec<u32>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            missing_prerequisites: None,
        }
    }
}

//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests: the learning
//! pipeline, curricula and their weeks, quiz results, the verification
//! walkthrough and shared sessions. It uses `utoipa` doc comments to generate
//! OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rand::{Rng, distr::Alphanumeric};
use std::sync::Arc;
use topdown_core::{
    code_analyzer::AnalysisError,
    curriculum::CurriculumVariant,
    llm_client::ChatMessage,
    pipeline::PipelineError,
    session::SessionMode,
    verification::{self, Advance, TOTAL_STEPS, VerificationError, VerificationSession},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::StoreError,
    engine::EngineError,
    models::{
        AnalyzePayload, AnalyzeResponse, ChatPayload, ChatResponse, CreateCurriculumPayload, CreateSharedSessionPayload,
        CurriculumListItem, CurriculumView, ErrorResponse, HealthResponse, JumpPayload,
        LearnPayload, LearnResponse, NewQuizResult, QuizPayload, QuizResult, QuizView,
        SearchPayload, SearchResponse, SharedSession, SharedSessionCreated, StartVerificationPayload, StartWeekPayload,
        StartWeekResponse, StepDescriptor, VerificationAdvanceResponse,
        VerificationAnswerPayload, VerificationReply, VerificationStepView, WeekView,
    },
    state::AppState,
};

const SHARE_TOKEN_LEN: usize = 12;

pub enum ApiError {
    BadRequest(String),
    Unprocessable(String),
    NotFound(String),
    Conflict {
        message: String,
        missing_prerequisites: Option<Vec<u32>>,
    },
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse::new(message)),
            )
                .into_response(),
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Conflict {
                message,
                missing_prerequisites,
            } => (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    message,
                    missing_prerequisites,
                }),
            )
                .into_response(),
            ApiError::BadGateway(message) => {
                warn!("Text generation failed: {}", message);
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new(message)),
                )
                    .into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(message) => Self::BadRequest(message),
            StoreError::CurriculumNotFound(_) => Self::NotFound(err.to_string()),
            other => Self::InternalServerError(other.into()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Malformed(e) => Self::Unprocessable(e.to_string()),
            EngineError::Generation(e) => Self::BadGateway(e.to_string()),
            EngineError::CurriculumNotFound(_) | EngineError::WeekNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            EngineError::PrerequisitesNotMet { ref missing, .. } => Self::Conflict {
                missing_prerequisites: Some(missing.clone()),
                message: err.to_string(),
            },
            EngineError::Store(e) => e.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Blank(_) => Self::BadRequest(err.to_string()),
            PipelineError::Generation(e) => Self::BadGateway(e.to_string()),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Blank(_) | AnalysisError::NotADirectory(_) => {
                Self::BadRequest(err.to_string())
            }
            AnalysisError::Generation(e) => Self::BadGateway(e.to_string()),
            AnalysisError::ScanAborted => Self::InternalServerError(err.into()),
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::AlreadyComplete => Self::Conflict {
                message: err.to_string(),
                missing_prerequisites: None,
            },
            VerificationError::StepOutOfRange(_) => Self::BadRequest(err.to_string()),
            VerificationError::Generation(e) => Self::BadGateway(e.to_string()),
        }
    }
}

fn session_not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Session with id '{}' not found", id))
}

fn new_session_id(requested: Option<String>) -> String {
    requested
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn share_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Open a topic: first-principle map, Socratic question, resources and a practice mission.
#[utoipa::path(
    post,
    path = "/learn",
    request_body = LearnPayload,
    responses(
        (status = 200, description = "Learning pack generated", body = LearnResponse),
        (status = 400, description = "Blank topic", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    )
)]
pub async fn learn(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LearnPayload>,
) -> Result<Json<LearnResponse>, ApiError> {
    let pack = state.pipeline.start(&payload.topic).await?;
    let session_id = new_session_id(payload.session_id);
    state
        .sessions
        .bind(
            &session_id,
            SessionMode::Learning {
                topic: payload.topic.trim().to_string(),
            },
            pack.seed_history(),
        )
        .await;
    Ok(Json(LearnResponse::new(session_id, pack)))
}

/// Map the architecture of a local project and open a tutor session on it.
#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzePayload,
    responses(
        (status = 200, description = "Architecture map generated", body = AnalyzeResponse),
        (status = 400, description = "Blank field or path is not a directory", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    )
)]
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnalyzePayload>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let analysis = state
        .analyzer
        .analyze(&payload.path, &payload.name)
        .await?;
    let session_id = new_session_id(payload.session_id);
    state
        .sessions
        .bind(
            &session_id,
            SessionMode::CodeAnalysis {
                project: analysis.name.clone(),
            },
            vec![ChatMessage::assistant(analysis.architecture.clone())],
        )
        .await;
    Ok(Json(AnalyzeResponse::new(session_id, analysis)))
}

/// Curate further resources for a free-form query.
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchPayload,
    responses(
        (status = 200, description = "Resources curated", body = SearchResponse),
        (status = 400, description = "Blank query", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchPayload>,
) -> Result<Json<SearchResponse>, ApiError> {
    let resources = state.pipeline.search(&payload.query).await?;
    Ok(Json(SearchResponse { resources }))
}

/// Continue the tutor conversation of a session.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatPayload,
    responses(
        (status = 200, description = "Tutor reply", body = ChatResponse),
        (status = 400, description = "Blank message", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session = state
        .sessions
        .get(&payload.session_id)
        .await
        .ok_or_else(|| session_not_found(&payload.session_id))?;

    let response = state
        .pipeline
        .tutor_reply(session.mode.topic(), &session.history, &payload.message)
        .await?;
    state
        .sessions
        .append(
            &payload.session_id,
            vec![
                ChatMessage::user(payload.message),
                ChatMessage::assistant(response.clone()),
            ],
        )
        .await;

    Ok(Json(ChatResponse {
        session_id: payload.session_id,
        response,
    }))
}

/// Generate a three-question quiz over a session's conversation.
#[utoipa::path(
    post,
    path = "/quiz",
    request_body = QuizPayload,
    responses(
        (status = 200, description = "Quiz generated", body = QuizView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    )
)]
pub async fn quiz(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuizPayload>,
) -> Result<Json<QuizView>, ApiError> {
    let session = state
        .sessions
        .get(&payload.session_id)
        .await
        .ok_or_else(|| session_not_found(&payload.session_id))?;
    let quiz = state
        .pipeline
        .quiz(session.mode.topic(), &session.history)
        .await?;
    Ok(Json(quiz.into()))
}

/// Record a quiz score.
#[utoipa::path(
    post,
    path = "/quiz-results",
    request_body = NewQuizResult,
    responses(
        (status = 201, description = "Quiz result saved", body = QuizResult),
        (status = 400, description = "Invalid score", body = ErrorResponse),
        (status = 404, description = "Curriculum not found", body = ErrorResponse)
    )
)]
pub async fn save_quiz_result(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewQuizResult>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state.db.save_quiz_result(&payload).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Quiz results for one week, newest first.
#[utoipa::path(
    get,
    path = "/curricula/{id}/weeks/{week}/quiz-results",
    responses((status = 200, description = "Quiz results", body = [QuizResult])),
    params(
        ("id" = i64, Path, description = "Curriculum ID"),
        ("week" = u32, Path, description = "Week number")
    )
)]
pub async fn list_quiz_results(
    State(state): State<Arc<AppState>>,
    Path((id, week)): Path<(i64, u32)>,
) -> Result<Json<Vec<QuizResult>>, ApiError> {
    Ok(Json(state.db.get_quiz_results(id, week).await?))
}

/// Generate and store a new curriculum.
#[utoipa::path(
    post,
    path = "/curricula",
    request_body = CreateCurriculumPayload,
    responses(
        (status = 201, description = "Curriculum created", body = CurriculumView),
        (status = 422, description = "Generator output rejected", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    )
)]
pub async fn create_curriculum(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCurriculumPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let variant = if payload.from_code {
        CurriculumVariant::FromCodePatterns
    } else {
        CurriculumVariant::Standard
    };
    let curriculum = state.engine.create(&payload.topic, variant).await?;
    Ok((StatusCode::CREATED, Json(CurriculumView::from(&curriculum))))
}

/// List all curricula, newest first.
#[utoipa::path(
    get,
    path = "/curricula",
    responses(
        (status = 200, description = "List of curricula", body = [CurriculumListItem]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_curricula(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CurriculumListItem>>, ApiError> {
    let curricula = state.engine.list().await?;
    Ok(Json(curricula.into_iter().map(Into::into).collect()))
}

/// Get a curriculum with every week's lock state.
#[utoipa::path(
    get,
    path = "/curricula/{id}",
    responses(
        (status = 200, description = "Curriculum details", body = CurriculumView),
        (status = 404, description = "Curriculum not found", body = ErrorResponse)
    ),
    params(("id" = i64, Path, description = "Curriculum ID"))
)]
pub async fn get_curriculum(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CurriculumView>, ApiError> {
    let curriculum = state.engine.get(id).await?;
    Ok(Json(CurriculumView::from(&curriculum)))
}

/// Delete a curriculum with its weeks and quiz results.
#[utoipa::path(
    delete,
    path = "/curricula/{id}",
    responses(
        (status = 204, description = "Curriculum deleted"),
        (status = 404, description = "Curriculum not found", body = ErrorResponse)
    ),
    params(("id" = i64, Path, description = "Curriculum ID"))
)]
pub async fn delete_curriculum(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_curriculum(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn week_view(state: &AppState, id: i64, week: u32) -> Result<WeekView, ApiError> {
    let curriculum = state.engine.get(id).await?;
    let current = curriculum.week(week).ok_or_else(|| {
        ApiError::NotFound(format!("week {week} not found in curriculum {id}"))
    })?;
    Ok(WeekView::new(current, &curriculum.weeks))
}

/// Start a week once its prerequisites are completed.
#[utoipa::path(
    post,
    path = "/curricula/{id}/weeks/{week}/start",
    request_body = StartWeekPayload,
    responses(
        (status = 200, description = "Week started", body = StartWeekResponse),
        (status = 404, description = "Curriculum or week not found", body = ErrorResponse),
        (status = 409, description = "Prerequisites not completed", body = ErrorResponse)
    ),
    params(
        ("id" = i64, Path, description = "Curriculum ID"),
        ("week" = u32, Path, description = "Week number")
    )
)]
pub async fn start_week(
    State(state): State<Arc<AppState>>,
    Path((id, week)): Path<(i64, u32)>,
    payload: Option<Json<StartWeekPayload>>,
) -> Result<Json<StartWeekResponse>, ApiError> {
    let started = state.engine.start_week(id, week).await?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();

    if let Some(session_id) = &payload.session_id {
        state
            .sessions
            .bind(
                session_id,
                SessionMode::Curriculum {
                    curriculum_id: id,
                    week_number: week,
                    topic: started.topic_for_learning.clone(),
                },
                Vec::new(),
            )
            .await;
        info!(session_id = %session_id, curriculum_id = id, week, "Session bound to week");
    }

    Ok(Json(StartWeekResponse {
        week: week_view(&state, id, week).await?,
        session_id: payload.session_id,
    }))
}

/// Mark a week completed.
#[utoipa::path(
    post,
    path = "/curricula/{id}/weeks/{week}/complete",
    responses(
        (status = 200, description = "Week completed", body = WeekView),
        (status = 404, description = "Curriculum or week not found", body = ErrorResponse)
    ),
    params(
        ("id" = i64, Path, description = "Curriculum ID"),
        ("week" = u32, Path, description = "Week number")
    )
)]
pub async fn complete_week(
    State(state): State<Arc<AppState>>,
    Path((id, week)): Path<(i64, u32)>,
) -> Result<Json<WeekView>, ApiError> {
    state.engine.complete_week(id, week).await?;
    Ok(Json(week_view(&state, id, week).await?))
}

/// Return a week to pending.
#[utoipa::path(
    post,
    path = "/curricula/{id}/weeks/{week}/reset",
    responses(
        (status = 200, description = "Week reset", body = WeekView),
        (status = 404, description = "Curriculum or week not found", body = ErrorResponse)
    ),
    params(
        ("id" = i64, Path, description = "Curriculum ID"),
        ("week" = u32, Path, description = "Week number")
    )
)]
pub async fn reset_week(
    State(state): State<Arc<AppState>>,
    Path((id, week)): Path<(i64, u32)>,
) -> Result<Json<WeekView>, ApiError> {
    state.engine.reset_week(id, week).await?;
    Ok(Json(week_view(&state, id, week).await?))
}

/// The fixed seven verification steps.
#[utoipa::path(
    get,
    path = "/verify/steps",
    responses((status = 200, description = "Verification steps", body = [StepDescriptor]))
)]
pub async fn verification_steps() -> Json<Vec<StepDescriptor>> {
    Json(verification::STEPS.iter().map(StepDescriptor::from).collect())
}

/// Begin a verification walkthrough of an agent at step 1.
#[utoipa::path(
    post,
    path = "/verify/start",
    request_body = StartVerificationPayload,
    responses(
        (status = 200, description = "Step 1 content", body = VerificationStepView),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    )
)]
pub async fn start_verification(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartVerificationPayload>,
) -> Result<Json<VerificationStepView>, ApiError> {
    if payload.agent.name.trim().is_empty() {
        return Err(ApiError::BadRequest("agent name must not be blank".to_string()));
    }
    let (run, content) = VerificationSession::start(
        payload.agent.into(),
        state.llm.as_ref(),
        &state.prompts.verifier,
    )
    .await?;

    let session_id = new_session_id(payload.session_id);
    state
        .sessions
        .bind(&session_id, SessionMode::Verification(run), Vec::new())
        .await;
    Ok(Json(VerificationStepView::new(session_id, content)))
}

async fn verification_run(state: &AppState, session_id: &str) -> Result<VerificationSession, ApiError> {
    let session = state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| session_not_found(session_id))?;
    match session.mode {
        SessionMode::Verification(run) => Ok(run),
        other => Err(ApiError::BadRequest(format!(
            "session '{}' is in {} mode, not verification",
            session_id,
            other.name()
        ))),
    }
}

/// Answer the current verification step.
#[utoipa::path(
    post,
    path = "/verify/{session_id}/answer",
    request_body = VerificationAnswerPayload,
    responses(
        (status = 200, description = "Socratic follow-up", body = VerificationReply),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Verification already complete", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    ),
    params(("session_id" = String, Path, description = "Session ID"))
)]
pub async fn verification_answer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<VerificationAnswerPayload>,
) -> Result<Json<VerificationReply>, ApiError> {
    if payload.answer.trim().is_empty() {
        return Err(ApiError::BadRequest("answer must not be blank".to_string()));
    }
    let mut run = verification_run(&state, &session_id).await?;
    let response = run
        .respond(&payload.answer, state.llm.as_ref(), &state.prompts.verifier)
        .await?;
    let step = run.current_step().unwrap_or(TOTAL_STEPS);
    state.sessions.update_verification(&session_id, run).await;
    Ok(Json(VerificationReply { step, response }))
}

/// Advance to the next step, or finish with a summary after step 7.
#[utoipa::path(
    post,
    path = "/verify/{session_id}/next",
    responses(
        (status = 200, description = "Next step or final summary", body = VerificationAdvanceResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Verification already complete", body = ErrorResponse),
        (status = 502, description = "Text generation failed", body = ErrorResponse)
    ),
    params(("session_id" = String, Path, description = "Session ID"))
)]
pub async fn verification_next(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<VerificationAdvanceResponse>, ApiError> {
    let mut run = verification_run(&state, &session_id).await?;
    let advance = run
        .advance(state.llm.as_ref(), &state.prompts.verifier)
        .await?;
    state.sessions.update_verification(&session_id, run).await;

    let response = match advance {
        Advance::Step(content) => VerificationAdvanceResponse {
            complete: false,
            step: Some(VerificationStepView::new(session_id, content)),
            summary: None,
        },
        Advance::Complete { summary } => VerificationAdvanceResponse {
            complete: true,
            step: None,
            summary: Some(summary),
        },
    };
    Ok(Json(response))
}

/// Jump directly to a step in 1..=7.
#[utoipa::path(
    post,
    path = "/verify/{session_id}/jump",
    request_body = JumpPayload,
    responses(
        (status = 200, description = "Step content", body = VerificationStepView),
        (status = 400, description = "Step out of range", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Verification already complete", body = ErrorResponse)
    ),
    params(("session_id" = String, Path, description = "Session ID"))
)]
pub async fn verification_jump(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<JumpPayload>,
) -> Result<Json<VerificationStepView>, ApiError> {
    let mut run = verification_run(&state, &session_id).await?;
    let content = run
        .jump(payload.step, state.llm.as_ref(), &state.prompts.verifier)
        .await?;
    state.sessions.update_verification(&session_id, run).await;
    Ok(Json(VerificationStepView::new(session_id, content)))
}

/// Publish a read-only copy of a conversation under an opaque token.
#[utoipa::path(
    post,
    path = "/shared",
    request_body = CreateSharedSessionPayload,
    responses(
        (status = 201, description = "Shared session created", body = SharedSessionCreated),
        (status = 400, description = "Blank topic", body = ErrorResponse)
    )
)]
pub async fn create_shared_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSharedSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let shared = state
        .db
        .create_shared_session(
            &share_token(),
            &payload.topic,
            payload.mode.as_deref(),
            &payload.chat_history,
        )
        .await?;
    info!(share_id = %shared.id, "Shared session created");
    Ok((
        StatusCode::CREATED,
        Json(SharedSessionCreated { id: shared.id }),
    ))
}

/// Fetch a shared conversation.
#[utoipa::path(
    get,
    path = "/shared/{id}",
    responses(
        (status = 200, description = "Shared session", body = SharedSession),
        (status = 404, description = "Shared session not found or expired", body = ErrorResponse)
    ),
    params(("id" = String, Path, description = "Share token"))
)]
pub async fn get_shared_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SharedSession>, ApiError> {
    state
        .db
        .get_shared_session(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Shared session '{}' not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_token_shape() {
        let token = share_token();
        assert_eq!(token.len(), SHARE_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, share_token());
    }

    #[test]
    fn test_new_session_id_keeps_requested() {
        assert_eq!(new_session_id(Some("abc".into())), "abc");
        assert_ne!(new_session_id(Some("  ".into())), "  ");
        assert_eq!(new_session_id(None).len(), 36);
    }

    #[test]
    fn test_engine_errors_map_to_statuses() {
        let locked: ApiError = EngineError::PrerequisitesNotMet {
            week: 2,
            missing: vec![1],
        }
        .into();
        assert_eq!(locked.into_response().status(), StatusCode::CONFLICT);

        let missing: ApiError = EngineError::CurriculumNotFound(3).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = StoreError::Validation("bad".into()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let out_of_range: ApiError = VerificationError::StepOutOfRange(9).into();
        assert_eq!(out_of_range.into_response().status(), StatusCode::BAD_REQUEST);

        let upstream: ApiError = PipelineError::Generation(
            topdown_core::llm_client::GenerationError::EmptyResponse,
        )
        .into();
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}

//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AgentPayload, AnalyzePayload, AnalyzeResponse, ChatPayload, ChatResponse, CreateCurriculumPayload,
        CreateSharedSessionPayload, CurriculumListItem, CurriculumView, ErrorResponse,
        HealthResponse, JumpPayload, LearnPayload, LearnResponse, NewQuizResult, QuizPayload,
        QuizQuestionView, QuizResult, QuizView, SearchPayload, SearchResponse, SharedMessage,
        SharedSession,
        SharedSessionCreated, StartVerificationPayload, StartWeekPayload, StartWeekResponse,
        StepDescriptor, VerificationAdvanceResponse, VerificationAnswerPayload,
        VerificationReply, VerificationStepView, WeekView,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::learn,
        handlers::search,
        handlers::analyze,
        handlers::chat,
        handlers::quiz,
        handlers::save_quiz_result,
        handlers::list_quiz_results,
        handlers::create_curriculum,
        handlers::list_curricula,
        handlers::get_curriculum,
        handlers::delete_curriculum,
        handlers::start_week,
        handlers::complete_week,
        handlers::reset_week,
        handlers::verification_steps,
        handlers::start_verification,
        handlers::verification_answer,
        handlers::verification_next,
        handlers::verification_jump,
        handlers::create_shared_session,
        handlers::get_shared_session,
    ),
    components(
        schemas(
            HealthResponse, ErrorResponse, LearnPayload, LearnResponse, SearchPayload,
            SearchResponse, AnalyzePayload, AnalyzeResponse, ChatPayload, ChatResponse,
            QuizPayload, QuizView, QuizQuestionView, NewQuizResult, QuizResult,
            CreateCurriculumPayload, CurriculumView, CurriculumListItem, WeekView,
            StartWeekPayload, StartWeekResponse, StepDescriptor, AgentPayload,
            StartVerificationPayload, VerificationStepView, VerificationAnswerPayload,
            VerificationReply, VerificationAdvanceResponse, JumpPayload,
            CreateSharedSessionPayload, SharedSession, SharedMessage, SharedSessionCreated
        )
    ),
    tags(
        (name = "Top-Down Learning API", description = "Curricula, Socratic learning sessions and agent verification")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/health", get(handlers::health))
        .route("/learn", post(handlers::learn))
        .route("/search", post(handlers::search))
        .route("/analyze", post(handlers::analyze))
        .route("/chat", post(handlers::chat))
        .route("/quiz", post(handlers::quiz))
        .route("/quiz-results", post(handlers::save_quiz_result))
        .route(
            "/curricula",
            get(handlers::list_curricula).post(handlers::create_curriculum),
        )
        .route(
            "/curricula/{id}",
            get(handlers::get_curriculum).delete(handlers::delete_curriculum),
        )
        .route(
            "/curricula/{id}/weeks/{week}/start",
            post(handlers::start_week),
        )
        .route(
            "/curricula/{id}/weeks/{week}/complete",
            post(handlers::complete_week),
        )
        .route(
            "/curricula/{id}/weeks/{week}/reset",
            post(handlers::reset_week),
        )
        .route(
            "/curricula/{id}/weeks/{week}/quiz-results",
            get(handlers::list_quiz_results),
        )
        .route("/verify/steps", get(handlers::verification_steps))
        .route("/verify/start", post(handlers::start_verification))
        .route(
            "/verify/{session_id}/answer",
            post(handlers::verification_answer),
        )
        .route("/verify/{session_id}/next", post(handlers::verification_next))
        .route("/verify/{session_id}/jump", post(handlers::verification_jump))
        .route("/shared", post(handlers::create_shared_session))
        .route("/shared/{id}", get(handlers::get_shared_session))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::Db, engine::CurriculumEngine};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use topdown_core::{
        code_analyzer::CodeAnalyzer,
        curriculum::MockCurriculumGenerator,
        llm_client::{ChatMessage, GenerationError, TextGenerator},
        pipeline::LearningPipeline,
        prompts::Prompts,
        session::SessionCoordinator,
    };
    use tower::ServiceExt;

    /// Answers every prompt with a fixed line, or a canned quiz for quiz prompts.
    struct ScriptedGenerator;

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, _: &str) -> Result<String, GenerationError> {
            if prompt.contains("quiz questions") {
                return Ok(r#"{"questions": [{"question": "Q", "options": ["a", "b"], "answer": 1}]}"#.into());
            }
            Ok(format!("generated ({} chars)", prompt.len()))
        }

        async fn chat(
            &self,
            history: &[ChatMessage],
            message: &str,
            _: &str,
        ) -> Result<String, GenerationError> {
            Ok(format!("reply to '{message}' after {} turns", history.len()))
        }
    }

    async fn app() -> Router {
        let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
        db.run_migrations().await.unwrap();
        let llm: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator);
        let prompts = Arc::new(Prompts::default());
        let state = AppState {
            engine: Arc::new(CurriculumEngine::new(
                db.clone(),
                Arc::new(MockCurriculumGenerator),
            )),
            pipeline: Arc::new(LearningPipeline::new(llm.clone(), prompts.clone())),
            analyzer: Arc::new(CodeAnalyzer::new(llm.clone(), prompts.clone())),
            db,
            llm,
            sessions: SessionCoordinator::in_memory(),
            prompts,
        };
        create_router(Arc::new(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_curriculum_week_flow() {
        let app = app().await;
        let (status, created) =
            send(&app, "POST", "/curricula", Some(json!({"topic": "Databases"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["weeks"][1]["locked"], true);
        assert_eq!(created["weeks"][1]["missing_prerequisites"], json!([1]));

        let (status, body) =
            send(&app, "POST", &format!("/curricula/{id}/weeks/2/start"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["missing_prerequisites"], json!([1]));

        let (status, body) = send(
            &app,
            "POST",
            &format!("/curricula/{id}/weeks/1/complete"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");

        let (status, body) = send(
            &app,
            "POST",
            &format!("/curricula/{id}/weeks/2/start"),
            Some(json!({"session_id": "s-week"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["week"]["status"], "in_progress");
        assert_eq!(body["session_id"], "s-week");

        let (status, body) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"session_id": "s-week", "message": "Where do I begin?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "reply to 'Where do I begin?' after 0 turns");

        let (status, list) = send(&app, "GET", "/curricula", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["completed_weeks"], 1);

        let (status, _) = send(&app, "DELETE", &format!("/curricula/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/curricula/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_week_is_not_found() {
        let app = app().await;
        let (_, created) =
            send(&app, "POST", "/curricula", Some(json!({"topic": "Networks"}))).await;
        let id = created["id"].as_i64().unwrap();
        let (status, _) =
            send(&app, "POST", &format!("/curricula/{id}/weeks/9/start"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", "/curricula/999/weeks/1/complete", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_learn_chat_and_quiz() {
        let app = app().await;
        let (status, pack) = send(&app, "POST", "/learn", Some(json!({"topic": "Entropy"}))).await;
        assert_eq!(status, StatusCode::OK);
        let session_id = pack["session_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"session_id": session_id, "message": "Why disorder?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "reply to 'Why disorder?' after 2 turns");

        let (status, quiz) =
            send(&app, "POST", "/quiz", Some(json!({"session_id": session_id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(quiz["questions"][0]["answer"], 1);

        let (status, _) = send(&app, "POST", "/learn", Some(json!({"topic": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"session_id": "ghost", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_curates_resources() {
        let app = app().await;
        let (status, body) =
            send(&app, "POST", "/search", Some(json!({"query": "vector clocks"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["resources"].as_str().unwrap().starts_with("generated"));

        let (status, body) = send(&app, "POST", "/search", Some(json!({"query": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "query must not be blank");
    }

    #[tokio::test]
    async fn test_analyze_binds_a_code_analysis_session() {
        let app = app().await;
        let project = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(project.path().join("src")).unwrap();
        std::fs::write(project.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::create_dir(project.path().join("node_modules")).unwrap();

        let (status, body) = send(
            &app,
            "POST",
            "/analyze",
            Some(json!({
                "path": project.path().display().to_string(),
                "name": "shop",
                "session_id": "code-1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "code-1");
        assert_eq!(body["structure"], json!([{"name": "src", "type": "dir", "children": [{"name": "main.rs", "type": "file"}]}]));

        let (status, body) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"session_id": "code-1", "message": "Where does a request enter?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "reply to 'Where does a request enter?' after 1 turns");

        let (status, _) = send(
            &app,
            "POST",
            "/analyze",
            Some(json!({"path": "/definitely/not/a/project", "name": "shop"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_quiz_results_endpoints() {
        let app = app().await;
        let (_, created) =
            send(&app, "POST", "/curricula", Some(json!({"topic": "Databases"}))).await;
        let id = created["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            "/quiz-results",
            Some(json!({"curriculum_id": id, "week_number": 1, "score": 4, "total": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/quiz-results",
            Some(json!({"curriculum_id": id, "week_number": 99, "score": 1, "total": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, saved) = send(
            &app,
            "POST",
            "/quiz-results",
            Some(json!({"curriculum_id": id, "week_number": 1, "score": 2, "total": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["score"], 2);

        let (status, results) = send(
            &app,
            "GET",
            &format!("/curricula/{id}/weeks/1/quiz-results"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_verification_walkthrough() {
        let app = app().await;
        let (status, steps) = send(&app, "GET", "/verify/steps", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(steps.as_array().unwrap().len(), 7);

        let (status, first) = send(
            &app,
            "POST",
            "/verify/start",
            Some(json!({"session_id": "v1", "agent": {"name": "Digest", "pattern": "Router"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["step"], 1);

        let (status, reply) = send(
            &app,
            "POST",
            "/verify/v1/answer",
            Some(json!({"answer": "It routes by intent"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["step"], 1);

        let (status, _) =
            send(&app, "POST", "/verify/v1/jump", Some(json!({"step": 8}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, jumped) =
            send(&app, "POST", "/verify/v1/jump", Some(json!({"step": 7}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(jumped["step"], 7);

        let (status, done) = send(&app, "POST", "/verify/v1/next", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["complete"], true);
        assert!(done["summary"].is_string());

        let (status, _) = send(&app, "POST", "/verify/v1/next", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_shared_session_endpoints() {
        let app = app().await;
        let (status, created) = send(
            &app,
            "POST",
            "/shared",
            Some(json!({
                "topic": "Entropy",
                "mode": "learning",
                "chat_history": [{"label": "Mission", "content": "Measure it", "role": "assistant"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = created["id"].as_str().unwrap();
        assert_eq!(token.len(), 12);

        let (status, shared) = send(&app, "GET", &format!("/shared/{token}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shared["chat_history"][0]["label"], "Mission");

        let (status, _) = send(&app, "GET", "/shared/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

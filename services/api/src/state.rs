//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the store, the engine and the text generator.

use crate::{db::Db, engine::CurriculumEngine};
use std::sync::Arc;
use topdown_core::{
    code_analyzer::CodeAnalyzer, llm_client::TextGenerator, pipeline::LearningPipeline, prompts::Prompts,
    session::SessionCoordinator,
};

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub engine: Arc<CurriculumEngine>,
    pub pipeline: Arc<LearningPipeline>,
    pub analyzer: Arc<CodeAnalyzer>,
    pub llm: Arc<dyn TextGenerator>,
    pub sessions: SessionCoordinator,
    pub prompts: Arc<Prompts>,
}

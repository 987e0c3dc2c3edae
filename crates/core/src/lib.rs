//! Core domain logic for the top-down learning service: curriculum validation
//! and week gating rules, the verification walkthrough, the learning pipeline,
//! local code analysis and session coordination. Nothing here touches storage.

pub mod code_analyzer;
pub mod code_patterns;
pub mod curriculum;
pub mod llm_client;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod verification;
pub mod week;

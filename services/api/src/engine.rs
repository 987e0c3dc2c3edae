//! Curriculum Engine
//!
//! Sits between the untrusted curriculum generator and the store. Generator
//! output is validated before any row is written, and week starts are gated
//! here on the server regardless of what lock state a client displays.

use serde_json::Value;
use std::sync::Arc;
use topdown_core::{
    curriculum::{
        ComposeError, Curriculum, CurriculumGenerator, CurriculumSummary, CurriculumVariant,
        MalformedCurriculum, ValidatedCurriculum,
    },
    llm_client::GenerationError,
    week::{self, Week, WeekStatus},
};
use tracing::{debug, info, instrument, warn};

use crate::db::{Db, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Malformed(#[from] MalformedCurriculum),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("curriculum {0} not found")]
    CurriculumNotFound(i64),
    #[error("week {week} not found in curriculum {curriculum_id}")]
    WeekNotFound { curriculum_id: i64, week: u32 },
    #[error("week {week} is locked until weeks {missing:?} are completed")]
    PrerequisitesNotMet { week: u32, missing: Vec<u32> },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ComposeError> for EngineError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::Generation(e) => Self::Generation(e),
            ComposeError::Malformed(e) => Self::Malformed(e),
        }
    }
}

pub struct CurriculumEngine {
    db: Arc<Db>,
    generator: Arc<dyn CurriculumGenerator>,
}

impl CurriculumEngine {
    pub fn new(db: Arc<Db>, generator: Arc<dyn CurriculumGenerator>) -> Self {
        Self { db, generator }
    }

    /// Asks the generator for a curriculum on `topic`, ingests it and returns
    /// the stored record. A generator failure writes nothing.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        topic: &str,
        variant: CurriculumVariant,
    ) -> Result<Curriculum, EngineError> {
        if topic.trim().is_empty() {
            return Err(MalformedCurriculum::BlankTopic.into());
        }
        let output = self.generator.compose(topic.trim(), variant).await?;
        let id = self.ingest(topic.trim(), output).await?;
        self.get(id).await
    }

    /// Validates generator output and persists the curriculum with all of its
    /// weeks as one unit.
    pub async fn ingest(&self, topic: &str, output: Value) -> Result<i64, EngineError> {
        let validated = ValidatedCurriculum::from_generator_output(topic, output).inspect_err(
            |e| warn!(error = %e, %topic, "Rejected generator output"),
        )?;
        let id = self.db.insert_curriculum(&validated).await?;
        info!(curriculum_id = id, title = validated.title(), "Curriculum ingested");
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<CurriculumSummary>, EngineError> {
        Ok(self.db.get_curricula().await?)
    }

    pub async fn get(&self, curriculum_id: i64) -> Result<Curriculum, EngineError> {
        self.db
            .get_curriculum_by_id(curriculum_id)
            .await?
            .ok_or(EngineError::CurriculumNotFound(curriculum_id))
    }

    /// Moves a week to `in_progress` once every prerequisite is completed.
    ///
    /// Gating is checked first, so a locked week is rejected whatever its own
    /// status. Starting a week that is already in progress or completed is a
    /// no-op that returns the week unchanged.
    #[instrument(skip(self))]
    pub async fn start_week(&self, curriculum_id: i64, week_number: u32) -> Result<Week, EngineError> {
        let mut week = self.require_week(curriculum_id, week_number).await?;

        if !self
            .db
            .are_prerequisites_complete(curriculum_id, &week.prerequisites)
            .await?
        {
            // The rejection reports the weeks missing in one consistent read.
            // If that read finds nothing missing, a prerequisite was completed
            // in between and the start goes ahead.
            let curriculum = self.get(curriculum_id).await?;
            week = curriculum
                .week(week_number)
                .cloned()
                .ok_or(EngineError::WeekNotFound {
                    curriculum_id,
                    week: week_number,
                })?;
            let missing = week::incomplete_prerequisites(&week, &curriculum.weeks);
            if !missing.is_empty() {
                warn!(?missing, "Week start rejected, prerequisites incomplete");
                return Err(EngineError::PrerequisitesNotMet {
                    week: week_number,
                    missing,
                });
            }
        }

        if week.status != WeekStatus::Pending {
            debug!(status = %week.status, "Week already started");
            return Ok(week);
        }
        self.transition(curriculum_id, week_number, WeekStatus::InProgress)
            .await
    }

    /// Marks a week completed from any status. Completing it again keeps the
    /// original completion time.
    #[instrument(skip(self))]
    pub async fn complete_week(
        &self,
        curriculum_id: i64,
        week_number: u32,
    ) -> Result<Week, EngineError> {
        let week = self.require_week(curriculum_id, week_number).await?;
        if week.is_completed() {
            return Ok(week);
        }
        self.transition(curriculum_id, week_number, WeekStatus::Completed)
            .await
    }

    /// Returns a week to `pending` and clears its completion time.
    #[instrument(skip(self))]
    pub async fn reset_week(&self, curriculum_id: i64, week_number: u32) -> Result<Week, EngineError> {
        let week = self.require_week(curriculum_id, week_number).await?;
        if week.status == WeekStatus::Pending {
            return Ok(week);
        }
        self.transition(curriculum_id, week_number, WeekStatus::Pending)
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_curriculum(&self, curriculum_id: i64) -> Result<(), EngineError> {
        if self.db.delete_curriculum(curriculum_id).await? {
            Ok(())
        } else {
            Err(EngineError::CurriculumNotFound(curriculum_id))
        }
    }

    async fn require_week(&self, curriculum_id: i64, week_number: u32) -> Result<Week, EngineError> {
        if let Some(week) = self.db.get_week(curriculum_id, week_number).await? {
            return Ok(week);
        }
        // Tell a missing curriculum apart from a missing week.
        self.get(curriculum_id).await?;
        Err(EngineError::WeekNotFound {
            curriculum_id,
            week: week_number,
        })
    }

    async fn transition(
        &self,
        curriculum_id: i64,
        week_number: u32,
        status: WeekStatus,
    ) -> Result<Week, EngineError> {
        self.db
            .update_week_status(curriculum_id, week_number, status)
            .await?;
        info!(curriculum_id, week = week_number, %status, "Week transitioned");
        self.db
            .get_week(curriculum_id, week_number)
            .await?
            .ok_or(EngineError::WeekNotFound {
                curriculum_id,
                week: week_number,
            })
    }
}

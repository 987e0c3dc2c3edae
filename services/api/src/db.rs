//! Data Access Layer
//!
//! The persistent store for curricula, their weeks, quiz results and shared
//! sessions. Every write that touches more than one row runs inside a single
//! `sqlx` transaction; dropping an uncommitted transaction rolls it back.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{
    FromRow, SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    types::Json,
};
use std::{collections::HashSet, str::FromStr};
use topdown_core::{
    curriculum::{Curriculum, CurriculumSummary, MalformedCurriculum, ValidatedCurriculum},
    week::{self, NewWeek, Week, WeekStatus},
};
use tracing::{debug, info};

use crate::models::{NewQuizResult, QuizResult, SharedMessage, SharedSession};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("curriculum {0} not found")]
    CurriculumNotFound(i64),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<MalformedCurriculum> for StoreError {
    fn from(err: MalformedCurriculum) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(FromRow)]
struct CurriculumRow {
    id: i64,
    topic: String,
    structure: Json<Value>,
    mermaid_diagram: Option<String>,
    total_weeks: i64,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SummaryRow {
    id: i64,
    topic: String,
    total_weeks: i64,
    completed_weeks: i64,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct WeekRow {
    curriculum_id: i64,
    week_number: i64,
    title: String,
    objectives: Json<Vec<String>>,
    concepts: Json<Vec<String>>,
    prerequisites: Json<Vec<u32>>,
    topic_for_learning: String,
    status: String,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct SharedSessionRow {
    id: String,
    topic: String,
    mode: Option<String>,
    chat_history: Json<Vec<SharedMessage>>,
    created_at: DateTime<Utc>,
}

fn to_u32(value: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value}")))
}

impl TryFrom<WeekRow> for Week {
    type Error = StoreError;

    fn try_from(row: WeekRow) -> StoreResult<Self> {
        Ok(Week {
            curriculum_id: row.curriculum_id,
            week_number: to_u32(row.week_number, "week_number")?,
            title: row.title,
            objectives: row.objectives.0,
            concepts: row.concepts.0,
            prerequisites: row.prerequisites.0,
            topic_for_learning: row.topic_for_learning,
            status: WeekStatus::from_str(&row.status)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            completed_at: row.completed_at,
        })
    }
}

impl From<SharedSessionRow> for SharedSession {
    fn from(row: SharedSessionRow) -> Self {
        SharedSession {
            id: row.id,
            topic: row.topic,
            mode: row.mode,
            chat_history: row.chat_history.0,
            created_at: row.created_at,
        }
    }
}

const WEEK_COLUMNS: &str = "curriculum_id, week_number, title, objectives, concepts, prerequisites, \
                            topic_for_learning, status, completed_at";

/// A wrapper around the `SqlitePool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url`, creating the database file and its
    /// directory when missing. In-memory databases get a single long-lived
    /// connection so every query sees the same database.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Validation(format!(
                            "cannot create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self::new(pool))
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts one curriculum row without any weeks.
    pub async fn create_curriculum(
        &self,
        topic: &str,
        structure: &Value,
        diagram: Option<&str>,
        total_weeks: u32,
    ) -> StoreResult<i64> {
        let mut conn = self.pool.acquire().await?;
        insert_curriculum_row(&mut conn, topic, structure, diagram, total_weeks).await
    }

    /// Inserts every week of a curriculum in one all-or-nothing transaction.
    ///
    /// The batch must be the complete week set `1..=total_weeks` of a
    /// curriculum that has no weeks yet.
    pub async fn create_weeks(&self, curriculum_id: i64, weeks: &[NewWeek]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let total_weeks: i64 =
            sqlx::query_scalar("SELECT total_weeks FROM curricula WHERE id = $1")
                .bind(curriculum_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::CurriculumNotFound(curriculum_id))?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM curriculum_weeks WHERE curriculum_id = $1")
                .bind(curriculum_id)
                .fetch_one(&mut *tx)
                .await?;
        if existing > 0 {
            return Err(StoreError::Validation(format!(
                "curriculum {curriculum_id} already has weeks"
            )));
        }

        insert_weeks(&mut tx, curriculum_id, total_weeks, weeks).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persists a validated curriculum together with all of its weeks.
    pub async fn insert_curriculum(&self, curriculum: &ValidatedCurriculum) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        let id = insert_curriculum_row(
            &mut tx,
            curriculum.topic(),
            curriculum.structure(),
            curriculum.diagram(),
            curriculum.total_weeks(),
        )
        .await?;
        insert_weeks(
            &mut tx,
            id,
            i64::from(curriculum.total_weeks()),
            curriculum.weeks(),
        )
        .await?;
        tx.commit().await?;
        info!(curriculum_id = id, weeks = curriculum.total_weeks(), "Curriculum stored");
        Ok(id)
    }

    /// Lists curricula, newest first, with their completed-week counts.
    pub async fn get_curricula(&self) -> StoreResult<Vec<CurriculumSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT c.id, c.topic, c.total_weeks, c.created_at,
                (SELECT COUNT(*) FROM curriculum_weeks w
                 WHERE w.curriculum_id = c.id AND w.status = 'completed') AS completed_weeks
            FROM curricula c
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(CurriculumSummary {
                    id: r.id,
                    topic: r.topic,
                    total_weeks: to_u32(r.total_weeks, "total_weeks")?,
                    completed_weeks: to_u32(r.completed_weeks, "completed_weeks")?,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    /// Retrieves a curriculum with its weeks in ascending week order.
    pub async fn get_curriculum_by_id(&self, id: i64) -> StoreResult<Option<Curriculum>> {
        let Some(row) = sqlx::query_as::<_, CurriculumRow>(
            "SELECT id, topic, structure, mermaid_diagram, total_weeks, created_at \
             FROM curricula WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let weeks = sqlx::query_as::<_, WeekRow>(&format!(
            "SELECT {WEEK_COLUMNS} FROM curriculum_weeks WHERE curriculum_id = $1 ORDER BY week_number"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Week::try_from)
        .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(Curriculum {
            id: row.id,
            topic: row.topic,
            structure: row.structure.0,
            diagram: row.mermaid_diagram,
            total_weeks: to_u32(row.total_weeks, "total_weeks")?,
            created_at: row.created_at,
            weeks,
        }))
    }

    pub async fn get_week(&self, curriculum_id: i64, week_number: u32) -> StoreResult<Option<Week>> {
        sqlx::query_as::<_, WeekRow>(&format!(
            "SELECT {WEEK_COLUMNS} FROM curriculum_weeks WHERE curriculum_id = $1 AND week_number = $2"
        ))
        .bind(curriculum_id)
        .bind(i64::from(week_number))
        .fetch_optional(&self.pool)
        .await?
        .map(Week::try_from)
        .transpose()
    }

    /// Sets a week's status. `completed` stamps `completed_at` with now, any
    /// other status clears it. Prerequisites are not checked here.
    ///
    /// Returns `false` when the week does not exist.
    pub async fn update_week_status(
        &self,
        curriculum_id: i64,
        week_number: u32,
        status: WeekStatus,
    ) -> StoreResult<bool> {
        let completed_at = (status == WeekStatus::Completed).then(Utc::now);
        let result = sqlx::query(
            "UPDATE curriculum_weeks SET status = $1, completed_at = $2 \
             WHERE curriculum_id = $3 AND week_number = $4",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(curriculum_id)
        .bind(i64::from(week_number))
        .execute(&self.pool)
        .await?;
        debug!(curriculum_id, week = week_number, %status, "Week status updated");
        Ok(result.rows_affected() > 0)
    }

    /// True iff every listed week exists and is completed. Vacuously true for
    /// an empty list.
    pub async fn are_prerequisites_complete(
        &self,
        curriculum_id: i64,
        prerequisites: &[u32],
    ) -> StoreResult<bool> {
        if prerequisites.is_empty() {
            return Ok(true);
        }
        let completed: HashSet<i64> = sqlx::query_scalar::<_, i64>(
            "SELECT week_number FROM curriculum_weeks \
             WHERE curriculum_id = $1 AND status = 'completed'",
        )
        .bind(curriculum_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();
        Ok(prerequisites
            .iter()
            .all(|p| completed.contains(&i64::from(*p))))
    }

    /// Appends a quiz result.
    pub async fn save_quiz_result(&self, result: &NewQuizResult) -> StoreResult<QuizResult> {
        if result.total <= 0 {
            return Err(StoreError::Validation("total must be positive".into()));
        }
        if result.score < 0 || result.score > result.total {
            return Err(StoreError::Validation(format!(
                "score {} must be between 0 and {}",
                result.score, result.total
            )));
        }
        if result.week_number.is_some() && result.curriculum_id.is_none() {
            return Err(StoreError::Validation(
                "week_number requires curriculum_id".into(),
            ));
        }
        if let Some(curriculum_id) = result.curriculum_id {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM curricula WHERE id = $1")
                .bind(curriculum_id)
                .fetch_optional(&self.pool)
                .await?;
            if exists.is_none() {
                return Err(StoreError::CurriculumNotFound(curriculum_id));
            }
            if let Some(week_number) = result.week_number {
                let week: Option<i64> = sqlx::query_scalar(
                    "SELECT id FROM curriculum_weeks WHERE curriculum_id = $1 AND week_number = $2",
                )
                .bind(curriculum_id)
                .bind(i64::from(week_number))
                .fetch_optional(&self.pool)
                .await?;
                if week.is_none() {
                    return Err(StoreError::Validation(format!(
                        "curriculum {curriculum_id} has no week {week_number}"
                    )));
                }
            }
        }

        let saved = sqlx::query_as::<_, QuizResult>(
            "INSERT INTO quiz_results (curriculum_id, week_number, score, total, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, curriculum_id, week_number, score, total, created_at",
        )
        .bind(result.curriculum_id)
        .bind(result.week_number.map(i64::from))
        .bind(result.score)
        .bind(result.total)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    /// Quiz results for one week, newest first.
    pub async fn get_quiz_results(
        &self,
        curriculum_id: i64,
        week_number: u32,
    ) -> StoreResult<Vec<QuizResult>> {
        let results = sqlx::query_as::<_, QuizResult>(
            "SELECT id, curriculum_id, week_number, score, total, created_at FROM quiz_results \
             WHERE curriculum_id = $1 AND week_number = $2 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(curriculum_id)
        .bind(i64::from(week_number))
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    /// Deletes a curriculum's quiz results, weeks and row in one transaction.
    ///
    /// Returns `false` when the curriculum did not exist.
    pub async fn delete_curriculum(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let quizzes = sqlx::query("DELETE FROM quiz_results WHERE curriculum_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let weeks = sqlx::query("DELETE FROM curriculum_weeks WHERE curriculum_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let curricula = sqlx::query("DELETE FROM curricula WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        info!(curriculum_id = id, quizzes, weeks, "Curriculum deleted");
        Ok(curricula > 0)
    }

    pub async fn create_shared_session(
        &self,
        id: &str,
        topic: &str,
        mode: Option<&str>,
        chat_history: &[SharedMessage],
    ) -> StoreResult<SharedSession> {
        if topic.trim().is_empty() {
            return Err(StoreError::Validation("topic must not be blank".into()));
        }
        let row = sqlx::query_as::<_, SharedSessionRow>(
            "INSERT INTO shared_sessions (id, topic, mode, chat_history, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, topic, mode, chat_history, created_at",
        )
        .bind(id)
        .bind(topic)
        .bind(mode)
        .bind(Json(chat_history))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn get_shared_session(&self, id: &str) -> StoreResult<Option<SharedSession>> {
        let row = sqlx::query_as::<_, SharedSessionRow>(
            "SELECT id, topic, mode, chat_history, created_at FROM shared_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Deletes shared sessions older than `days_to_keep` days and returns how
    /// many were removed.
    pub async fn clean_expired_shared_sessions(&self, days_to_keep: u32) -> StoreResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_to_keep));
        let removed = sqlx::query("DELETE FROM shared_sessions WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!(removed, days_to_keep, "Expired shared sessions purged");
        Ok(removed)
    }
}

async fn insert_curriculum_row(
    conn: &mut SqliteConnection,
    topic: &str,
    structure: &Value,
    diagram: Option<&str>,
    total_weeks: u32,
) -> StoreResult<i64> {
    if total_weeks < 1 {
        return Err(StoreError::Validation("total_weeks must be at least 1".into()));
    }
    if topic.trim().is_empty() {
        return Err(StoreError::Validation("topic must not be blank".into()));
    }
    let id = sqlx::query_scalar(
        "INSERT INTO curricula (topic, structure, mermaid_diagram, total_weeks, created_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(topic)
    .bind(Json(structure))
    .bind(diagram)
    .bind(i64::from(total_weeks))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

async fn insert_weeks(
    conn: &mut SqliteConnection,
    curriculum_id: i64,
    total_weeks: i64,
    weeks: &[NewWeek],
) -> StoreResult<()> {
    week::validate_week_set(weeks)?;
    if weeks.len() as i64 != total_weeks {
        return Err(StoreError::Validation(format!(
            "curriculum {curriculum_id} expects {total_weeks} weeks, got {}",
            weeks.len()
        )));
    }

    for w in weeks {
        sqlx::query(
            "INSERT INTO curriculum_weeks \
             (curriculum_id, week_number, title, objectives, concepts, prerequisites, topic_for_learning) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(curriculum_id)
        .bind(i64::from(w.week_number))
        .bind(&w.title)
        .bind(Json(&w.objectives))
        .bind(Json(&w.concepts))
        .bind(Json(&w.prerequisites))
        .bind(&w.topic_for_learning)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marker_types::{EvalResult, Score};
use serde_json::Value;
use sqlx::{Pool, Postgres, Row};
use tracing::instrument;

use crate::sql::error::SqlError;
use crate::sql::query::Queries;
use crate::sql::schema::ScoreRow;

const SCORE_BATCH_SIZE: usize = 500;

#[async_trait]
pub trait EvalSqlLogic {
    /// Register (or refresh) an eval definition, returning its row id.
    async fn upsert_eval(
        pool: &Pool<Postgres>,
        name: &str,
        description: Option<&str>,
        dataset_config: &Value,
        scorers_config: &Value,
        meta: &Value,
    ) -> Result<i64, SqlError> {
        let query = Queries::UpsertEval.get_query();

        let row = sqlx::query(query.sql)
            .bind(name)
            .bind(description)
            .bind(dataset_config)
            .bind(scorers_config)
            .bind(meta)
            .fetch_one(pool)
            .await?;

        Ok(row.get::<i64, _>("id"))
    }

    /// Persist a run and its scores. Scores are inserted in batches.
    #[instrument(skip_all, fields(run_id = %run.run_id, scores = run.scores.len()))]
    async fn insert_run(
        pool: &Pool<Postgres>,
        eval_row_id: i64,
        run: &EvalResult,
        model: Option<&str>,
    ) -> Result<(), SqlError> {
        let query = Queries::InsertRun.get_query();

        sqlx::query(query.sql)
            .bind(eval_row_id)
            .bind(&run.run_id)
            .bind(&run.dataset_id)
            .bind(model)
            .bind(run.created_at)
            .bind(Value::Object(run.metadata.clone()))
            .execute(pool)
            .await?;

        for chunk in run.scores.chunks(SCORE_BATCH_SIZE) {
            Self::insert_scores_batch(pool, &run.run_id, chunk, run.created_at).await?;
        }

        Ok(())
    }

    async fn insert_scores_batch(
        pool: &Pool<Postgres>,
        run_id: &str,
        scores: &[Score],
        created_at: DateTime<Utc>,
    ) -> Result<(), SqlError> {
        if scores.is_empty() {
            return Ok(());
        }

        let query = Queries::InsertScoresBatch.get_query();

        let mut run_ids: Vec<&str> = Vec::with_capacity(scores.len());
        let mut names: Vec<&str> = Vec::with_capacity(scores.len());
        let mut values: Vec<f64> = Vec::with_capacity(scores.len());
        let mut eval_ids: Vec<&str> = Vec::with_capacity(scores.len());
        let mut comments: Vec<Option<&str>> = Vec::with_capacity(scores.len());
        let mut metas: Vec<Value> = Vec::with_capacity(scores.len());
        let mut trace_ids: Vec<Option<&str>> = Vec::with_capacity(scores.len());
        let mut observation_ids: Vec<Option<&str>> = Vec::with_capacity(scores.len());
        let mut created_ats: Vec<DateTime<Utc>> = Vec::with_capacity(scores.len());

        for score in scores {
            run_ids.push(run_id);
            names.push(&score.name);
            values.push(score.value.as_f64());
            eval_ids.push(&score.eval_id);
            comments.push(score.comment.as_deref());
            metas.push(Value::Object(score.metadata.clone()));
            trace_ids.push(score.trace_id.as_deref());
            observation_ids.push(score.observation_id.as_deref());
            created_ats.push(created_at);
        }

        sqlx::query(query.sql)
            .bind(run_ids)
            .bind(names)
            .bind(values)
            .bind(eval_ids)
            .bind(comments)
            .bind(metas)
            .bind(trace_ids)
            .bind(observation_ids)
            .bind(created_ats)
            .execute(pool)
            .await?;

        Ok(())
    }

    async fn get_run_scores(
        pool: &Pool<Postgres>,
        run_id: &str,
    ) -> Result<Vec<Score>, SqlError> {
        let query = Queries::GetRunScores.get_query();

        let rows = sqlx::query_as::<_, ScoreRow>(query.sql)
            .bind(run_id)
            .fetch_all(pool)
            .await?;

        Ok(rows.into_iter().map(ScoreRow::into_score).collect())
    }
}

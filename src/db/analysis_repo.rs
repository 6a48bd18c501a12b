// src/db/analysis_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{types::Json, Executor, Sqlite};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::analysis::{AnalysisOutcome, AnalysisResult},
};

#[derive(Clone, Default)]
pub struct AnalysisRepository;

impl AnalysisRepository {
    pub fn new() -> Self {
        Self
    }

    /// Cada análise é uma linha nova; nada é sobrescrito.
    pub async fn insert_result<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
        outcome: &AnalysisOutcome,
        now: DateTime<Utc>,
    ) -> Result<AnalysisResult, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query_as::<_, AnalysisResult>(
            r#"
            INSERT INTO analysis_results (id, customer_id, report, opportunities, simulated, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, customer_id, report, opportunities, simulated, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .bind(&outcome.report)
        .bind(Json(&outcome.opportunities))
        .bind(outcome.simulated)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(result)
    }

    /// Mais recentes primeiro.
    pub async fn list_for_customer<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
    ) -> Result<Vec<AnalysisResult>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let results = sqlx::query_as::<_, AnalysisResult>(
            r#"
            SELECT id, customer_id, report, opportunities, simulated, created_at
            FROM analysis_results
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;

        Ok(results)
    }
}

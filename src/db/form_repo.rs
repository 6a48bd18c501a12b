// src/db/form_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{types::Json, Executor, Sqlite};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::form::{FormSchema, FormTemplate},
};

#[derive(Clone, Default)]
pub struct FormRepository;

impl FormRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_template<'e, E>(
        &self,
        executor: E,
        name: &str,
        schema: &FormSchema,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<FormTemplate, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, FormTemplate>(
            r#"
            INSERT INTO form_templates (id, version, name, schema, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING id, version, name, schema, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&schema.version)
        .bind(name)
        .bind(Json(schema))
        .bind(is_active)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            // Versão repetida
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateFormVersion(schema.version.clone());
                }
            }
            e.into()
        })
    }

    pub async fn find_active<'e, E>(&self, executor: E) -> Result<Option<FormTemplate>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let form = sqlx::query_as::<_, FormTemplate>(
            r#"
            SELECT id, version, name, schema, is_active, created_at, updated_at
            FROM form_templates
            WHERE is_active = 1
            "#,
        )
        .fetch_optional(executor)
        .await?;

        Ok(form)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<FormTemplate>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let form = sqlx::query_as::<_, FormTemplate>(
            r#"
            SELECT id, version, name, schema, is_active, created_at, updated_at
            FROM form_templates
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(form)
    }

    pub async fn list<'e, E>(&self, executor: E) -> Result<Vec<FormTemplate>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let forms = sqlx::query_as::<_, FormTemplate>(
            r#"
            SELECT id, version, name, schema, is_active, created_at, updated_at
            FROM form_templates
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(forms)
    }

    pub async fn count<'e, E>(&self, executor: E) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM form_templates")
            .fetch_one(executor)
            .await?;
        Ok(total)
    }

    pub async fn update_template<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: &str,
        schema: &FormSchema,
        now: DateTime<Utc>,
    ) -> Result<Option<FormTemplate>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, FormTemplate>(
            r#"
            UPDATE form_templates
            SET name = ?2, version = ?3, schema = ?4, updated_at = ?5
            WHERE id = ?1
            RETURNING id, version, name, schema, is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(&schema.version)
        .bind(Json(schema))
        .bind(now)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateFormVersion(schema.version.clone());
                }
            }
            e.into()
        })
    }

    pub async fn deactivate_all<'e, E>(&self, executor: E, now: DateTime<Utc>) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE form_templates SET is_active = 0, updated_at = ?1 WHERE is_active = 1")
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn mark_active<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<FormTemplate>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let form = sqlx::query_as::<_, FormTemplate>(
            r#"
            UPDATE form_templates
            SET is_active = 1, updated_at = ?2
            WHERE id = ?1
            RETURNING id, version, name, schema, is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        Ok(form)
    }
}

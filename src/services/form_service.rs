// src/services/form_service.rs

use chrono::Utc;
use sqlx::{Acquire, Executor, Sqlite};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::FormRepository,
    models::form::{default_form_schema, FormSchema, FormTemplate, RenderedForm, SubmittedValues, ValidationResult},
    services::form_engine,
};

pub const DEFAULT_FORM_NAME: &str = "KYC intake";

#[derive(Clone)]
pub struct FormService {
    repo: FormRepository,
}

impl FormService {
    pub fn new(repo: FormRepository) -> Self {
        Self { repo }
    }

    /// Semeia o formulário padrão (já ativo) quando a tabela está vazia.
    pub async fn ensure_default<'e, E>(&self, executor: E) -> Result<Option<FormTemplate>, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut tx = executor.begin().await?;

        if self.repo.count(&mut *tx).await? > 0 {
            return Ok(None);
        }

        let form = self
            .repo
            .create_template(&mut *tx, DEFAULT_FORM_NAME, &default_form_schema(), true, Utc::now())
            .await?;
        tx.commit().await?;

        tracing::info!("📝 Formulário padrão v{} criado", form.version);
        Ok(Some(form))
    }

    pub async fn active_template<'e, E>(&self, executor: E) -> Result<FormTemplate, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        self.repo.find_active(executor).await?.ok_or(AppError::NoActiveForm)
    }

    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<FormTemplate, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        self.repo.find_by_id(executor, id).await?.ok_or(AppError::FormNotFound)
    }

    pub async fn list<'e, E>(&self, executor: E) -> Result<Vec<FormTemplate>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        self.repo.list(executor).await
    }

    /// Novos templates nascem inativos; ativar é um passo explícito.
    pub async fn create<'e, E>(&self, executor: E, name: &str, schema: &FormSchema) -> Result<FormTemplate, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        form_engine::check_schema(schema).map_err(AppError::InvalidFormSchema)?;
        self.repo.create_template(executor, name, schema, false, Utc::now()).await
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        schema: Option<&FormSchema>,
    ) -> Result<FormTemplate, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        if let Some(schema) = schema {
            form_engine::check_schema(schema).map_err(AppError::InvalidFormSchema)?;
        }

        let mut tx = executor.begin().await?;
        let current = self.repo.find_by_id(&mut *tx, id).await?.ok_or(AppError::FormNotFound)?;

        let name = name.unwrap_or(&current.name);
        let schema = schema.unwrap_or(&current.schema.0);
        let updated = self
            .repo
            .update_template(&mut *tx, id, name, schema, Utc::now())
            .await?
            .ok_or(AppError::FormNotFound)?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Ativa um template e desativa o anterior na mesma transação.
    /// Clientes existentes mantêm o `form_version` com que foram gravados.
    pub async fn activate<'e, E>(&self, executor: E, id: Uuid) -> Result<FormTemplate, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut tx = executor.begin().await?;
        let now = Utc::now();

        self.repo.find_by_id(&mut *tx, id).await?.ok_or(AppError::FormNotFound)?;
        self.repo.deactivate_all(&mut *tx, now).await?;
        let form = self
            .repo
            .mark_active(&mut *tx, id, now)
            .await?
            .ok_or(AppError::FormNotFound)?;

        tx.commit().await?;
        tracing::info!("📝 Formulário v{} ativado", form.version);
        Ok(form)
    }

    pub async fn validate_active<'e, E>(&self, executor: E, values: &SubmittedValues) -> Result<ValidationResult, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let form = self.active_template(executor).await?;
        Ok(form_engine::validate(&form.schema, values))
    }

    pub async fn render_active<'e, E>(&self, executor: E) -> Result<RenderedForm, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let form = self.active_template(executor).await?;
        Ok(form_engine::render(&form.schema))
    }
}

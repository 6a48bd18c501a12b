// src/handlers/forms.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::form::{FormSchema, FormTemplate, RenderedForm, SubmittedValues, ValidationResult},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormPayload {
    #[validate(length(min = 1, max = 100, message = "length"))]
    #[schema(example = "KYC intake v2")]
    pub name: String,
    pub schema: FormSchema,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormPayload {
    #[validate(length(min = 1, max = 100, message = "length"))]
    pub name: Option<String>,
    pub schema: Option<FormSchema>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFormPayload {
    #[schema(value_type = Object, example = json!({"source_channel": "referral"}))]
    pub values: SubmittedValues,
}

// GET /api/forms/active
#[utoipa::path(
    get,
    path = "/api/forms/active",
    tag = "Forms",
    responses(
        (status = 200, description = "Formulário ativo", body = FormTemplate),
        (status = 404, description = "Nenhum formulário ativo")
    )
)]
pub async fn get_active_form(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let form = app_state
        .form_service
        .active_template(&app_state.db_pool)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(form)))
}

// GET /api/forms/active/render
#[utoipa::path(
    get,
    path = "/api/forms/active/render",
    tag = "Forms",
    responses(
        (status = 200, description = "Descrição de UI do formulário ativo", body = RenderedForm),
        (status = 404, description = "Nenhum formulário ativo")
    )
)]
pub async fn render_active_form(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let rendered = app_state
        .form_service
        .render_active(&app_state.db_pool)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(rendered)))
}

// POST /api/forms/validate
#[utoipa::path(
    post,
    path = "/api/forms/validate",
    tag = "Forms",
    request_body = ValidateFormPayload,
    responses(
        (status = 200, description = "Resultado da validação (todos os erros de uma vez)", body = ValidationResult),
        (status = 404, description = "Nenhum formulário ativo")
    )
)]
pub async fn validate_form(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<ValidateFormPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .form_service
        .validate_active(&app_state.db_pool, &payload.values)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(result)))
}

// GET /api/forms
#[utoipa::path(
    get,
    path = "/api/forms",
    tag = "Forms",
    responses(
        (status = 200, description = "Todos os templates", body = Vec<FormTemplate>)
    )
)]
pub async fn list_forms(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let forms = app_state
        .form_service
        .list(&app_state.db_pool)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(forms)))
}

// POST /api/forms
#[utoipa::path(
    post,
    path = "/api/forms",
    tag = "Forms",
    request_body = CreateFormPayload,
    responses(
        (status = 201, description = "Template criado (inativo)", body = FormTemplate),
        (status = 400, description = "Definição inválida"),
        (status = 409, description = "Versão já existe")
    )
)]
pub async fn create_form(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CreateFormPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let form = app_state
        .form_service
        .create(&app_state.db_pool, payload.name.trim(), &payload.schema)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(form)))
}

// GET /api/forms/{id}
#[utoipa::path(
    get,
    path = "/api/forms/{id}",
    tag = "Forms",
    params(("id" = Uuid, Path, description = "ID do template")),
    responses(
        (status = 200, description = "Template", body = FormTemplate),
        (status = 404, description = "Template não encontrado")
    )
)]
pub async fn get_form(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let form = app_state
        .form_service
        .get(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(form)))
}

// PUT /api/forms/{id}
#[utoipa::path(
    put,
    path = "/api/forms/{id}",
    tag = "Forms",
    params(("id" = Uuid, Path, description = "ID do template")),
    request_body = UpdateFormPayload,
    responses(
        (status = 200, description = "Template atualizado", body = FormTemplate),
        (status = 400, description = "Definição inválida"),
        (status = 404, description = "Template não encontrado"),
        (status = 409, description = "Versão já existe")
    )
)]
pub async fn update_form(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFormPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let form = app_state
        .form_service
        .update(&app_state.db_pool, id, payload.name.as_deref().map(str::trim), payload.schema.as_ref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(form)))
}

// POST /api/forms/{id}/activate
#[utoipa::path(
    post,
    path = "/api/forms/{id}/activate",
    tag = "Forms",
    params(("id" = Uuid, Path, description = "ID do template")),
    responses(
        (status = 200, description = "Template ativado; o anterior foi desativado", body = FormTemplate),
        (status = 404, description = "Template não encontrado")
    )
)]
pub async fn activate_form(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let form = app_state
        .form_service
        .activate(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(form)))
}

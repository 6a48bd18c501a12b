// src/handlers/analysis.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::analysis::AnalysisResult,
};

// POST /api/customers/{id}/analyze
#[utoipa::path(
    post,
    path = "/api/customers/{id}/analyze",
    tag = "Analysis",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Análise concluída; cliente em proposal_ready", body = AnalysisResult),
        (status = 400, description = "Cliente sem dados KYC"),
        (status = 404, description = "Cliente não encontrado"),
        (status = 409, description = "Status atual não permite análise"),
        (status = 502, description = "Falha no serviço de IA"),
        (status = 504, description = "Serviço de IA não respondeu a tempo")
    )
)]
pub async fn analyze_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .analysis_service
        .run(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(result)))
}

// GET /api/customers/{id}/analyses
#[utoipa::path(
    get,
    path = "/api/customers/{id}/analyses",
    tag = "Analysis",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Análises anteriores, mais recentes primeiro", body = Vec<AnalysisResult>),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn list_analyses(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let results = app_state
        .analysis_service
        .list_results(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(results)))
}

// src/handlers/invites.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::invite::{CreateInvitePayload, FormInvite, InviteCheck, InviteLink, InviteReceipt, InviteSubmission},
};

// POST /api/invites
#[utoipa::path(
    post,
    path = "/api/invites",
    tag = "Invites",
    request_body = CreateInvitePayload,
    responses(
        (status = 201, description = "Link de preenchimento criado", body = InviteLink),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn create_invite(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CreateInvitePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let invite = app_state
        .invite_service
        .create(&app_state.db_pool, &payload, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(InviteLink::new(invite, &app_state.public_base_url))))
}

// GET /api/customers/{id}/invites
#[utoipa::path(
    get,
    path = "/api/customers/{id}/invites",
    tag = "Invites",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Convites do cliente, mais recentes primeiro", body = Vec<FormInvite>),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn list_customer_invites(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invites = app_state
        .invite_service
        .list_for_customer(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(invites)))
}

// DELETE /api/invites/{id}
#[utoipa::path(
    delete,
    path = "/api/invites/{id}",
    tag = "Invites",
    params(("id" = Uuid, Path, description = "ID do convite")),
    responses(
        (status = 200, description = "Convite revogado", body = FormInvite),
        (status = 404, description = "Convite não encontrado")
    )
)]
pub async fn revoke_invite(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invite = app_state
        .invite_service
        .revoke(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(invite)))
}

// GET /api/public/invites/{token}
#[utoipa::path(
    get,
    path = "/api/public/invites/{token}",
    tag = "Invites",
    params(("token" = String, Path, description = "Token do link")),
    responses(
        (status = 200, description = "Situação do link e formulário a preencher", body = InviteCheck)
    )
)]
pub async fn check_invite(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let check = app_state
        .invite_service
        .check(&app_state.db_pool, &token, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(check)))
}

// POST /api/public/invites/{token}/submit
#[utoipa::path(
    post,
    path = "/api/public/invites/{token}/submit",
    tag = "Invites",
    params(("token" = String, Path, description = "Token do link")),
    request_body = InviteSubmission,
    responses(
        (status = 200, description = "KYC recebido; link consumido", body = InviteReceipt),
        (status = 400, description = "Formulário inválido (erros por campo)"),
        (status = 404, description = "Link inexistente"),
        (status = 410, description = "Link usado, expirado ou revogado")
    )
)]
pub async fn submit_invite(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
    Json(payload): Json<InviteSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = app_state
        .invite_service
        .submit(&app_state.db_pool, &token, &payload.kyc_data, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(receipt)))
}

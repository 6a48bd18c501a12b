// src/handlers/customers.rs

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::crm::{
        CreateCustomerPayload, Customer, CustomerFilter, CustomerPage, CustomerStatus, StatusHistoryEntry,
        TransitionSource, UpdateBirthdayPayload, UpdateCustomerPayload, UpdateStatusPayload,
    },
    services::crm_service::MAX_PAGE_SIZE,
};

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCustomersQuery {
    /// Filtra por status
    pub status: Option<CustomerStatus>,
    #[validate(range(min = 0, message = "range"))]
    pub skip: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "range"))]
    pub limit: Option<i64>,
}

// GET /api/customers
#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "Customers",
    params(ListCustomersQuery),
    responses(
        (status = 200, description = "Página de clientes, mais recentes primeiro", body = CustomerPage),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn list_customers(
    State(app_state): State<AppState>,
    locale: Locale,
    query: Result<Query<ListCustomersQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Status desconhecido ou número malformado: mesma resposta JSON dos outros 400.
    let Query(query) = query.map_err(|rejection| {
        AppError::InvalidQuery(rejection.body_text()).to_api_error(&locale, &app_state.i18n_store)
    })?;

    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let filter = CustomerFilter {
        status: query.status,
        skip: query.skip.unwrap_or(0),
        limit: query.limit.unwrap_or(MAX_PAGE_SIZE),
    };

    let page = app_state
        .crm_service
        .list_customers(&app_state.db_pool, filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(page)))
}

// POST /api/customers
#[utoipa::path(
    post,
    path = "/api/customers",
    tag = "Customers",
    request_body = CreateCustomerPayload,
    responses(
        (status = 201, description = "Cliente criado", body = Customer),
        (status = 400, description = "Dados inválidos (erros por campo)"),
        (status = 404, description = "Nenhum formulário ativo")
    )
)]
pub async fn create_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CreateCustomerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let customer = app_state
        .crm_service
        .create_customer(&app_state.db_pool, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(customer)))
}

// GET /api/customers/{id}
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente", body = Customer),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn get_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = app_state
        .crm_service
        .get_customer(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(customer)))
}

// PUT /api/customers/{id}
#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = UpdateCustomerPayload,
    responses(
        (status = 200, description = "Cliente atualizado", body = Customer),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn update_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let customer = app_state
        .crm_service
        .update_customer(&app_state.db_pool, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(customer)))
}

// PUT /api/customers/{id}/status
#[utoipa::path(
    put,
    path = "/api/customers/{id}/status",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status alterado", body = Customer),
        (status = 404, description = "Cliente não encontrado"),
        (status = 409, description = "Transição não permitida")
    )
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = app_state
        .crm_service
        .transition(&app_state.db_pool, id, payload.status, TransitionSource::Operator)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(customer)))
}

// PUT /api/customers/{id}/birthday
#[utoipa::path(
    put,
    path = "/api/customers/{id}/birthday",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = UpdateBirthdayPayload,
    responses(
        (status = 200, description = "Aniversário atualizado", body = Customer),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn update_birthday(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBirthdayPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = app_state
        .crm_service
        .update_birthday(&app_state.db_pool, id, payload.birthday)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(customer)))
}

// GET /api/customers/{id}/history
#[utoipa::path(
    get,
    path = "/api/customers/{id}/history",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Histórico de status, mais antigo primeiro", body = Vec<StatusHistoryEntry>),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn get_history(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let history = app_state
        .crm_service
        .history(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(history)))
}

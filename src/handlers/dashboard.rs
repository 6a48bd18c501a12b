// src/handlers/dashboard.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::{crm::CustomerStats, reminder::Reminder},
};

// GET /api/dashboard/reminders
#[utoipa::path(
    get,
    path = "/api/dashboard/reminders",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Lembretes do dia, mais urgentes primeiro", body = Vec<Reminder>)
    )
)]
pub async fn get_reminders(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let reminders = app_state
        .reminder_service
        .reminders(&app_state.db_pool, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(reminders.into_vec())))
}

// GET /api/dashboard/stats
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Total de clientes por status", body = CustomerStats)
    )
)]
pub async fn get_stats(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let stats = app_state
        .crm_service
        .stats(&app_state.db_pool)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(stats)))
}

// src/lib.rs

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;

/// Monta o router completo (API + Swagger). Usado pelo `main` e pelos testes.
pub fn build_app(app_state: AppState) -> Router {
    let customer_routes = Router::new()
        .route(
            "/",
            post(handlers::customers::create_customer).get(handlers::customers::list_customers),
        )
        .route(
            "/{id}",
            get(handlers::customers::get_customer).put(handlers::customers::update_customer),
        )
        .route("/{id}/status", put(handlers::customers::update_status))
        .route("/{id}/birthday", put(handlers::customers::update_birthday))
        .route("/{id}/history", get(handlers::customers::get_history))
        .route("/{id}/analyze", post(handlers::analysis::analyze_customer))
        .route("/{id}/analyses", get(handlers::analysis::list_analyses))
        .route("/{id}/invites", get(handlers::invites::list_customer_invites));

    let form_routes = Router::new()
        .route(
            "/",
            get(handlers::forms::list_forms).post(handlers::forms::create_form),
        )
        .route("/active", get(handlers::forms::get_active_form))
        .route("/active/render", get(handlers::forms::render_active_form))
        .route("/validate", post(handlers::forms::validate_form))
        .route(
            "/{id}",
            get(handlers::forms::get_form).put(handlers::forms::update_form),
        )
        .route("/{id}/activate", post(handlers::forms::activate_form));

    let invite_routes = Router::new()
        .route("/", post(handlers::invites::create_invite))
        .route("/{id}", delete(handlers::invites::revoke_invite));

    // Sem autenticação de operador: é o que o cliente abre pelo link.
    let public_invite_routes = Router::new()
        .route("/{token}", get(handlers::invites::check_invite))
        .route("/{token}/submit", post(handlers::invites::submit_invite));

    let dashboard_routes = Router::new()
        .route("/reminders", get(handlers::dashboard::get_reminders))
        .route("/stats", get(handlers::dashboard::get_stats));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/customers", customer_routes)
        .nest("/api/forms", form_routes)
        .nest("/api/invites", invite_routes)
        .nest("/api/public/invites", public_invite_routes)
        .nest("/api/dashboard", dashboard_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}

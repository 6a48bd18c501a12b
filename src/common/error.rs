use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    models::{
        crm::{CustomerStatus, TransitionSource},
        form::ValidationResult,
        invite::InviteStatus,
    },
    services::analysis_gateway::AnalysisError,
};

// Erro de domínio/serviço. Os handlers convertem para ApiError com o idioma do pedido.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Formulário KYC inválido ({} campo(s))", .0.errors.len())]
    FormValidation(ValidationResult),

    #[error("Definição de formulário inválida: {}", .0.join("; "))]
    InvalidFormSchema(Vec<String>),

    #[error("Transição inválida de {from} para {to} ({via})")]
    InvalidTransition {
        from: CustomerStatus,
        to: CustomerStatus,
        via: TransitionSource,
    },

    #[error("Parâmetros de consulta inválidos: {0}")]
    InvalidQuery(String),

    #[error("Cliente não encontrado")]
    CustomerNotFound,

    #[error("Formulário não encontrado")]
    FormNotFound,

    #[error("Nenhum formulário ativo")]
    NoActiveForm,

    #[error("Convite não encontrado")]
    InviteNotFound,

    #[error("Convite indisponível ({0})")]
    InviteUnavailable(InviteStatus),

    #[error("Cliente sem dados KYC")]
    MissingKycData,

    #[error("Versão de formulário '{0}' já existe")]
    DuplicateFormVersion(String),

    #[error("Falha na análise de IA: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Falha nas migrações: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

/// Resposta de erro já traduzida, pronta para sair pelo axum.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    fn simple(status: StatusCode, code: &'static str, message: String) -> Self {
        Self { status, code, message, details: None }
    }
}

impl AppError {
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let lang = locale.0.as_str();
        let t = |key: &'static str, args: &[(&str, String)]| i18n.translate(lang, key, args);

        match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let code = e.message.as_deref().unwrap_or(e.code.as_ref());
                            let key = format!("field.{code}");
                            Value::String(i18n.translate(lang, &key, &[("label", field.to_string())]))
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    code: "invalid_payload",
                    message: t("error.invalid_payload", &[]),
                    details: Some(Value::Object(details)),
                }
            }
            AppError::FormValidation(result) => {
                let details: Vec<Value> = result
                    .errors
                    .iter()
                    .map(|e| {
                        let mut args = e.code.message_args();
                        args.push(("label", e.label.clone()));
                        let mut entry = serde_json::to_value(e).unwrap_or_else(|_| json!({}));
                        if let Value::Object(map) = &mut entry {
                            map.insert(
                                "message".to_string(),
                                Value::String(i18n.translate(lang, e.code.message_key(), &args)),
                            );
                        }
                        entry
                    })
                    .collect();
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    code: "form_invalid",
                    message: t("error.form_invalid", &[("count", result.errors.len().to_string())]),
                    details: Some(Value::Array(details)),
                }
            }
            AppError::InvalidFormSchema(problems) => ApiError {
                status: StatusCode::BAD_REQUEST,
                code: "invalid_form_schema",
                message: t("error.invalid_form_schema", &[]),
                details: Some(json!(problems)),
            },
            AppError::InvalidTransition { from, to, via } => ApiError::simple(
                StatusCode::CONFLICT,
                "invalid_transition",
                t("error.invalid_transition", &[
                    ("from", from.to_string()),
                    ("to", to.to_string()),
                    ("via", via.to_string()),
                ]),
            ),
            AppError::InvalidQuery(reason) => ApiError {
                status: StatusCode::BAD_REQUEST,
                code: "invalid_query",
                message: t("error.invalid_query", &[]),
                details: Some(json!({ "reason": reason })),
            },
            AppError::CustomerNotFound => ApiError::simple(
                StatusCode::NOT_FOUND,
                "customer_not_found",
                t("error.customer_not_found", &[]),
            ),
            AppError::FormNotFound => ApiError::simple(
                StatusCode::NOT_FOUND,
                "form_not_found",
                t("error.form_not_found", &[]),
            ),
            AppError::NoActiveForm => ApiError::simple(
                StatusCode::NOT_FOUND,
                "no_active_form",
                t("error.no_active_form", &[]),
            ),
            AppError::InviteNotFound => ApiError::simple(
                StatusCode::NOT_FOUND,
                "invite_not_found",
                t("error.invite_not_found", &[]),
            ),
            AppError::InviteUnavailable(status) => {
                let (code, key) = match status {
                    InviteStatus::Used => ("invite_used", "error.invite_used"),
                    InviteStatus::Expired => ("invite_expired", "error.invite_expired"),
                    _ => ("invite_revoked", "error.invite_revoked"),
                };
                ApiError::simple(StatusCode::GONE, code, t(key, &[]))
            }
            AppError::MissingKycData => ApiError::simple(
                StatusCode::BAD_REQUEST,
                "missing_kyc",
                t("error.missing_kyc", &[]),
            ),
            AppError::DuplicateFormVersion(version) => ApiError::simple(
                StatusCode::CONFLICT,
                "duplicate_form_version",
                t("error.duplicate_form_version", &[("version", version.clone())]),
            ),
            AppError::Analysis(AnalysisError::Timeout(_)) => ApiError::simple(
                StatusCode::GATEWAY_TIMEOUT,
                "analysis_timeout",
                t("error.analysis_timeout", &[]),
            ),
            AppError::Analysis(err) => {
                tracing::warn!("Falha na análise de IA: {}", err);
                ApiError::simple(
                    StatusCode::BAD_GATEWAY,
                    "analysis_failed",
                    t("error.analysis_failed", &[("reason", err.to_string())]),
                )
            }

            // Banco e erros inesperados viram 500, com o detalhe só no log.
            e @ (AppError::DatabaseError(_) | AppError::MigrationError(_) | AppError::InternalServerError(_)) => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                ApiError::simple(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    t("error.internal", &[]),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "code": self.code,
        });
        if let (Some(details), Value::Object(map)) = (self.details, &mut body) {
            map.insert("details".to_string(), details);
        }
        (self.status, Json(body)).into_response()
    }
}

// Caminho sem idioma (ex.: rejeições de extratores): usa inglês.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), &I18nStore::new()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_is_conflict_naming_the_path() {
        let err = AppError::InvalidTransition {
            from: CustomerStatus::Signed,
            to: CustomerStatus::Signed,
            via: TransitionSource::Operator,
        };
        assert_eq!(err.to_string(), "Transição inválida de signed para signed (operator)");

        let api = err.to_api_error(&Locale::default(), &I18nStore::new());
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.code, "invalid_transition");
        assert_eq!(api.message, "Cannot move customer from 'signed' to 'signed' (operator).");
    }
}

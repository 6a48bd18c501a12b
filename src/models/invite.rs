// src/models/invite.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::form::{RenderedForm, SubmittedValues};

/// Situação de um link de preenchimento num dado instante.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Open,
    Used,
    Expired,
    Revoked,
    /// Token que não existe.
    Unknown,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Open => "open",
            InviteStatus::Used => "used",
            InviteStatus::Expired => "expired",
            InviteStatus::Revoked => "revoked",
            InviteStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormInvite {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[schema(example = "3f2a9c0d8e7b4a1c9d6e5f4a3b2c1d0e")]
    pub token: String,
    /// `None` = não expira.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FormInvite {
    pub fn new(customer_id: Uuid, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            token: Uuid::new_v4().simple().to_string(),
            expires_at,
            is_active: true,
            used_at: None,
            created_at: now,
        }
    }

    // Uso vence expiração, que vence revogação.
    pub fn status_at(&self, now: DateTime<Utc>) -> InviteStatus {
        if self.used_at.is_some() {
            InviteStatus::Used
        } else if self.expires_at.is_some_and(|at| at < now) {
            InviteStatus::Expired
        } else if !self.is_active {
            InviteStatus::Revoked
        } else {
            InviteStatus::Open
        }
    }
}

/// Convite recém-criado, com o link pronto para enviar ao cliente.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteLink {
    #[serde(flatten)]
    pub invite: FormInvite,
    #[schema(example = "http://localhost:3000/fill/3f2a9c0d8e7b4a1c9d6e5f4a3b2c1d0e")]
    pub invite_url: String,
}

impl InviteLink {
    pub fn new(invite: FormInvite, public_base_url: &str) -> Self {
        let invite_url = format!("{}/fill/{}", public_base_url.trim_end_matches('/'), invite.token);
        Self { invite, invite_url }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitePayload {
    pub customer_id: Uuid,
    /// Dias até expirar (padrão 7); 0 = sem expiração.
    #[validate(range(min = 0, max = 90, message = "range"))]
    #[schema(example = 7)]
    pub expires_days: Option<i64>,
}

/// O que a página pública recebe ao abrir o link.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteCheck {
    pub valid: bool,
    pub status: InviteStatus,
    pub customer_name: Option<String>,
    /// Formulário ativo já renderizado; ausente se o link não vale ou não há formulário.
    pub form: Option<RenderedForm>,
}

impl InviteCheck {
    pub fn rejected(status: InviteStatus) -> Self {
        Self { valid: false, status, customer_name: None, form: None }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteSubmission {
    #[schema(value_type = Object, example = json!({"source_channel": "referral", "city": "Shanghai"}))]
    pub kyc_data: SubmittedValues,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteReceipt {
    pub customer_id: Uuid,
    pub form_version: Option<String>,
}

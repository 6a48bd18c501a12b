// src/services/invite_service.rs

use chrono::{DateTime, Duration, Utc};
use sqlx::{Acquire, Executor, Sqlite};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::InviteRepository,
    models::{
        crm::UpdateCustomerPayload,
        form::SubmittedValues,
        invite::{CreateInvitePayload, FormInvite, InviteCheck, InviteReceipt, InviteStatus},
    },
    services::{crm_service::CrmService, form_service::FormService},
};

pub const DEFAULT_INVITE_DAYS: i64 = 7;

/// Links para o cliente preencher o próprio KYC.
#[derive(Clone)]
pub struct InviteService {
    repo: InviteRepository,
    crm: CrmService,
    forms: FormService,
}

impl InviteService {
    pub fn new(repo: InviteRepository, crm: CrmService, forms: FormService) -> Self {
        Self { repo, crm, forms }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreateInvitePayload,
        now: DateTime<Utc>,
    ) -> Result<FormInvite, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut conn = executor.acquire().await?;
        self.crm.get_customer(&mut *conn, payload.customer_id).await?;

        let days = payload.expires_days.unwrap_or(DEFAULT_INVITE_DAYS);
        let expires_at = (days > 0).then(|| now + Duration::days(days));
        let invite = self
            .repo
            .insert_invite(&mut *conn, &FormInvite::new(payload.customer_id, expires_at, now))
            .await?;

        tracing::info!("📝 Convite {} criado para o cliente {}", invite.id, invite.customer_id);
        Ok(invite)
    }

    /// Abertura do link pela página pública. Link inválido não é erro: volta `valid: false`.
    pub async fn check<'e, E>(&self, executor: E, token: &str, now: DateTime<Utc>) -> Result<InviteCheck, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut conn = executor.acquire().await?;
        let Some(invite) = self.repo.find_by_token(&mut *conn, token).await? else {
            return Ok(InviteCheck::rejected(InviteStatus::Unknown));
        };

        let status = invite.status_at(now);
        if status != InviteStatus::Open {
            return Ok(InviteCheck::rejected(status));
        }

        let customer = self.crm.get_customer(&mut *conn, invite.customer_id).await?;
        let form = match self.forms.render_active(&mut *conn).await {
            Ok(form) => Some(form),
            Err(AppError::NoActiveForm) => None,
            Err(e) => return Err(e),
        };

        Ok(InviteCheck {
            valid: true,
            status,
            customer_name: Some(customer.name),
            form,
        })
    }

    /// Envio pelo cliente. Os valores novos sobrescrevem o KYC existente e o
    /// resultado passa pela validação do formulário ativo. O link é consumido
    /// na mesma transação; se a validação falhar, continua aberto.
    pub async fn submit<'e, E>(
        &self,
        executor: E,
        token: &str,
        values: &SubmittedValues,
        now: DateTime<Utc>,
    ) -> Result<InviteReceipt, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut tx = executor.begin().await?;

        let invite = self
            .repo
            .find_by_token(&mut *tx, token)
            .await?
            .ok_or(AppError::InviteNotFound)?;
        let status = invite.status_at(now);
        if status != InviteStatus::Open {
            return Err(AppError::InviteUnavailable(status));
        }
        if !self.repo.mark_used(&mut *tx, invite.id, now).await? {
            return Err(AppError::InviteUnavailable(InviteStatus::Used));
        }

        let customer = self.crm.get_customer(&mut *tx, invite.customer_id).await?;
        let mut merged = customer.kyc_data.map(|data| data.0).unwrap_or_default();
        merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));

        let changes = UpdateCustomerPayload {
            kyc_data: Some(merged),
            ..Default::default()
        };
        let updated = self.crm.update_customer(&mut *tx, customer.id, changes).await?;
        tx.commit().await?;

        tracing::info!("✅ KYC do cliente {} recebido pelo convite {}", updated.id, invite.id);
        Ok(InviteReceipt {
            customer_id: updated.id,
            form_version: updated.form_version,
        })
    }

    pub async fn list_for_customer<'e, E>(&self, executor: E, customer_id: Uuid) -> Result<Vec<FormInvite>, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut conn = executor.acquire().await?;
        self.crm.get_customer(&mut *conn, customer_id).await?;
        self.repo.list_for_customer(&mut *conn, customer_id).await
    }

    pub async fn revoke<'e, E>(&self, executor: E, id: Uuid) -> Result<FormInvite, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let invite = self.repo.deactivate(executor, id).await?.ok_or(AppError::InviteNotFound)?;
        tracing::info!("🔒 Convite {} revogado", invite.id);
        Ok(invite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::db_utils::connect_fresh,
        db::{CrmRepository, FormRepository},
        models::crm::CreateCustomerPayload,
    };
    use serde_json::{json, Value};
    use sqlx::SqlitePool;

    async fn setup() -> (tempfile::TempDir, SqlitePool, InviteService, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect_fresh(dir.path()).await.unwrap();
        let forms = FormService::new(FormRepository::new());
        forms.ensure_default(&pool).await.unwrap();
        let crm = CrmService::new(CrmRepository::new(), forms.clone());

        let customer = crm
            .create_customer(
                &pool,
                CreateCustomerPayload {
                    name: "Xu".to_string(),
                    kyc_data: Some(values(json!({"city": "Suzhou", "core_needs": ["retirement"]}))),
                    birthday: None,
                    next_follow_up: None,
                    related_contacts: vec![],
                },
            )
            .await
            .unwrap();

        (dir, pool, InviteService::new(InviteRepository::new(), crm, forms), customer.id)
    }

    fn values(v: Value) -> SubmittedValues {
        v.as_object().cloned().unwrap()
    }

    fn invite_for(customer_id: Uuid, days: Option<i64>) -> CreateInvitePayload {
        CreateInvitePayload { customer_id, expires_days: days }
    }

    #[tokio::test]
    async fn open_link_shows_customer_and_active_form() {
        let (_dir, pool, service, customer_id) = setup().await;
        let now = Utc::now();
        let invite = service.create(&pool, &invite_for(customer_id, None), now).await.unwrap();
        let expected = now + Duration::days(DEFAULT_INVITE_DAYS);
        assert!(invite.expires_at.is_some_and(|at| (at - expected).num_seconds().abs() < 1));

        let check = service.check(&pool, &invite.token, now).await.unwrap();
        assert!(check.valid);
        assert_eq!(check.status, InviteStatus::Open);
        assert_eq!(check.customer_name.as_deref(), Some("Xu"));
        assert_eq!(check.form.map(|f| f.version).as_deref(), Some("1.0"));

        let unknown = service.check(&pool, "nope", now).await.unwrap();
        assert!(!unknown.valid);
        assert_eq!(unknown.status, InviteStatus::Unknown);
    }

    #[tokio::test]
    async fn submission_merges_kyc_and_consumes_link() {
        let (_dir, pool, service, customer_id) = setup().await;
        let now = Utc::now();
        let invite = service.create(&pool, &invite_for(customer_id, Some(0)), now).await.unwrap();
        assert_eq!(invite.expires_at, None);

        let receipt = service
            .submit(&pool, &invite.token, &values(json!({"city": "Hangzhou", "source_channel": "referral"})), now)
            .await
            .unwrap();
        assert_eq!(receipt.customer_id, customer_id);
        assert_eq!(receipt.form_version.as_deref(), Some("1.0"));

        let customer = service.crm.get_customer(&pool, customer_id).await.unwrap();
        assert_eq!(customer.city.as_deref(), Some("Hangzhou"));
        assert_eq!(customer.source_channel.as_deref(), Some("referral"));
        assert_eq!(customer.core_needs.0, vec!["retirement"]);

        let again = service.submit(&pool, &invite.token, &values(json!({})), now).await;
        assert!(matches!(again, Err(AppError::InviteUnavailable(InviteStatus::Used))));
        assert_eq!(service.check(&pool, &invite.token, now).await.unwrap().status, InviteStatus::Used);
    }

    #[tokio::test]
    async fn invalid_submission_keeps_link_open() {
        let (_dir, pool, service, customer_id) = setup().await;
        let now = Utc::now();
        let invite = service.create(&pool, &invite_for(customer_id, None), now).await.unwrap();

        let err = service
            .submit(&pool, &invite.token, &values(json!({"source_channel": "billboard"})), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FormValidation(_)));

        let check = service.check(&pool, &invite.token, now).await.unwrap();
        assert_eq!(check.status, InviteStatus::Open);
        let customer = service.crm.get_customer(&pool, customer_id).await.unwrap();
        assert_eq!(customer.source_channel, None);
    }

    #[tokio::test]
    async fn expired_and_revoked_links_are_refused() {
        let (_dir, pool, service, customer_id) = setup().await;
        let now = Utc::now();

        let short = service.create(&pool, &invite_for(customer_id, Some(1)), now).await.unwrap();
        let later = now + Duration::days(2);
        assert_eq!(service.check(&pool, &short.token, later).await.unwrap().status, InviteStatus::Expired);
        assert!(matches!(
            service.submit(&pool, &short.token, &values(json!({})), later).await,
            Err(AppError::InviteUnavailable(InviteStatus::Expired))
        ));

        let revoked = service.create(&pool, &invite_for(customer_id, None), now).await.unwrap();
        let after = service.revoke(&pool, revoked.id).await.unwrap();
        assert!(!after.is_active);
        assert!(matches!(
            service.submit(&pool, &revoked.token, &values(json!({})), now).await,
            Err(AppError::InviteUnavailable(InviteStatus::Revoked))
        ));
        assert!(matches!(service.revoke(&pool, Uuid::new_v4()).await, Err(AppError::InviteNotFound)));
        assert!(matches!(
            service.submit(&pool, "missing", &values(json!({})), now).await,
            Err(AppError::InviteNotFound)
        ));

        let listed = service.list_for_customer(&pool, customer_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, revoked.id);
    }

    #[tokio::test]
    async fn unknown_customer_gets_no_invite() {
        let (_dir, pool, service, _) = setup().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            service.create(&pool, &invite_for(missing, None), Utc::now()).await,
            Err(AppError::CustomerNotFound)
        ));
        assert!(matches!(
            service.list_for_customer(&pool, missing).await,
            Err(AppError::CustomerNotFound)
        ));
    }
}

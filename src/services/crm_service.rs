// src/services/crm_service.rs

use chrono::{NaiveDate, Utc};
use sqlx::{types::Json, Acquire, Executor, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CrmRepository,
    models::{
        crm::{
            CreateCustomerPayload, Customer, CustomerFilter, CustomerPage, CustomerStats, CustomerStatus,
            StatusHistoryEntry, TransitionSource, UpdateCustomerPayload,
        },
        form::{KycData, SubmittedValues},
    },
    services::{form_engine, form_service::FormService, workflow},
};

pub const MAX_PAGE_SIZE: i64 = 100;

/// Nome sem espaços nas pontas; vazio depois do trim é rejeitado.
fn clean_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("name", validator::ValidationError::new("length").with_message("length".into()));
        return Err(AppError::ValidationError(errors));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct CrmService {
    repo: CrmRepository,
    forms: FormService,
}

impl CrmService {
    pub fn new(repo: CrmRepository, forms: FormService) -> Self {
        Self { repo, forms }
    }

    // =========================================================================
    //  CADASTRO
    // =========================================================================

    /// Valida a submissão contra o formulário ativo, com todos os erros de uma vez.
    async fn accept_kyc(&self, conn: &mut SqliteConnection, values: &SubmittedValues) -> Result<KycData, AppError> {
        let form = self.forms.active_template(&mut *conn).await?;
        form_engine::accept(&form.schema, values).map_err(AppError::FormValidation)
    }

    pub async fn create_customer<'e, E>(&self, executor: E, payload: CreateCustomerPayload) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let name = clean_name(&payload.name)?;
        let mut tx = executor.begin().await?;

        // `None` = KYC ainda não enviado; `Some({})` passa pela validação normal.
        let mut customer = Customer::new(name, Utc::now());
        if let Some(values) = payload.kyc_data.as_ref() {
            let kyc = self.accept_kyc(&mut tx, values).await?;
            customer.apply_kyc(kyc);
        }
        // Aniversário explícito prevalece sobre o do formulário.
        if payload.birthday.is_some() {
            customer.birthday = payload.birthday;
        }
        customer.next_follow_up = payload.next_follow_up;
        customer.related_contacts = Json(payload.related_contacts);

        let saved = self.repo.insert_customer(&mut *tx, &customer).await?;
        tx.commit().await?;

        tracing::info!("👤 Cliente {} criado", saved.id);
        Ok(saved)
    }

    pub async fn get_customer<'e, E>(&self, executor: E, id: Uuid) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        self.repo.find_customer(executor, id).await?.ok_or(AppError::CustomerNotFound)
    }

    pub async fn list_customers<'e, E>(&self, executor: E, filter: CustomerFilter) -> Result<CustomerPage, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let filter = CustomerFilter {
            skip: filter.skip.max(0),
            limit: filter.limit.clamp(1, MAX_PAGE_SIZE),
            ..filter
        };

        let mut conn = executor.acquire().await?;
        let total = self.repo.count_customers(&mut *conn, filter.status).await?;
        let items = self.repo.list_customers(&mut *conn, &filter).await?;

        Ok(CustomerPage { total, items })
    }

    /// Atualização parcial. Se vier `kycData`, é revalidado contra o formulário ativo.
    pub async fn update_customer<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: UpdateCustomerPayload,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut tx = executor.begin().await?;
        let mut customer = self
            .repo
            .find_customer(&mut *tx, id)
            .await?
            .ok_or(AppError::CustomerNotFound)?;

        if let Some(name) = payload.name.as_deref() {
            customer.name = clean_name(name)?;
        }
        if let Some(values) = payload.kyc_data.as_ref() {
            let kyc = self.accept_kyc(&mut tx, values).await?;
            customer.apply_kyc(kyc);
        }
        if let Some(birthday) = payload.birthday {
            customer.birthday = birthday;
        }
        if let Some(next_follow_up) = payload.next_follow_up {
            customer.next_follow_up = next_follow_up;
        }
        if let Some(contacts) = payload.related_contacts {
            customer.related_contacts = Json(contacts);
        }
        customer.updated_at = Utc::now();

        let saved = self
            .repo
            .update_customer(&mut *tx, &customer)
            .await?
            .ok_or(AppError::CustomerNotFound)?;
        tx.commit().await?;

        Ok(saved)
    }

    pub async fn update_birthday<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        birthday: Option<NaiveDate>,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        self.repo
            .update_birthday(executor, id, birthday, Utc::now())
            .await?
            .ok_or(AppError::CustomerNotFound)
    }

    // =========================================================================
    //  STATUS
    // =========================================================================

    pub async fn transition<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        target: CustomerStatus,
        source: TransitionSource,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut tx = executor.begin().await?;
        let customer = self.transition_on(&mut tx, id, target, source).await?;
        tx.commit().await?;
        Ok(customer)
    }

    /// Verifica, grava o histórico e muda o status na conexão dada.
    /// Quem chama decide a transação.
    pub async fn transition_on(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
        target: CustomerStatus,
        source: TransitionSource,
    ) -> Result<Customer, AppError> {
        let current = self
            .repo
            .find_customer(&mut *conn, id)
            .await?
            .ok_or(AppError::CustomerNotFound)?;

        workflow::check_transition(current.status, target, source)?;

        let now = Utc::now();
        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            customer_id: id,
            from_status: current.status,
            to_status: target,
            source,
            changed_at: now,
        };
        self.repo.insert_status_history(&mut *conn, &entry).await?;

        let updated = self
            .repo
            .update_status(&mut *conn, id, target, now)
            .await?
            .ok_or(AppError::CustomerNotFound)?;

        tracing::info!("🔄 Cliente {}: {} -> {} ({})", id, current.status, target, source);
        Ok(updated)
    }

    pub async fn history<'e, E>(&self, executor: E, id: Uuid) -> Result<Vec<StatusHistoryEntry>, AppError>
    where
        E: Executor<'e, Database = Sqlite> + Acquire<'e, Database = Sqlite>,
    {
        let mut conn = executor.acquire().await?;
        self.repo
            .find_customer(&mut *conn, id)
            .await?
            .ok_or(AppError::CustomerNotFound)?;
        self.repo.list_status_history(&mut *conn, id).await
    }

    // =========================================================================
    //  PAINEL
    // =========================================================================

    pub async fn stats<'e, E>(&self, executor: E) -> Result<CustomerStats, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut stats = CustomerStats::default();
        for (status, count) in self.repo.count_by_status(executor).await? {
            stats.total_customers += count;
            match status {
                CustomerStatus::PendingIntake => stats.pending_intake = count,
                CustomerStatus::AiAnalyzing => stats.ai_analyzing = count,
                CustomerStatus::ProposalReady => stats.proposal_ready = count,
                CustomerStatus::FollowingUp => stats.following_up = count,
                CustomerStatus::Signed => stats.signed = count,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::db_utils::connect_fresh,
        db::FormRepository,
        models::{
            crm::RelatedContact,
            form::{FieldDefinition, FieldErrorCode, FieldGroup, FieldKind, FormSchema},
        },
    };
    use serde_json::{json, Value};
    use sqlx::SqlitePool;

    async fn setup() -> (tempfile::TempDir, SqlitePool, CrmService) {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect_fresh(dir.path()).await.unwrap();
        let forms = FormService::new(FormRepository::new());
        forms.ensure_default(&pool).await.unwrap();
        (dir, pool, CrmService::new(CrmRepository::new(), forms))
    }

    fn values(v: Value) -> SubmittedValues {
        v.as_object().cloned().unwrap()
    }

    fn payload(name: &str, kyc: Option<Value>) -> CreateCustomerPayload {
        CreateCustomerPayload {
            name: name.to_string(),
            kyc_data: kyc.map(values),
            birthday: None,
            next_follow_up: None,
            related_contacts: vec![],
        }
    }

    #[tokio::test]
    async fn creates_customer_with_normalized_kyc() {
        let (_dir, pool, service) = setup().await;

        let kyc = json!({
            "source_channel": "referral",
            "children_count": "2",
            "core_needs": ["retirement", "retirement", "tax_optimization"],
            "birthday": "1980-05-20",
            "unknown_field": "dropped"
        });
        let customer = service.create_customer(&pool, payload("  Zhang San ", Some(kyc))).await.unwrap();

        assert_eq!(customer.name, "Zhang San");
        assert_eq!(customer.status, CustomerStatus::PendingIntake);
        assert_eq!(customer.source_channel.as_deref(), Some("referral"));
        assert_eq!(customer.children_count, Some(2));
        assert_eq!(customer.core_needs.0, vec!["retirement", "tax_optimization"]);
        assert_eq!(customer.birthday, NaiveDate::from_ymd_opt(1980, 5, 20));
        assert_eq!(customer.form_version.as_deref(), Some("1.0"));
        assert!(!customer.kyc_data.as_ref().unwrap().0.contains_key("unknown_field"));

        let fetched = service.get_customer(&pool, customer.id).await.unwrap();
        assert_eq!(fetched.core_needs.0, customer.core_needs.0);
    }

    #[tokio::test]
    async fn rejects_invalid_kyc_with_every_error() {
        let (_dir, pool, service) = setup().await;

        let kyc = json!({"source_channel": "billboard", "core_needs": ["a", "b"], "birthday": "20/05/1980"});
        let err = service.create_customer(&pool, payload("Li", Some(kyc))).await.unwrap_err();

        let AppError::FormValidation(result) = err else { panic!("expected form validation error") };
        assert!(result.error_for("source_channel").is_some());
        assert!(result.error_for("core_needs").is_some());
        assert!(result.error_for("birthday").is_some());
        assert_eq!(service.list_customers(&pool, CustomerFilter { limit: 10, ..Default::default() }).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn transition_appends_history() {
        let (_dir, pool, service) = setup().await;
        let customer = service.create_customer(&pool, payload("Wang", None)).await.unwrap();

        let moved = service
            .transition(&pool, customer.id, CustomerStatus::FollowingUp, TransitionSource::Operator)
            .await
            .unwrap();
        assert_eq!(moved.status, CustomerStatus::FollowingUp);

        let history = service.history(&pool, customer.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, CustomerStatus::PendingIntake);
        assert_eq!(history[0].to_status, CustomerStatus::FollowingUp);
        assert_eq!(history[0].source, TransitionSource::Operator);
    }

    #[tokio::test]
    async fn rejected_transition_changes_nothing() {
        let (_dir, pool, service) = setup().await;
        let customer = service.create_customer(&pool, payload("Zhao", None)).await.unwrap();

        let same = service
            .transition(&pool, customer.id, CustomerStatus::PendingIntake, TransitionSource::Operator)
            .await;
        assert!(matches!(same, Err(AppError::InvalidTransition { .. })));

        let skip = service
            .transition(&pool, customer.id, CustomerStatus::Signed, TransitionSource::Pipeline)
            .await;
        assert!(matches!(skip, Err(AppError::InvalidTransition { .. })));

        assert!(service.history(&pool, customer.id).await.unwrap().is_empty());
        let missing = service
            .transition(&pool, Uuid::new_v4(), CustomerStatus::Signed, TransitionSource::Operator)
            .await;
        assert!(matches!(missing, Err(AppError::CustomerNotFound)));
    }

    #[tokio::test]
    async fn history_rows_cannot_be_rewritten() {
        let (_dir, pool, service) = setup().await;
        let customer = service.create_customer(&pool, payload("Sun", None)).await.unwrap();
        service
            .transition(&pool, customer.id, CustomerStatus::Signed, TransitionSource::Operator)
            .await
            .unwrap();

        assert!(sqlx::query("DELETE FROM customer_status_history").execute(&pool).await.is_err());
        assert!(sqlx::query("UPDATE customer_status_history SET to_status = 'pending_intake'")
            .execute(&pool)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn partial_update_and_birthday() {
        let (_dir, pool, service) = setup().await;
        let mut create = payload("Qian", None);
        create.birthday = NaiveDate::from_ymd_opt(1975, 1, 1);
        create.next_follow_up = NaiveDate::from_ymd_opt(2025, 7, 1);
        let customer = service.create_customer(&pool, create).await.unwrap();

        let changes = UpdateCustomerPayload {
            next_follow_up: Some(None),
            related_contacts: Some(vec![RelatedContact {
                name: "Qian Jr".to_string(),
                relation: "child".to_string(),
                note: None,
            }]),
            ..Default::default()
        };
        let updated = service.update_customer(&pool, customer.id, changes).await.unwrap();
        assert_eq!(updated.name, "Qian");
        assert_eq!(updated.birthday, NaiveDate::from_ymd_opt(1975, 1, 1));
        assert_eq!(updated.next_follow_up, None);
        assert_eq!(updated.related_contacts.0.len(), 1);

        let cleared = service.update_birthday(&pool, customer.id, None).await.unwrap();
        assert_eq!(cleared.birthday, None);
        assert!(matches!(
            service.update_birthday(&pool, Uuid::new_v4(), None).await,
            Err(AppError::CustomerNotFound)
        ));
    }

    #[tokio::test]
    async fn list_filters_and_stats() {
        let (_dir, pool, service) = setup().await;
        for name in ["A", "B", "C"] {
            service.create_customer(&pool, payload(name, None)).await.unwrap();
        }
        let last = service.create_customer(&pool, payload("D", None)).await.unwrap();
        service
            .transition(&pool, last.id, CustomerStatus::Signed, TransitionSource::Operator)
            .await
            .unwrap();

        let all = service.list_customers(&pool, CustomerFilter { limit: 2, ..Default::default() }).await.unwrap();
        assert_eq!(all.total, 4);
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.items[0].name, "D");

        let signed = service
            .list_customers(&pool, CustomerFilter { status: Some(CustomerStatus::Signed), skip: 0, limit: 100 })
            .await
            .unwrap();
        assert_eq!(signed.total, 1);

        let stats = service.stats(&pool).await.unwrap();
        assert_eq!(stats.total_customers, 4);
        assert_eq!(stats.pending_intake, 3);
        assert_eq!(stats.signed, 1);
        assert_eq!(stats.ai_analyzing, 0);
    }

    #[tokio::test]
    async fn empty_kyc_submission_still_checks_required_fields() {
        let (_dir, pool, service) = setup().await;
        let schema = FormSchema {
            version: "2.0".to_string(),
            sections: vec![FieldGroup {
                title: "Source".to_string(),
                fields: vec![FieldDefinition {
                    name: "source_channel".to_string(),
                    label: "Source channel".to_string(),
                    required: true,
                    kind: FieldKind::Select { options: vec!["referral".to_string(), "other".to_string()] },
                }],
            }],
        };
        let form = service.forms.create(&pool, "Strict", &schema).await.unwrap();
        service.forms.activate(&pool, form.id).await.unwrap();

        let err = service.create_customer(&pool, payload("Zhou", Some(json!({})))).await.unwrap_err();
        let AppError::FormValidation(result) = err else { panic!("expected form validation error") };
        assert_eq!(result.error_for("source_channel").map(|e| &e.code), Some(&FieldErrorCode::Required));

        // Sem `kycData` o cliente entra sem KYC, como antes.
        let bare = service.create_customer(&pool, payload("Zhou", None)).await.unwrap();
        assert_eq!(bare.form_version, None);

        let update = UpdateCustomerPayload { kyc_data: Some(values(json!({}))), ..Default::default() };
        assert!(matches!(
            service.update_customer(&pool, bare.id, update).await,
            Err(AppError::FormValidation(_))
        ));
    }

    #[tokio::test]
    async fn blank_names_are_rejected_after_trimming() {
        let (_dir, pool, service) = setup().await;

        let err = service.create_customer(&pool, payload("   ", None)).await.unwrap_err();
        let AppError::ValidationError(errors) = err else { panic!("expected validation error") };
        assert!(errors.field_errors().contains_key("name"));

        let customer = service.create_customer(&pool, payload("Feng", None)).await.unwrap();
        let rename = UpdateCustomerPayload { name: Some(" \t ".to_string()), ..Default::default() };
        assert!(matches!(
            service.update_customer(&pool, customer.id, rename).await,
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(service.get_customer(&pool, customer.id).await.unwrap().name, "Feng");
    }
}

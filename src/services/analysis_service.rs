// src/services/analysis_service.rs

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AnalysisRepository,
    models::{
        analysis::{AnalysisOutcome, AnalysisResult},
        crm::{CustomerStatus, TransitionSource},
    },
    services::{analysis_gateway::AnalysisGateway, crm_service::CrmService},
};

#[derive(Clone)]
pub struct AnalysisService {
    repo: AnalysisRepository,
    crm: CrmService,
    gateway: Arc<dyn AnalysisGateway>,
}

impl AnalysisService {
    pub fn new(repo: AnalysisRepository, crm: CrmService, gateway: Arc<dyn AnalysisGateway>) -> Self {
        Self { repo, crm, gateway }
    }

    pub fn is_simulated(&self) -> bool {
        self.gateway.is_simulated()
    }

    /// Roda a análise de um cliente.
    ///
    /// Recebe a pool (e não um executor genérico) porque a chamada externa
    /// acontece entre duas transações: nenhuma conexão fica presa esperando a IA.
    pub async fn run(&self, pool: &SqlitePool, customer_id: Uuid) -> Result<AnalysisResult, AppError> {
        let customer = self.crm.get_customer(pool, customer_id).await?;
        if !customer.has_kyc() {
            return Err(AppError::MissingKycData);
        }
        let previous = customer.status;

        let analyzing = self
            .crm
            .transition(pool, customer_id, CustomerStatus::AiAnalyzing, TransitionSource::Pipeline)
            .await?;

        let outcome = match self.gateway.analyze(&analyzing).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("⚠️ Análise do cliente {} falhou: {}", customer_id, err);
                self.revert(pool, customer_id, previous).await;
                return Err(err.into());
            }
        };

        match self.persist(pool, customer_id, &outcome).await {
            Ok(result) => {
                tracing::info!(
                    "✅ Análise do cliente {} concluída ({} oportunidades{})",
                    customer_id,
                    result.opportunities.len(),
                    if result.simulated { ", simulada" } else { "" }
                );
                Ok(result)
            }
            Err(err) => {
                self.revert(pool, customer_id, previous).await;
                Err(err)
            }
        }
    }

    // Resultado + `proposal_ready` numa só transação.
    async fn persist(
        &self,
        pool: &SqlitePool,
        customer_id: Uuid,
        outcome: &AnalysisOutcome,
    ) -> Result<AnalysisResult, AppError> {
        let mut tx = pool.begin().await?;
        let result = self.repo.insert_result(&mut *tx, customer_id, outcome, Utc::now()).await?;
        self.crm
            .transition_on(&mut tx, customer_id, CustomerStatus::ProposalReady, TransitionSource::Pipeline)
            .await?;
        tx.commit().await?;
        Ok(result)
    }

    // Volta ao status anterior. Se até isso falhar, só resta o log.
    async fn revert(&self, pool: &SqlitePool, customer_id: Uuid, previous: CustomerStatus) {
        if let Err(e) = self
            .crm
            .transition(pool, customer_id, previous, TransitionSource::Pipeline)
            .await
        {
            tracing::error!("🔥 Falha ao reverter o cliente {} para {}: {}", customer_id, previous, e);
        }
    }

    pub async fn list_results(&self, pool: &SqlitePool, customer_id: Uuid) -> Result<Vec<AnalysisResult>, AppError> {
        self.crm.get_customer(pool, customer_id).await?;
        self.repo.list_for_customer(pool, customer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::db_utils::connect_fresh,
        db::{CrmRepository, FormRepository},
        models::crm::{CreateCustomerPayload, Customer},
        services::{
            analysis_gateway::{AnalysisError, SimulatedGateway},
            form_service::FormService,
        },
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct FailingGateway;

    #[async_trait]
    impl AnalysisGateway for FailingGateway {
        async fn analyze(&self, _customer: &Customer) -> Result<AnalysisOutcome, AnalysisError> {
            Err(AnalysisError::Timeout(Duration::from_secs(1)))
        }
    }

    async fn setup(gateway: Arc<dyn AnalysisGateway>) -> (tempfile::TempDir, SqlitePool, AnalysisService) {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect_fresh(dir.path()).await.unwrap();
        let forms = FormService::new(FormRepository::new());
        forms.ensure_default(&pool).await.unwrap();
        let crm = CrmService::new(CrmRepository::new(), forms);
        (dir, pool, AnalysisService::new(AnalysisRepository::new(), crm, gateway))
    }

    async fn customer_with_kyc(service: &AnalysisService, pool: &SqlitePool, with_kyc: bool) -> Customer {
        let kyc = with_kyc.then(|| {
            json!({"core_needs": ["retirement"], "target_countries": ["portugal"]})
                .as_object()
                .cloned()
                .unwrap()
        });
        service
            .crm
            .create_customer(
                pool,
                CreateCustomerPayload {
                    name: "Zhou".to_string(),
                    kyc_data: kyc,
                    birthday: None,
                    next_follow_up: None,
                    related_contacts: vec![],
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn success_stores_result_and_moves_to_proposal() {
        let (_dir, pool, service) = setup(Arc::new(SimulatedGateway)).await;
        assert!(service.is_simulated());
        let customer = customer_with_kyc(&service, &pool, true).await;

        let result = service.run(&pool, customer.id).await.unwrap();
        assert!(result.simulated);
        assert_eq!(result.opportunities.0[0].kind, "retirement");

        let after = service.crm.get_customer(&pool, customer.id).await.unwrap();
        assert_eq!(after.status, CustomerStatus::ProposalReady);

        let history = service.crm.history(&pool, customer.id).await.unwrap();
        let path: Vec<_> = history.iter().map(|h| h.to_status).collect();
        assert_eq!(path, vec![CustomerStatus::AiAnalyzing, CustomerStatus::ProposalReady]);

        assert_eq!(service.list_results(&pool, customer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_reverts_status() {
        let (_dir, pool, service) = setup(Arc::new(FailingGateway)).await;
        let customer = customer_with_kyc(&service, &pool, true).await;

        let err = service.run(&pool, customer.id).await.unwrap_err();
        assert!(matches!(err, AppError::Analysis(AnalysisError::Timeout(_))));

        let after = service.crm.get_customer(&pool, customer.id).await.unwrap();
        assert_eq!(after.status, CustomerStatus::PendingIntake);

        let history = service.crm.history(&pool, customer.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to_status, CustomerStatus::AiAnalyzing);
        assert_eq!(history[1].from_status, CustomerStatus::AiAnalyzing);
        assert_eq!(history[1].to_status, CustomerStatus::PendingIntake);
        assert!(service.list_results(&pool, customer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn requires_kyc_and_existing_customer() {
        let (_dir, pool, service) = setup(Arc::new(SimulatedGateway)).await;
        let bare = customer_with_kyc(&service, &pool, false).await;

        assert!(matches!(service.run(&pool, bare.id).await, Err(AppError::MissingKycData)));
        assert!(matches!(service.run(&pool, Uuid::new_v4()).await, Err(AppError::CustomerNotFound)));
        assert!(service.crm.history(&pool, bare.id).await.unwrap().is_empty());
    }
}

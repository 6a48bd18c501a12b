// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::SqlitePool;

use crate::{
    common::{db_utils, i18n::I18nStore},
    db::{AnalysisRepository, CrmRepository, FormRepository, InviteRepository},
    services::{
        analysis_gateway::{gateway_from_settings, AnalysisGateway},
        analysis_service::AnalysisService,
        crm_service::CrmService,
        form_service::FormService,
        invite_service::InviteService,
        reminder_service::{ReminderPolicy, ReminderService},
    },
};

pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Credenciais e limites do workflow de IA. Sem chave ou sem workflow, usa o simulado.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub workflow_id: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// Base dos links de convite enviados aos clientes.
    pub public_base_url: String,
    pub ai: AiSettings,
    pub reminders: ReminderPolicy,
}

// Lê uma variável opcional; vazia conta como ausente.
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} inválida ('{raw}'): {e}")),
        None => Ok(default),
    }
}

impl Settings {
    /// Carrega `.env` (se existir) e as variáveis de ambiente.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = ReminderPolicy::default();

        Ok(Self {
            database_url: env_or("DATABASE_URL", "sqlite://data/crm.db".to_string())?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            public_base_url: env_or("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL.to_string())?,
            ai: AiSettings {
                api_key: env_opt("COZE_API_KEY"),
                workflow_id: env_opt("COZE_WORKFLOW_ID"),
                base_url: env_or("COZE_API_BASE_URL", "https://api.coze.cn/v1".to_string())?,
                timeout: Duration::from_secs(env_or("AI_TIMEOUT_SECS", 120u64)?),
            },
            reminders: ReminderPolicy {
                followup_stale_days: env_or("REMINDER_FOLLOWUP_STALE_DAYS", defaults.followup_stale_days)?,
                birthday_lookahead_days: env_or(
                    "REMINDER_BIRTHDAY_LOOKAHEAD_DAYS",
                    defaults.birthday_lookahead_days,
                )?,
                stall_pending_intake_days: env_or("REMINDER_STALL_PENDING_DAYS", defaults.stall_pending_intake_days)?,
                stall_ai_analyzing_days: env_or("REMINDER_STALL_ANALYZING_DAYS", defaults.stall_ai_analyzing_days)?,
                stall_proposal_ready_days: env_or("REMINDER_STALL_PROPOSAL_DAYS", defaults.stall_proposal_ready_days)?,
                stall_following_up_days: env_or("REMINDER_STALL_FOLLOWING_DAYS", defaults.stall_following_up_days)?,
            },
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub i18n_store: I18nStore,
    pub form_service: FormService,
    pub crm_service: CrmService,
    pub reminder_service: ReminderService,
    pub analysis_service: AnalysisService,
    pub invite_service: InviteService,
    pub public_base_url: String,
}

impl AppState {
    /// Conecta, migra, semeia o formulário padrão e monta os serviços.
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = db_utils::connect_pool(&settings.database_url).await?;
        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        db_utils::run_migrations(&db_pool)
            .await
            .context("falha ao rodar as migrações do banco de dados")?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

        let gateway = gateway_from_settings(&settings.ai).context("falha ao montar o cliente de IA")?;
        let mut state = Self::from_parts(db_pool, settings.reminders.clone(), gateway);
        state.public_base_url = settings.public_base_url.clone();

        state.form_service.ensure_default(&state.db_pool).await?;
        Ok(state)
    }

    // --- Monta o gráfico de dependências ---
    pub fn from_parts(db_pool: SqlitePool, reminders: ReminderPolicy, gateway: Arc<dyn AnalysisGateway>) -> Self {
        let crm_repo = CrmRepository::new();
        let form_service = FormService::new(FormRepository::new());
        let crm_service = CrmService::new(crm_repo.clone(), form_service.clone());
        let reminder_service = ReminderService::new(crm_repo, reminders);
        let analysis_service = AnalysisService::new(AnalysisRepository::new(), crm_service.clone(), gateway);
        let invite_service = InviteService::new(InviteRepository::new(), crm_service.clone(), form_service.clone());

        Self {
            db_pool,
            i18n_store: I18nStore::new(),
            form_service,
            crm_service,
            reminder_service,
            analysis_service,
            invite_service,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_and_reports_bad_numbers() {
        // Nomes exclusivos deste teste para não colidir com outros.
        unsafe {
            env::set_var("KYC_CRM_TEST_DAYS", "21");
            env::set_var("KYC_CRM_TEST_BAD", "two weeks");
        }
        assert_eq!(env_or("KYC_CRM_TEST_DAYS", 14i64).unwrap(), 21);
        assert_eq!(env_or("KYC_CRM_TEST_MISSING", 14i64).unwrap(), 14);
        let err = env_or("KYC_CRM_TEST_BAD", 14i64).unwrap_err();
        assert!(err.to_string().contains("KYC_CRM_TEST_BAD"));
    }
}

// src/models/crm.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::form::{KycData, SubmittedValues};

// --- ENUMS ---

/// Estados do cliente, na única ordem "para frente" definida.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    PendingIntake,
    AiAnalyzing,
    ProposalReady,
    FollowingUp,
    Signed,
}

impl CustomerStatus {
    pub const ALL: [CustomerStatus; 5] = [
        CustomerStatus::PendingIntake,
        CustomerStatus::AiAnalyzing,
        CustomerStatus::ProposalReady,
        CustomerStatus::FollowingUp,
        CustomerStatus::Signed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::PendingIntake => "pending_intake",
            CustomerStatus::AiAnalyzing => "ai_analyzing",
            CustomerStatus::ProposalReady => "proposal_ready",
            CustomerStatus::FollowingUp => "following_up",
            CustomerStatus::Signed => "signed",
        }
    }

    /// Próximo estado no caminho documentado. `Signed` é terminal.
    pub fn next(&self) -> Option<CustomerStatus> {
        match self {
            CustomerStatus::PendingIntake => Some(CustomerStatus::AiAnalyzing),
            CustomerStatus::AiAnalyzing => Some(CustomerStatus::ProposalReady),
            CustomerStatus::ProposalReady => Some(CustomerStatus::FollowingUp),
            CustomerStatus::FollowingUp => Some(CustomerStatus::Signed),
            CustomerStatus::Signed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CustomerStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown customer status '{s}'"))
    }
}

/// Quem pediu a transição: o pipeline de IA ou um operador pelo endpoint de status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    Pipeline,
    Operator,
}

impl std::fmt::Display for TransitionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionSource::Pipeline => f.write_str("pipeline"),
            TransitionSource::Operator => f.write_str("operator"),
        }
    }
}

// --- CLIENTE ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelatedContact {
    #[validate(length(min = 1, max = 100, message = "length"))]
    #[schema(example = "Li Wei")]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "length"))]
    #[schema(example = "sibling")]
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Also considering Portugal")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    #[schema(example = "Zhang San")]
    pub name: String,

    // Perfil (projeção tipada do KYC)
    pub source_channel: Option<String>,
    pub city: Option<String>,
    pub age_band: Option<String>,
    pub education: Option<String>,

    // Família
    pub children_count: Option<i64>,
    #[schema(value_type = Vec<String>)]
    pub children_education: Json<Vec<String>>,

    // Patrimônio e carreira
    pub asset_tier: Option<String>,
    pub occupation: Option<String>,
    pub job_title: Option<String>,

    // Necessidades e preferências
    #[schema(value_type = Vec<String>)]
    pub core_needs: Json<Vec<String>>,
    #[schema(value_type = Vec<String>)]
    pub target_countries: Json<Vec<String>>,
    pub timeline: Option<String>,

    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = Date, example = "1980-05-20")]
    pub birthday: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub next_follow_up: Option<NaiveDate>,
    #[schema(value_type = Vec<RelatedContact>)]
    pub related_contacts: Json<Vec<RelatedContact>>,

    // Submissão normalizada (só chaves do schema)
    #[schema(value_type = Option<Object>)]
    pub kyc_data: Option<Json<Map<String, Value>>>,
    #[schema(example = "1.0")]
    pub form_version: Option<String>,

    pub status: CustomerStatus,
    pub status_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Projeção tipada dos campos KYC conhecidos. O resto fica só em `kyc_data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerProfile {
    pub source_channel: Option<String>,
    pub city: Option<String>,
    pub age_band: Option<String>,
    pub education: Option<String>,
    pub children_count: Option<i64>,
    pub children_education: Vec<String>,
    pub asset_tier: Option<String>,
    pub occupation: Option<String>,
    pub job_title: Option<String>,
    pub core_needs: Vec<String>,
    pub target_countries: Vec<String>,
    pub timeline: Option<String>,
    pub notes: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl CustomerProfile {
    pub fn from_kyc(kyc: &KycData) -> Self {
        Self {
            source_channel: kyc.text("source_channel"),
            city: kyc.text("city"),
            age_band: kyc.text("age_band"),
            education: kyc.text("education"),
            children_count: kyc.integer("children_count"),
            children_education: kyc.tags("children_education"),
            asset_tier: kyc.text("asset_tier"),
            occupation: kyc.text("occupation"),
            job_title: kyc.text("job_title"),
            core_needs: kyc.tags("core_needs"),
            target_countries: kyc.tags("target_countries"),
            timeline: kyc.text("timeline"),
            notes: kyc.text("notes"),
            birthday: kyc
                .text("birthday")
                .and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()),
        }
    }
}

impl Customer {
    pub fn has_kyc(&self) -> bool {
        self.kyc_data.as_ref().is_some_and(|data| !data.0.is_empty())
    }

    /// Aplica uma submissão KYC já validada sobre o registro.
    /// O aniversário só é sobrescrito quando o formulário traz um.
    pub fn apply_kyc(&mut self, kyc: KycData) {
        let profile = CustomerProfile::from_kyc(&kyc);
        self.source_channel = profile.source_channel;
        self.city = profile.city;
        self.age_band = profile.age_band;
        self.education = profile.education;
        self.children_count = profile.children_count;
        self.children_education = Json(profile.children_education);
        self.asset_tier = profile.asset_tier;
        self.occupation = profile.occupation;
        self.job_title = profile.job_title;
        self.core_needs = Json(profile.core_needs);
        self.target_countries = Json(profile.target_countries);
        self.timeline = profile.timeline;
        self.notes = profile.notes;
        if profile.birthday.is_some() {
            self.birthday = profile.birthday;
        }
        self.form_version = Some(kyc.form_version);
        self.kyc_data = Some(Json(kyc.values));
    }

    /// Cliente novo, ainda não persistido, em `pending_intake`.
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            source_channel: None,
            city: None,
            age_band: None,
            education: None,
            children_count: None,
            children_education: Json(Vec::new()),
            asset_tier: None,
            occupation: None,
            job_title: None,
            core_needs: Json(Vec::new()),
            target_countries: Json(Vec::new()),
            timeline: None,
            notes: None,
            birthday: None,
            next_follow_up: None,
            related_contacts: Json(Vec::new()),
            kyc_data: None,
            form_version: None,
            status: CustomerStatus::PendingIntake,
            status_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub from_status: CustomerStatus,
    pub to_status: CustomerStatus,
    pub source: TransitionSource,
    pub changed_at: DateTime<Utc>,
}

// --- CONSULTAS ---

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub status: Option<CustomerStatus>,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPage {
    pub total: i64,
    pub items: Vec<Customer>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total_customers: i64,
    pub pending_intake: i64,
    pub ai_analyzing: i64,
    pub proposal_ready: i64,
    pub following_up: i64,
    pub signed: i64,
}

// --- PAYLOADS ---

// Distingue "campo ausente" (None) de "campo enviado como null" (Some(None)).
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerPayload {
    #[validate(length(min = 1, max = 100, message = "length"))]
    #[schema(example = "Zhang San")]
    pub name: String,

    /// Valores do formulário ativo; validados no servidor.
    #[serde(default)]
    #[schema(value_type = Option<Object>, example = json!({"source_channel": "referral", "core_needs": ["retirement"]}))]
    pub kyc_data: Option<SubmittedValues>,

    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date, example = "1980-05-20")]
    pub birthday: Option<NaiveDate>,

    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date)]
    pub next_follow_up: Option<NaiveDate>,

    #[serde(default)]
    #[validate(nested)]
    pub related_contacts: Vec<RelatedContact>,
}

/// Atualização parcial: só o que vier no corpo é alterado.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerPayload {
    #[validate(length(min = 1, max = 100, message = "length"))]
    pub name: Option<String>,

    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub kyc_data: Option<SubmittedValues>,

    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, format = Date)]
    pub birthday: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, format = Date)]
    pub next_follow_up: Option<Option<NaiveDate>>,

    #[validate(nested)]
    pub related_contacts: Option<Vec<RelatedContact>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    pub status: CustomerStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBirthdayPayload {
    /// `null` apaga o aniversário.
    #[schema(value_type = Option<String>, format = Date, example = "1980-05-20")]
    pub birthday: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in CustomerStatus::ALL {
            assert_eq!(status.as_str().parse::<CustomerStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("signed_off".parse::<CustomerStatus>().is_err());
    }

    #[test]
    fn only_signed_is_terminal() {
        let terminal: Vec<_> = CustomerStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![CustomerStatus::Signed]);
    }

    #[test]
    fn update_payload_tells_null_from_absent() {
        let cleared: UpdateCustomerPayload =
            serde_json::from_str(r#"{"birthday": null}"#).unwrap();
        assert_eq!(cleared.birthday, Some(None));
        assert_eq!(cleared.next_follow_up, None);

        let set: UpdateCustomerPayload =
            serde_json::from_str(r#"{"nextFollowUp": "2025-07-01"}"#).unwrap();
        assert_eq!(set.next_follow_up, Some(NaiveDate::from_ymd_opt(2025, 7, 1)));
    }
}

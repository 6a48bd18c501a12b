// src/services/analysis_gateway.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    config::AiSettings,
    models::{
        analysis::{AnalysisOutcome, Opportunity, Priority},
        crm::Customer,
    },
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("workflow service answered HTTP {0}")]
    Http(u16),

    #[error("workflow service error {code}: {message}")]
    Upstream { code: i64, message: String },

    #[error("malformed workflow response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Capacidade de análise. Implementações: Coze (real) e simulada.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    async fn analyze(&self, customer: &Customer) -> Result<AnalysisOutcome, AnalysisError>;

    fn is_simulated(&self) -> bool {
        false
    }
}

// =============================================================================
//  PAYLOAD (só campos de negócio permitidos)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientProfile {
    pub source_channel: Option<String>,
    pub city: Option<String>,
    pub age_band: Option<String>,
    pub education: Option<String>,
    pub asset_tier: Option<String>,
    pub occupation: Option<String>,
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyStructure {
    pub children_count: Option<i64>,
    pub children_education: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeedsAndPreferences {
    pub core_needs: Vec<String>,
    pub target_countries: Vec<String>,
    pub timeline: Option<String>,
}

/// Contato relacionado sem o nome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactSummary {
    pub relation: String,
    pub note: Option<String>,
}

/// O que sai da máquina. Nome, aniversário, notas e `kyc_data` cru ficam de fora.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub client_profile: ClientProfile,
    pub family_structure: FamilyStructure,
    pub needs_and_preferences: NeedsAndPreferences,
    pub related_contacts: Vec<ContactSummary>,
}

impl From<&Customer> for AnalysisRequest {
    fn from(customer: &Customer) -> Self {
        Self {
            client_profile: ClientProfile {
                source_channel: customer.source_channel.clone(),
                city: customer.city.clone(),
                age_band: customer.age_band.clone(),
                education: customer.education.clone(),
                asset_tier: customer.asset_tier.clone(),
                occupation: customer.occupation.clone(),
                job_title: customer.job_title.clone(),
            },
            family_structure: FamilyStructure {
                children_count: customer.children_count,
                children_education: customer.children_education.0.clone(),
            },
            needs_and_preferences: NeedsAndPreferences {
                core_needs: customer.core_needs.0.clone(),
                target_countries: customer.target_countries.0.clone(),
                timeline: customer.timeline.clone(),
            },
            related_contacts: customer
                .related_contacts
                .0
                .iter()
                .map(|c| ContactSummary {
                    relation: c.relation.clone(),
                    note: c.note.clone(),
                })
                .collect(),
        }
    }
}

// =============================================================================
//  COZE
// =============================================================================

#[derive(Debug, Deserialize)]
struct WorkflowOutput {
    report: String,
    opportunities: Vec<Opportunity>,
}

fn outcome_from(value: Value) -> Result<AnalysisOutcome, AnalysisError> {
    let output: WorkflowOutput =
        serde_json::from_value(value).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
    if output.report.trim().is_empty() {
        return Err(AnalysisError::MalformedResponse("empty report".to_string()));
    }
    Ok(AnalysisOutcome {
        report: output.report,
        opportunities: output.opportunities,
        simulated: false,
    })
}

/// `data` pode vir como objeto ou como string JSON; às vezes embrulhado em `output`.
fn unwrap_data(data: Value) -> Result<Value, AnalysisError> {
    let data = match data {
        Value::String(raw) => serde_json::from_str(&raw)
            .map_err(|e| AnalysisError::MalformedResponse(format!("data is not JSON: {e}")))?,
        other => other,
    };
    match data {
        Value::Object(mut map) if !map.contains_key("report") && map.contains_key("output") => {
            unwrap_data(map.remove("output").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// Interpreta a resposta do workflow: direta (`{report, opportunities}`) ou
/// no envelope `{code, msg, data}`.
pub fn parse_workflow_response(body: Value) -> Result<AnalysisOutcome, AnalysisError> {
    let Value::Object(mut map) = body else {
        return Err(AnalysisError::MalformedResponse("body is not an object".to_string()));
    };

    if let Some(code) = map.get("code").and_then(Value::as_i64) {
        if code != 0 {
            let message = map
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(AnalysisError::Upstream { code, message });
        }
    }

    if map.contains_key("report") {
        return outcome_from(Value::Object(map));
    }

    match map.remove("data") {
        Some(data) => outcome_from(unwrap_data(data)?),
        None => Err(AnalysisError::MalformedResponse("missing report".to_string())),
    }
}

pub struct CozeGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    workflow_id: String,
    timeout: Duration,
}

impl CozeGateway {
    pub fn new(base_url: &str, api_key: String, workflow_id: String, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            workflow_id,
            timeout,
        })
    }

    fn map_reqwest(&self, err: reqwest::Error) -> AnalysisError {
        if err.is_timeout() {
            AnalysisError::Timeout(self.timeout)
        } else if err.is_decode() {
            AnalysisError::MalformedResponse(err.to_string())
        } else {
            AnalysisError::Transport(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl AnalysisGateway for CozeGateway {
    async fn analyze(&self, customer: &Customer) -> Result<AnalysisOutcome, AnalysisError> {
        let request = AnalysisRequest::from(customer);
        let url = format!("{}/workflow/run", self.base_url);

        tracing::info!("🤖 Chamando workflow de análise para o cliente {}", customer.id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "workflow_id": self.workflow_id,
                "parameters": request,
            }))
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Http(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| self.map_reqwest(e))?;
        parse_workflow_response(body)
    }
}

// =============================================================================
//  SIMULADO
// =============================================================================

/// Usado quando não há credenciais. Saída determinística, marcada como simulada.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway;

fn joined(items: &[String]) -> String {
    if items.is_empty() {
        "not specified".to_string()
    } else {
        items.join(", ")
    }
}

fn opportunity(kind: &str, description: String, priority: Priority) -> Opportunity {
    Opportunity {
        kind: kind.to_string(),
        description,
        priority,
    }
}

impl SimulatedGateway {
    pub fn outcome_for(request: &AnalysisRequest) -> AnalysisOutcome {
        let profile = &request.client_profile;
        let family = &request.family_structure;
        let needs = &request.needs_and_preferences;
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());

        let report = format!(
            "# Client plan analysis (simulated)\n\n\
             ## Profile\n\n\
             - **Target countries**: {}\n\
             - **Core needs**: {}\n\
             - **Asset tier**: {}\n\
             - **Timeline**: {}\n\
             - **Children**: {}\n\n\
             ## Suggestions\n\n\
             1. Prepare identity and asset documents early.\n\
             2. Align the children's education plan with the chosen destination.\n\n\
             ---\n\
             *Generated without an AI workflow configured. For reference only.*\n",
            joined(&needs.target_countries),
            joined(&needs.core_needs),
            or_unknown(&profile.asset_tier),
            or_unknown(&needs.timeline),
            family.children_count.unwrap_or(0),
        );

        let mut opportunities = Vec::new();
        let stages = &family.children_education;
        let has_stage = |s: &str| stages.iter().any(|x| x == s);

        if family.children_count.unwrap_or(0) > 0 {
            if has_stage("middle_school") || has_stage("high_school") {
                opportunities.push(opportunity(
                    "children_education",
                    format!("Children currently in {}: international school and pre-university planning.", stages.join("/")),
                    Priority::High,
                ));
            }
            if has_stage("undergraduate") || has_stage("graduate") {
                opportunities.push(opportunity(
                    "overseas_study",
                    "Children in higher education: graduate applications and career planning abroad.".to_string(),
                    Priority::Medium,
                ));
            }
        }
        if needs.core_needs.iter().any(|n| n == "retirement") {
            opportunities.push(opportunity(
                "retirement",
                "Retirement planning need: retirement visas and health insurance.".to_string(),
                Priority::Medium,
            ));
        }
        if needs.core_needs.iter().any(|n| n == "tax_optimization") {
            opportunities.push(opportunity(
                "tax_advisory",
                "Tax optimization need: tax structure design and trust setup.".to_string(),
                Priority::High,
            ));
        }
        if !request.related_contacts.is_empty() {
            opportunities.push(opportunity(
                "referral",
                format!("{} related contact(s) to explore for referrals.", request.related_contacts.len()),
                Priority::Medium,
            ));
        }
        if opportunities.is_empty() {
            opportunities.push(opportunity(
                "in_depth_service",
                "Understand the client's needs in more depth before proposing a plan.".to_string(),
                Priority::Low,
            ));
        }

        AnalysisOutcome {
            report,
            opportunities,
            simulated: true,
        }
    }
}

#[async_trait]
impl AnalysisGateway for SimulatedGateway {
    async fn analyze(&self, customer: &Customer) -> Result<AnalysisOutcome, AnalysisError> {
        Ok(Self::outcome_for(&AnalysisRequest::from(customer)))
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Escolhido uma vez, na montagem do estado.
pub fn gateway_from_settings(settings: &AiSettings) -> Result<Arc<dyn AnalysisGateway>, AnalysisError> {
    match (&settings.api_key, &settings.workflow_id) {
        (Some(api_key), Some(workflow_id)) => {
            tracing::info!("✅ Análise de IA via workflow em {}", settings.base_url);
            Ok(Arc::new(CozeGateway::new(
                &settings.base_url,
                api_key.clone(),
                workflow_id.clone(),
                settings.timeout,
            )?))
        }
        _ => {
            tracing::warn!("⚠️ COZE_API_KEY/COZE_WORKFLOW_ID ausentes: usando análise simulada");
            Ok(Arc::new(SimulatedGateway))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::crm::RelatedContact;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use chrono::{NaiveDate, Utc};
    use sqlx::types::Json as DbJson;
    use tokio::sync::Mutex;

    fn sample_customer() -> Customer {
        let mut c = Customer::new("Secret Name".to_string(), Utc::now());
        c.city = Some("Shanghai".to_string());
        c.asset_tier = Some("A9".to_string());
        c.children_count = Some(2);
        c.children_education = DbJson(vec!["high_school".to_string()]);
        c.core_needs = DbJson(vec!["tax_optimization".to_string(), "children_education".to_string()]);
        c.target_countries = DbJson(vec!["singapore".to_string()]);
        c.notes = Some("private remark about divorce".to_string());
        c.birthday = NaiveDate::from_ymd_opt(1979, 3, 14);
        c.related_contacts = DbJson(vec![RelatedContact {
            name: "Hidden Brother".to_string(),
            relation: "sibling".to_string(),
            note: Some("lives abroad".to_string()),
        }]);
        c
    }

    fn assert_no_sensitive_values(payload: &str) {
        for secret in ["Secret Name", "private remark", "1979-03-14", "Hidden Brother", "kyc_data"] {
            assert!(!payload.contains(secret), "payload leaked {secret}: {payload}");
        }
    }

    #[test]
    fn request_only_carries_allow_listed_fields() {
        let request = AnalysisRequest::from(&sample_customer());
        let payload = serde_json::to_string(&request).unwrap();

        assert_no_sensitive_values(&payload);
        assert!(payload.contains("Shanghai"));
        assert!(payload.contains("sibling"));
        assert!(payload.contains("lives abroad"));
    }

    #[test]
    fn parses_direct_and_enveloped_responses() {
        let direct = json!({"report": "# R", "opportunities": [{"type": "tax", "description": "d", "priority": "high"}]});
        let outcome = parse_workflow_response(direct).unwrap();
        assert_eq!(outcome.opportunities.len(), 1);
        assert!(!outcome.simulated);

        let as_string = json!({"code": 0, "msg": "", "data": "{\"report\": \"# From string\", \"opportunities\": []}"});
        assert_eq!(parse_workflow_response(as_string).unwrap().report, "# From string");

        let as_object = json!({"code": 0, "data": {"output": {"report": "# Nested", "opportunities": []}}});
        assert_eq!(parse_workflow_response(as_object).unwrap().report, "# Nested");
    }

    #[test]
    fn rejects_upstream_errors_and_malformed_bodies() {
        let upstream = parse_workflow_response(json!({"code": 4100, "msg": "bad token"}));
        assert!(matches!(upstream, Err(AnalysisError::Upstream { code: 4100, .. })));

        for body in [
            json!({"code": 0, "data": "not json"}),
            json!({"code": 0, "data": {"report": "   ", "opportunities": []}}),
            json!({"code": 0}),
            json!({"report": "# R", "opportunities": [{"type": "x", "description": "d", "priority": "urgent"}]}),
            json!([1, 2, 3]),
        ] {
            assert!(matches!(parse_workflow_response(body), Err(AnalysisError::MalformedResponse(_))));
        }
    }

    #[test]
    fn missing_opportunities_is_malformed_not_empty() {
        for body in [
            json!({"report": "# R"}),
            json!({"code": 0, "data": "{\"report\": \"# R\"}"}),
        ] {
            match parse_workflow_response(body) {
                Err(AnalysisError::MalformedResponse(reason)) => assert!(reason.contains("opportunities"), "{reason}"),
                other => panic!("unexpected: {other:?}"),
            }
        }

        let null_list = json!({"code": 0, "data": {"output": {"report": "# R", "opportunities": null}}});
        assert!(matches!(parse_workflow_response(null_list), Err(AnalysisError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn simulated_output_is_deterministic_and_flagged() {
        let customer = sample_customer();
        let first = SimulatedGateway.analyze(&customer).await.unwrap();
        let second = SimulatedGateway.analyze(&customer).await.unwrap();

        assert_eq!(first, second);
        assert!(first.simulated);
        assert!(!first.report.contains("Secret Name"));
        let kinds: Vec<_> = first.opportunities.iter().map(|o| o.kind.as_str()).collect();
        assert_eq!(kinds, vec!["children_education", "tax_advisory", "referral"]);
    }

    // --- servidor falso ---

    type Captured = Arc<Mutex<Option<(Option<String>, Value)>>>;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn capture(State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        *captured.lock().await = Some((auth, body));
        Json(json!({
            "code": 0,
            "msg": "Success",
            "data": "{\"report\": \"# Plan\", \"opportunities\": [{\"type\": \"tax\", \"description\": \"d\", \"priority\": \"medium\"}]}"
        }))
    }

    #[tokio::test]
    async fn coze_gateway_sends_allow_listed_payload() {
        let captured: Captured = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route("/workflow/run", post(capture))
            .with_state(captured.clone());
        let base = spawn_server(app).await;

        let gateway = CozeGateway::new(&base, "key-123".to_string(), "wf-9".to_string(), Duration::from_secs(5)).unwrap();
        let outcome = gateway.analyze(&sample_customer()).await.unwrap();
        assert_eq!(outcome.report, "# Plan");

        let (auth, body) = captured.lock().await.clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer key-123"));
        assert_eq!(body["workflow_id"], "wf-9");
        assert_eq!(body["parameters"]["client_profile"]["city"], "Shanghai");
        assert_no_sensitive_values(&body.to_string());
    }

    #[tokio::test]
    async fn coze_gateway_reports_http_errors_and_garbage() {
        let app = Router::new()
            .route("/workflow/run", post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }))
            .route("/garbage/workflow/run", post(|| async { "<html>oops</html>" }));
        let base = spawn_server(app).await;

        let gateway = CozeGateway::new(&base, "k".to_string(), "w".to_string(), Duration::from_secs(5)).unwrap();
        assert!(matches!(gateway.analyze(&sample_customer()).await, Err(AnalysisError::Http(503))));

        let garbage = CozeGateway::new(&format!("{base}/garbage"), "k".to_string(), "w".to_string(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            garbage.analyze(&sample_customer()).await,
            Err(AnalysisError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn coze_gateway_times_out() {
        let app = Router::new().route(
            "/workflow/run",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"report": "# late"}))
            }),
        );
        let base = spawn_server(app).await;

        let gateway = CozeGateway::new(&base, "k".to_string(), "w".to_string(), Duration::from_millis(200)).unwrap();
        assert!(matches!(gateway.analyze(&sample_customer()).await, Err(AnalysisError::Timeout(_))));
    }

    #[test]
    fn missing_credentials_select_the_simulated_gateway() {
        let settings = AiSettings {
            api_key: Some("k".to_string()),
            workflow_id: None,
            base_url: "https://coze.invalid/v1".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(gateway_from_settings(&settings).unwrap().is_simulated());
    }
}

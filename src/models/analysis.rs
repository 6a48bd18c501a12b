// src/models/analysis.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Opportunity {
    #[serde(rename = "type")]
    #[schema(example = "children_education")]
    pub kind: String,
    pub description: String,
    pub priority: Priority,
}

/// O que o gateway devolve, antes de ser persistido.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub report: String,
    pub opportunities: Vec<Opportunity>,
    pub simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Relatório em Markdown.
    pub report: String,
    #[schema(value_type = Vec<Opportunity>)]
    pub opportunities: Json<Vec<Opportunity>>,
    /// `true` quando veio do gateway simulado (sem credenciais configuradas).
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
}

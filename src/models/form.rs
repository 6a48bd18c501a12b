// src/models/form.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

// --- DEFINIÇÕES (O Molde) ---

/// Tipo do campo. Select/multiselect carregam as opções no próprio variante,
/// então não existe select "sem opções" depois da desserialização.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Number,
    Date,
    Select {
        options: Vec<String>,
    },
    Multiselect {
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
}

impl FieldKind {
    pub fn options(&self) -> &[String] {
        match self {
            FieldKind::Select { options } | FieldKind::Multiselect { options, .. } => options,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldDefinition {
    #[schema(example = "source_channel")]
    pub name: String,
    #[schema(example = "Source channel")]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldGroup {
    #[schema(example = "Basic information")]
    pub title: String,
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FormSchema {
    #[schema(example = "1.0")]
    pub version: String,
    pub sections: Vec<FieldGroup>,
}

impl FormSchema {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().find(|f| f.name == name)
    }
}

// --- TEMPLATE PERSISTIDO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormTemplate {
    pub id: Uuid,
    #[schema(example = "1.0")]
    pub version: String,
    #[schema(example = "KYC intake")]
    pub name: String,
    #[schema(value_type = FormSchema)]
    pub schema: Json<FormSchema>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- RENDERIZAÇÃO (descrição de UI) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    TextInput,
    TextArea,
    NumberInput,
    DatePicker,
    Dropdown,
    CheckboxGroup,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderedField {
    pub name: String,
    pub label: String,
    pub widget: Widget,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSection {
    pub title: String,
    pub fields: Vec<RenderedField>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderedForm {
    pub version: String,
    pub sections: Vec<RenderedSection>,
}

// --- VALIDAÇÃO ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldErrorCode {
    Required,
    InvalidOption { value: String },
    InvalidOptions { values: Vec<String> },
    TooManySelections { max: usize },
    ExpectedList,
    ExpectedText,
    InvalidNumber,
    InvalidDate,
}

impl FieldErrorCode {
    /// Chave usada no I18nStore.
    pub fn message_key(&self) -> &'static str {
        match self {
            FieldErrorCode::Required => "field.required",
            FieldErrorCode::InvalidOption { .. } => "field.invalid_option",
            FieldErrorCode::InvalidOptions { .. } => "field.invalid_options",
            FieldErrorCode::TooManySelections { .. } => "field.too_many_selections",
            FieldErrorCode::ExpectedList => "field.expected_list",
            FieldErrorCode::ExpectedText => "field.expected_text",
            FieldErrorCode::InvalidNumber => "field.invalid_number",
            FieldErrorCode::InvalidDate => "field.invalid_date",
        }
    }

    /// Parâmetros para interpolar na mensagem traduzida.
    pub fn message_args(&self) -> Vec<(&'static str, String)> {
        match self {
            FieldErrorCode::InvalidOption { value } => vec![("value", value.clone())],
            FieldErrorCode::InvalidOptions { values } => vec![("values", values.join(", "))],
            FieldErrorCode::TooManySelections { max } => vec![("max", max.to_string())],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub label: String,
    #[serde(flatten)]
    pub code: FieldErrorCode,
    /// Mensagem legível (inglês). A resposta HTTP usa a versão traduzida.
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }
}

/// Dados KYC já validados e normalizados contra um schema.
#[derive(Debug, Clone, PartialEq)]
pub struct KycData {
    pub form_version: String,
    pub values: Map<String, Value>,
}

impl KycData {
    pub fn text(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        let value = self.values.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
    }

    pub fn tags(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// --- FORMULÁRIO PADRÃO ---

fn text(name: &str, label: &str) -> FieldDefinition {
    FieldDefinition {
        name: name.to_string(),
        label: label.to_string(),
        required: false,
        kind: FieldKind::Text,
    }
}

fn select(name: &str, label: &str, options: &[&str]) -> FieldDefinition {
    FieldDefinition {
        name: name.to_string(),
        label: label.to_string(),
        required: false,
        kind: FieldKind::Select {
            options: options.iter().map(|o| o.to_string()).collect(),
        },
    }
}

fn multiselect(name: &str, label: &str, options: &[&str], max: Option<usize>) -> FieldDefinition {
    FieldDefinition {
        name: name.to_string(),
        label: label.to_string(),
        required: false,
        kind: FieldKind::Multiselect {
            options: options.iter().map(|o| o.to_string()).collect(),
            max,
        },
    }
}

/// Formulário semeado na primeira inicialização quando não há nenhum template.
pub fn default_form_schema() -> FormSchema {
    FormSchema {
        version: "1.0".to_string(),
        sections: vec![
            FieldGroup {
                title: "Source".to_string(),
                fields: vec![select(
                    "source_channel",
                    "Source channel",
                    &["referral", "search", "social_media", "offline_event", "other"],
                )],
            },
            FieldGroup {
                title: "Basic information".to_string(),
                fields: vec![
                    text("city", "City"),
                    select("age_band", "Age band", &["18-35", "36-45", "46-55", "56-65", "65+"]),
                    select(
                        "education",
                        "Education",
                        &["high_school_or_below", "bachelor", "master", "doctorate", "other"],
                    ),
                ],
            },
            FieldGroup {
                title: "Family".to_string(),
                fields: vec![
                    FieldDefinition {
                        name: "children_count".to_string(),
                        label: "Number of children".to_string(),
                        required: false,
                        kind: FieldKind::Number,
                    },
                    multiselect(
                        "children_education",
                        "Children education stage",
                        &[
                            "preschool",
                            "primary",
                            "middle_school",
                            "high_school",
                            "undergraduate",
                            "graduate",
                            "working",
                        ],
                        None,
                    ),
                ],
            },
            FieldGroup {
                title: "Assets and career".to_string(),
                fields: vec![
                    select("asset_tier", "Asset tier", &["A8", "A9", "A10", "A11"]),
                    select(
                        "occupation",
                        "Occupation",
                        &["business_owner", "executive", "professional", "investor", "freelancer", "other"],
                    ),
                    text("job_title", "Job title"),
                ],
            },
            FieldGroup {
                title: "Core needs".to_string(),
                fields: vec![multiselect(
                    "core_needs",
                    "Core needs (up to 3)",
                    &[
                        "asset_allocation",
                        "children_education",
                        "risk_hedging",
                        "tax_optimization",
                        "retirement",
                        "identity_backup",
                        "business_expansion",
                    ],
                    Some(3),
                )],
            },
            FieldGroup {
                title: "Target countries".to_string(),
                fields: vec![multiselect(
                    "target_countries",
                    "Target countries",
                    &[
                        "singapore", "turkey", "hong_kong", "united_states", "canada",
                        "united_kingdom", "portugal", "malta", "greece", "other",
                    ],
                    None,
                )],
            },
            FieldGroup {
                title: "Timeline".to_string(),
                fields: vec![select(
                    "timeline",
                    "Expected timeline",
                    &["within_6_months", "6_to_12_months", "1_to_2_years", "no_rush"],
                )],
            },
            FieldGroup {
                title: "Additional information".to_string(),
                fields: vec![
                    FieldDefinition {
                        name: "birthday".to_string(),
                        label: "Birthday".to_string(),
                        required: false,
                        kind: FieldKind::Date,
                    },
                    FieldDefinition {
                        name: "notes".to_string(),
                        label: "Notes".to_string(),
                        required: false,
                        kind: FieldKind::Textarea,
                    },
                ],
            },
        ],
    }
}

/// Valores submetidos crus, antes da validação.
pub type SubmittedValues = Map<String, Value>;

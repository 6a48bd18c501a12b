// src/services/form_engine.rs
//
// Motor de formulário dinâmico: funções puras sobre (schema, valores).

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};

use crate::models::form::{
    FieldDefinition, FieldError, FieldErrorCode, FieldKind, FormSchema, KycData, RenderedField,
    RenderedForm, RenderedSection, SubmittedValues, ValidationResult, Widget,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

type Checker = fn(&FieldKind, &Value) -> Result<Value, FieldErrorCode>;

// Tabela de despacho por tipo de campo.
fn checker_for(kind: &FieldKind) -> Checker {
    match kind {
        FieldKind::Text | FieldKind::Textarea => check_text,
        FieldKind::Number => check_number,
        FieldKind::Date => check_date,
        FieldKind::Select { .. } => check_select,
        FieldKind::Multiselect { .. } => check_multiselect,
    }
}

fn widget_for(kind: &FieldKind) -> Widget {
    match kind {
        FieldKind::Text => Widget::TextInput,
        FieldKind::Textarea => Widget::TextArea,
        FieldKind::Number => Widget::NumberInput,
        FieldKind::Date => Widget::DatePicker,
        FieldKind::Select { .. } => Widget::Dropdown,
        FieldKind::Multiselect { .. } => Widget::CheckboxGroup,
    }
}

pub fn render(schema: &FormSchema) -> RenderedForm {
    RenderedForm {
        version: schema.version.clone(),
        sections: schema
            .sections
            .iter()
            .map(|section| RenderedSection {
                title: section.title.clone(),
                fields: section.fields.iter().map(render_field).collect(),
            })
            .collect(),
    }
}

fn render_field(field: &FieldDefinition) -> RenderedField {
    let max_selections = match &field.kind {
        FieldKind::Multiselect { max, .. } => *max,
        _ => None,
    };
    RenderedField {
        name: field.name.clone(),
        label: field.label.clone(),
        widget: widget_for(&field.kind),
        required: field.required,
        options: field.kind.options().to_vec(),
        max_selections,
    }
}

/// Valida todos os campos e devolve todos os erros de uma vez (não para no primeiro).
pub fn validate(schema: &FormSchema, values: &SubmittedValues) -> ValidationResult {
    let mut result = ValidationResult::default();
    for field in schema.fields() {
        if let Err(code) = check_field(field, values.get(&field.name)) {
            result.errors.push(field_error(field, code));
        }
    }
    result
}

/// Valida e normaliza: números convertidos, listas sem repetição,
/// chaves fora do schema e opcionais vazios descartados.
pub fn accept(schema: &FormSchema, values: &SubmittedValues) -> Result<KycData, ValidationResult> {
    let mut result = ValidationResult::default();
    let mut normalized = Map::new();

    for field in schema.fields() {
        match check_field(field, values.get(&field.name)) {
            Ok(Some(value)) => {
                normalized.insert(field.name.clone(), value);
            }
            Ok(None) => {}
            Err(code) => result.errors.push(field_error(field, code)),
        }
    }

    if result.is_valid() {
        Ok(KycData { form_version: schema.version.clone(), values: normalized })
    } else {
        Err(result)
    }
}

fn check_field(field: &FieldDefinition, value: Option<&Value>) -> Result<Option<Value>, FieldErrorCode> {
    match value {
        Some(v) if !is_empty(v) => checker_for(&field.kind)(&field.kind, v).map(Some),
        _ if field.required => Err(FieldErrorCode::Required),
        _ => Ok(None),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn check_text(_: &FieldKind, value: &Value) -> Result<Value, FieldErrorCode> {
    match value {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err(FieldErrorCode::ExpectedText),
    }
}

fn check_number(_: &FieldKind, value: &Value) -> Result<Value, FieldErrorCode> {
    match value {
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::String(s) => parse_number(s.trim()).ok_or(FieldErrorCode::InvalidNumber),
        _ => Err(FieldErrorCode::InvalidNumber),
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    let f = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(f).map(Value::Number)
}

fn check_date(_: &FieldKind, value: &Value) -> Result<Value, FieldErrorCode> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
        .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
        .ok_or(FieldErrorCode::InvalidDate)
}

fn check_select(kind: &FieldKind, value: &Value) -> Result<Value, FieldErrorCode> {
    let options = kind.options();
    match value.as_str() {
        Some(s) if options.iter().any(|o| o == s) => Ok(Value::String(s.to_string())),
        Some(s) => Err(FieldErrorCode::InvalidOption { value: s.to_string() }),
        None => Err(FieldErrorCode::InvalidOption { value: value.to_string() }),
    }
}

fn check_multiselect(kind: &FieldKind, value: &Value) -> Result<Value, FieldErrorCode> {
    let Value::Array(items) = value else {
        return Err(FieldErrorCode::ExpectedList);
    };
    let options = kind.options();

    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    let mut invalid = Vec::new();
    for item in items {
        match item.as_str() {
            Some(s) if options.iter().any(|o| o == s) => {
                if seen.insert(s) {
                    selected.push(Value::String(s.to_string()));
                }
            }
            Some(s) => invalid.push(s.to_string()),
            None => invalid.push(item.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(FieldErrorCode::InvalidOptions { values: invalid });
    }
    if let FieldKind::Multiselect { max: Some(max), .. } = kind {
        if selected.len() > *max {
            return Err(FieldErrorCode::TooManySelections { max: *max });
        }
    }
    Ok(Value::Array(selected))
}

fn field_error(field: &FieldDefinition, code: FieldErrorCode) -> FieldError {
    FieldError {
        field: field.name.clone(),
        label: field.label.clone(),
        reason: describe(&field.label, &code),
        code,
    }
}

fn describe(label: &str, code: &FieldErrorCode) -> String {
    match code {
        FieldErrorCode::Required => format!("{label} is required"),
        FieldErrorCode::InvalidOption { value } => {
            format!("{label}: '{value}' is not one of the allowed options")
        }
        FieldErrorCode::InvalidOptions { values } => {
            format!("{label} contains invalid options: {}", values.join(", "))
        }
        FieldErrorCode::TooManySelections { max } => format!("{label} allows at most {max} selections"),
        FieldErrorCode::ExpectedList => format!("{label} must be a list"),
        FieldErrorCode::ExpectedText => format!("{label} must be text"),
        FieldErrorCode::InvalidNumber => format!("{label} must be a number"),
        FieldErrorCode::InvalidDate => format!("{label} must be a date (YYYY-MM-DD)"),
    }
}

/// Checagens da definição em si, feitas quando um administrador cria/edita um formulário.
pub fn check_schema(schema: &FormSchema) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if schema.version.trim().is_empty() {
        problems.push("version must not be empty".to_string());
    }
    if schema.sections.is_empty() {
        problems.push("form must have at least one section".to_string());
    }

    let mut names = HashSet::new();
    for (s_idx, section) in schema.sections.iter().enumerate() {
        if section.title.trim().is_empty() {
            problems.push(format!("section #{} has an empty title", s_idx + 1));
        }
        if section.fields.is_empty() {
            problems.push(format!("section '{}' has no fields", section.title));
        }
        for field in &section.fields {
            if field.name.trim().is_empty() {
                problems.push(format!("a field in section '{}' has an empty name", section.title));
                continue;
            }
            if !names.insert(field.name.as_str()) {
                problems.push(format!("field name '{}' is used more than once", field.name));
            }
            if field.label.trim().is_empty() {
                problems.push(format!("field '{}' has an empty label", field.name));
            }
            if let FieldKind::Select { options } | FieldKind::Multiselect { options, .. } = &field.kind {
                if options.is_empty() {
                    problems.push(format!("field '{}' needs at least one option", field.name));
                }
                let unique: HashSet<_> = options.iter().collect();
                if unique.len() != options.len() {
                    problems.push(format!("field '{}' has duplicate options", field.name));
                }
            }
            if let FieldKind::Multiselect { max: Some(0), .. } = &field.kind {
                problems.push(format!("field '{}' has max = 0", field.name));
            }
        }
    }

    if problems.is_empty() { Ok(()) } else { Err(problems) }
}

// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_LANG: &str = "en";
pub const SUPPORTED_LANGS: &[&str] = &["en", "zh"];

const EN: &[(&str, &str)] = &[
    ("error.invalid_payload", "One or more fields are invalid."),
    ("error.form_invalid", "The form submission has {count} invalid field(s)."),
    ("error.invalid_form_schema", "The form definition is invalid."),
    ("error.invalid_query", "The query parameters are invalid."),
    ("error.invite_not_found", "Invite link not found."),
    ("error.invite_used", "This invite link has already been used."),
    ("error.invite_expired", "This invite link has expired."),
    ("error.invite_revoked", "This invite link has been revoked."),
    ("error.invalid_transition", "Cannot move customer from '{from}' to '{to}' ({via})."),
    ("error.customer_not_found", "Customer not found."),
    ("error.form_not_found", "Form template not found."),
    ("error.no_active_form", "No active form template is configured."),
    ("error.missing_kyc", "The customer has not submitted the KYC form yet."),
    ("error.duplicate_form_version", "Form version '{version}' already exists."),
    ("error.analysis_failed", "AI analysis failed: {reason}"),
    ("error.analysis_timeout", "AI analysis timed out. Try again later."),
    ("error.internal", "An unexpected error occurred."),
    ("field.required", "{label} is required."),
    ("field.invalid_option", "{label}: '{value}' is not one of the allowed options."),
    ("field.invalid_options", "{label} contains invalid options: {values}."),
    ("field.too_many_selections", "{label} allows at most {max} selections."),
    ("field.expected_list", "{label} must be a list."),
    ("field.expected_text", "{label} must be text."),
    ("field.invalid_number", "{label} must be a number."),
    ("field.invalid_date", "{label} must be a date (YYYY-MM-DD)."),
    ("field.length", "{label} has an invalid length."),
    ("field.range", "{label} is out of range."),
];

const ZH: &[(&str, &str)] = &[
    ("error.invalid_payload", "一个或多个字段无效。"),
    ("error.form_invalid", "表单有 {count} 个字段未通过校验。"),
    ("error.invalid_form_schema", "表单配置无效。"),
    ("error.invalid_query", "查询参数无效。"),
    ("error.invite_not_found", "邀请链接无效"),
    ("error.invite_used", "该链接已被使用"),
    ("error.invite_expired", "邀请链接已过期"),
    ("error.invite_revoked", "邀请链接已失效"),
    ("error.invalid_transition", "无法将客户状态从「{from}」变更为「{to}」（{via}）。"),
    ("error.customer_not_found", "客户不存在"),
    ("error.form_not_found", "表单配置不存在"),
    ("error.no_active_form", "未找到激活的表单配置"),
    ("error.missing_kyc", "客户尚未填写 KYC 表单"),
    ("error.duplicate_form_version", "表单版本「{version}」已存在"),
    ("error.analysis_failed", "AI 分析失败：{reason}"),
    ("error.analysis_timeout", "AI 分析超时，请稍后重试"),
    ("error.internal", "服务器内部错误"),
    ("field.required", "{label} 为必填项"),
    ("field.invalid_option", "{label} 的值「{value}」不在可选项中"),
    ("field.invalid_options", "{label} 包含无效选项: {values}"),
    ("field.too_many_selections", "{label} 最多选择 {max} 项"),
    ("field.expected_list", "{label} 应为列表类型"),
    ("field.expected_text", "{label} 应为文本"),
    ("field.invalid_number", "{label} 应为数字"),
    ("field.invalid_date", "{label} 应为日期 (YYYY-MM-DD)"),
    ("field.length", "{label} 长度不符合要求"),
    ("field.range", "{label} 超出允许范围"),
];

/// Catálogo de mensagens por idioma. Clonar é barato (Arc).
#[derive(Clone)]
pub struct I18nStore {
    catalogs: Arc<HashMap<&'static str, HashMap<&'static str, &'static str>>>,
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}

impl I18nStore {
    pub fn new() -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert("en", EN.iter().copied().collect());
        catalogs.insert("zh", ZH.iter().copied().collect());
        Self { catalogs: Arc::new(catalogs) }
    }

    /// Traduz `key` para `lang`, caindo para inglês e, por último, para a própria chave.
    pub fn translate(&self, lang: &str, key: &str, args: &[(&str, String)]) -> String {
        let template = self
            .catalogs
            .get(lang)
            .and_then(|c| c.get(key))
            .or_else(|| self.catalogs.get(DEFAULT_LANG).and_then(|c| c.get(key)))
            .copied()
            .unwrap_or(key);

        args.iter().fold(template.to_string(), |message, (name, value)| {
            message.replace(&format!("{{{name}}}"), value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_arguments() {
        let store = I18nStore::new();
        let msg = store.translate("en", "field.too_many_selections", &[
            ("label", "Core needs".to_string()),
            ("max", "3".to_string()),
        ]);
        assert_eq!(msg, "Core needs allows at most 3 selections.");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let store = I18nStore::new();
        assert_eq!(store.translate("pt", "error.customer_not_found", &[]), "Customer not found.");
        assert_eq!(store.translate("zh", "error.customer_not_found", &[]), "客户不存在");
        assert_eq!(store.translate("en", "no.such.key", &[]), "no.such.key");
    }
}

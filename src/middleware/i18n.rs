// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::i18n::{DEFAULT_LANG, SUPPORTED_LANGS};

// Idioma negociado para as mensagens de erro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LANG.to_string())
    }
}

impl Locale {
    /// Primeiro idioma do cabeçalho (em ordem de `q`) que temos catálogo.
    /// "zh-CN" casa com "zh"; nada suportado cai para o padrão.
    pub fn negotiate(accept_language: &str) -> Self {
        accept_language::parse(accept_language)
            .iter()
            .filter_map(|tag| tag.split('-').next())
            .map(str::to_lowercase)
            .find(|primary| SUPPORTED_LANGS.contains(&primary.as_str()))
            .map(Locale)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let locale = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .map(Locale::negotiate)
            .unwrap_or_default();

        Ok(locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_supported_language() {
        assert_eq!(Locale::negotiate("zh-CN,zh;q=0.9,en;q=0.8").0, "zh");
        assert_eq!(Locale::negotiate("fr-FR, zh;q=0.5").0, "zh");
        assert_eq!(Locale::negotiate("EN-us").0, "en");
    }

    #[test]
    fn unsupported_or_garbage_falls_back() {
        assert_eq!(Locale::negotiate("pt-BR,fr;q=0.8"), Locale::default());
        assert_eq!(Locale::negotiate(""), Locale::default());
    }
}

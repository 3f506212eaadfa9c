// src/common/i18n.rs

use std::collections::HashMap;

pub const DEFAULT_LOCALE: &str = "pt";

/// Catálogo de mensagens por idioma, embutido no binário.
#[derive(Debug, Clone)]
pub struct I18nStore {
    bundles: HashMap<String, HashMap<String, String>>,
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}

impl I18nStore {
    pub fn new() -> Self {
        let mut bundles = HashMap::new();
        for (lang, raw) in [
            ("pt", include_str!("../../locales/pt.json")),
            ("en", include_str!("../../locales/en.json")),
        ] {
            match serde_json::from_str::<HashMap<String, String>>(raw) {
                Ok(bundle) => {
                    bundles.insert(lang.to_string(), bundle);
                }
                Err(e) => tracing::error!("❌ Catálogo de mensagens '{}' inválido: {}", lang, e),
            }
        }
        Self { bundles }
    }

    /// Traduz a chave; cai para o português e, por fim, para a própria chave.
    pub fn translate(&self, locale: &str, key: &str) -> String {
        self.lookup(locale, key)
            .or_else(|| self.lookup(DEFAULT_LOCALE, key))
            .unwrap_or(key)
            .to_string()
    }

    pub fn supports(&self, locale: &str) -> bool {
        self.bundles.contains_key(locale)
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.bundles
            .get(locale)
            .and_then(|bundle| bundle.get(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_portuguese_then_key() {
        let i18n = I18nStore::new();
        assert_eq!(i18n.translate("fr", "auth_wrong_password"), "Senha incorreta");
        assert_eq!(i18n.translate("en", "no_such_key"), "no_such_key");
    }

    #[test]
    fn both_bundles_cover_the_same_keys() {
        let i18n = I18nStore::new();
        let pt = &i18n.bundles["pt"];
        let en = &i18n.bundles["en"];
        for key in pt.keys() {
            assert!(en.contains_key(key), "chave ausente em en: {key}");
        }
    }
}

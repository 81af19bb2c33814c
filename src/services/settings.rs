use crate::{
    config::{OcrEngineConfig, FALLBACK_ENGINE_URL},
    database::{queries::SettingQueries, Database},
    errors::Result,
};

pub const ENGINE_URL_KEY: &str = "ocr_engine_url";
pub const ENGINE_TOKEN_KEY: &str = "ocr_engine_token";

/// Where and how to call the OCR engine, resolved per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEndpoint {
    pub url: String,
    pub token: Option<String>,
    /// True when the URL came from the store or the configuration rather than
    /// the built-in fallback.
    pub url_configured: bool,
}

/// Stored values win over configured ones; blank values count as unset.
pub fn resolve_endpoint(
    stored_url: Option<String>,
    stored_token: Option<String>,
    defaults: &OcrEngineConfig,
) -> EngineEndpoint {
    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let url = non_blank(stored_url).or_else(|| non_blank(defaults.url.clone()));
    let token = non_blank(stored_token).or_else(|| non_blank(defaults.token.clone()));

    EngineEndpoint {
        url_configured: url.is_some(),
        url: url.unwrap_or_else(|| FALLBACK_ENGINE_URL.to_string()),
        token,
    }
}

#[derive(Clone)]
pub struct SettingsStore {
    database: Database,
}

impl SettingsStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        SettingQueries::get(self.database.pool(), key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        SettingQueries::upsert(self.database.pool(), key, value).await?;
        tracing::info!(key, "Setting updated");
        Ok(())
    }

    /// Never fails: a storage error falls back to the configured values.
    pub async fn engine_endpoint(&self, defaults: &OcrEngineConfig) -> EngineEndpoint {
        let stored_url = self.get_or_warn(ENGINE_URL_KEY).await;
        let stored_token = self.get_or_warn(ENGINE_TOKEN_KEY).await;
        resolve_endpoint(stored_url, stored_token, defaults)
    }

    async fn get_or_warn(&self, key: &str) -> Option<String> {
        match self.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, "Failed to read setting, using configured value: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(url: Option<&str>, token: Option<&str>) -> OcrEngineConfig {
        OcrEngineConfig {
            url: url.map(str::to_string),
            token: token.map(str::to_string),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_fallback_url_without_any_source() {
        let endpoint = resolve_endpoint(None, None, &defaults(None, None));
        assert_eq!(endpoint.url, FALLBACK_ENGINE_URL);
        assert!(endpoint.token.is_none());
        assert!(!endpoint.url_configured);
    }

    #[test]
    fn test_stored_values_take_precedence() {
        let endpoint = resolve_endpoint(
            Some("http://stored/ocr".into()),
            Some("stored-token".into()),
            &defaults(Some("http://env/ocr"), Some("env-token")),
        );
        assert_eq!(endpoint.url, "http://stored/ocr");
        assert_eq!(endpoint.token.as_deref(), Some("stored-token"));
    }

    #[test]
    fn test_blank_stored_value_falls_through() {
        let endpoint = resolve_endpoint(
            Some("  ".into()),
            Some(String::new()),
            &defaults(Some("http://env/ocr"), Some("env-token")),
        );
        assert_eq!(endpoint.url, "http://env/ocr");
        assert_eq!(endpoint.token.as_deref(), Some("env-token"));
        assert!(endpoint.url_configured);
    }

    #[tokio::test]
    async fn test_store_round_trip_and_overwrite() {
        let store = SettingsStore::new(Database::in_memory().await.unwrap());
        assert!(store.get(ENGINE_URL_KEY).await.unwrap().is_none());

        store.set(ENGINE_URL_KEY, "http://a/ocr").await.unwrap();
        store.set(ENGINE_URL_KEY, "http://b/ocr").await.unwrap();

        let endpoint = store.engine_endpoint(&defaults(None, None)).await;
        assert_eq!(endpoint.url, "http://b/ocr");
    }
}

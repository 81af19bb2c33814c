use anyhow::Result;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "ocr-gateway";
pub const FALLBACK_ENGINE_URL: &str = "http://example.com/ocr";

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: Option<String>,
    pub session_ttl_days: i64,
    pub default_daily_limit: i64,
    pub max_payload_bytes: usize,
    pub max_request_bytes: usize,
    pub compression_workers: usize,
    pub history_limit: i64,
    pub bcrypt_cost: u32,
    pub ocr_engine_url: Option<String>,
    pub ocr_engine_token: Option<String>,
    pub ocr_timeout_secs: u64,
}

/// Engine settings taken from the process configuration. Values stored in the
/// settings table take precedence at call time.
#[derive(Debug, Clone, Default)]
pub struct OcrEngineConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ocr-gateway.db?mode=rwc".to_string(),
            port: 5001,
            jwt_secret: None,
            session_ttl_days: 7,
            default_daily_limit: 3,
            max_payload_bytes: 8 * MIB,
            max_request_bytes: 32 * MIB,
            compression_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            history_limit: 20,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            ocr_engine_url: None,
            ocr_engine_token: None,
            ocr_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load(CONFIG_FILE)
    }

    /// Layers compiled defaults, an optional config file and the environment,
    /// in that order of increasing precedence.
    pub fn load(file: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let mut loaded: Config = config.try_deserialize()?;
        loaded.jwt_secret = loaded.jwt_secret.filter(|s| !s.trim().is_empty());
        loaded.ocr_engine_url = loaded.ocr_engine_url.filter(|s| !s.trim().is_empty());
        loaded.ocr_engine_token = loaded.ocr_engine_token.filter(|s| !s.trim().is_empty());

        if loaded.compression_workers == 0 {
            loaded.compression_workers = 1;
        }

        Ok(loaded)
    }

    /// Returns the configured signing secret, or a random one that only lives
    /// as long as the process.
    pub fn resolve_jwt_secret(&self) -> String {
        match &self.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!(
                    "JWT_SECRET is not set; using a random per-process secret, sessions will not survive a restart"
                );
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(64)
                    .map(char::from)
                    .collect()
            }
        }
    }

    pub fn ocr_engine(&self) -> OcrEngineConfig {
        OcrEngineConfig {
            url: self.ocr_engine_url.clone(),
            token: self.ocr_engine_token.clone(),
            timeout_secs: self.ocr_timeout_secs,
        }
    }
}

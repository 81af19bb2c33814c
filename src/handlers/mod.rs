use std::sync::Arc;

use chrono::Duration;

use crate::{
    auth::JwtService,
    config::Config,
    database::Database,
    errors::{AppError, Result},
    services::{
        AccountService, AdmissionPipeline, HistoryStore, HttpOcrEngine, ImageCompressor, MetricsService,
        OcrEngine, QuotaLedger, SessionStore, SettingsStore,
    },
};

pub mod admin;
pub mod auth;
pub mod docs;
pub mod health;
pub mod metrics;
pub mod ocr;
pub mod user;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub quota: QuotaLedger,
    pub history: HistoryStore,
    pub settings: SettingsStore,
    pub accounts: AccountService,
    pub pipeline: AdmissionPipeline,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    /// Wires every service around an already-migrated database and the given
    /// OCR engine.
    pub fn new(database: Database, config: Config, engine: Arc<dyn OcrEngine>) -> Result<Self> {
        let metrics = Arc::new(
            MetricsService::new().map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create metrics: {}", e)))?,
        );

        let jwt = Arc::new(JwtService::new(
            &config.resolve_jwt_secret(),
            Duration::days(config.session_ttl_days),
        ));
        let sessions = SessionStore::new(database.clone(), jwt);
        let quota = QuotaLedger::new(database.clone(), config.default_daily_limit);
        let history = HistoryStore::new(database.clone(), config.history_limit);
        let settings = SettingsStore::new(database.clone());
        let accounts = AccountService::new(database.clone(), sessions.clone(), quota.clone(), config.bcrypt_cost);
        let compressor = ImageCompressor::new(config.max_payload_bytes, config.compression_workers);

        let pipeline = AdmissionPipeline::new(
            sessions.clone(),
            quota.clone(),
            compressor,
            engine,
            history.clone(),
            metrics.clone(),
        );

        Ok(Self {
            database,
            config: Arc::new(config),
            sessions,
            quota,
            history,
            settings,
            accounts,
            pipeline,
            metrics,
        })
    }

    /// Production wiring with the HTTP OCR engine.
    pub fn from_config(database: Database, config: Config) -> Result<Self> {
        let engine = HttpOcrEngine::new(SettingsStore::new(database.clone()), config.ocr_engine())?;
        Self::new(database, config, Arc::new(engine))
    }
}

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::task::JoinHandle;

use crate::{
    errors::{AppError, ImageError, Result, UpstreamError},
    models::{OcrBox, OcrResult},
    services::{
        history::HistoryStore,
        image_compressor::ImageCompressor,
        metrics::MetricsService,
        ocr_engine::{EngineResult, OcrEngine},
        quota_ledger::QuotaLedger,
        session_store::SessionStore,
    },
};

#[derive(Debug, Clone)]
pub struct OcrSubmission {
    pub token: String,
    pub client_ip: String,
    pub image_base64: String,
}

/// A successful submission. `bookkeeping` records quota usage and history in
/// the background; dropping the handle detaches it.
#[derive(Debug)]
pub struct Admitted {
    pub user_id: i64,
    pub result: OcrResult,
    pub bookkeeping: JoinHandle<()>,
}

/// Gatekeeper in front of the OCR engine. Stages run strictly in order and
/// the first failure ends the request:
///
/// 1. session validation
/// 2. quota check
/// 3. base64 decode and compression under the payload ceiling
/// 4. engine call
/// 5. quota usage and history, only after the engine succeeded
#[derive(Clone)]
pub struct AdmissionPipeline {
    sessions: SessionStore,
    quota: QuotaLedger,
    compressor: ImageCompressor,
    engine: Arc<dyn OcrEngine>,
    history: HistoryStore,
    metrics: Arc<MetricsService>,
}

impl AdmissionPipeline {
    pub fn new(
        sessions: SessionStore,
        quota: QuotaLedger,
        compressor: ImageCompressor,
        engine: Arc<dyn OcrEngine>,
        history: HistoryStore,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            sessions,
            quota,
            compressor,
            engine,
            history,
            metrics,
        }
    }

    pub async fn run(&self, submission: OcrSubmission) -> Result<Admitted> {
        let outcome = self.admit(submission).await;

        match &outcome {
            Ok(_) => self.metrics.record_ocr("success"),
            Err(e) => self.metrics.record_ocr(e.kind()),
        }

        outcome
    }

    async fn admit(&self, submission: OcrSubmission) -> Result<Admitted> {
        let session = self.sessions.validate(&submission.token).await?;
        let user_id = session.user_id;

        let decision = self.quota.check_and_admit(user_id).await?;
        if !decision.admitted {
            tracing::info!(user_id, used = decision.used, limit = decision.limit, "Daily quota exhausted");
            self.metrics.record_quota_rejection();
            return Err(AppError::QuotaExceeded {
                used: decision.used,
                limit: decision.limit,
            });
        }

        let raw = decode_base64_image(&submission.image_base64)?;
        let compressed = self.compressor.compress(raw).await?;
        if compressed.was_recompressed() {
            self.metrics.record_compression(compressed.ratio());
            tracing::info!(
                user_id,
                original_size = compressed.original_size,
                final_size = compressed.final_size,
                attempts = compressed.attempts.len(),
                ceiling = self.compressor.ceiling(),
                "Image recompressed"
            );
        }

        let payload = STANDARD.encode(&compressed.payload);
        drop(compressed);

        let engine_result = self.engine.recognize(&payload).await.map_err(|e| {
            tracing::warn!(user_id, "OCR engine call failed: {}", e);
            e
        })?;
        let result = normalize_engine_result(engine_result)?;

        let bookkeeping = self.spawn_bookkeeping(user_id, submission.client_ip, result.text.clone());

        Ok(Admitted {
            user_id,
            result,
            bookkeeping,
        })
    }

    fn spawn_bookkeeping(&self, user_id: i64, client_ip: String, text: String) -> JoinHandle<()> {
        let quota = self.quota.clone();
        let history = self.history.clone();

        tokio::spawn(async move {
            if let Err(e) = quota.record(user_id, &client_ip).await {
                tracing::warn!(user_id, "Failed to record quota usage: {}", e);
            }
            if let Err(e) = history.append(user_id, &text).await {
                tracing::warn!(user_id, "Failed to record OCR history: {}", e);
            }
        })
    }
}

/// Surrounding whitespace is ignored; anything else that is not standard
/// base64 is a decode failure.
pub fn decode_base64_image(encoded: &str) -> std::result::Result<Vec<u8>, ImageError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| ImageError::Decode(format!("invalid base64: {}", e)))
}

/// Maps the engine payload onto the public schema. Geometry is truncated
/// toward zero and the text is the non-empty box texts joined by newlines.
pub fn normalize_engine_result(engine: EngineResult) -> std::result::Result<OcrResult, UpstreamError> {
    if engine.errcode != 0 {
        return Err(UpstreamError::EngineCode(engine.errcode));
    }

    let text = engine
        .ocr_response
        .iter()
        .filter(|b| !b.text.is_empty())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let boxes = engine
        .ocr_response
        .into_iter()
        .map(|b| OcrBox {
            text: b.text,
            left: b.left as i32,
            top: b.top as i32,
            right: b.right as i32,
            bottom: b.bottom as i32,
            confidence: b.rate,
        })
        .collect();

    Ok(OcrResult {
        errcode: 0,
        msg: "success".to_string(),
        text,
        boxes,
        width: engine.width,
        height: engine.height,
    })
}

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::errors::{AppError, Result};

/// Owns a private registry so that every application instance, tests
/// included, starts from zero.
pub struct MetricsService {
    registry: Registry,
    ocr_requests: IntCounterVec,
    quota_rejections: IntCounter,
    images_compressed: IntCounter,
    compression_ratio: Histogram,
    http_errors: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ocr_requests = IntCounterVec::new(
            Opts::new("ocr_requests_total", "OCR submissions by outcome"),
            &["outcome"],
        )?;
        let quota_rejections =
            IntCounter::new("quota_rejections_total", "OCR submissions refused by the daily quota")?;
        let images_compressed =
            IntCounter::new("images_compressed_total", "Images re-encoded to fit the payload ceiling")?;
        let compression_ratio = Histogram::with_opts(
            HistogramOpts::new("compression_ratio", "Final size divided by original size")
                .buckets(vec![0.05, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]),
        )?;
        let http_errors = IntCounterVec::new(
            Opts::new("http_errors_total", "HTTP error responses by class"),
            &["class"],
        )?;

        registry.register(Box::new(ocr_requests.clone()))?;
        registry.register(Box::new(quota_rejections.clone()))?;
        registry.register(Box::new(images_compressed.clone()))?;
        registry.register(Box::new(compression_ratio.clone()))?;
        registry.register(Box::new(http_errors.clone()))?;

        Ok(Self {
            registry,
            ocr_requests,
            quota_rejections,
            images_compressed,
            compression_ratio,
            http_errors,
        })
    }

    pub fn record_ocr(&self, outcome: &str) {
        self.ocr_requests.with_label_values(&[outcome]).inc();
    }

    pub fn record_quota_rejection(&self) {
        self.quota_rejections.inc();
    }

    pub fn record_compression(&self, ratio: f64) {
        self.images_compressed.inc();
        self.compression_ratio.observe(ratio);
    }

    pub fn record_error(&self, class: &str) {
        self.http_errors.with_label_values(&[class]).inc();
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::Internal(e.into()))?;

        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_ocr("success");
        metrics.record_ocr("quota_exceeded");
        metrics.record_quota_rejection();
        metrics.record_compression(0.4);
        metrics.record_error("client_error");

        let text = metrics.render().unwrap();
        assert!(text.contains("ocr_requests_total{outcome=\"success\"} 1"));
        assert!(text.contains("quota_rejections_total 1"));
        assert!(text.contains("images_compressed_total 1"));
        assert!(text.contains("compression_ratio_count 1"));
        assert!(text.contains("http_errors_total{class=\"client_error\"} 1"));
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let first = MetricsService::new().unwrap();
        let second = MetricsService::new().unwrap();
        first.record_quota_rejection();

        assert!(second.render().unwrap().contains("quota_rejections_total 0"));
    }
}

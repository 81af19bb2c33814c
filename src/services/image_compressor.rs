use std::io::Cursor;
use std::sync::Arc;

use image::{imageops::FilterType, DynamicImage, ImageOutputFormat};
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::errors::{ImageError, Result};

/// Payload ceiling accepted by the OCR engine.
pub const DEFAULT_CEILING: usize = 8 * 1024 * 1024;
pub const MAX_ATTEMPTS: u32 = 3;

const INITIAL_QUALITY: u8 = 90;
const QUALITY_STEP: u8 = 10;
const MIN_QUALITY: u8 = 40;
const MIN_SCALE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionAttempt {
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    pub encoded_size: usize,
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub payload: Vec<u8>,
    pub original_size: usize,
    pub final_size: usize,
    pub attempts: Vec<CompressionAttempt>,
}

impl CompressionResult {
    pub fn was_recompressed(&self) -> bool {
        !self.attempts.is_empty()
    }

    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 1.0;
        }
        self.final_size as f64 / self.original_size as f64
    }
}

/// Brings an encoded JPEG or PNG under `ceiling` bytes.
///
/// Payloads already within the ceiling are returned untouched, without being
/// decoded. Otherwise the image is re-encoded as JPEG, lowering the quality
/// and downscaling between attempts, for at most [`MAX_ATTEMPTS`] encodes.
/// Alpha is discarded.
pub fn compress_to_limit(data: Vec<u8>, ceiling: usize) -> std::result::Result<CompressionResult, ImageError> {
    let original_size = data.len();
    if original_size <= ceiling {
        return Ok(CompressionResult {
            payload: data,
            original_size,
            final_size: original_size,
            attempts: Vec::new(),
        });
    }

    let decoded = image::load_from_memory(&data).map_err(|e| ImageError::Decode(e.to_string()))?;
    drop(data);

    let mut img = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut quality = INITIAL_QUALITY;
    let mut attempts = Vec::with_capacity(MAX_ATTEMPTS as usize);

    for attempt in 1..=MAX_ATTEMPTS {
        let encoded = encode_jpeg(&img, quality)?;
        attempts.push(CompressionAttempt {
            quality,
            width: img.width(),
            height: img.height(),
            encoded_size: encoded.len(),
        });

        if encoded.len() <= ceiling {
            tracing::debug!(
                original_size,
                final_size = encoded.len(),
                attempt,
                quality,
                "Image compressed under ceiling"
            );
            return Ok(CompressionResult {
                final_size: encoded.len(),
                payload: encoded,
                original_size,
                attempts,
            });
        }

        if attempt == MAX_ATTEMPTS {
            break;
        }

        let scale = step_scale(ceiling, encoded.len());
        let (width, height) = scaled_dimensions(img.width(), img.height(), scale);
        img = img.resize_exact(width, height, FilterType::Lanczos3);
        quality = next_quality(quality);
    }

    let last_size = attempts.last().map(|a| a.encoded_size).unwrap_or(original_size);
    Err(ImageError::CompressionLimitExceeded {
        attempts: MAX_ATTEMPTS,
        ceiling,
        last_size,
    })
}

/// Linear shrink factor expected to bring `encoded` down to `ceiling`.
pub fn step_scale(ceiling: usize, encoded: usize) -> f64 {
    if encoded == 0 {
        return 1.0;
    }
    (ceiling as f64 / encoded as f64).sqrt().clamp(MIN_SCALE, 1.0)
}

pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = ((width as f64 * scale).floor() as u32).max(1);
    let h = ((height as f64 * scale).floor() as u32).max(1);
    (w, h)
}

pub fn next_quality(quality: u8) -> u8 {
    quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> std::result::Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Jpeg(quality))
        .map_err(|e| ImageError::Internal(format!("JPEG encode failed: {}", e)))?;
    Ok(buffer)
}

/// Runs [`compress_to_limit`] on the blocking pool, bounded by a fixed number
/// of concurrent jobs.
#[derive(Clone)]
pub struct ImageCompressor {
    ceiling: usize,
    permits: Arc<Semaphore>,
}

impl ImageCompressor {
    pub fn new(ceiling: usize, workers: usize) -> Self {
        Self {
            ceiling,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub async fn compress(&self, data: Vec<u8>) -> Result<CompressionResult> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ImageError::Internal("compression pool closed".to_string()))?;

        let ceiling = self.ceiling;
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            compress_to_limit(data, ceiling)
        })
        .await
        .map_err(|e| ImageError::Internal(format!("compression task failed: {}", e)))??;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, RgbImage};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(7);
        let img: RgbImage = ImageBuffer::from_fn(width, height, |_, _| image::Rgb(rng.gen::<[u8; 3]>()));

        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_small_payload_passes_through_untouched() {
        let garbage = b"definitely not an image".to_vec();
        let result = compress_to_limit(garbage.clone(), 1024).unwrap();

        assert_eq!(result.payload, garbage);
        assert!(!result.was_recompressed());
        assert_eq!(result.ratio(), 1.0);
    }

    #[test]
    fn test_payload_at_ceiling_passes_through() {
        let png = noise_png(16, 16);
        let len = png.len();
        let result = compress_to_limit(png.clone(), len).unwrap();
        assert_eq!(result.payload, png);
    }

    #[test]
    fn test_undecodable_payload_over_ceiling() {
        let garbage = vec![0xAB; 4096];
        let err = compress_to_limit(garbage, 100).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn test_unreachable_ceiling_fails_after_three_attempts() {
        let png = noise_png(64, 64);
        let err = compress_to_limit(png, 10).unwrap_err();

        match err {
            ImageError::CompressionLimitExceeded { attempts, ceiling, last_size } => {
                assert_eq!(attempts, MAX_ATTEMPTS);
                assert_eq!(ceiling, 10);
                assert!(last_size > 10);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_png_is_reencoded_as_jpeg() {
        let png = noise_png(128, 128);
        let ceiling = png.len() - 1;
        let result = compress_to_limit(png, ceiling).unwrap();

        assert!(result.was_recompressed());
        assert!(result.final_size <= ceiling);
        assert_eq!(result.payload.len(), result.final_size);
        assert_eq!(&result.payload[..2], &[0xFF, 0xD8]);
        image::load_from_memory(&result.payload).unwrap();
    }

    #[test]
    fn test_attempts_degrade_monotonically() {
        let png = noise_png(256, 256);
        let first = encode_jpeg(&image::load_from_memory(&png).unwrap(), INITIAL_QUALITY).unwrap();
        let ceiling = first.len() - 1;

        let result = compress_to_limit(png, ceiling).unwrap();
        assert!(result.attempts.len() >= 2);
        assert!(result.final_size <= ceiling);

        for pair in result.attempts.windows(2) {
            assert!(pair[1].quality < pair[0].quality);
            assert!(pair[1].quality >= MIN_QUALITY);
            assert!(pair[1].width <= pair[0].width);
            assert!(pair[1].height <= pair[0].height);
        }
    }

    #[test]
    fn test_scale_is_clamped() {
        assert_eq!(step_scale(1, 1_000_000), MIN_SCALE);
        assert_eq!(step_scale(100, 100), 1.0);
        assert!((step_scale(25, 100) - 0.5).abs() < f64::EPSILON);
        assert!((step_scale(81, 100) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_dimensions_never_reach_zero() {
        assert_eq!(scaled_dimensions(1, 1, 0.5), (1, 1));
        assert_eq!(scaled_dimensions(1000, 3, 0.5), (500, 1));
        assert_eq!(scaled_dimensions(101, 99, 0.9), (90, 89));
    }

    #[test]
    fn test_quality_floor() {
        assert_eq!(next_quality(90), 80);
        assert_eq!(next_quality(45), MIN_QUALITY);
        assert_eq!(next_quality(MIN_QUALITY), MIN_QUALITY);
    }

    #[tokio::test]
    async fn test_compressor_runs_on_blocking_pool() {
        let compressor = ImageCompressor::new(64, 2);
        let err = compressor.compress(vec![1; 128]).await.unwrap_err();
        assert_eq!(err.kind(), "decode_failure");

        let ok = compressor.compress(vec![1; 64]).await.unwrap();
        assert_eq!(ok.final_size, 64);
    }
}

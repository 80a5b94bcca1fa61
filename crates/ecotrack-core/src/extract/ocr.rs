//! Image OCR through short-lived recognition workers.
//!
//! A worker is spawned for each image and terminated afterwards, whether
//! recognition succeeded or not.

use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// A loaded recognizer for one request.
pub trait OcrWorker {
    fn recognize(&mut self, image: &DynamicImage) -> Result<String, OcrError>;

    /// Release the worker's resources.
    fn terminate(&mut self);
}

/// Spawns OCR workers.
pub trait OcrProvider: Send + Sync {
    fn spawn_worker(&self) -> Result<Box<dyn OcrWorker>, OcrError>;
}

/// Terminates the wrapped worker when dropped.
struct ScopedWorker(Box<dyn OcrWorker>);

impl Drop for ScopedWorker {
    fn drop(&mut self) {
        self.0.terminate();
        debug!("OCR worker terminated");
    }
}

/// Recognize the text in an encoded image.
pub fn recognize_image(provider: &dyn OcrProvider, bytes: &[u8]) -> Result<String, OcrError> {
    let mut worker = ScopedWorker(provider.spawn_worker()?);

    let image =
        image::load_from_memory(bytes).map_err(|e| OcrError::InvalidImage(e.to_string()))?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidImage("image has no pixels".to_string()));
    }

    worker.0.recognize(&image)
}

/// Spawns `pure-onnx-ocr` engines from model files on disk.
pub struct PureOcrProvider {
    config: OcrConfig,
}

impl PureOcrProvider {
    /// Only Latin-script English recognition models are supported.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        match config.language.to_lowercase().as_str() {
            "eng" | "en" | "latin" => Ok(Self { config }),
            other => Err(OcrError::ModelLoad(format!(
                "unsupported OCR language: {}",
                other
            ))),
        }
    }
}

impl OcrProvider for PureOcrProvider {
    fn spawn_worker(&self) -> Result<Box<dyn OcrWorker>, OcrError> {
        let dir = &self.config.model_dir;
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(dir.join(&self.config.detection_model))
            .rec_model_path(dir.join(&self.config.recognition_model))
            .dictionary_path(dir.join(&self.config.dictionary))
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        debug!("Spawned OCR worker from {}", dir.display());

        Ok(Box::new(PureOcrWorker {
            engine: Some(engine),
            keep_unk: self.config.keep_unk,
        }))
    }
}

struct PureOcrWorker {
    engine: Option<pure_onnx_ocr::engine::OcrEngine>,
    keep_unk: bool,
}

struct Line {
    x: f64,
    y: f64,
    text: String,
}

impl OcrWorker for PureOcrWorker {
    fn recognize(&mut self, image: &DynamicImage) -> Result<String, OcrError> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| OcrError::Recognition("worker already terminated".to_string()))?;

        let start = Instant::now();
        let (width, height) = image.dimensions();
        info!("Recognizing image: {}x{}", width, height);

        let results = engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        let mut lines: Vec<Line> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                Line { x, y, text }
            })
            .collect();

        // Reading order: 20px rows, then left to right
        lines.sort_by(|a, b| {
            let row_a = (a.y / 20.0) as i64;
            let row_b = (b.y / 20.0) as i64;
            row_a
                .cmp(&row_b)
                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });

        info!(
            "OCR complete: {} text regions in {}ms",
            lines.len(),
            start.elapsed().as_millis()
        );

        Ok(lines
            .into_iter()
            .map(|l| l.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn terminate(&mut self) {
        self.engine = None;
    }
}

fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f64, f64) {
    polygon
        .exterior()
        .coords()
        .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| {
            (x.min(c.x), y.min(c.y))
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Worker that returns fixed text or fails, and records termination.
    pub(crate) struct FakeProvider {
        pub text: Option<String>,
        pub spawned: Arc<AtomicUsize>,
        pub terminated: Arc<AtomicBool>,
    }

    impl FakeProvider {
        pub fn returning(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                spawned: Arc::new(AtomicUsize::new(0)),
                terminated: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn failing() -> Self {
            Self {
                text: None,
                ..Self::returning("")
            }
        }
    }

    struct FakeWorker {
        text: Option<String>,
        terminated: Arc<AtomicBool>,
    }

    impl OcrWorker for FakeWorker {
        fn recognize(&mut self, _image: &DynamicImage) -> Result<String, OcrError> {
            self.text
                .clone()
                .ok_or_else(|| OcrError::Recognition("blurry".to_string()))
        }

        fn terminate(&mut self) {
            self.terminated.store(true, Ordering::SeqCst);
        }
    }

    impl OcrProvider for FakeProvider {
        fn spawn_worker(&self) -> Result<Box<dyn OcrWorker>, OcrError> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeWorker {
                text: self.text.clone(),
                terminated: self.terminated.clone(),
            }))
        }
    }

    pub(crate) fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::new_rgb8(8, 8);
        let mut bytes = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_worker_terminated_after_success() {
        let provider = FakeProvider::returning("Water 15 m3");
        let text = recognize_image(&provider, &png_bytes()).unwrap();
        assert_eq!(text, "Water 15 m3");
        assert!(provider.terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_worker_terminated_after_failure() {
        let provider = FakeProvider::failing();
        let err = recognize_image(&provider, &png_bytes()).unwrap_err();
        assert!(matches!(err, OcrError::Recognition(_)));
        assert!(provider.terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_undecodable_image_still_terminates() {
        let provider = FakeProvider::returning("unused");
        let err = recognize_image(&provider, b"not an image").unwrap_err();
        assert!(matches!(err, OcrError::InvalidImage(_)));
        assert_eq!(provider.spawned.load(Ordering::SeqCst), 1);
        assert!(provider.terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_rejects_unsupported_language() {
        let config = OcrConfig {
            language: "pol".to_string(),
            ..OcrConfig::default()
        };
        assert!(PureOcrProvider::new(config).is_err());
        assert!(PureOcrProvider::new(OcrConfig::default()).is_ok());
    }
}

//! Turning uploaded invoices into plain text.

mod ocr;
mod pdf;

pub use ocr::{recognize_image, OcrProvider, OcrWorker, PureOcrProvider};
pub use pdf::{PdfTextExtractor, PdfType};

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::config::EcotrackConfig;
use crate::upload::UploadedFile;

/// Extracts the text content of an uploaded file.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, file: &UploadedFile) -> Result<String, ExtractionError>;
}

/// Routes PDFs to the text layer and images to OCR.
pub struct DocumentTextExtractor {
    pdf: PdfTextExtractor,
    ocr: Arc<dyn OcrProvider>,
}

impl DocumentTextExtractor {
    pub fn new(pdf: PdfTextExtractor, ocr: Arc<dyn OcrProvider>) -> Self {
        Self { pdf, ocr }
    }

    pub fn from_config(config: &EcotrackConfig) -> Result<Self, ExtractionError> {
        let ocr = PureOcrProvider::new(config.ocr.clone())?;
        Ok(Self::new(
            PdfTextExtractor::new(config.pdf.min_text_length),
            Arc::new(ocr),
        ))
    }
}

impl TextExtractor for DocumentTextExtractor {
    fn extract(&self, file: &UploadedFile) -> Result<String, ExtractionError> {
        let text = if file.mime_type == "application/pdf" {
            debug!("Extracting PDF text layer from {}", file.original_name);
            self.pdf.extract(&file.read()?)?
        } else if file.mime_type.starts_with("image/") {
            debug!("Running OCR on {}", file.original_name);
            recognize_image(self.ocr.as_ref(), &file.read()?)?
        } else {
            return Err(ExtractionError::UnsupportedType(file.mime_type.clone()));
        };

        info!("Extracted {} chars from {}", text.len(), file.original_name);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::ocr::tests::{png_bytes, FakeProvider};
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    fn stored(dir: &tempfile::TempDir, name: &str, mime: &str, bytes: &[u8]) -> UploadedFile {
        let path: PathBuf = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        UploadedFile {
            path,
            original_name: name.to_string(),
            mime_type: mime.to_string(),
            size: bytes.len() as u64,
        }
    }

    #[test]
    fn test_image_goes_through_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeProvider::returning("Gas 120 m3"));
        let extractor = DocumentTextExtractor::new(PdfTextExtractor::default(), provider.clone());

        let file = stored(&dir, "scan.png", "image/png", &png_bytes());
        assert_eq!(extractor.extract(&file).unwrap(), "Gas 120 m3");
        assert_eq!(provider.spawned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ocr_failure_carries_hint() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = DocumentTextExtractor::new(
            PdfTextExtractor::default(),
            Arc::new(FakeProvider::failing()),
        );

        let file = stored(&dir, "scan.jpg", "image/jpeg", &png_bytes());
        let err = extractor.extract(&file).unwrap_err();
        assert!(matches!(err, ExtractionError::Ocr(_)));
        assert!(err.to_string().contains("clearer image"));
    }

    #[test]
    fn test_broken_pdf_and_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeProvider::returning("unused"));
        let extractor = DocumentTextExtractor::new(PdfTextExtractor::default(), provider.clone());

        let pdf = stored(&dir, "bill.pdf", "application/pdf", b"garbage");
        let err = extractor.extract(&pdf).unwrap_err();
        assert!(matches!(err, ExtractionError::Pdf(_)));
        assert!(err.to_string().contains("image-only"));

        let text = stored(&dir, "bill.txt", "text/plain", b"hello");
        assert!(matches!(
            extractor.extract(&text).unwrap_err(),
            ExtractionError::UnsupportedType(_)
        ));
        assert_eq!(provider.spawned.load(Ordering::SeqCst), 0);
    }
}

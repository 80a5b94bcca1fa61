//! PDF text-layer extraction using lopdf and pdf-extract.

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Type of PDF content, judged by the amount of embedded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Contains extractable text.
    Text,
    /// Little or no text layer, probably a scan.
    ImageOnly,
}

/// Extracts the embedded text layer of a PDF.
pub struct PdfTextExtractor {
    min_text_length: usize,
}

impl PdfTextExtractor {
    pub fn new(min_text_length: usize) -> Self {
        Self { min_text_length }
    }

    /// Extract all text from PDF bytes.
    ///
    /// An image-only PDF yields little or no text; that is not an error here,
    /// but it is logged since the extracted metadata will be mostly defaults.
    pub fn extract(&self, data: &[u8]) -> Result<String> {
        let raw = load(data)?;
        let text = pdf_extract::extract_text_from_mem(&raw)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;

        let chars = text.trim().len();
        match self.classify(&text) {
            PdfType::Text => debug!("PDF text extraction: {} chars", chars),
            PdfType::ImageOnly => warn!(
                "PDF has only {} chars of text (minimum {}), probably a scan; upload it as an image for OCR",
                chars, self.min_text_length
            ),
        }

        Ok(text)
    }

    /// Text shorter than `min_text_length` after trimming means image-only.
    pub fn classify(&self, text: &str) -> PdfType {
        if text.trim().len() >= self.min_text_length {
            PdfType::Text
        } else {
            PdfType::ImageOnly
        }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Parse the document and return bytes `pdf-extract` can read.
///
/// PDFs encrypted with an empty user password are decrypted first.
fn load(data: &[u8]) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

    if doc.get_pages().is_empty() {
        return Err(PdfError::NoPages);
    }

    if !doc.is_encrypted() {
        return Ok(data.to_vec());
    }

    if doc.decrypt("").is_err() {
        return Err(PdfError::Encrypted);
    }
    debug!("Decrypted PDF with empty password");

    let mut decrypted = Vec::new();
    doc.save_to(&mut decrypted)
        .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
    Ok(decrypted)
}

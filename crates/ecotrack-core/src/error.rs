//! Error types for the ecotrack-core library.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the ecotrack library.
#[derive(Error, Debug)]
pub enum EcotrackError {
    /// Text extraction error.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Language model error.
    #[error("language model error: {0}")]
    Llm(#[from] LlmError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Terminal failure turning an uploaded file into text.
///
/// The display text carries a hint the uploader can act on.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(
        "could not read text from the PDF ({0}). The file may be damaged, encrypted or image-only."
    )]
    Pdf(#[source] PdfError),

    #[error(
        "could not recognize text in the image ({0}). The image may be low quality or blurry; try a clearer image or a PDF."
    )]
    Ocr(#[source] OcrError),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("could not read uploaded file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for ExtractionError {
    fn from(err: PdfError) -> Self {
        Self::Pdf(err)
    }
}

impl From<OcrError> for ExtractionError {
    fn from(err: OcrError) -> Self {
        Self::Ocr(err)
    }
}

/// Errors returned by a language-model completion endpoint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 401 from the provider.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 429 from the provider.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 400 from the provider, with the provider's message.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from the consumption and emissions calculator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculatorError {
    /// The language model credential is missing or malformed.
    #[error("language model API key is not configured correctly: {0}")]
    Configuration(String),

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// The provider rejected the request; carries its message.
    #[error("{0}")]
    ModelRejected(String),

    #[error("no response from the language model service")]
    NoResponse,

    #[error("language model service error: {0}")]
    Upstream(String),
}

impl From<LlmError> for CalculatorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unauthorized(_) => Self::InvalidApiKey,
            LlmError::RateLimited(_) => Self::RateLimitExceeded,
            LlmError::BadRequest(message) => Self::ModelRejected(message),
            LlmError::Network(_) | LlmError::Timeout => Self::NoResponse,
            other => Self::Upstream(other.to_string()),
        }
    }
}

/// Errors from a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Reasons an upload is refused before the pipeline runs.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("only PDF and image files are accepted, got {0}")]
    UnsupportedType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal pipeline failure, mapped to an HTTP-style status class.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("authentication required: no uploader identity")]
    MissingIdentity,

    #[error(transparent)]
    Rejected(#[from] UploadError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("failed to persist invoice record: {0}")]
    Persistence(#[from] StoreError),

    #[error("unexpected pipeline failure: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// HTTP-style status class for this failure.
    pub fn status(&self) -> u16 {
        match self {
            PipelineError::MissingIdentity => 401,
            PipelineError::Rejected(_) | PipelineError::Extraction(_) => 422,
            PipelineError::Persistence(_) | PipelineError::Unexpected(_) => 500,
        }
    }

    /// Caller-facing error body. Internal details of 500-class failures are
    /// logged, not returned.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            PipelineError::Persistence(_) | PipelineError::Unexpected(_) => {
                "Failed to process invoice. Please try again later.".to_string()
            }
            other => other.to_string(),
        };
        ErrorResponse {
            success: false,
            message,
        }
    }
}

/// `{ "success": false, "message": ... }` body for terminal failures.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// Result type for the ecotrack library.
pub type Result<T> = std::result::Result<T, EcotrackError>;

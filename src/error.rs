//! Error types for the edgequake-pdf2rows library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot proceed at all (bad input
//!   file, wrong password, provider not configured, model service down with
//!   [`crate::config::OnChunkError::Abort`]). Returned as `Err(ExtractError)`
//!   from the top-level `extract*` functions; no rows are persisted.
//!
//! * [`ChunkError`] — **Non-fatal**: one chunk's model call failed while the
//!   run was configured with [`crate::config::OnChunkError::Skip`]. Stored
//!   inside [`crate::output::PageReport`] so callers can see which chunks
//!   contributed nothing.
//!
//! Pages without text and model replies without recoverable JSON are not
//! errors at all: they simply yield zero rows.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2rows library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection does not intersect the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium could not load or render a specific page.
    #[error("Page {page}: {detail}")]
    PageAccessFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine could not be run or returned a failure status.
    #[error("OCR failed: {0}")]
    OcrFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model service failed for one chunk and the run was aborted.
    #[error("Model call failed on page {page}, chunk {chunk}: {detail}")]
    ModelFailed {
        page: usize,
        chunk: usize,
        detail: String,
    },

    /// Transport-level failure reported by a [`crate::pipeline::llm::ModelService`].
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialisation failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
///
/// Only produced when the run tolerates model failures; the chunk then
/// contributes zero rows.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// Model call failed after retries.
    #[error("Page {page}, chunk {chunk}: model call failed after {retries} retries: {detail}")]
    ModelFailed {
        page: usize,
        chunk: usize,
        retries: u32,
        detail: String,
    },
}

impl From<ChunkError> for ExtractError {
    fn from(e: ChunkError) -> Self {
        match e {
            ChunkError::ModelFailed {
                page,
                chunk,
                detail,
                ..
            } => ExtractError::ModelFailed {
                page,
                chunk,
                detail,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_failed_display() {
        let e = ExtractError::ModelFailed {
            page: 3,
            chunk: 2,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("chunk 2"), "got: {msg}");
    }

    #[test]
    fn chunk_error_converts_to_fatal() {
        let e: ExtractError = ChunkError::ModelFailed {
            page: 1,
            chunk: 4,
            retries: 2,
            detail: "503".into(),
        }
        .into();
        match e {
            ExtractError::ModelFailed { page, chunk, detail } => {
                assert_eq!((page, chunk), (1, 4));
                assert_eq!(detail, "503");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn page_out_of_range_display() {
        let e = ExtractError::PageOutOfRange { page: 9, total: 4 };
        assert!(e.to_string().contains("4 pages"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = ExtractError::ProviderNotConfigured {
            provider: "gemini".into(),
            hint: "set GEMINI_API_KEY".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }
}

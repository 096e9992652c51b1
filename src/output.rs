//! Result types returned by an extraction run.

use crate::error::ChunkError;
use serde::{Deserialize, Serialize};

/// One structured record: field name → scalar JSON value.
///
/// The field set follows the active [`crate::schema::SchemaVariant`] plus any
/// extra fields the model chose to emit.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Serialized from detected tables.
    Tables,
    /// pdfium's native text layer.
    Native,
    /// Tesseract on the rendered page.
    Ocr,
    /// Nothing usable; the page was skipped.
    Empty,
}

/// What happened to one selected page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    pub source: TextSource,
    /// Characters of text handed to the chunker.
    pub text_chars: usize,
    pub chunks: usize,
    /// Rows parsed from this page's replies, before deduplication.
    pub rows: usize,
    /// Chunks whose model call failed (only with `OnChunkError::Skip`).
    pub errors: Vec<ChunkError>,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages visited after applying the page selection.
    pub selected_pages: usize,
    /// Selected pages that produced text.
    pub processed_pages: usize,
    /// Selected pages with no text after every fallback.
    pub skipped_pages: usize,
    /// Pages whose text came from OCR.
    pub ocr_pages: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
    /// Rows parsed across all chunks.
    pub raw_rows: usize,
    /// Rows in the final table.
    pub rows: usize,
    pub duplicates_removed: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub model_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Normalized, deduplicated rows in page → chunk → reply order.
    pub rows: Vec<Row>,
    pub pages: Vec<PageReport>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Basic document facts, available without a model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub pdf_version: String,
}

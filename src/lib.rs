//! # edgequake-pdf2rows
//!
//! Extract structured records from semi-structured PDFs using LLMs.
//!
//! Procurement forecasts and toll-authority financial reports publish the
//! data people want as prose paragraphs, ragged tables and scanned pages.
//! This crate gets the best text it can from each page, cuts it into bounded
//! chunks, asks a model for schema-shaped JSON rows per chunk, and returns
//! one flat, deduplicated table.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Acquire    detected tables → native text → tesseract OCR
//!  ├─ 3. Chunk      character-bounded (prose) or row-bounded (tables)
//!  ├─ 4. Model      one schema-constrained request per chunk
//!  ├─ 5. Parse      JSON array, or the first array found in the reply
//!  ├─ 6. Normalize  document defaults, list flattening, exact dedup
//!  └─ 7. Output     rows + per-page reports + stats, or a CSV file
//! ```
//!
//! Everything runs strictly sequentially: one page, one chunk, one model
//! call at a time, so rows come back in document order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2rows::{extract, ExtractionConfig, SchemaVariant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ...
//!     let config = ExtractionConfig::builder()
//!         .schema(SchemaVariant::FinancialFacts)
//!         .agency("New Jersey Turnpike Authority")
//!         .asset_type("Toll Road")
//!         .build()?;
//!     let output = extract("annual-report.pdf", &config).await?;
//!     println!("{} rows", output.rows.len());
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.total_input_tokens,
//!         output.stats.total_output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2rows` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External Tools
//!
//! * **pdfium**: bound at runtime from `PDFIUM_LIB_PATH`, the working
//!   directory, or the system library path.
//! * **tesseract**: invoked only for pages whose text layer is too thin.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod csv_out;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ChunkPolicy, DocumentDefaults, ExtractionConfig, ExtractionConfigBuilder, OcrSettings,
    OnChunkError, PageSelection,
};
pub use csv_out::{rows_to_csv_string, write_csv};
pub use error::{ChunkError, ExtractError};
pub use extract::{extract, extract_sync, extract_to_file, inspect, run_pipeline};
pub use output::{DocumentInfo, ExtractionOutput, ExtractionStats, PageReport, Row, TextSource};
pub use pipeline::document::DocumentSource;
pub use pipeline::llm::{ModelReply, ModelService};
pub use pipeline::ocr::OcrEngine;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::SchemaVariant;

//! Extraction entry points and the sequential pipeline driver.
//!
//! [`run_pipeline`] is the core: it walks the selected pages in ascending
//! order against injected collaborators and returns the normalized rows.
//! [`extract`] and friends wire it to the production collaborators (pdfium,
//! the tesseract CLI and an `edgequake-llm` provider).

use crate::config::{ExtractionConfig, OnChunkError};
use crate::csv_out;
use crate::error::ExtractError;
use crate::output::{DocumentInfo, ExtractionOutput, ExtractionStats, PageReport, TextSource};
use crate::pipeline::acquire::acquire_page;
use crate::pipeline::chunk::chunk_page;
use crate::pipeline::document::{DocumentSource, PdfiumDocument};
use crate::pipeline::input;
use crate::pipeline::llm::{
    extract_chunk, resolve_provider, LlmModelService, ModelService, DEFAULT_MODEL,
};
use crate::pipeline::normalize::{annotate_row, normalize_and_dedup};
use crate::pipeline::ocr::{OcrEngine, TesseractCli};
use crate::pipeline::parse::parse_rows;
use std::borrow::Cow;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Extract rows from a PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Extraction configuration
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors:
/// - File not found, unreadable, or not a PDF
/// - Document cannot be opened (corrupt, password)
/// - No model provider configured
/// - A model call failed under [`OnChunkError::Abort`]
///
/// Pages without text and unparseable replies are not errors; they show up
/// as zero rows in the page reports.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let provider = resolve_provider(config)?;
    debug!(
        "Provider resolved (model {})",
        config.model.as_deref().unwrap_or(DEFAULT_MODEL)
    );

    // A downloaded document's URL is its provenance unless one was given.
    let config = match resolved.source_url() {
        Some(url) if config.defaults.source_url.is_none() => {
            let mut owned = config.clone();
            owned.defaults.source_url = Some(url.to_string());
            Cow::Owned(owned)
        }
        _ => Cow::Borrowed(config),
    };

    let doc = PdfiumDocument::open(resolved.path(), config.password.as_deref())?;
    let ocr = TesseractCli::new(config.ocr.clone());
    let model = LlmModelService::new(provider, &config);

    run_pipeline(&doc, &ocr, &model, &config).await
}

/// Extract rows and write them to `output_path` as CSV.
///
/// The file is replaced atomically. When no rows were extracted nothing is
/// written; check `stats.rows`.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract(input_str, config).await?;
    if output.is_empty() {
        warn!("No records extracted; not writing {}", output_path.as_ref().display());
        return Ok(output.stats);
    }
    csv_out::write_csv(output_path.as_ref(), &output.rows, config.schema)?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Read document facts without extracting anything.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentInfo, ExtractError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    let doc = PdfiumDocument::open(resolved.path(), password)?;
    Ok(doc.info())
}

/// Drive one run over already-open collaborators.
///
/// Per selected page: acquire text, skip if empty, chunk, then for each chunk
/// call the model, parse the reply and annotate the rows. Rows accumulate in
/// page → chunk → reply order and are normalized and deduplicated at the end.
///
/// Under [`OnChunkError::Abort`] the first model failure ends the run and
/// every row gathered so far is discarded.
pub async fn run_pipeline(
    doc: &dyn DocumentSource,
    ocr: &dyn OcrEngine,
    model: &dyn ModelService,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let total_pages = doc.page_count();

    let pages = config.pages.to_pages(total_pages);
    if pages.is_empty() {
        return Err(ExtractError::PageOutOfRange {
            page: config.pages.first_requested(),
            total: total_pages,
        });
    }
    info!(
        "{} pages selected of {} ({} schema)",
        pages.len(),
        total_pages,
        config.schema.name()
    );

    let cb = config.progress_callback.as_deref();
    if let Some(cb) = cb {
        cb.on_extraction_start(pages.len());
    }

    let policy = config.effective_chunk_policy();
    let instructions = config.instructions();
    let defaults = config.defaults.entries();

    let mut stats = ExtractionStats {
        total_pages,
        selected_pages: pages.len(),
        ..Default::default()
    };
    let mut reports = Vec::with_capacity(pages.len());
    let mut rows = Vec::new();

    for &page_num in &pages {
        if let Some(cb) = cb {
            cb.on_page_start(page_num, pages.len());
        }

        let page = acquire_page(doc, ocr, page_num, config).await;
        if page.is_empty() {
            info!("Page {}: no text after every fallback, skipping", page_num);
            stats.skipped_pages += 1;
            reports.push(PageReport {
                page_num,
                source: TextSource::Empty,
                text_chars: 0,
                chunks: 0,
                rows: 0,
                errors: Vec::new(),
            });
            if let Some(cb) = cb {
                cb.on_page_skipped(page_num, pages.len());
            }
            continue;
        }

        stats.processed_pages += 1;
        if page.source == TextSource::Ocr {
            stats.ocr_pages += 1;
        }

        let chunks = chunk_page(&page.text, page_num, policy);
        debug!("Page {}: {} chunks from {:?}", page_num, chunks.len(), page.source);

        let mut page_rows = 0;
        let mut errors = Vec::new();
        for chunk in &chunks {
            match extract_chunk(model, chunk, instructions, config).await {
                Ok(reply) => {
                    stats.total_input_tokens += reply.input_tokens as u64;
                    stats.total_output_tokens += reply.output_tokens as u64;
                    stats.model_duration_ms += reply.duration_ms;

                    let mut parsed = parse_rows(&reply.text);
                    for row in &mut parsed {
                        annotate_row(row, &defaults);
                    }
                    debug!("Page {} chunk {}: {} rows", page_num, chunk.index, parsed.len());
                    if let Some(cb) = cb {
                        cb.on_chunk_complete(page_num, chunk.index, parsed.len());
                    }
                    page_rows += parsed.len();
                    rows.extend(parsed);
                }
                Err(e) => {
                    if let Some(cb) = cb {
                        cb.on_chunk_error(page_num, chunk.index, &e.to_string());
                    }
                    match config.on_chunk_error {
                        OnChunkError::Abort => {
                            error!("{}; aborting, {} rows discarded", e, rows.len());
                            return Err(e.into());
                        }
                        OnChunkError::Skip => {
                            warn!("{}; continuing", e);
                            stats.failed_chunks += 1;
                            errors.push(e);
                        }
                    }
                }
            }
        }

        info!(
            "Page {}/{}: {:?}, {} chunks, {} rows",
            page_num,
            total_pages,
            page.source,
            chunks.len(),
            page_rows
        );
        stats.chunks += chunks.len();
        if let Some(cb) = cb {
            cb.on_page_complete(page_num, pages.len(), page_rows);
        }
        reports.push(PageReport {
            page_num,
            source: page.source,
            text_chars: page.text.chars().count(),
            chunks: chunks.len(),
            rows: page_rows,
            errors,
        });
    }

    stats.raw_rows = rows.len();
    stats.duplicates_removed = normalize_and_dedup(&mut rows);
    stats.rows = rows.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} rows ({} duplicates removed) from {}/{} pages, {}ms",
        stats.rows,
        stats.duplicates_removed,
        stats.processed_pages,
        stats.selected_pages,
        stats.total_duration_ms
    );

    if let Some(cb) = cb {
        cb.on_extraction_complete(pages.len(), rows.len());
    }

    Ok(ExtractionOutput {
        rows,
        pages: reports,
        stats,
    })
}

//! Page text acquisition: tables, then native text, then OCR.
//!
//! Acquisition never fails. Every collaborator error is logged and the next
//! fallback is tried; a page with nothing left is reported as
//! [`TextSource::Empty`] and the driver skips it.

use crate::config::ExtractionConfig;
use crate::output::TextSource;
use crate::pipeline::document::DocumentSource;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::tables::tables_to_text;
use tracing::{debug, warn};

/// Best available text for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredPage {
    pub page_num: usize,
    pub text: String,
    pub source: TextSource,
}

impl AcquiredPage {
    pub fn is_empty(&self) -> bool {
        self.source == TextSource::Empty
    }
}

/// Acquire the text of page `page_num` (1-indexed).
pub async fn acquire_page(
    doc: &dyn DocumentSource,
    ocr: &dyn OcrEngine,
    page_num: usize,
    config: &ExtractionConfig,
) -> AcquiredPage {
    let page = |text: String, source| AcquiredPage {
        page_num,
        text,
        source,
    };

    if config.effective_prefer_tables() {
        match doc.tables(page_num) {
            Ok(tables) if !tables.is_empty() => {
                let text = tables_to_text(&tables);
                if !text.trim().is_empty() {
                    debug!("Page {}: {} tables", page_num, tables.len());
                    return page(text, TextSource::Tables);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Page {}: table extraction failed: {}", page_num, e),
        }
    }

    let native = match doc.native_text(page_num) {
        Ok(t) => clean_text(&t),
        Err(e) => {
            warn!("Page {}: native text extraction failed: {}", page_num, e);
            String::new()
        }
    };

    let native_len = native.trim().chars().count();
    if native_len >= config.min_native_chars {
        return page(native, TextSource::Native);
    }

    debug!(
        "Page {}: {} native chars < {}, falling back to OCR",
        page_num, native_len, config.min_native_chars
    );
    match ocr_page(doc, ocr, page_num, config).await {
        Some(text) => page(text, TextSource::Ocr),
        None if native_len > 0 => page(native, TextSource::Native),
        None => page(String::new(), TextSource::Empty),
    }
}

/// Render and recognise; `None` when either step fails or yields nothing.
async fn ocr_page(
    doc: &dyn DocumentSource,
    ocr: &dyn OcrEngine,
    page_num: usize,
    config: &ExtractionConfig,
) -> Option<String> {
    let image = doc
        .render(page_num, config.ocr.dpi)
        .map_err(|e| warn!("Page {}: render for OCR failed: {}", page_num, e))
        .ok()?;
    let text = ocr
        .recognize(&image)
        .await
        .map_err(|e| warn!("Page {}: {}", page_num, e))
        .ok()?;
    let text = clean_text(&text);
    (!text.trim().is_empty()).then_some(text)
}

/// Normalise line endings and strip invisible Unicode that pdfium and
/// tesseract both leak (zero-width spaces, BOM, soft hyphens, form feeds).
fn clean_text(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(
            [
                '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{000C}',
            ],
            "",
        )
}

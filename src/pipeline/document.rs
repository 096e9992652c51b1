//! Document access: page count, native text, tables and rendering.
//!
//! [`DocumentSource`] is the narrow contract the driver consumes; the
//! production implementation [`PdfiumDocument`] wraps `pdfium-render`.
//! pdfium is bound once per process and the document stays open for the
//! whole run, released when the `PdfiumDocument` is dropped.

use crate::error::ExtractError;
use crate::output::DocumentInfo;
use crate::pipeline::tables::{detect_tables, PositionedChar, Table};
use image::DynamicImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Read access to one open document. Page numbers are 1-indexed.
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    /// The page's native text layer (possibly empty).
    fn native_text(&self, page_num: usize) -> Result<String, ExtractError>;

    /// Tables detected on the page, top to bottom (possibly none).
    fn tables(&self, page_num: usize) -> Result<Vec<Table>, ExtractError>;

    /// Rasterise the page at `dpi` for OCR.
    fn render(&self, page_num: usize, dpi: u32) -> Result<DynamicImage, ExtractError>;
}

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Bind pdfium once: `PDFIUM_LIB_PATH`, then the working directory, then the
/// system library.
fn pdfium() -> Result<&'static Pdfium, ExtractError> {
    PDFIUM.get_or_try_init(|| {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
            _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    })
}

/// A PDF opened through pdfium for the lifetime of a run.
pub struct PdfiumDocument {
    path: PathBuf,
    document: PdfDocument<'static>,
}

impl PdfiumDocument {
    pub fn open(path: &Path, password: Option<&str>) -> Result<Self, ExtractError> {
        let document = pdfium()?
            .load_pdf_from_file(path, password)
            .map_err(|e| classify_open_error(path, password, e))?;
        info!(
            "PDF loaded: {} ({} pages)",
            path.display(),
            document.pages().len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> DocumentInfo {
        let metadata = self.document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata
                .get(tag)
                .map(|t| t.value().to_string())
                .filter(|v| !v.is_empty())
        };
        DocumentInfo {
            page_count: self.page_count(),
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            pdf_version: format!("{:?}", self.document.version()),
        }
    }

    fn page(&self, page_num: usize) -> Result<PdfPage<'_>, ExtractError> {
        if page_num == 0 || page_num > self.page_count() {
            return Err(ExtractError::PageOutOfRange {
                page: page_num,
                total: self.page_count(),
            });
        }
        self.document
            .pages()
            .get((page_num - 1) as u16)
            .map_err(|e| ExtractError::PageAccessFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })
    }
}

fn classify_open_error(path: &Path, password: Option<&str>, e: PdfiumError) -> ExtractError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            ExtractError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        ExtractError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

impl DocumentSource for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn native_text(&self, page_num: usize) -> Result<String, ExtractError> {
        let page = self.page(page_num)?;
        let text = page.text().map_err(|e| ExtractError::PageAccessFailed {
            page: page_num,
            detail: format!("text layer: {:?}", e),
        })?;
        Ok(text.all())
    }

    fn tables(&self, page_num: usize) -> Result<Vec<Table>, ExtractError> {
        let page = self.page(page_num)?;
        let text = page.text().map_err(|e| ExtractError::PageAccessFailed {
            page: page_num,
            detail: format!("text layer: {:?}", e),
        })?;

        let mut chars = Vec::new();
        for c in text.chars().iter() {
            let Some(ch) = c.unicode_char() else {
                continue;
            };
            let Ok(bounds) = c.loose_bounds() else {
                continue;
            };
            chars.push(PositionedChar {
                ch,
                left: bounds.left().value,
                bottom: bounds.bottom().value,
                width: bounds.width().value,
                height: bounds.height().value,
            });
        }

        let tables = detect_tables(&chars);
        debug!("Page {}: {} chars → {} tables", page_num, chars.len(), tables.len());
        Ok(tables)
    }

    fn render(&self, page_num: usize, dpi: u32) -> Result<DynamicImage, ExtractError> {
        let page = self.page(page_num)?;
        let scale = dpi as f32 / POINTS_PER_INCH;
        let config = PdfRenderConfig::new()
            .set_target_width(((page.width().value * scale) as i32).max(1))
            .set_target_height(((page.height().value * scale) as i32).max(1));

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractError::PageAccessFailed {
                page: page_num,
                detail: format!("render: {:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} at {} DPI → {}x{} px",
            page_num,
            dpi,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

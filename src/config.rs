//! Configuration types for PDF-to-rows extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The schema variant supplies defaults for
//! the chunking policy and table preference; every other knob is shared by
//! both variants so one driver serves them all.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use crate::schema::SchemaVariant;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2rows::{ExtractionConfig, PageSelection, SchemaVariant};
///
/// let config = ExtractionConfig::builder()
///     .schema(SchemaVariant::FinancialFacts)
///     .pages(PageSelection::Range(1, 3))
///     .agency("New Jersey Turnpike Authority")
///     .asset_type("Toll Road")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Record schema for the run. Default: [`SchemaVariant::Procurement`].
    pub schema: SchemaVariant,

    /// Chunking policy override. `None` uses the schema's default
    /// (`Chars(2000)` for procurement, `Rows(30)` for financial facts).
    pub chunk_policy: Option<ChunkPolicy>,

    /// Whether detected tables replace a page's running text.
    /// `None` uses the schema's default.
    pub prefer_tables: Option<bool>,

    /// Native text shorter than this (trimmed, in characters) sends the page
    /// to OCR. Default: 50.
    pub min_native_chars: usize,

    /// OCR rendering and recognition settings.
    pub ocr: OcrSettings,

    /// LLM model identifier. If None, `gemini-2.5-pro`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per chunk. Default: 8192.
    ///
    /// A dense comparison table can expand to a few hundred facts; a
    /// truncated reply loses its closing bracket and parses as zero rows.
    pub max_tokens: usize,

    /// Retry attempts for a failed model call. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// What a model failure does to the run. Default: [`OnChunkError::Abort`].
    pub on_chunk_error: OnChunkError,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Replacement instruction document. If None, the schema's built-in one.
    pub instructions: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Document-level values filled into rows that lack them.
    pub defaults: DocumentDefaults,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback for per-page / per-chunk events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            schema: SchemaVariant::default(),
            chunk_policy: None,
            prefer_tables: None,
            min_native_chars: 50,
            ocr: OcrSettings::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 8192,
            max_retries: 0,
            retry_backoff_ms: 500,
            on_chunk_error: OnChunkError::default(),
            password: None,
            instructions: None,
            pages: PageSelection::default(),
            defaults: DocumentDefaults::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("schema", &self.schema)
            .field("chunk_policy", &self.effective_chunk_policy())
            .field("prefer_tables", &self.effective_prefer_tables())
            .field("min_native_chars", &self.min_native_chars)
            .field("ocr", &self.ocr)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("on_chunk_error", &self.on_chunk_error)
            .field("custom_instructions", &self.instructions.is_some())
            .field("pages", &self.pages)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn effective_chunk_policy(&self) -> ChunkPolicy {
        self.chunk_policy
            .unwrap_or_else(|| self.schema.default_chunk_policy())
    }

    pub fn effective_prefer_tables(&self) -> bool {
        self.prefer_tables
            .unwrap_or_else(|| self.schema.default_prefer_tables())
    }

    /// The instruction document sent ahead of every chunk.
    pub fn instructions(&self) -> &str {
        self.instructions
            .as_deref()
            .unwrap_or_else(|| self.schema.instructions())
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn schema(mut self, schema: SchemaVariant) -> Self {
        self.config.schema = schema;
        self
    }

    pub fn chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.config.chunk_policy = Some(policy);
        self
    }

    pub fn prefer_tables(mut self, v: bool) -> Self {
        self.config.prefer_tables = Some(v);
        self
    }

    pub fn min_native_chars(mut self, n: usize) -> Self {
        self.config.min_native_chars = n;
        self
    }

    pub fn ocr(mut self, ocr: OcrSettings) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn on_chunk_error(mut self, policy: OnChunkError) -> Self {
        self.config.on_chunk_error = policy;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn instructions(mut self, doc: impl Into<String>) -> Self {
        self.config.instructions = Some(doc.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn defaults(mut self, defaults: DocumentDefaults) -> Self {
        self.config.defaults = defaults;
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.config.defaults.source_url = Some(url.into());
        self
    }

    pub fn agency(mut self, agency: impl Into<String>) -> Self {
        self.config.defaults.agency = Some(agency.into());
        self
    }

    pub fn asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.config.defaults.asset_type = Some(asset_type.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        match c.effective_chunk_policy() {
            ChunkPolicy::Chars(0) | ChunkPolicy::Rows(0) => {
                return Err(ExtractError::InvalidConfig(
                    "Chunk threshold must be ≥ 1".into(),
                ));
            }
            _ => {}
        }
        if c.ocr.dpi < 72 || c.ocr.dpi > 600 {
            return Err(ExtractError::InvalidConfig(format!(
                "OCR DPI must be 72–600, got {}",
                c.ocr.dpi
            )));
        }
        if c.ocr.tesseract_cmd.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Tesseract command must not be empty".into(),
            ));
        }
        if let Some(doc) = &c.instructions {
            if doc.trim().is_empty() {
                return Err(ExtractError::InvalidConfig(
                    "Instruction document must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums and settings ───────────────────────────────────────────────────

/// How a page's text is split into model-sized chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// At most this many characters per chunk; lines are space-joined.
    Chars(usize),
    /// At most this many non-blank lines per chunk; lines are newline-joined.
    Rows(usize),
}

/// What happens to the run when a model call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnChunkError {
    /// Abort the run; rows extracted so far are discarded. (default)
    #[default]
    Abort,
    /// Record the failure and continue with zero rows for that chunk.
    Skip,
}

/// Rendering and recognition settings for the OCR fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Render resolution for scanned pages. Default: 200.
    pub dpi: u32,
    /// Tesseract page segmentation mode. Default: 6 (single uniform block),
    /// which keeps table rows on one line.
    pub psm: u8,
    /// Tesseract language code. Default: "eng".
    pub lang: String,
    /// Tesseract executable. Default: "tesseract" (resolved via PATH).
    pub tesseract_cmd: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            dpi: 200,
            psm: 6,
            lang: "eng".to_string(),
            tesseract_cmd: "tesseract".to_string(),
        }
    }
}

/// Document-level values attached to rows that do not carry their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDefaults {
    pub source_url: Option<String>,
    pub agency: Option<String>,
    pub asset_type: Option<String>,
    /// Further `(field, value)` pairs, applied after the named ones.
    pub extra: Vec<(String, String)>,
}

impl DocumentDefaults {
    /// All configured defaults as `(field, value)` in application order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let named = [
            ("source_url", &self.source_url),
            ("agency", &self.agency),
            ("asset_type", &self.asset_type),
        ];
        named
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), Value::String(v.clone()))))
            .chain(
                self.extra
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone()))),
            )
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Process all pages (default).
    #[default]
    All,
    /// Process a single page (1-indexed).
    Single(usize),
    /// Process a contiguous range of pages (1-indexed, inclusive), clipped to
    /// the document's last page.
    Range(usize, usize),
    /// Process from this page (1-indexed) to the end of the document.
    From(usize),
    /// Process specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-indexed page numbers.
    pub fn to_pages(&self, total_pages: usize) -> Vec<usize> {
        let in_doc = |p: &usize| *p >= 1 && *p <= total_pages;
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => std::iter::once(*p).filter(in_doc).collect(),
            PageSelection::Range(start, end) => {
                let s = (*start).max(1);
                let e = (*end).min(total_pages);
                (s..=e).collect()
            }
            PageSelection::From(start) => ((*start).max(1)..=total_pages).collect(),
            PageSelection::Set(pages) => pages.iter().copied().filter(in_doc).collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// The first page the selection asks for, used in out-of-range errors.
    pub fn first_requested(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) | PageSelection::From(p) => *p,
            PageSelection::Range(s, _) => *s,
            PageSelection::Set(v) => v.iter().copied().min().unwrap_or(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_schema() {
        let c = ExtractionConfig::default();
        assert_eq!(c.effective_chunk_policy(), ChunkPolicy::Chars(2000));
        assert!(!c.effective_prefer_tables());

        let c = ExtractionConfig::builder()
            .schema(SchemaVariant::FinancialFacts)
            .build()
            .unwrap();
        assert_eq!(c.effective_chunk_policy(), ChunkPolicy::Rows(30));
        assert!(c.effective_prefer_tables());
    }

    #[test]
    fn overrides_win_over_schema() {
        let c = ExtractionConfig::builder()
            .schema(SchemaVariant::FinancialFacts)
            .chunk_policy(ChunkPolicy::Chars(500))
            .prefer_tables(false)
            .instructions("custom")
            .build()
            .unwrap();
        assert_eq!(c.effective_chunk_policy(), ChunkPolicy::Chars(500));
        assert!(!c.effective_prefer_tables());
        assert_eq!(c.instructions(), "custom");
    }

    #[test]
    fn zero_threshold_rejected() {
        let err = ExtractionConfig::builder()
            .chunk_policy(ChunkPolicy::Rows(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn ocr_dpi_validated() {
        let ocr = OcrSettings {
            dpi: 20,
            ..OcrSettings::default()
        };
        assert!(ExtractionConfig::builder().ocr(ocr).build().is_err());
    }

    #[test]
    fn defaults_entries_in_order() {
        let d = DocumentDefaults {
            source_url: Some("https://example.org/a.pdf".into()),
            agency: None,
            asset_type: Some("Toll Road".into()),
            extra: vec![("region".into(), "NJ".into())],
        };
        let keys: Vec<String> = d.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["source_url", "asset_type", "region"]);
        assert!(DocumentDefaults::default().is_empty());
    }

    #[test]
    fn page_selection_to_pages() {
        assert_eq!(PageSelection::All.to_pages(3), vec![1, 2, 3]);
        assert_eq!(PageSelection::Single(2).to_pages(3), vec![2]);
        assert_eq!(PageSelection::Single(4).to_pages(3), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 25).to_pages(4), vec![2, 3, 4]);
        assert_eq!(PageSelection::From(3).to_pages(4), vec![3, 4]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3, 9]).to_pages(4),
            vec![1, 3]
        );
        assert_eq!(PageSelection::Range(5, 2).to_pages(10), Vec::<usize>::new());
    }
}

//! CLI binary for edgequake-pdf2rows.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2rows::{
    extract, extract_to_file, inspect, rows_to_csv_string, ChunkPolicy, DocumentDefaults,
    ExtractionConfig, ExtractionProgressCallback, OcrSettings, OnChunkError, PageSelection,
    ProgressCallback, SchemaVariant,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live page bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    rows: AtomicUsize,
    failed_chunks: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            rows: AtomicUsize::new(0),
            failed_chunks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> String {
        let secs = self
            .page_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting rows from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut t) = self.page_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_skipped(&self, page_num: usize, total: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            dim("·"),
            page_num,
            total,
            dim("no text, skipped"),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_complete(&self, page_num: usize, chunk: usize, rows: usize) {
        let total = self.rows.fetch_add(rows, Ordering::SeqCst) + rows;
        self.bar
            .set_message(format!("page {page_num} chunk {chunk}  {total} rows"));
    }

    fn on_chunk_error(&self, page_num: usize, chunk: usize, error: &str) {
        self.failed_chunks.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3} chunk {}  {}",
            red("✗"),
            page_num,
            chunk,
            red(&msg),
        ));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, rows: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{rows:>4} rows")),
            dim(&self.page_elapsed()),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, rows: usize) {
        self.bar.finish_and_clear();
        let failed = self.failed_chunks.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pages read, {} rows",
                green("✔"),
                bold(&total_pages.to_string()),
                bold(&rows.to_string())
            );
        } else {
            eprintln!(
                "{} {} pages read, {} rows  ({} chunks failed)",
                cyan("⚠"),
                bold(&total_pages.to_string()),
                bold(&rows.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Procurement forecast to CSV
  pdf2rows forecast.pdf --agency "Illinois Tollway" -o opportunities.csv

  # Toll revenue tables, pages 21 onwards
  pdf2rows --schema financial-facts --pages 21- \
      --agency "New Jersey Turnpike Authority" --asset-type "Toll Road" \
      annual-report.pdf -o facts.csv

  # From a URL (the URL becomes each row's source_url)
  pdf2rows https://example.org/reports/fy2025.pdf -o rows.csv

  # Keep going when a model call fails
  pdf2rows --max-retries 2 --on-chunk-error skip report.pdf -o rows.csv

  # Structured JSON (rows + per-page report + stats)
  pdf2rows --json report.pdf > output.json

  # Inspect PDF metadata (no API key needed)
  pdf2rows --inspect-only report.pdf

PAGE TEXT:
  Detected tables are used first when the schema prefers them
  (financial-facts does). Otherwise the native text layer; pages with fewer
  than --min-native-chars characters are rendered and sent to tesseract.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  PDF2ROWS_*              Any flag below, e.g. PDF2ROWS_SCHEMA=financial-facts
"#;

/// Extract structured rows from PDF files and URLs using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2rows",
    version,
    about = "Extract procurement and toll-financial records from PDFs using LLMs",
    long_about = "Extract structured records (procurement opportunities or toll financial \
facts) from PDF documents, local or remote. Text comes from detected tables, the native text \
layer, or tesseract OCR; a model turns each chunk into JSON rows which are flattened, \
deduplicated and written as CSV.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write CSV to this file instead of stdout.
    #[arg(short, long, env = "PDF2ROWS_OUTPUT")]
    output: Option<PathBuf>,

    /// Record schema.
    #[arg(long, env = "PDF2ROWS_SCHEMA", value_enum, default_value = "procurement")]
    schema: SchemaArg,

    /// LLM model ID. Default: gemini-2.5-pro.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// Page selection: all, 5, 3-15, 21- or 1,3,5,7.
    #[arg(long, env = "PDF2ROWS_PAGES", default_value = "all")]
    pages: String,

    /// Agency filled into rows that do not name one.
    #[arg(long, env = "PDF2ROWS_AGENCY")]
    agency: Option<String>,

    /// Asset type filled into rows that do not name one (e.g. "Toll Road").
    #[arg(long, env = "PDF2ROWS_ASSET_TYPE")]
    asset_type: Option<String>,

    /// Canonical document URL filled into rows' source_url.
    #[arg(long, env = "PDF2ROWS_SOURCE_URL")]
    source_url: Option<String>,

    /// Extra default as FIELD=VALUE (repeatable).
    #[arg(long = "default", value_name = "FIELD=VALUE", value_parser = parse_default)]
    defaults: Vec<(String, String)>,

    /// Path to a text file replacing the schema's instruction document.
    #[arg(long, env = "PDF2ROWS_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Character-bounded chunks of at most N characters.
    #[arg(long, env = "PDF2ROWS_CHUNK_CHARS", conflicts_with = "chunk_rows")]
    chunk_chars: Option<usize>,

    /// Row-bounded chunks of at most N lines.
    #[arg(long, env = "PDF2ROWS_CHUNK_ROWS")]
    chunk_rows: Option<usize>,

    /// Use detected tables in place of running text (true/false).
    #[arg(long, env = "PDF2ROWS_PREFER_TABLES", value_name = "BOOL")]
    prefer_tables: Option<bool>,

    /// Native text shorter than this sends the page to OCR.
    #[arg(long, env = "PDF2ROWS_MIN_NATIVE_CHARS", default_value_t = 50)]
    min_native_chars: usize,

    /// OCR rendering DPI (72–600).
    #[arg(long, env = "PDF2ROWS_OCR_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    ocr_dpi: u32,

    /// Tesseract page segmentation mode.
    #[arg(long, env = "PDF2ROWS_OCR_PSM", default_value_t = 6)]
    ocr_psm: u8,

    /// Tesseract language(s), e.g. eng or eng+fra.
    #[arg(long, env = "PDF2ROWS_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Tesseract executable.
    #[arg(long, env = "PDF2ROWS_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2ROWS_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens per chunk.
    #[arg(long, env = "PDF2ROWS_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2ROWS_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per chunk on LLM failure.
    #[arg(long, env = "PDF2ROWS_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// What a failed model call does: abort the run or skip the chunk.
    #[arg(long, env = "PDF2ROWS_ON_CHUNK_ERROR", value_enum, default_value = "abort")]
    on_chunk_error: OnChunkErrorArg,

    /// Output structured JSON (ExtractionOutput) instead of CSV.
    #[arg(long, env = "PDF2ROWS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2ROWS_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2ROWS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2ROWS_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2ROWS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SchemaArg {
    Procurement,
    #[value(alias = "toll")]
    FinancialFacts,
}

impl From<SchemaArg> for SchemaVariant {
    fn from(v: SchemaArg) -> Self {
        match v {
            SchemaArg::Procurement => SchemaVariant::Procurement,
            SchemaArg::FinancialFacts => SchemaVariant::FinancialFacts,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OnChunkErrorArg {
    Abort,
    Skip,
}

impl From<OnChunkErrorArg> for OnChunkError {
    fn from(v: OnChunkErrorArg) -> Self {
        match v {
            OnChunkErrorArg::Abort => OnChunkError::Abort,
            OnChunkErrorArg::Skip => OnChunkError::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = info.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = info.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", info.page_count);
            println!("PDF Version:  {}", info.pdf_version);
            if let Some(ref p) = info.producer {
                println!("Producer:     {}", p);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    if let (Some(output_path), false) = (&cli.output, cli.json) {
        let stats = extract_to_file(&cli.input, output_path, &config)
            .await
            .context("Extraction failed")?;

        if !cli.quiet {
            if stats.rows == 0 {
                eprintln!("No records extracted");
            } else {
                eprintln!("Extracted {} rows", stats.rows);
                eprintln!("Saved to {}", bold(&output_path.display().to_string()));
            }
            eprintln!(
                "   {} pages ({} OCR, {} skipped)  {} duplicates removed  {}ms",
                stats.processed_pages,
                stats.ocr_pages,
                stats.skipped_pages,
                stats.duplicates_removed,
                stats.total_duration_ms,
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
        return Ok(());
    }

    let output = extract(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        rows_to_csv_string(&output.rows, config.schema).context("Failed to render CSV")?
    };

    match cli.output {
        Some(ref path) => std::fs::write(path, rendered.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None if cli.json || !output.is_empty() => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        None => {}
    }

    if !cli.quiet && !cli.json {
        if output.is_empty() {
            eprintln!("No records extracted");
        } else {
            eprintln!("Extracted {} rows", output.stats.rows);
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let instructions = if let Some(ref path) = cli.instructions {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read instructions from {:?}", path))?,
        )
    } else {
        None
    };

    let pages = parse_pages(&cli.pages)?;

    let defaults = DocumentDefaults {
        source_url: cli.source_url.clone(),
        agency: cli.agency.clone(),
        asset_type: cli.asset_type.clone(),
        extra: cli.defaults.clone(),
    };

    let mut builder = ExtractionConfig::builder()
        .schema(cli.schema.into())
        .pages(pages)
        .defaults(defaults)
        .min_native_chars(cli.min_native_chars)
        .ocr(OcrSettings {
            dpi: cli.ocr_dpi,
            psm: cli.ocr_psm,
            lang: cli.ocr_lang.clone(),
            tesseract_cmd: cli.tesseract.clone(),
        })
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .on_chunk_error(cli.on_chunk_error.into())
        .download_timeout_secs(cli.download_timeout);

    if let Some(n) = cli.chunk_chars {
        builder = builder.chunk_policy(ChunkPolicy::Chars(n));
    } else if let Some(n) = cli.chunk_rows {
        builder = builder.chunk_policy(ChunkPolicy::Rows(n));
    }
    if let Some(v) = cli.prefer_tables {
        builder = builder.prefer_tables(v);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(doc) = instructions {
        builder = builder.instructions(doc);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--default FIELD=VALUE`.
fn parse_default(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected FIELD=VALUE, got '{s}'")),
    }
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Open range: "21-"
    if let Some(start) = s.strip_suffix('-') {
        let start: usize = start.trim().parse().context("Invalid start page")?;
        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        return Ok(PageSelection::From(start));
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if pages.contains(&0) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
        }

        return Ok(PageSelection::Set(pages));
    }

    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_forms() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages("5").unwrap(), PageSelection::Single(5)));
        assert!(matches!(parse_pages("3-15").unwrap(), PageSelection::Range(3, 15)));
        assert!(matches!(parse_pages("21-").unwrap(), PageSelection::From(21)));
        match parse_pages("1, 3,5").unwrap() {
            PageSelection::Set(v) => assert_eq!(v, vec![1, 3, 5]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn pages_rejects_bad_input() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-3").is_err());
        assert!(parse_pages("x").is_err());
        assert!(parse_pages("1,0").is_err());
    }

    #[test]
    fn default_pairs() {
        assert_eq!(
            parse_default("division=Engineering").unwrap(),
            ("division".to_string(), "Engineering".to_string())
        );
        assert!(parse_default("novalue").is_err());
        assert!(parse_default("=x").is_err());
    }

    #[test]
    fn cli_parses_schema_alias() {
        let cli = Cli::try_parse_from(["pdf2rows", "--schema", "toll", "doc.pdf"]).unwrap();
        assert!(matches!(cli.schema, SchemaArg::FinancialFacts));
    }
}

//! Model interaction: send one chunk with its instruction document and
//! collect the raw reply.
//!
//! The driver talks to [`ModelService`], an ordered list of text parts in and
//! text out. [`LlmModelService`] is the production implementation over an
//! `edgequake-llm` provider; tests substitute canned replies. All prompt text
//! lives in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Retries are off by default. With `max_retries > 0` the wait before attempt
//! `n` is `retry_backoff_ms * 2^(n-1)`, so a 500 ms base and 3 retries waits
//! 500 ms → 1 s → 2 s.

use crate::config::ExtractionConfig;
use crate::error::{ChunkError, ExtractError};
use crate::pipeline::chunk::Chunk;
use crate::prompts::chunk_body;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// A model's answer to one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anything that can turn ordered text parts into one text reply.
///
/// The first part is the instruction document; the rest are content.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn generate(&self, parts: &[String]) -> Result<ModelReply, ExtractError>;
}

/// [`ModelService`] over an `edgequake-llm` chat provider.
pub struct LlmModelService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmModelService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl ModelService for LlmModelService {
    /// The first part becomes the system message, every later part a user
    /// message.
    async fn generate(&self, parts: &[String]) -> Result<ModelReply, ExtractError> {
        let mut messages = Vec::with_capacity(parts.len());
        if let Some((instructions, content)) = parts.split_first() {
            messages.push(ChatMessage::system(instructions.as_str()));
            messages.extend(content.iter().map(|p| ChatMessage::user(p.as_str())));
        }

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ExtractError::LlmApiError {
                message: e.to_string(),
            })?;

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Raw reply for one chunk plus call accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Failed attempts before the one that succeeded.
    pub retries: u32,
}

/// Ask the model for the rows in one chunk.
///
/// The request is `[instructions, "TEXT:\n" + chunk]`. A failure after all
/// retries is returned as a [`ChunkError`]; whether that ends the run is the
/// driver's decision.
pub async fn extract_chunk(
    service: &dyn ModelService,
    chunk: &Chunk,
    instructions: &str,
    config: &ExtractionConfig,
) -> Result<ChunkReply, ChunkError> {
    let start = Instant::now();
    let parts = [instructions.to_string(), chunk_body(&chunk.text)];

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Page {} chunk {}: retry {}/{} after {}ms",
                chunk.page_num, chunk.index, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match service.generate(&parts).await {
            Ok(reply) => {
                let duration = start.elapsed();
                debug!(
                    "Page {} chunk {}: {} input tokens, {} output tokens, {:?}",
                    chunk.page_num, chunk.index, reply.input_tokens, reply.output_tokens, duration
                );
                return Ok(ChunkReply {
                    text: reply.text,
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt,
                });
            }
            Err(e) => {
                warn!(
                    "Page {} chunk {}: attempt {} failed: {}",
                    chunk.page_num,
                    chunk.index,
                    attempt + 1,
                    e
                );
                last_err = Some(e.to_string());
            }
        }
    }

    Err(ChunkError::ModelFailed {
        page: chunk.page_num,
        chunk: chunk.index,
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    [`DEFAULT_MODEL`].
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini key** `GEMINI_API_KEY` present: gemini with the configured or
///    default model.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::CHUNK_LABEL;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` calls, then echoes the parts back.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelService for Flaky {
        async fn generate(&self, parts: &[String]) -> Result<ModelReply, ExtractError> {
            self.seen.lock().unwrap().push(parts.to_vec());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(ExtractError::LlmApiError {
                    message: "503 unavailable".into(),
                });
            }
            Ok(ModelReply {
                text: "[]".into(),
                input_tokens: 10,
                output_tokens: 2,
            })
        }
    }

    fn chunk() -> Chunk {
        Chunk {
            page_num: 3,
            index: 2,
            text: "Contract 12-345".into(),
        }
    }

    fn config(max_retries: u32) -> ExtractionConfig {
        ExtractionConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[tokio::test]
    async fn request_is_instructions_then_labelled_text() {
        let svc = Flaky::new(0);
        let reply = extract_chunk(&svc, &chunk(), "INSTRUCTIONS", &config(0))
            .await
            .unwrap();
        assert_eq!(reply.text, "[]");
        assert_eq!(reply.retries, 0);
        let seen = svc.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0], "INSTRUCTIONS");
        assert_eq!(seen[0][1], format!("{CHUNK_LABEL}\nContract 12-345"));
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let svc = Flaky::new(1);
        let err = extract_chunk(&svc, &chunk(), "I", &config(0))
            .await
            .unwrap_err();
        let ChunkError::ModelFailed {
            page,
            chunk,
            retries,
            detail,
        } = err;
        assert_eq!((page, chunk, retries), (3, 2, 0));
        assert!(detail.contains("503"));
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let svc = Flaky::new(2);
        let reply = extract_chunk(&svc, &chunk(), "I", &config(3))
            .await
            .unwrap();
        assert_eq!(reply.retries, 2);
        assert_eq!(reply.input_tokens, 10);
        assert_eq!(svc.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let svc = Flaky::new(10);
        let result = tokio_test::block_on(extract_chunk(&svc, &chunk(), "I", &config(2)));
        assert!(result.is_err());
        assert_eq!(svc.calls.load(Ordering::SeqCst), 3);
    }
}

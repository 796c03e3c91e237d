//! Provider gateway: one interface over every text-generation backend.
//!
//! Adapters speak their vendor's wire format behind [`ChatProvider`];
//! [`ProviderGateway`] routes by [`ProviderId`], caps per-provider
//! concurrency, applies the per-call timeout and reports usage. It does not
//! retry: retry policy belongs to the caller.

pub mod anthropic;
pub mod error;
pub mod openrouter;
pub mod types;
pub mod usage;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use usage::{CallStatus, ProviderCallRecord};

pub use anthropic::AnthropicAdapter;
pub use error::{ErrorContext, FailureKind, ProviderError, RateLimitSource};
pub use openrouter::OpenRouterAdapter;
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

use crate::prompts;

/// Maximum response size in bytes (1MB).
pub(crate) const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed input characters (~125k tokens).
pub(crate) const MAX_INPUT_CHARS: usize = 500_000;

/// Judge calls only need room for a single letter.
const JUDGE_MAX_TOKENS: u32 = 10;
const JUDGE_TEMPERATURE: f32 = 0.5;

// =============================================================================
// TRAITS
// =============================================================================

/// A single backend that can serve chat requests.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[async_trait]
impl<T: ChatProvider + ?Sized> ChatProvider for Arc<T> {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        (**self).chat(req).await
    }
}

/// Free-form generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub route: ModelRoute,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub attribution: Attribution,
}

/// Pairwise judging request. `prompt_a`/`prompt_b` describe each side; the
/// gateway wraps them in the judge template.
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub route: ModelRoute,
    pub prompt_a: String,
    pub prompt_b: String,
    pub attribution: Attribution,
}

/// What the pipeline needs from the outside world.
#[async_trait]
pub trait TextGateway: Send + Sync {
    async fn generate(&self, req: GenerateRequest) -> Result<String, ProviderError>;

    /// Ask the judge which side is funnier. An answer that is neither side
    /// (nor a tie) is a `ProviderError::Parse`, never a default verdict.
    async fn compare(&self, req: CompareRequest) -> Result<Verdict, ProviderError>;
}

// =============================================================================
// GATEWAY
// =============================================================================

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// In-flight calls allowed per provider, shared by every story.
    pub max_concurrency_per_provider: usize,
    /// Upper bound on a single provider call.
    pub call_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrency_per_provider: 8,
            call_timeout: Duration::from_secs(60),
        }
    }
}

struct ProviderSlot {
    adapter: Arc<dyn ChatProvider>,
    permits: Arc<Semaphore>,
}

pub struct ProviderGateway<U: UsageSink> {
    providers: HashMap<ProviderId, ProviderSlot>,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

impl<U: UsageSink> ProviderGateway<U> {
    pub fn new(usage_sink: Arc<U>, config: GatewayConfig) -> Self {
        Self {
            providers: HashMap::new(),
            usage_sink,
            config,
        }
    }

    /// Register every provider whose API key is present in the environment.
    pub fn from_env(usage_sink: Arc<U>, config: GatewayConfig) -> Result<Self, ProviderError> {
        let mut gateway = Self::new(usage_sink, config);

        if std::env::var("OPENROUTER_API_KEY").is_ok() {
            gateway = gateway.with_provider(ProviderId::OpenRouter, OpenRouterAdapter::from_env()?);
        }
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            gateway = gateway.with_provider(ProviderId::Anthropic, AnthropicAdapter::from_env()?);
        }

        if gateway.providers.is_empty() {
            return Err(ProviderError::config(
                "no provider configured: set OPENROUTER_API_KEY or ANTHROPIC_API_KEY",
            ));
        }
        Ok(gateway)
    }

    pub fn with_provider(mut self, id: ProviderId, adapter: impl ChatProvider + 'static) -> Self {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency_per_provider.max(1)));
        self.providers.insert(
            id,
            ProviderSlot {
                adapter: Arc::new(adapter),
                permits,
            },
        );
        self
    }

    pub fn has_provider(&self, id: ProviderId) -> bool {
        self.providers.contains_key(&id)
    }

    /// Issue exactly one call to the routed provider.
    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let slot = self.providers.get(&req.route.provider).ok_or_else(|| {
            ProviderError::config(format!("provider not configured: {}", req.route.provider))
        })?;

        let _permit = slot
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::rate_limited_local(Duration::from_secs(1)))?;

        let start = Instant::now();
        let result = match tokio::time::timeout(self.config.call_timeout, slot.adapter.chat(&req))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.call_timeout, None)),
        };

        match &result {
            Ok(resp) => {
                self.record_usage(&req, resp, start, CallStatus::Success, None)
                    .await
            }
            Err(err) => {
                tracing::debug!(
                    provider = %req.route.provider,
                    model = %req.route.model,
                    caller = req.attribution.caller,
                    error = %err,
                    "provider call failed"
                );
                self.record_usage(&req, &ChatResponse::empty(), start, CallStatus::Error, Some(err))
                    .await
            }
        }

        result
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        resp: &ChatResponse,
        start: Instant,
        status: CallStatus,
        error: Option<&ProviderError>,
    ) {
        let endpoint = match req.route.provider {
            ProviderId::OpenRouter => "chat/completions",
            ProviderId::Anthropic => "messages",
        };
        let record = ProviderCallRecord::new(
            req.route.provider.as_str(),
            endpoint,
            req.route.model.clone(),
            req.attribution.caller,
        )
        .tokens(resp.input_tokens, resp.output_tokens)
        .run(req.attribution.run_id)
        .latency(start.elapsed().as_millis() as u64);

        let record = match (status, error) {
            (CallStatus::Error, Some(err)) => record
                .request_id(err.request_id().map(str::to_string))
                .error(err.code()),
            (CallStatus::Error, None) => record.error("provider_error"),
            _ => record,
        };

        self.usage_sink.record(record).await;
    }
}

#[async_trait]
impl<U: UsageSink> TextGateway for ProviderGateway<U> {
    async fn generate(&self, req: GenerateRequest) -> Result<String, ProviderError> {
        let chat = ChatRequest::new(req.route, req.messages, req.attribution)
            .temperature(req.temperature)
            .max_tokens(req.max_tokens);
        let resp = self.chat(chat).await?;
        Ok(resp.content)
    }

    async fn compare(&self, req: CompareRequest) -> Result<Verdict, ProviderError> {
        let prompt = prompts::judge_prompt(&req.prompt_a, &req.prompt_b);
        let chat = ChatRequest::new(req.route, prompt.to_messages(), req.attribution)
            .temperature(JUDGE_TEMPERATURE)
            .max_tokens(JUDGE_MAX_TOKENS);
        let resp = self.chat(chat).await?;
        parse_verdict(&resp.content)
    }
}

// =============================================================================
// REPLY HANDLING
// =============================================================================

/// Map a judge reply onto a verdict.
///
/// Accepts `A`, `B`, `TIE`/`DRAW`/`EQUAL` after trimming punctuation. Failing
/// that, a reply led by `A` or `B` wins for that letter unless the other one
/// also stands alone in capitals. Last, a reply in which exactly one capital
/// `A`/`B` stands alone. Lowercase `a` is an article and never a vote.
pub fn parse_verdict(raw: &str) -> Result<Verdict, ProviderError> {
    let tokens: Vec<&str> = raw
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let joined = tokens.join(" ").to_ascii_uppercase();
    match joined.as_str() {
        "A" => return Ok(Verdict::A),
        "B" => return Ok(Verdict::B),
        "TIE" | "DRAW" | "EQUAL" => return Ok(Verdict::Tie),
        _ => {}
    }

    let has_a = tokens.iter().any(|&t| t == "A");
    let has_b = tokens.iter().any(|&t| t == "B");

    match tokens.first().map(|t| t.to_ascii_uppercase()).as_deref() {
        Some("A") if !has_b => return Ok(Verdict::A),
        Some("B") if !has_a => return Ok(Verdict::B),
        _ => {}
    }

    match (has_a, has_b) {
        (true, false) => Ok(Verdict::A),
        (false, true) => Ok(Verdict::B),
        _ => Err(ProviderError::parse("expected the letter A or B", raw)),
    }
}

/// Trim whitespace and one layer of surrounding quotes from generated text.
pub fn clean_headline_text(raw: &str) -> String {
    let mut s = raw.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')] {
        if s.len() >= 2 && s.starts_with(open) && s.ends_with(close) {
            s = s[open.len_utf8()..s.len() - close.len_utf8()].trim();
            break;
        }
    }
    s.to_string()
}

/// Check if message indicates a refusal.
pub(crate) fn is_refusal(msg: &str) -> bool {
    let l = msg.trim_start().to_lowercase();
    let first_line = l.lines().next().unwrap_or("");

    const PREFIXES: &[&str] = &[
        "refus",
        "i cannot",
        "i can't",
        "i won't",
        "i will not",
        "i am unable to",
        "i'm unable to",
        "unable to comply",
        "unable to assist",
        "unable to help",
        "unable to provide",
    ];

    PREFIXES.iter().any(|p| first_line.starts_with(p)) || l.contains("request was refused")
}

/// Stream the body, refusing anything over [`MAX_RESPONSE_LEN`].
pub(crate) async fn read_bounded_body(
    provider: &'static str,
    mut response: reqwest::Response,
) -> Result<String, ProviderError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let new_len = bytes.len() + chunk.len();
        if new_len > MAX_RESPONSE_LEN {
            return Err(ProviderError::provider(
                provider,
                format!("Response too large: {new_len} bytes"),
                false,
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

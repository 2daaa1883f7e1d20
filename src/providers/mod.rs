use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::errors::{ConfigurationError, OracleError};

mod claude;
mod gemini;
mod openai;

pub use claude::Claude;
pub use gemini::Gemini;
pub use openai::OpenAI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
    Claude,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => openai::DEFAULT_MODEL,
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::Claude => claude::DEFAULT_MODEL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSelection {
    pub provider: ProviderKind,
    pub requested_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl ProviderUsage {
    pub fn merge(self, next: Option<&ProviderUsage>) -> ProviderUsage {
        let Some(next) = next else {
            return self;
        };
        ProviderUsage {
            prompt_tokens: Some(self.prompt_tokens.unwrap_or(0) + next.prompt_tokens.unwrap_or(0)),
            completion_tokens: Some(
                self.completion_tokens.unwrap_or(0) + next.completion_tokens.unwrap_or(0),
            ),
            total_tokens: Some(self.total_tokens.unwrap_or(0) + next.total_tokens.unwrap_or(0)),
        }
    }
}

/// Raw oracle output. `text` is untrusted and may be empty.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<ProviderResponse, OracleError>> + Send>>;

/// A text-in, text-out oracle. Builders are consumed by `generate`, so each
/// request starts from a fresh clone.
pub trait Provider: Clone + Send + Sync {
    fn append_user_input(self, input: String) -> Self;
    fn generate(self) -> ProviderFuture;
}

#[derive(Debug, Clone)]
pub enum ProviderImpl {
    OpenAI(OpenAI),
    Gemini(Gemini),
    Claude(Claude),
}

impl ProviderImpl {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderImpl::OpenAI(_) => ProviderKind::OpenAI,
            ProviderImpl::Gemini(_) => ProviderKind::Gemini,
            ProviderImpl::Claude(_) => ProviderKind::Claude,
        }
    }
}

impl Provider for ProviderImpl {
    fn append_user_input(self, input: String) -> Self {
        match self {
            ProviderImpl::OpenAI(provider) => {
                ProviderImpl::OpenAI(provider.append_user_input(input))
            }
            ProviderImpl::Gemini(provider) => {
                ProviderImpl::Gemini(provider.append_user_input(input))
            }
            ProviderImpl::Claude(provider) => {
                ProviderImpl::Claude(provider.append_user_input(input))
            }
        }
    }

    fn generate(self) -> ProviderFuture {
        match self {
            ProviderImpl::OpenAI(provider) => provider.generate(),
            ProviderImpl::Gemini(provider) => provider.generate(),
            ProviderImpl::Claude(provider) => provider.generate(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// Versioned API base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: Option<String>,
    pub max_tokens: Option<u32>,
}

pub fn build_provider(
    provider: ProviderKind,
    key: String,
    model: String,
    options: &ProviderOptions,
) -> ProviderImpl {
    let endpoint = options
        .endpoint
        .as_deref()
        .filter(|value| !value.trim().is_empty());
    match provider {
        ProviderKind::OpenAI => {
            let mut client = OpenAI::new(key).with_model(model);
            if let Some(endpoint) = endpoint {
                client = client.with_endpoint(endpoint);
            }
            ProviderImpl::OpenAI(client)
        }
        ProviderKind::Gemini => {
            let mut client = Gemini::new(key).with_model(model);
            if let Some(endpoint) = endpoint {
                client = client.with_endpoint(endpoint);
            }
            ProviderImpl::Gemini(client)
        }
        ProviderKind::Claude => {
            let mut client = Claude::new(key).with_model(model);
            if let Some(endpoint) = endpoint {
                client = client.with_endpoint(endpoint);
            }
            if let Some(max_tokens) = options.max_tokens {
                client = client.with_max_tokens(max_tokens);
            }
            ProviderImpl::Claude(client)
        }
    }
}

/// Picks the provider from `--model`, then the settings default, then Gemini.
pub fn resolve_provider_selection(
    model_arg: Option<&str>,
    default_provider: Option<&str>,
) -> Result<ProviderSelection, ConfigurationError> {
    if let Some(model) = model_arg {
        return parse_model_arg(model);
    }
    let provider = match default_provider.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => provider_from_name(&name.to_lowercase()).ok_or_else(|| {
            ConfigurationError::Provider(format!(
                "unknown provider '{}' (expected gemini, openai or claude)",
                name
            ))
        })?,
        None => ProviderKind::Gemini,
    };
    Ok(ProviderSelection {
        provider,
        requested_model: None,
    })
}

pub fn resolve_key(
    provider: ProviderKind,
    override_key: Option<&str>,
) -> Result<String, ConfigurationError> {
    if let Some(key) = override_key {
        return Ok(key.to_string());
    }

    match provider {
        ProviderKind::OpenAI => get_env("OPENAI_API_KEY"),
        ProviderKind::Gemini => get_env("GEMINI_API_KEY").or_else(|| get_env("GOOGLE_API_KEY")),
        ProviderKind::Claude => get_env("ANTHROPIC_API_KEY"),
    }
    .ok_or(ConfigurationError::MissingKey)
}

pub fn validate_key(key: &str) -> Result<(), ConfigurationError> {
    if key.trim().is_empty() {
        return Err(ConfigurationError::MissingKey);
    }
    if key.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(ConfigurationError::InvalidKey(
            "key must not contain whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

fn parse_model_arg(model_arg: &str) -> Result<ProviderSelection, ConfigurationError> {
    let raw = model_arg.trim();
    if raw.is_empty() {
        return Err(ConfigurationError::Provider(
            "model argument is empty".to_string(),
        ));
    }

    let lower = raw.to_lowercase();
    if let Some(provider) = provider_from_name(&lower) {
        return Ok(ProviderSelection {
            provider,
            requested_model: None,
        });
    }

    if let Some((provider, model)) = parse_provider_model_pair(raw) {
        return Ok(ProviderSelection {
            provider,
            requested_model: model,
        });
    }

    if let Some(provider) = infer_provider_from_model(&lower) {
        return Ok(ProviderSelection {
            provider,
            requested_model: Some(raw.to_string()),
        });
    }

    Err(ConfigurationError::Provider(format!(
        "unable to infer provider from model '{}'. Use provider:model (gemini:, openai:, claude:)",
        raw
    )))
}

fn parse_provider_model_pair(input: &str) -> Option<(ProviderKind, Option<String>)> {
    let (provider_part, model_part) = input.split_once(':')?;
    let provider = provider_from_name(&provider_part.to_lowercase())?;
    let model = if model_part.trim().is_empty() {
        None
    } else {
        Some(model_part.trim().to_string())
    };
    Some((provider, model))
}

fn provider_from_name(name: &str) -> Option<ProviderKind> {
    match name {
        "openai" => Some(ProviderKind::OpenAI),
        "gemini" | "google" => Some(ProviderKind::Gemini),
        "claude" | "anthropic" => Some(ProviderKind::Claude),
        _ => None,
    }
}

fn infer_provider_from_model(model: &str) -> Option<ProviderKind> {
    if model.starts_with("gemini") {
        Some(ProviderKind::Gemini)
    } else if model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3") {
        Some(ProviderKind::OpenAI)
    } else if model.starts_with("claude") {
        Some(ProviderKind::Claude)
    } else {
        None
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Sends one request and returns the body of a successful response. Exactly
/// one round trip: failures are classified, never retried.
pub(crate) async fn send_once(
    request: RequestBuilder,
    provider: &str,
    extract_error: fn(&str) -> Option<String>,
) -> Result<String, OracleError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if status.is_success() {
        return Ok(text);
    }
    let message = format!(
        "{} API error: {}",
        provider,
        extract_error(&text).unwrap_or_else(|| text.clone())
    );
    Err(classify_failure(status, &text, message))
}

pub(crate) fn classify_failure(status: StatusCode, body: &str, message: String) -> OracleError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return OracleError::Auth(message);
    }
    let lower = body.to_lowercase();
    if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
        return OracleError::Auth(message);
    }
    if is_rate_limited(status, &lower) {
        return OracleError::RateLimited(message);
    }
    OracleError::Api {
        status: status.as_u16(),
        message,
    }
}

fn is_rate_limited(status: StatusCode, lower_body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let code = status.as_u16();
    if code == 529 || code == 503 {
        return true;
    }
    lower_body.contains("rate limit")
        || lower_body.contains("rate_limit")
        || lower_body.contains("too many requests")
        || lower_body.contains("resource_exhausted")
        || lower_body.contains("quota")
        || lower_body.contains("overloaded")
}

pub(crate) fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = code
        && !code.trim().is_empty()
    {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

use serde::Deserialize;
use serde_json::json;

use super::{Provider, ProviderFuture, ProviderResponse, ProviderUsage, format_error_parts, send_once};
use crate::errors::OracleError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct Claude {
    key: String,
    model: String,
    endpoint: Option<String>,
    max_tokens: u32,
    inputs: Vec<String>,
}

impl Claude {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            inputs: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    /// Base URL up to and including `/v1`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        if max_tokens > 0 {
            self.max_tokens = max_tokens;
        }
        self
    }

    fn url(&self) -> String {
        let base = self.endpoint.clone().unwrap_or_else(|| {
            std::env::var("ANTHROPIC_BASE_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        });
        format!("{}/messages", base)
    }
}

impl Provider for Claude {
    fn append_user_input(mut self, input: String) -> Self {
        self.inputs.push(input);
        self
    }

    fn generate(self) -> ProviderFuture {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let content = self
                .inputs
                .iter()
                .map(|text| json!({"type": "text", "text": text}))
                .collect::<Vec<_>>();
            let body = json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "messages": [
                    {
                        "role": "user",
                        "content": content
                    }
                ]
            });

            let request = client
                .post(self.url())
                .header("x-api-key", self.key.clone())
                .header("anthropic-version", "2023-06-01")
                .json(&body);
            let text = send_once(request, "Claude", extract_claude_error).await?;
            extract_text_response(&text, &self.model)
        })
    }
}

fn extract_text_response(text: &str, fallback_model: &str) -> Result<ProviderResponse, OracleError> {
    let payload: ClaudeResponse = serde_json::from_str(text)
        .map_err(|err| OracleError::Parse(format!("Claude response JSON: {}", err)))?;
    let text = payload
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<String>();
    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage
            .input_tokens
            .zip(usage.output_tokens)
            .map(|(input, output)| input + output),
    });
    Ok(ProviderResponse { text, model, usage })
}

fn extract_claude_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<ClaudeError>,
    }

    #[derive(Deserialize)]
    struct ClaudeError {
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(error.message, error.kind, None))
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
    model: Option<String>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

use serde::Deserialize;
use serde_json::json;

use super::{Provider, ProviderFuture, ProviderResponse, ProviderUsage, format_error_parts, send_once};
use crate::errors::OracleError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
    endpoint: Option<String>,
    inputs: Vec<String>,
}

impl OpenAI {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
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

    fn base_url(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        })
    }
}

impl Provider for OpenAI {
    fn append_user_input(mut self, input: String) -> Self {
        self.inputs.push(input);
        self
    }

    fn generate(self) -> ProviderFuture {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let url = format!("{}/chat/completions", self.base_url());
            let messages = self
                .inputs
                .iter()
                .map(|content| json!({"role": "user", "content": content}))
                .collect::<Vec<_>>();
            let body = json!({
                "model": self.model,
                "messages": messages
            });

            let request = client
                .post(&url)
                .bearer_auth(self.key.clone())
                .json(&body);
            let text = send_once(request, "OpenAI", extract_openai_error).await?;
            extract_text_response(&text, &self.model)
        })
    }
}

fn extract_text_response(text: &str, fallback_model: &str) -> Result<ProviderResponse, OracleError> {
    let payload: ChatResponse = serde_json::from_str(text)
        .map_err(|err| OracleError::Parse(format!("OpenAI response JSON: {}", err)))?;
    let text = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });
    Ok(ProviderResponse { text, model, usage })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<serde_json::Value>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let code = error.code.and_then(|value| match value {
        serde_json::Value::String(code) => Some(code),
        serde_json::Value::Number(code) => Some(code.to_string()),
        _ => None,
    });
    Some(format_error_parts(error.message, error.kind, code))
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

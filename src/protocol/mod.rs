use tera::{Context as TeraContext, Tera};
use tracing::{debug, warn};

use crate::document::is_xml_char;
use crate::errors::OracleError;
use crate::providers::{Provider, ProviderUsage};
use crate::settings::Settings;

const ANNOTATION_PROMPT: &str = include_str!("prompts/annotation_prompt.tera");

/// Result of one fail-soft oracle exchange. `text` is either the validated
/// annotation or, when `fallback` is set, the original paragraph text.
#[derive(Debug)]
pub struct Translation {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
    pub fallback: Option<OracleError>,
}

pub fn render_prompt(text: &str, settings: &Settings) -> Result<String, OracleError> {
    let mut context = TeraContext::new();
    context.insert("text", text);
    context.insert("loanword_examples", &settings.loanword_examples);
    Tera::one_off(ANNOTATION_PROMPT, &context, false)
        .map_err(|err| OracleError::Prompt(err.to_string()))
}

/// One oracle round trip for one paragraph, with response validation.
pub async fn request_annotation<P: Provider>(
    provider: &P,
    text: &str,
    settings: &Settings,
) -> Result<Translation, OracleError> {
    let prompt = render_prompt(text, settings)?;
    let response = provider.clone().append_user_input(prompt).generate().await?;
    let annotated = validate_response(&response.text)?;
    Ok(Translation {
        text: annotated,
        model: response.model,
        usage: response.usage,
        fallback: None,
    })
}

/// Never fails: any oracle problem hands the original text straight back.
pub async fn translate<P: Provider>(provider: &P, text: &str, settings: &Settings) -> Translation {
    match request_annotation(provider, text, settings).await {
        Ok(translation) => {
            debug!(
                model = translation.model.as_deref().unwrap_or("unknown"),
                "oracle returned annotation"
            );
            translation
        }
        Err(err) => {
            warn!(error = %err, "oracle unavailable; keeping original paragraph");
            Translation {
                text: text.to_string(),
                model: None,
                usage: None,
                fallback: Some(err),
            }
        }
    }
}

/// Trims, removes a surrounding code fence and drops characters that a
/// `.docx` part cannot store.
pub fn validate_response(raw: &str) -> Result<String, OracleError> {
    let printable = raw.chars().filter(|ch| is_xml_char(*ch)).collect::<String>();
    let cleaned = strip_code_fence(printable.trim()).trim();
    if cleaned.is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    Ok(cleaned.to_string())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(body) = text
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return text;
    };
    match body.split_once('\n') {
        // opening line holds at most a language tag
        Some((tag, inner)) if !tag.trim().contains(char::is_whitespace) => inner,
        _ => body,
    }
}

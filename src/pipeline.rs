use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{error, info, warn};

use crate::Config;
use crate::document::Document;
use crate::errors::ConfigurationError;
use crate::progress::{ProgressSink, percent};
use crate::providers::{
    self, Provider, ProviderImpl, ProviderKind, ProviderOptions, ProviderUsage,
};
use crate::rewriter::{self, Rewrite, RewriteOutcome};
use crate::settings::{self, Settings};

pub const SUCCESS_MESSAGE: &str = "Processing Complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationMode {
    /// Annotate English-origin terms, leave everything else as written.
    Basic,
}

impl AnnotationMode {
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value.trim().to_lowercase().as_str() {
            "basic" => Ok(AnnotationMode::Basic),
            _ => Err(ConfigurationError::UnsupportedMode(value.trim().to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationMode::Basic => "basic",
        }
    }
}

/// Terminal outcome of one run, reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Success(String),
    Failure(String),
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            RunResult::Success(message) | RunResult::Failure(message) => message,
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub paragraphs: usize,
    pub candidates: usize,
    pub rewritten: usize,
    /// Candidates kept as-is because the oracle failed.
    pub fallbacks: usize,
    pub usage: ProviderUsage,
}

impl RunStats {
    fn record(&mut self, rewrite: Rewrite) {
        match rewrite.outcome {
            RewriteOutcome::Skipped => return,
            RewriteOutcome::Unchanged => self.candidates += 1,
            RewriteOutcome::Rewritten => {
                self.candidates += 1;
                self.rewritten += 1;
            }
        }
        if rewrite.fell_back {
            self.fallbacks += 1;
        }
        self.usage = std::mem::take(&mut self.usage).merge(rewrite.usage.as_ref());
    }
}

/// Drives one document through detection, annotation and persistence.
/// Paragraphs are processed strictly in order, one oracle call at a time.
#[derive(Debug, Clone)]
pub struct Pipeline<P: Provider> {
    provider: P,
    settings: Settings,
    mode: AnnotationMode,
}

impl Pipeline<ProviderImpl> {
    /// Gemini-backed pipeline with the layered settings.
    pub fn new(api_key: &str, mode: &str) -> Result<Self, ConfigurationError> {
        Self::from_config(&Config {
            model: Some(ProviderKind::Gemini.as_str().to_string()),
            key: Some(api_key.to_string()),
            mode: Some(mode.to_string()),
            settings_path: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let settings_path = config.settings_path.as_deref().map(Path::new);
        let settings = settings::load_settings(settings_path)
            .map_err(|err| ConfigurationError::Settings(format!("{:#}", err)))?;
        let mode = AnnotationMode::parse(config.mode.as_deref().unwrap_or(&settings.mode))?;

        let selection = providers::resolve_provider_selection(
            config.model.as_deref(),
            settings.provider.as_deref(),
        )?;
        let key = providers::resolve_key(selection.provider, config.key.as_deref())?;
        providers::validate_key(&key)?;

        let model = selection
            .requested_model
            .or_else(|| settings_model_for(&settings, selection.provider))
            .unwrap_or_else(|| selection.provider.default_model().to_string());
        let options = ProviderOptions {
            endpoint: settings.endpoint.clone(),
            max_tokens: settings.max_tokens,
        };
        info!(
            provider = selection.provider.as_str(),
            model = %model,
            mode = mode.as_str(),
            "configured oracle"
        );
        let provider = providers::build_provider(selection.provider, key, model, &options);
        Ok(Self::with_provider(provider, settings, mode))
    }
}

impl<P: Provider> Pipeline<P> {
    pub fn with_provider(provider: P, settings: Settings, mode: AnnotationMode) -> Self {
        Self {
            provider,
            settings,
            mode,
        }
    }

    pub fn mode(&self) -> AnnotationMode {
        self.mode
    }

    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        mut progress: Option<&mut (dyn ProgressSink + Send)>,
    ) -> RunResult {
        info!(
            input = %input.display(),
            output = %output.display(),
            mode = self.mode.as_str(),
            "starting run"
        );
        let mut document = match Document::load(input) {
            Ok(document) => document,
            Err(err) => {
                error!(error = %err, "failed to load document");
                return RunResult::Failure(format!(
                    "failed to load document {}: {}",
                    input.display(),
                    err
                ));
            }
        };

        let total = document.paragraph_count();
        let mut stats = RunStats {
            paragraphs: total,
            ..RunStats::default()
        };
        for (index, paragraph) in document.paragraphs_mut().enumerate() {
            let rewrite = rewriter::rewrite(&self.provider, paragraph, &self.settings).await;
            stats.record(rewrite);
            emit(&mut progress, percent(index, total));
        }
        emit(&mut progress, 100);

        if let Err(err) = document.save(output) {
            error!(error = %err, "failed to save document");
            return RunResult::Failure(format!("annotation finished but saving failed: {}", err));
        }

        info!(
            paragraphs = stats.paragraphs,
            candidates = stats.candidates,
            rewritten = stats.rewritten,
            fallbacks = stats.fallbacks,
            total_tokens = stats.usage.total_tokens.unwrap_or(0),
            "run complete"
        );
        RunResult::Success(SUCCESS_MESSAGE.to_string())
    }
}

fn settings_model_for(settings: &Settings, provider: ProviderKind) -> Option<String> {
    let configured = settings
        .provider
        .as_deref()
        .map(|name| name.trim().to_lowercase())
        .unwrap_or_else(|| ProviderKind::Gemini.as_str().to_string());
    let matches = match provider {
        ProviderKind::Gemini => configured == "gemini" || configured == "google",
        ProviderKind::OpenAI => configured == "openai",
        ProviderKind::Claude => configured == "claude" || configured == "anthropic",
    };
    if matches { settings.model.clone() } else { None }
}

fn emit(progress: &mut Option<&mut (dyn ProgressSink + Send)>, value: u8) {
    if let Some(sink) = progress.as_deref_mut()
        && let Err(err) = sink.report(value)
    {
        warn!(error = %err, percent = value, "progress sink failed");
    }
}

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub mod detector;
pub mod document;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod protocol;
mod providers;
pub mod rewriter;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use document::{Document, Paragraph};
pub use pipeline::{AnnotationMode, Pipeline, RunResult, RunStats};
pub use progress::{ChannelProgress, ProgressSink};
pub use providers::{
    Claude, Gemini, OpenAI, Provider, ProviderFuture, ProviderImpl, ProviderKind, ProviderResponse,
    ProviderUsage,
};
pub use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Model name or provider:model.
    pub model: Option<String>,
    pub key: Option<String>,
    pub mode: Option<String>,
    pub settings_path: Option<String>,
}

/// `<stem>_translated.docx` beside the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{}_translated.docx", stem))
}

/// Builds a pipeline from `config` and runs it once.
pub async fn run(
    config: Config,
    input: &Path,
    output: Option<&Path>,
    progress: Option<&mut (dyn ProgressSink + Send)>,
) -> Result<RunResult> {
    let pipeline = Pipeline::from_config(&config).with_context(|| "failed to configure pipeline")?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));
    Ok(pipeline.run(input, &output, progress).await)
}

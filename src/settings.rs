use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub max_tokens: Option<u32>,
    pub mode: String,
    pub loanword_examples: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            endpoint: None,
            max_tokens: None,
            mode: "basic".to_string(),
            loanword_examples: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    oracle: Option<OracleSettings>,
    annotate: Option<AnnotateSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OracleSettings {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateSettings {
    mode: Option<String>,
    loanword_examples: Option<Vec<String>>,
}

/// Built-in defaults, then `./settings.toml`, `./settings.local.toml`, the
/// same pair under `~/.urdu-annotator`, then `extra_path`. Later files win.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let embedded: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(embedded);

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(oracle) = incoming.oracle {
            if let Some(provider) = non_blank(oracle.provider) {
                self.provider = Some(provider);
            }
            if let Some(model) = non_blank(oracle.model) {
                self.model = Some(model);
            }
            if let Some(endpoint) = non_blank(oracle.endpoint) {
                self.endpoint = Some(endpoint);
            }
            if let Some(max_tokens) = oracle.max_tokens
                && max_tokens > 0
            {
                self.max_tokens = Some(max_tokens);
            }
        }
        if let Some(annotate) = incoming.annotate {
            if let Some(mode) = non_blank(annotate.mode) {
                self.mode = mode;
            }
            if let Some(examples) = annotate.loanword_examples {
                self.loanword_examples = examples
                    .into_iter()
                    .map(|word| word.trim().to_string())
                    .filter(|word| !word.is_empty())
                    .collect();
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".urdu-annotator"))
        }
    })
}

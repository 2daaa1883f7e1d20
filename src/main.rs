use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "urdu-annotator",
    version,
    about = "Annotate English loanwords in Urdu .docx documents"
)]
struct Cli {
    /// Input .docx file
    input: PathBuf,

    /// Output path (default: <stem>_translated.docx beside the input)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Model name or provider:model (e.g. gemini:gemini-2.5-flash)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Annotation mode (default from settings: basic)
    #[arg(long = "mode")]
    mode: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    urdu_loanword_annotator::logging::init(cli.verbose)?;

    let config = urdu_loanword_annotator::Config {
        model: cli.model,
        key: cli.key,
        mode: cli.mode,
        settings_path: cli.read_settings,
    };
    let mut last = None;
    let mut progress = move |percent: u8| {
        if last != Some(percent) {
            last = Some(percent);
            eprint!("\rprogress: {:>3}%", percent);
            let _ = io::stderr().flush();
        }
    };
    let result = urdu_loanword_annotator::run(
        config,
        &cli.input,
        cli.output.as_deref(),
        Some(&mut progress),
    )
    .await?;
    eprintln!();

    if !result.is_success() {
        eprintln!("{}", result.message());
        std::process::exit(1);
    }
    println!("{}", result.message());
    Ok(())
}

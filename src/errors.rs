use thiserror::Error;

/// Failures detected before a run starts. Never retried.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("API key is missing")]
    MissingKey,

    #[error("API key is invalid: {0}")]
    InvalidKey(String),

    #[error("unsupported mode '{0}' (expected: basic)")]
    UnsupportedMode(String),

    #[error("{0}")]
    Provider(String),

    #[error("settings error: {0}")]
    Settings(String),
}

/// The input cannot be read as a word-processing document.
#[derive(Error, Debug)]
pub enum DocumentFormatError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not a docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("docx archive has no word/document.xml")]
    MissingMainPart,

    #[error("malformed document xml: {0}")]
    Xml(String),

    #[error("document xml has no w:body element")]
    MissingBody,
}

/// A single oracle round trip failed. Absorbed per paragraph, never fatal.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("API responded with {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("failed to render prompt: {0}")]
    Prompt(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::Transport(err.to_string())
    }
}

/// The annotated document could not be written.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to serialise document: {0}")]
    Serialize(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to overwrite the input document {0}")]
    SameAsInput(String),
}

use quick_xml::escape::escape;
use std::io::{Cursor, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::errors::OracleError;
use crate::providers::{Provider, ProviderFuture, ProviderResponse, ProviderUsage};

/// Runs `func` with `HOME` pointing at a fresh temporary directory.
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    static HOME_MUTEX: Mutex<()> = Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var_os("HOME");
    // SAFETY: HOME is only changed while HOME_MUTEX is held.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = panic::catch_unwind(AssertUnwindSafe(|| func(dir.path())));
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result.unwrap_or_else(|payload| panic::resume_unwind(payload))
}

type Reply = dyn Fn(&str) -> Result<String, OracleError> + Send + Sync;

/// Scripted oracle that records every prompt it is sent.
#[derive(Clone)]
pub(crate) struct StubProvider {
    reply: Arc<Reply>,
    inputs: Vec<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubProvider {
    pub(crate) fn with<F>(reply: F) -> Self
    where
        F: Fn(&str) -> Result<String, OracleError> + Send + Sync + 'static,
    {
        Self {
            reply: Arc::new(reply),
            inputs: Vec::new(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::with(move |_| Ok(text.clone()))
    }

    pub(crate) fn failing() -> Self {
        Self::with(|_| Err(OracleError::Transport("connection refused".to_string())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Provider for StubProvider {
    fn append_user_input(mut self, input: String) -> Self {
        self.inputs.push(input);
        self
    }

    fn generate(self) -> ProviderFuture {
        let prompt = self.inputs.join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());
        let result = (self.reply)(&prompt);
        Box::pin(async move {
            result.map(|text| ProviderResponse {
                text,
                model: Some("stub-model".to_string()),
                usage: Some(ProviderUsage {
                    prompt_tokens: Some(10),
                    completion_tokens: Some(5),
                    total_tokens: Some(15),
                }),
            })
        })
    }
}

/// The paragraph text embedded at the end of a rendered prompt.
pub(crate) fn paragraph_of(prompt: &str) -> String {
    prompt
        .rsplit_once("Paragraph:\n")
        .map(|(_, text)| text.strip_suffix('\n').unwrap_or(text).to_string())
        .unwrap_or_default()
}

pub(crate) fn document_xml(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}</w:body></w:document>"
        ),
        body
    )
}

pub(crate) fn docx_with_paragraphs(texts: &[&str]) -> Vec<u8> {
    let body = texts
        .iter()
        .map(|text| {
            if text.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!(
                    r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                    escape(*text)
                )
            }
        })
        .collect::<String>();
    docx_from_parts(&document_xml(&format!("{}<w:sectPr/>", body)), &[])
}

pub(crate) fn docx_from_parts(document_xml: &str, extra: &[(&str, &str)]) -> Vec<u8> {
    let mut entries = vec![
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        ),
        ("word/document.xml", document_xml),
    ];
    entries.extend_from_slice(extra);
    zip_entries(&entries)
}

pub(crate) fn zip_entries(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub(crate) fn read_entry(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use urdu_loanword_annotator::errors::OracleError;
use urdu_loanword_annotator::{Document, Provider, ProviderFuture, ProviderResponse};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

type Reply = dyn Fn(&str) -> Result<String, OracleError> + Send + Sync;

/// Oracle double that answers from a closure over the paragraph text and
/// counts calls.
#[derive(Clone)]
pub struct ScriptedOracle {
    reply: Arc<Reply>,
    inputs: Vec<String>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOracle {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&str) -> Result<String, OracleError> + Send + Sync + 'static,
    {
        Self {
            reply: Arc::new(reply),
            inputs: Vec::new(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn paragraphs_seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Provider for ScriptedOracle {
    fn append_user_input(mut self, input: String) -> Self {
        self.inputs.push(input);
        self
    }

    fn generate(self) -> ProviderFuture {
        let prompt = self.inputs.join("\n");
        let paragraph = prompt
            .rsplit_once("Paragraph:\n")
            .map(|(_, text)| text.strip_suffix('\n').unwrap_or(text).to_string())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(paragraph.clone());
        let result = (self.reply)(&paragraph);
        Box::pin(async move {
            result.map(|text| ProviderResponse {
                text,
                model: Some("scripted".to_string()),
                usage: None,
            })
        })
    }
}

pub fn docx_with_paragraphs(texts: &[&str]) -> Vec<u8> {
    let body = texts
        .iter()
        .map(|text| {
            if text.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!(
                    r#"<w:p><w:pPr><w:bidi/></w:pPr><w:r><w:rPr><w:rtl/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                    quick_xml::escape::escape(*text)
                )
            }
        })
        .collect::<String>();
    let document = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#
        ),
        body
    );
    let entries = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        ),
        ("word/document.xml", document.as_str()),
        ("word/styles.xml", "<w:styles/>"),
        ("docProps/app.xml", "<Properties/>"),
    ];
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn paragraph_texts(document: &Document) -> Vec<String> {
    document.paragraphs().map(|p| p.text().to_string()).collect()
}

/// Every archive entry as (name, bytes), in archive order.
pub fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}

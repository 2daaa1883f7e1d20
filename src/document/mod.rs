use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::errors::{DocumentFormatError, PersistenceError};

mod paragraph;
mod xml;

pub use paragraph::Paragraph;
pub(crate) use xml::is_xml_char;
use xml::{Element, read_element, xml_error};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
const MAIN_PART_CONTENT_TYPES: [&str; 3] = [
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml",
    "application/vnd.ms-word.document.macroEnabled.main+xml",
];

#[derive(Debug, Clone)]
struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    compression: CompressionMethod,
    last_modified: DateTime,
    unix_mode: Option<u32>,
}

#[derive(Debug, Clone)]
enum BodyItem {
    Raw(Vec<u8>),
    Paragraph(Paragraph),
}

/// The main document part split around the body-level paragraphs.
#[derive(Debug, Clone)]
struct MainPart {
    head: Vec<u8>,
    items: Vec<BodyItem>,
    tail: Vec<u8>,
}

/// An opened `.docx` package. Only body paragraph text can change; every
/// other archive entry is kept as read.
#[derive(Debug, Clone)]
pub struct Document {
    source: Option<PathBuf>,
    entries: Vec<ArchiveEntry>,
    main_index: usize,
    main: MainPart,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self, DocumentFormatError> {
        let bytes = fs::read(path).map_err(|source| DocumentFormatError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut document = Self::from_bytes(&bytes)?;
        document.source = Some(path.to_path_buf());
        debug!(
            path = %path.display(),
            paragraphs = document.paragraph_count(),
            "loaded document"
        );
        Ok(document)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentFormatError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::new();
            if !file.is_dir() {
                file.read_to_end(&mut data)
                    .map_err(|err| DocumentFormatError::Archive(err.into()))?;
            }
            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
                compression: file.compression(),
                last_modified: file.last_modified(),
                unix_mode: file.unix_mode(),
            });
        }

        let main_name = find_main_part_name(&entries)?;
        let main_index = entries
            .iter()
            .position(|entry| !entry.is_dir && entry.name == main_name)
            .ok_or(DocumentFormatError::MissingMainPart)?;
        let main = parse_main_part(&entries[main_index].data)?;
        Ok(Self {
            source: None,
            entries,
            main_index,
            main,
        })
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs().count()
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.main.items.iter().filter_map(|item| match item {
            BodyItem::Paragraph(paragraph) => Some(paragraph),
            BodyItem::Raw(_) => None,
        })
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.main.items.iter_mut().filter_map(|item| match item {
            BodyItem::Paragraph(paragraph) => Some(paragraph),
            BodyItem::Raw(_) => None,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        let main_xml = self.main.to_bytes()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (index, entry) in self.entries.iter().enumerate() {
            let mut options = FileOptions::default()
                .compression_method(writable_compression(entry.compression))
                .last_modified_time(entry.last_modified);
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }
            if entry.is_dir {
                writer
                    .add_directory(entry.name.clone(), options)
                    .map_err(|err| serialize_error(&entry.name, err))?;
                continue;
            }
            let data = if index == self.main_index {
                &main_xml
            } else {
                &entry.data
            };
            writer
                .start_file(entry.name.clone(), options)
                .map_err(|err| serialize_error(&entry.name, err))?;
            writer
                .write_all(data)
                .map_err(|err| serialize_error(&entry.name, err))?;
        }
        let cursor = writer
            .finish()
            .map_err(|err| PersistenceError::Serialize(format!("failed to finalize zip: {}", err)))?;
        Ok(cursor.into_inner())
    }

    /// Writes the package to a temporary file beside `path` and renames it
    /// into place. On error `path` is left as it was.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(source) = &self.source
            && same_file(source, path)
        {
            return Err(PersistenceError::SameAsInput(path.display().to_string()));
        }
        let bytes = self.to_bytes()?;
        let write_error = |source: std::io::Error| PersistenceError::Write {
            path: path.display().to_string(),
            source,
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(parent).map_err(write_error)?;
        temp.write_all(&bytes).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(path).map_err(|err| write_error(err.error))?;
        debug!(path = %path.display(), bytes = bytes.len(), "saved document");
        Ok(())
    }
}

impl MainPart {
    fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        let mut out = self.head.clone();
        for item in &self.items {
            match item {
                BodyItem::Raw(bytes) => out.extend_from_slice(bytes),
                BodyItem::Paragraph(paragraph) => {
                    let xml = paragraph.to_xml().map_err(PersistenceError::Serialize)?;
                    out.extend_from_slice(&xml);
                }
            }
        }
        out.extend_from_slice(&self.tail);
        Ok(out)
    }
}

fn find_main_part_name(entries: &[ArchiveEntry]) -> Result<String, DocumentFormatError> {
    let Some(content_types) = entries
        .iter()
        .find(|entry| !entry.is_dir && entry.name == CONTENT_TYPES_PART)
    else {
        return Ok(DEFAULT_MAIN_PART.to_string());
    };

    let mut reader = Reader::from_reader(content_types.data.as_slice());
    loop {
        match reader.read_event().map_err(|err| xml_error(&reader, err))? {
            Event::Start(tag) | Event::Empty(tag) if tag.local_name().as_ref() == b"Override" => {
                let element = Element::empty(tag.into_owned());
                let is_main = element
                    .attribute(b"ContentType")
                    .is_some_and(|kind| MAIN_PART_CONTENT_TYPES.contains(&kind.trim()));
                if is_main && let Some(part) = element.attribute(b"PartName") {
                    return Ok(part.trim_start_matches('/').to_string());
                }
            }
            Event::Eof => return Ok(DEFAULT_MAIN_PART.to_string()),
            _ => {}
        }
    }
}

fn parse_main_part(xml: &[u8]) -> Result<MainPart, DocumentFormatError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);

    let head_end = loop {
        match reader.read_event().map_err(|err| xml_error(&reader, err))? {
            Event::Start(tag) if tag.local_name().as_ref() == b"body" => {
                break reader.buffer_position();
            }
            Event::Empty(tag) if tag.local_name().as_ref() == b"body" => {
                return Ok(MainPart {
                    head: xml.to_vec(),
                    items: Vec::new(),
                    tail: Vec::new(),
                });
            }
            Event::Eof => return Err(DocumentFormatError::MissingBody),
            _ => {}
        }
    };

    let mut items = Vec::new();
    let mut raw_start = head_end;
    loop {
        let position = reader.buffer_position();
        match reader.read_event().map_err(|err| xml_error(&reader, err))? {
            Event::Start(tag) if tag.local_name().as_ref() == b"p" => {
                let element = read_element(&mut reader, tag.into_owned())?;
                let end = reader.buffer_position();
                push_raw(&mut items, &xml[raw_start..position]);
                items.push(BodyItem::Paragraph(Paragraph::from_element(
                    element,
                    xml[position..end].to_vec(),
                )?));
                raw_start = end;
            }
            Event::Empty(tag) if tag.local_name().as_ref() == b"p" => {
                let end = reader.buffer_position();
                push_raw(&mut items, &xml[raw_start..position]);
                items.push(BodyItem::Paragraph(Paragraph::from_element(
                    Element::empty(tag.into_owned()),
                    xml[position..end].to_vec(),
                )?));
                raw_start = end;
            }
            // tables, section properties and other block content stay as raw bytes
            Event::Start(tag) => {
                read_element(&mut reader, tag.into_owned())?;
            }
            Event::End(_) => {
                push_raw(&mut items, &xml[raw_start..position]);
                return Ok(MainPart {
                    head: xml[..head_end].to_vec(),
                    items,
                    tail: xml[position..].to_vec(),
                });
            }
            Event::Eof => {
                return Err(DocumentFormatError::Xml(
                    "unexpected end of xml inside <w:body>".to_string(),
                ));
            }
            _ => {}
        }
    }
}

fn push_raw(items: &mut Vec<BodyItem>, bytes: &[u8]) {
    if !bytes.is_empty() {
        items.push(BodyItem::Raw(bytes.to_vec()));
    }
}

fn writable_compression(method: CompressionMethod) -> CompressionMethod {
    match method {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

fn serialize_error(entry: &str, err: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Serialize(format!("failed to write zip entry {}: {}", entry, err))
}

fn same_file(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::errors::DocumentFormatError;

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Element(Element),
    Leaf(Event<'static>),
}

/// An owned XML element. `end` is `None` for self-closing tags.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) start: BytesStart<'static>,
    pub(crate) children: Vec<Node>,
    pub(crate) end: Option<BytesEnd<'static>>,
}

impl Element {
    pub(crate) fn new(name: String) -> Self {
        Self {
            start: BytesStart::new(name.clone()),
            children: Vec::new(),
            end: Some(BytesEnd::new(name)),
        }
    }

    pub(crate) fn empty(start: BytesStart<'static>) -> Self {
        Self {
            start,
            children: Vec::new(),
            end: None,
        }
    }

    pub(crate) fn local_name(&self) -> &[u8] {
        self.start.local_name().into_inner()
    }

    pub(crate) fn is(&self, local: &[u8]) -> bool {
        self.local_name() == local
    }

    pub(crate) fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Leaf(_) => None,
        })
    }

    pub(crate) fn attribute(&self, local: &[u8]) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.local_name().as_ref() == local)
            .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
    }

    /// Makes sure the element is written with an explicit end tag.
    pub(crate) fn open(&mut self) {
        if self.end.is_none() {
            let name = String::from_utf8_lossy(self.start.name().into_inner()).into_owned();
            self.end = Some(BytesEnd::new(name));
        }
    }
}

/// Reads the rest of `start`'s subtree from `reader`.
pub(crate) fn read_element(
    reader: &mut Reader<&[u8]>,
    start: BytesStart<'static>,
) -> Result<Element, DocumentFormatError> {
    let mut children = Vec::new();
    loop {
        match reader.read_event().map_err(|err| xml_error(reader, err))? {
            Event::Start(child) => {
                let child = read_element(reader, child.into_owned())?;
                children.push(Node::Element(child));
            }
            Event::Empty(child) => children.push(Node::Element(Element::empty(child.into_owned()))),
            Event::End(end) => {
                return Ok(Element {
                    start,
                    children,
                    end: Some(end.into_owned()),
                });
            }
            Event::Eof => {
                return Err(DocumentFormatError::Xml(format!(
                    "unexpected end of xml inside <{}>",
                    String::from_utf8_lossy(start.name().into_inner())
                )));
            }
            other => children.push(Node::Leaf(other.into_owned())),
        }
    }
}

pub(crate) fn write_element(element: &Element) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    write_node_element(&mut writer, element)?;
    Ok(writer.into_inner())
}

fn write_node_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), String> {
    let Some(end) = &element.end else {
        return writer
            .write_event(Event::Empty(element.start.clone()))
            .map_err(|err| err.to_string());
    };
    writer
        .write_event(Event::Start(element.start.clone()))
        .map_err(|err| err.to_string())?;
    for child in &element.children {
        match child {
            Node::Element(child) => write_node_element(writer, child)?,
            Node::Leaf(event) => writer.write_event(event).map_err(|err| err.to_string())?,
        }
    }
    writer
        .write_event(Event::End(end.clone()))
        .map_err(|err| err.to_string())
}

/// Characters allowed in XML 1.0 character data.
pub(crate) fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

pub(crate) fn xml_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> DocumentFormatError {
    DocumentFormatError::Xml(format!("{} at byte {}", err, reader.buffer_position()))
}

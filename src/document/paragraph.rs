use quick_xml::events::{BytesStart, BytesText, Event};
use std::borrow::Cow;

use super::xml::{Element, Node, is_xml_char, write_element};
use crate::errors::DocumentFormatError;

/// Children of `w:p` that may wrap runs and still render as paragraph text.
const RUN_CONTAINERS: [&[u8]; 3] = [b"hyperlink", b"ins", b"smartTag"];

/// One body-level `w:p`. Untouched paragraphs are written back from their
/// original bytes.
#[derive(Debug, Clone)]
pub struct Paragraph {
    element: Element,
    raw: Vec<u8>,
    text: String,
    dirty: bool,
}

impl Paragraph {
    pub(crate) fn from_element(element: Element, raw: Vec<u8>) -> Result<Self, DocumentFormatError> {
        let mut text = String::new();
        collect_paragraph_text(&element, &mut text)?;
        Ok(Self {
            element,
            raw,
            text,
            dirty: false,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.dirty
    }

    /// Replaces the paragraph's text with a single run. Paragraph properties
    /// and children that carry no text stay where they are; the new run takes
    /// the formatting of the first text run. Characters XML 1.0 cannot carry
    /// are dropped.
    pub fn set_text(&mut self, text: &str) {
        let text = text.chars().filter(|ch| is_xml_char(*ch)).collect::<String>();
        let text = text.as_str();
        if text == self.text {
            return;
        }
        let prefix = name_prefix(&self.element.start);
        let run_properties = first_run_properties(&self.element);
        let run = build_run(&prefix, run_properties, text);

        self.element.open();
        let mut replacement = Some(run);
        let mut children = Vec::with_capacity(self.element.children.len());
        for node in self.element.children.drain(..) {
            let carries_text = matches!(&node, Node::Element(child) if contributes_text(child));
            if !carries_text {
                children.push(node);
            } else if let Some(run) = replacement.take() {
                children.push(Node::Element(run));
            }
        }
        if let Some(run) = replacement {
            children.push(Node::Element(run));
        }
        self.element.children = children;
        self.text = text.to_string();
        self.dirty = true;
    }

    pub(crate) fn to_xml(&self) -> Result<Cow<'_, [u8]>, String> {
        if !self.dirty {
            return Ok(Cow::Borrowed(&self.raw));
        }
        write_element(&self.element).map(Cow::Owned)
    }
}

fn collect_paragraph_text(paragraph: &Element, out: &mut String) -> Result<(), DocumentFormatError> {
    for child in paragraph.child_elements() {
        if child.is(b"r") {
            collect_run_text(child, out)?;
        } else if RUN_CONTAINERS.contains(&child.local_name()) {
            collect_paragraph_text(child, out)?;
        }
    }
    Ok(())
}

fn collect_run_text(run: &Element, out: &mut String) -> Result<(), DocumentFormatError> {
    for child in run.child_elements() {
        match child.local_name() {
            b"t" => {
                for node in &child.children {
                    match node {
                        Node::Leaf(Event::Text(text)) => {
                            let value = text
                                .unescape()
                                .map_err(|err| DocumentFormatError::Xml(err.to_string()))?;
                            out.push_str(&value);
                        }
                        Node::Leaf(Event::CData(data)) => {
                            out.push_str(&String::from_utf8_lossy(data));
                        }
                        _ => {}
                    }
                }
            }
            b"tab" | b"ptab" => out.push('\t'),
            b"br" if child.attribute(b"type").is_none_or(|kind| kind == "textWrapping") => {
                out.push('\n')
            }
            b"cr" => out.push('\n'),
            b"noBreakHyphen" => out.push('-'),
            _ => {}
        }
    }
    Ok(())
}

fn contributes_text(element: &Element) -> bool {
    if element.is(b"r") {
        let mut text = String::new();
        return collect_run_text(element, &mut text).is_err() || !text.is_empty();
    }
    if RUN_CONTAINERS.contains(&element.local_name()) {
        return element.child_elements().any(contributes_text);
    }
    false
}

fn first_run_properties(paragraph: &Element) -> Option<Element> {
    for child in paragraph.child_elements() {
        if child.is(b"r") && contributes_text(child) {
            return child.child_elements().find(|node| node.is(b"rPr")).cloned();
        }
        if RUN_CONTAINERS.contains(&child.local_name())
            && let Some(properties) = first_run_properties(child)
        {
            return Some(properties);
        }
    }
    None
}

fn build_run(prefix: &str, run_properties: Option<Element>, text: &str) -> Element {
    let mut run = Element::new(qualified(prefix, "r"));
    if let Some(properties) = run_properties {
        run.children.push(Node::Element(properties));
    }

    let mut pending = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        let marker = match ch {
            '\t' => "tab",
            '\n' => "br",
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                "br"
            }
            _ => {
                pending.push(ch);
                continue;
            }
        };
        flush_text(&mut run, prefix, &mut pending);
        run.children.push(Node::Element(Element::empty(BytesStart::new(qualified(
            prefix, marker,
        )))));
    }
    flush_text(&mut run, prefix, &mut pending);
    run
}

fn flush_text(run: &mut Element, prefix: &str, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let mut element = Element::new(qualified(prefix, "t"));
    element.start.push_attribute(("xml:space", "preserve"));
    element
        .children
        .push(Node::Leaf(Event::Text(BytesText::new(pending.as_str()).into_owned())));
    run.children.push(Node::Element(element));
    pending.clear();
}

fn name_prefix(start: &BytesStart<'_>) -> String {
    let name = start.name();
    let qualified = name.as_ref();
    match qualified.iter().position(|byte| *byte == b':') {
        Some(index) => String::from_utf8_lossy(&qualified[..index]).into_owned(),
        None => String::new(),
    }
}

fn qualified(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

//! # XML plumbing
//!
//! Writing goes through a small owned element tree: every model type builds
//! its [`Element`] fragment, the document assembles them and streams the
//! result through a `quick_xml::Writer`. Reading goes the other way, through
//! the forward-only [`XmlCursor`].

pub mod cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt::Display;
use std::io::Write;

use crate::error::Result;

pub use cursor::{ParseMode, ParseReport, RejectedRecord, Tag, XmlCursor};

pub const GML_NS: &str = "http://www.opengis.net/gml/3.2";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An owned XML element, attributes kept in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// `<name>text</name>`
    pub fn text_element(name: impl Into<String>, text: impl Display) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.to_string()));
        element
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Display) {
        let key = key.into();
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_value(&mut self, name: &str, value: impl Display) {
        self.push(Self::text_element(name, value));
    }

    /// Adds `<name>value</name>` only when a value is present.
    pub fn push_opt<T: Display>(&mut self, name: &str, value: Option<T>) {
        if let Some(value) = value {
            self.push_value(name, value);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child with the given qualified name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children().find(|e| e.name == name)
    }

    /// All descendants (depth first) with the given qualified name.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        for child in self.children() {
            if child.name == name {
                found.push(child);
            }
            found.extend(child.descendants_named(name));
        }
        found
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_to(writer)?,
                Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }

    /// Compact serialization, mostly useful for tests and logging.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

/// Splits whitespace separated numbers, failing on the first token that is
/// not a number.
pub(crate) fn parse_number_list(element: &str, text: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|token| cursor::parse_value::<f64>(element, token))
        .collect()
}

/// Joins coordinates into the `x y x y ...` form of `gml:pos`/`gml:posList`.
pub(crate) fn format_number_list(values: impl IntoIterator<Item = f64>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads the root element of `xml` with `read`.
#[cfg(test)]
pub(crate) fn read_fragment<'x, T>(
    xml: &'x str,
    mode: ParseMode,
    read: impl FnOnce(&mut XmlCursor<&'x [u8]>, &Tag) -> Result<T>,
) -> Result<T> {
    let mut cursor = XmlCursor::new(xml.as_bytes(), mode);
    let root = cursor.read_root()?;
    read(&mut cursor, &root)
}

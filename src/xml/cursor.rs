//! Forward-only reading over a `quick_xml::Reader`.
//!
//! Every record is read with the same loop: take the record's start tag, walk
//! its direct children one by one, hand each child to a visitor that knows
//! the element names of that record, and stop at the record's own end tag.
//! Children the visitor does not claim are skipped (lenient) or rejected
//! (strict). The cursor tracks nesting depth, so a half consumed child can
//! always be skipped up to its end tag.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Display;
use std::io::BufRead;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{ImaerError, Result};

/// How structural surprises are handled while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Unknown elements are skipped and broken records dropped; both are
    /// listed in the [`ParseReport`].
    #[default]
    Lenient,
    /// Any unknown element or broken record fails the parse.
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub element: String,
    pub reason: String,
}

/// What a lenient parse left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    /// `parent/child` paths of skipped elements.
    pub skipped: Vec<String>,
    pub rejected: Vec<RejectedRecord>,
}

impl ParseReport {
    /// True when nothing was skipped or rejected.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.rejected.is_empty()
    }
}

/// An owned start tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    is_empty: bool,
    depth: usize,
}

impl Tag {
    fn from_start(start: &BytesStart<'_>, is_empty: bool, depth: usize) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            is_empty,
            depth,
        })
    }

    /// Qualified name, e.g. `imaer:EmissionSource`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// `<tag/>`
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Looks an attribute up by qualified name, falling back to a match on
    /// the local part so `gml:id` also finds `gml32:id`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| {
                let local = local_part(key);
                self.attributes
                    .iter()
                    .find(|(k, _)| k.contains(':') == key.contains(':') && local_part(k) == local)
            })
            .map(|(_, v)| v.as_str())
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

enum Content {
    Element(Tag),
    Text(String),
}

enum Token {
    Start(Tag),
    End,
    Text(String),
    Eof,
}

pub struct XmlCursor<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    mode: ParseMode,
    report: ParseReport,
}

impl<R: BufRead> XmlCursor<R> {
    pub fn new(inner: R, mode: ParseMode) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::new(),
            depth: 0,
            mode,
            report: ParseReport::default(),
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn report(&self) -> &ParseReport {
        &self.report
    }

    pub fn into_report(self) -> ParseReport {
        self.report
    }

    fn next_token(&mut self) -> Result<Token> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => {
                    self.depth += 1;
                    return Ok(Token::Start(Tag::from_start(&start, false, self.depth)?));
                }
                Event::Empty(start) => {
                    return Ok(Token::Start(Tag::from_start(&start, true, self.depth + 1)?));
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(Token::End);
                }
                Event::Text(text) => {
                    let text = text.unescape()?.into_owned();
                    if !text.is_empty() {
                        return Ok(Token::Text(text));
                    }
                }
                Event::CData(data) => {
                    return Ok(Token::Text(String::from_utf8_lossy(&data).into_owned()));
                }
                Event::Eof => return Ok(Token::Eof),
                _ => {}
            }
        }
    }

    /// The document element.
    pub fn read_root(&mut self) -> Result<Tag> {
        loop {
            match self.next_token()? {
                Token::Start(tag) => return Ok(tag),
                Token::Eof => return Err(ImaerError::UnexpectedEof("document".to_string())),
                _ => {}
            }
        }
    }

    /// Next direct child of `parent`, or `None` once `parent` is closed.
    ///
    /// Only valid while every earlier child has been consumed, which
    /// [`read_children`](Self::read_children) guarantees.
    pub fn next_child(&mut self, parent: &Tag) -> Result<Option<Tag>> {
        loop {
            match self.next_content(parent)? {
                Some(Content::Element(tag)) => return Ok(Some(tag)),
                Some(Content::Text(_)) => {}
                None => return Ok(None),
            }
        }
    }

    fn next_content(&mut self, parent: &Tag) -> Result<Option<Content>> {
        if parent.is_empty || self.depth < parent.depth {
            return Ok(None);
        }
        loop {
            match self.next_token()? {
                Token::Start(tag) => return Ok(Some(Content::Element(tag))),
                Token::Text(text) if self.depth == parent.depth => {
                    return Ok(Some(Content::Text(text)))
                }
                Token::End if self.depth < parent.depth => return Ok(None),
                Token::Eof => return Err(ImaerError::UnexpectedEof(parent.name.clone())),
                _ => {}
            }
        }
    }

    /// Direct text content of `tag`, verbatim; consumes the tag up to its end.
    pub fn read_text(&mut self, tag: &Tag) -> Result<String> {
        let mut text = String::new();
        if tag.is_empty || self.depth < tag.depth {
            return Ok(text);
        }
        loop {
            match self.next_token()? {
                Token::Text(t) if self.depth == tag.depth => text.push_str(&t),
                Token::End if self.depth < tag.depth => return Ok(text),
                Token::Eof => return Err(ImaerError::UnexpectedEof(tag.name.clone())),
                _ => {}
            }
        }
    }

    /// Text of a code or id field, without surrounding whitespace.
    pub fn read_code(&mut self, tag: &Tag) -> Result<String> {
        Ok(self.read_text(tag)?.trim().to_string())
    }

    pub fn read_value<T>(&mut self, tag: &Tag) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let text = self.read_text(tag)?;
        parse_value(tag.name(), &text)
    }

    pub fn read_bool(&mut self, tag: &Tag) -> Result<bool> {
        let text = self.read_text(tag)?;
        match text.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ImaerError::invalid_value(tag.name(), other, "expected a boolean")),
        }
    }

    /// Consumes whatever is left of `tag`, including nested elements.
    pub fn skip(&mut self, tag: &Tag) -> Result<()> {
        if tag.is_empty {
            return Ok(());
        }
        while self.depth >= tag.depth {
            if let Token::Eof = self.next_token()? {
                return Err(ImaerError::UnexpectedEof(tag.name.clone()));
            }
        }
        Ok(())
    }

    /// Walks the children of `parent` until its end tag.
    ///
    /// `visit` returns `Ok(true)` for children it recognised; whatever it
    /// leaves unread of such a child is skipped. Unrecognised children go
    /// through [`unexpected`](Self::unexpected).
    pub fn read_children<F>(&mut self, parent: &Tag, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Self, &Tag) -> Result<bool>,
    {
        while let Some(child) = self.next_child(parent)? {
            if visit(self, &child)? {
                self.skip(&child)?;
            } else {
                self.unexpected(parent, &child)?;
            }
        }
        Ok(())
    }

    /// Like [`read_children`](Self::read_children) for mixed content: the
    /// direct text of `parent` is collected and returned.
    pub fn read_mixed<F>(&mut self, parent: &Tag, mut visit: F) -> Result<String>
    where
        F: FnMut(&mut Self, &Tag) -> Result<bool>,
    {
        let mut text = String::new();
        while let Some(content) = self.next_content(parent)? {
            match content {
                Content::Text(t) => text.push_str(&t),
                Content::Element(child) => {
                    if visit(self, &child)? {
                        self.skip(&child)?;
                    } else {
                        self.unexpected(parent, &child)?;
                    }
                }
            }
        }
        Ok(text)
    }

    /// Skips `child` in lenient mode, fails in strict mode.
    pub fn unexpected(&mut self, parent: &Tag, child: &Tag) -> Result<()> {
        match self.mode {
            ParseMode::Strict => Err(ImaerError::UnexpectedElement {
                parent: parent.name.clone(),
                element: child.name.clone(),
            }),
            ParseMode::Lenient => {
                debug!("Skipping <{}> inside <{}>", child.name, parent.name);
                self.report
                    .skipped
                    .push(format!("{}/{}", parent.name, child.name));
                self.skip(child)
            }
        }
    }

    /// Reads one record. In lenient mode a recoverable failure drops the
    /// record (it is listed in the report) and the cursor moves past it.
    pub fn read_record<T, F>(&mut self, tag: &Tag, read: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Self, &Tag) -> Result<T>,
    {
        match read(self, tag) {
            Ok(record) => Ok(Some(record)),
            Err(err) if self.mode == ParseMode::Lenient && err.is_recoverable() => {
                self.reject(tag.name(), err.to_string());
                self.skip(tag)?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn reject(&mut self, element: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Dropping <{}>: {}", element, reason);
        self.report.rejected.push(RejectedRecord {
            element: element.to_string(),
            reason,
        });
    }
}

pub(crate) fn parse_value<T>(element: &str, text: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| ImaerError::invalid_value(element, text.trim(), e))
}

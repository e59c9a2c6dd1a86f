//! Owned XML element tree for RSS documents.
//!
//! Text is stored the way RSS fields are read: the characters before an element's first
//! child live in `text`, the characters after an element (inside its parent) live in its
//! `tail`. CDATA sections are merged into the surrounding text. Comments, processing
//! instructions and the DOCTYPE are not kept.

use crate::utils::error::{FeedError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
    pub tail: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First direct child with the given tag name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    /// All direct children with the given tag name, in document order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn find_all_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.children
            .iter_mut()
            .filter(move |child| child.name == name)
    }

    /// Text content, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
        check_name(&element.name)?;
        for attr in start.attributes() {
            let attr = attr.map_err(|e| FeedError::parse(format!("bad attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            check_name(&key)?;
            if attr.value.contains(&b'<') {
                return Err(FeedError::parse(format!(
                    "'<' in value of attribute {} on <{}>",
                    key, element.name
                )));
            }
            let value = attr
                .unescape_value()
                .map_err(|e| FeedError::parse(e.to_string()))?
                .into_owned();
            check_chars(&value)?;
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    /// Prefixes bound by `xmlns:` attributes on this element.
    fn declared_prefixes(&self) -> Vec<String> {
        self.attributes
            .iter()
            .filter_map(|(key, _)| key.strip_prefix("xmlns:"))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parses a complete XML document. Any well-formedness problem is a `ParseError`.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut scopes: Vec<Vec<String>> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                FeedError::parse(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(start) => {
                    if stack.is_empty() && root.is_some() {
                        return Err(FeedError::parse("junk after document element"));
                    }
                    let element = Element::from_start(&start)?;
                    let declared = check_namespaces(&element, &scopes)?;
                    scopes.push(declared);
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    check_namespaces(&element, &scopes)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| FeedError::parse("unmatched closing tag"))?;
                    scopes.pop();
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if String::from_utf8_lossy(&text).contains("]]>") {
                        return Err(FeedError::parse("']]>' not allowed in text"));
                    }
                    let text = text
                        .unescape()
                        .map_err(|e| FeedError::parse(e.to_string()))?;
                    check_chars(&text)?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(cdata) => {
                    let text = cdata.decode().map_err(|e| FeedError::parse(e.to_string()))?;
                    check_chars(&text)?;
                    push_text(&mut stack, &text)?;
                }
                Event::Eof => break,
                // declaration, comments, processing instructions, doctype
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(FeedError::parse(format!(
                "unclosed element <{}> at end of input",
                open.name
            )));
        }

        root.map(Document::new)
            .ok_or_else(|| FeedError::parse("no element found"))
    }

    /// The `channel` element directly under the root.
    pub fn channel(&self) -> Option<&Element> {
        self.root.find("channel")
    }

    pub fn channel_mut(&mut self) -> Option<&mut Element> {
        self.root.find_mut("channel")
    }

    /// Renders the tree as UTF-8 with a leading XML declaration.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| FeedError::serialize(e.to_string()))?;
        writer.get_mut().push(b'\n');
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r')
        || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

fn check_chars(text: &str) -> Result<()> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(FeedError::parse(format!(
            "character U+{:04X} is not allowed in XML",
            c as u32
        ))),
        None => Ok(()),
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '_' | ':'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Element and attribute names: an XML Name with at most one `prefix:` part.
fn check_name(name: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        chars
            .next()
            .is_some_and(|c| c != ':' && is_name_start_char(c))
            && chars.all(|c| c != ':' && is_name_char(c))
    };
    let valid = match name.split_once(':') {
        Some((prefix, local)) => valid_part(prefix) && valid_part(local),
        None => valid_part(name),
    };
    if valid {
        Ok(())
    } else {
        Err(FeedError::parse(format!("not a valid XML name: '{}'", name)))
    }
}

/// Checks every prefix `element` uses is bound, returning the prefixes it declares.
fn check_namespaces(element: &Element, scopes: &[Vec<String>]) -> Result<Vec<String>> {
    let declared = element.declared_prefixes();
    let is_bound = |prefix: &str| {
        prefix == "xml"
            || declared.iter().any(|p| p == prefix)
            || scopes.iter().flatten().any(|p| p == prefix)
    };

    let attribute_names = element
        .attributes
        .iter()
        .map(|(key, _)| key.as_str())
        .filter(|key| *key != "xmlns" && !key.starts_with("xmlns:"));
    for name in std::iter::once(element.name.as_str()).chain(attribute_names) {
        if let Some((prefix, _)) = name.split_once(':') {
            if !is_bound(prefix) {
                return Err(FeedError::parse(format!(
                    "unbound prefix '{}' in <{}>",
                    prefix, element.name
                )));
            }
        }
    }

    Ok(declared)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(FeedError::parse("junk after document element")),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> Result<()> {
    let Some(current) = stack.last_mut() else {
        // only whitespace may surround the root element
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(FeedError::parse("text outside of the document element"));
    };

    let slot = match current.children.last_mut() {
        Some(previous) => &mut previous.tail,
        None => &mut current.text,
    };
    slot.get_or_insert_with(String::new).push_str(text);
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text();
    if text.is_none() && element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| FeedError::serialize(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| FeedError::serialize(e.to_string()))?;
    if let Some(text) = text {
        write_text(writer, text)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
        if let Some(tail) = child.tail.as_deref().filter(|t| !t.is_empty()) {
            write_text(writer, tail)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| FeedError::serialize(e.to_string()))
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<()> {
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| FeedError::serialize(e.to_string()))
}

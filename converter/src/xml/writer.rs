//! Element tree serialization with quick-xml.

use std::borrow::Cow;
use std::io::Write;

use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::assembler::Element;
use crate::error::{AssembleError, AssembleResult};

/// Serialization settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub include_declaration: bool,
    pub indent: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            include_declaration: true,
            indent: 2,
        }
    }
}

/// Write a document to `out`, ending with a newline.
pub fn write_document<W: Write>(out: W, root: &Element, options: WriteOptions) -> AssembleResult<()> {
    let mut xml = if options.indent > 0 {
        Writer::new_with_indent(out, b' ', options.indent)
    } else {
        Writer::new(out)
    };

    if options.include_declaration {
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    }
    write_element(&mut xml, root)?;
    xml.get_mut().write_all(b"\n")?;
    Ok(())
}

/// Serialize a document to a string.
pub fn to_xml_string(root: &Element, options: WriteOptions) -> AssembleResult<String> {
    let mut buffer = Vec::new();
    write_document(&mut buffer, root, options)?;
    String::from_utf8(buffer).map_err(|e| AssembleError::Xml(e.to_string()))
}

fn write_element<W: Write>(xml: &mut Writer<W>, element: &Element) -> AssembleResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), xml_chars(value).as_ref()));
    }

    let text = element.text.as_deref().map(xml_chars).filter(|t| !t.is_empty());
    if text.is_none() && element.children.is_empty() {
        xml.write_event(Event::Empty(start))?;
        return Ok(());
    }

    xml.write_event(Event::Start(start))?;
    if let Some(text) = text {
        xml.write_event(Event::Text(BytesText::from_escaped(escape(text.as_ref()))))?;
    }
    for child in &element.children {
        write_element(xml, child)?;
    }
    xml.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Drop characters outside the XML 1.0 `Char` production.
pub fn xml_chars(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_xml_char) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

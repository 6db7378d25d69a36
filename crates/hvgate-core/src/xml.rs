//! XML helpers for building requests and reading replies.
//!
//! Requests are assembled by concatenation with no whitespace between
//! elements, because the bytes of `<info>` and `<header>` are digested and
//! signed exactly as they are sent. Interpolated values must be escaped with
//! [`escape`] unless they are controlled tokens.
//!
//! Replies are parsed into a small [`Element`] tree; lookups go by local
//! name, so namespace prefixes such as `wc:info` are ignored.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// Escape `&`, `<`, `>`, `'` and `"` for use in element text or attributes.
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Append `<tag>text</tag>`. `text` is written verbatim.
pub fn push_element(out: &mut String, tag: &str, text: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(text);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Check that `fragment` is a single well-formed element that can be
/// embedded in another element.
///
/// XML declarations, doctypes and processing instructions are rejected:
/// they are only legal in a document prolog. Comments are allowed.
pub fn check_well_formed(fragment: &str) -> Result<()> {
    let mut reader = Reader::from_str(fragment);
    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::protocol(format!("malformed XML: {}", e)))?;
        let rejected = match event {
            Event::Decl(_) => "XML declaration",
            Event::DocType(_) => "doctype",
            Event::PI(_) => "processing instruction",
            Event::Eof => break,
            _ => continue,
        };
        return Err(Error::protocol(format!(
            "malformed fragment: {} not allowed inside an element",
            rejected
        )));
    }
    Element::parse(fragment).map(|_| ())
}

/// A parsed XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Parse a document with exactly one root element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::protocol(format!("malformed XML: {}", e)))?;
            match event {
                Event::Start(start) => stack.push(Element::open(&start)?),
                Event::Empty(start) => {
                    let element = Element::open(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::protocol("malformed XML: unbalanced end tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| Error::protocol(format!("malformed XML text: {}", e)))?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| Error::protocol(format!("malformed CDATA: {}", e)))?;
                    push_text(&mut stack, text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::protocol(format!(
                "malformed XML: <{}> is never closed",
                open.name
            )));
        }
        root.ok_or_else(|| Error::protocol("malformed XML: no root element"))
    }

    fn open(start: &BytesStart<'_>) -> Result<Element> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::protocol(format!("malformed attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::protocol(format!("malformed attribute value: {}", e)))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Element {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// Local name of the element.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text directly inside the element, with surrounding whitespace trimmed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value of the attribute with the given local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First descendant with the given local name, in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given local name, in document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect(name, found);
        }
    }

    /// Text of the first descendant with the given local name.
    pub fn find_text(&self, name: &str) -> Option<&str> {
        self.find(name).map(Element::text)
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(Error::protocol("malformed XML: more than one root element"))
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(top) => {
            top.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::protocol("malformed XML: text outside the root element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEOPLE_REPLY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<response>
  <status><code>0</code></status>
  <wc:info xmlns:wc="urn:com.microsoft.wc.methods.response.GetAuthorizedPeople">
    <response-results>
      <person-info>
        <person-id>P1</person-id>
        <record id="R1" record-custodian="true">Alice</record>
      </person-info>
      <person-info>
        <person-id>P2</person-id>
        <record id="R2">Bob &amp; Co</record>
      </person-info>
    </response-results>
  </wc:info>
</response>"#;

    #[test]
    fn test_find_first_descendant() {
        let root = Element::parse(PEOPLE_REPLY).unwrap();
        assert_eq!(root.name(), "response");
        assert_eq!(root.find_text("code"), Some("0"));
        assert_eq!(root.find_text("person-id"), Some("P1"));
        assert_eq!(root.find("record").and_then(|r| r.attr("id")), Some("R1"));
    }

    #[test]
    fn test_prefixed_names_use_local_name() {
        let root = Element::parse(PEOPLE_REPLY).unwrap();
        assert!(root.find("info").is_some());
    }

    #[test]
    fn test_find_all_in_document_order() {
        let root = Element::parse(PEOPLE_REPLY).unwrap();
        let people = root.find_all("person-info");
        assert_eq!(people.len(), 2);
        assert_eq!(people[1].find_text("person-id"), Some("P2"));
        assert_eq!(people[1].find_text("record"), Some("Bob & Co"));
    }

    #[test]
    fn test_missing_element_is_none() {
        let root = Element::parse("<a><b/></a>").unwrap();
        assert!(root.find("c").is_none());
        assert_eq!(root.find_text("b"), Some(""));
    }

    #[test]
    fn test_cdata_is_text() {
        let root = Element::parse("<a><b><![CDATA[<raw>]]></b></a>").unwrap();
        assert_eq!(root.find_text("b"), Some("<raw>"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(Element::parse("").is_err());
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("<a>").is_err());
        assert!(Element::parse("<a/><b/>").is_err());
        assert!(Element::parse("text<a/>").is_err());
    }

    #[test]
    fn test_check_well_formed() {
        assert!(check_well_formed("<heart-rate><value>72</value></heart-rate>").is_ok());
        assert!(check_well_formed("<heart-rate><value>72</heart-rate>").is_err());
    }

    #[test]
    fn test_escape_and_push_element() {
        let mut out = String::new();
        push_element(&mut out, "text", &escape("a < b & \"c\""));
        assert_eq!(out, "<text>a &lt; b &amp; &quot;c&quot;</text>");

        let root = Element::parse(&out).unwrap();
        assert_eq!(root.text(), "a < b & \"c\"");
    }
}

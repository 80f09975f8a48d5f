//! Extensible Resource Descriptor (XRD 1.0), the XML format of the original
//! WebFinger protocol and of `/.well-known/host-meta`.
//!
//! XRD allows repeated properties of one type and several titles per
//! language, so it is parsed into its own shape first and then converted.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::WebFingerError;
use crate::jrd::{Descriptor, Link, DEFAULT_TITLE_LANG};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Xrd {
    pub subject: String,
    pub expires: String,
    pub aliases: Vec<String>,
    pub properties: Vec<XrdProperty>,
    pub links: Vec<XrdLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrdProperty {
    pub type_uri: String,
    pub value: String,
    /// Set by `xsi:nil="true"`.
    pub nil: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrdTitle {
    /// `xml:lang`, if any.
    pub lang: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrdLink {
    pub rel: String,
    pub media_type: String,
    pub href: String,
    pub template: String,
    pub titles: Vec<XrdTitle>,
    pub properties: Vec<XrdProperty>,
}

impl Xrd {
    pub fn link_by_rel(&self, rel: &str) -> Option<&XrdLink> {
        self.links.iter().find(|link| link.rel == rel)
    }

    /// Convert to the JRD model.
    ///
    /// When a type appears on several properties the last one wins. When a
    /// language has several titles the first one wins.
    pub fn to_jrd(&self) -> Descriptor {
        let mut jrd = Descriptor {
            subject: self.subject.clone(),
            expires: non_empty(&self.expires),
            aliases: self.aliases.clone(),
            links: self.links.iter().map(XrdLink::to_jrd).collect(),
            ..Default::default()
        };
        for prop in &self.properties {
            jrd.properties.insert(prop.type_uri.clone(), prop.jrd_value());
        }
        jrd
    }
}

impl From<Xrd> for Descriptor {
    fn from(xrd: Xrd) -> Self {
        xrd.to_jrd()
    }
}

impl XrdLink {
    fn to_jrd(&self) -> Link {
        let mut link = Link {
            rel: self.rel.clone(),
            media_type: non_empty(&self.media_type),
            href: non_empty(&self.href),
            template: non_empty(&self.template),
            ..Default::default()
        };
        for title in &self.titles {
            let lang = title.lang.as_deref().unwrap_or(DEFAULT_TITLE_LANG);
            link.titles
                .entry(lang.to_string())
                .or_insert_with(|| title.value.clone());
        }
        for prop in &self.properties {
            link.properties.insert(prop.type_uri.clone(), prop.jrd_value());
        }
        link
    }
}

impl XrdProperty {
    fn jrd_value(&self) -> Option<String> {
        (!self.nil).then(|| self.value.clone())
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Open element while parsing. Elements outside the XRD vocabulary are
/// tracked as `Ignored` so their text does not leak into their parent.
enum Node {
    Root,
    Subject(String),
    Expires(String),
    Alias(String),
    Property(XrdProperty),
    Link(XrdLink),
    Title(XrdTitle),
    Ignored,
}

/// Parse an XRD document.
pub fn parse_xrd(blob: &[u8]) -> Result<Xrd, WebFingerError> {
    let text = std::str::from_utf8(blob).map_err(xml_error)?;
    // Text is kept verbatim; whitespace between elements lands on nodes
    // that carry no text.
    let mut reader = Reader::from_str(text);

    let mut xrd = Xrd::default();
    let mut stack: Vec<Node> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let node = open(stack.last(), seen_root, &e)?;
                seen_root = true;
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = open(stack.last(), seen_root, &e)?;
                seen_root = true;
                stack.push(node);
                close(&mut stack, &mut xrd);
            }
            Event::End(_) => close(&mut stack, &mut xrd),
            Event::Text(t) => {
                if let Some(node) = stack.last_mut() {
                    push_text(node, &t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(c) => {
                if let Some(node) = stack.last_mut() {
                    push_text(node, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(WebFingerError::InvalidXrd("no root element".into()));
    }
    if !stack.is_empty() {
        return Err(WebFingerError::InvalidXrd("unexpected end of document".into()));
    }
    Ok(xrd)
}

fn open(
    parent: Option<&Node>,
    seen_root: bool,
    e: &BytesStart<'_>,
) -> Result<Node, WebFingerError> {
    let name = e.local_name();
    let node = match (parent, name.as_ref()) {
        (None, _) if seen_root => {
            return Err(WebFingerError::InvalidXrd("multiple root elements".into()))
        }
        (None, _) => Node::Root,
        (Some(Node::Root), b"Subject") => Node::Subject(String::new()),
        (Some(Node::Root), b"Expires") => Node::Expires(String::new()),
        (Some(Node::Root), b"Alias") => Node::Alias(String::new()),
        (Some(Node::Root), b"Link") => Node::Link(XrdLink {
            rel: attr(e, b"rel")?.unwrap_or_default(),
            media_type: attr(e, b"type")?.unwrap_or_default(),
            href: attr(e, b"href")?.unwrap_or_default(),
            template: attr(e, b"template")?.unwrap_or_default(),
            ..Default::default()
        }),
        (Some(Node::Root | Node::Link(_)), b"Property") => Node::Property(XrdProperty {
            type_uri: attr(e, b"type")?.unwrap_or_default(),
            value: String::new(),
            nil: matches!(attr(e, b"nil")?.as_deref(), Some("true" | "1")),
        }),
        (Some(Node::Link(_)), b"Title") => Node::Title(XrdTitle {
            lang: attr(e, b"lang")?.filter(|l| !l.is_empty()),
            value: String::new(),
        }),
        _ => Node::Ignored,
    };
    Ok(node)
}

fn close(stack: &mut Vec<Node>, xrd: &mut Xrd) {
    let Some(node) = stack.pop() else {
        return;
    };
    match (node, stack.last_mut()) {
        (Node::Subject(s), _) => xrd.subject = s,
        (Node::Expires(s), _) => xrd.expires = s,
        (Node::Alias(s), _) => xrd.aliases.push(s),
        (Node::Link(link), _) => xrd.links.push(link),
        (Node::Property(prop), Some(Node::Link(link))) => link.properties.push(prop),
        (Node::Property(prop), _) => xrd.properties.push(prop),
        (Node::Title(title), Some(Node::Link(link))) => link.titles.push(title),
        _ => {}
    }
}

fn push_text(node: &mut Node, text: &str) {
    match node {
        Node::Subject(s) | Node::Expires(s) | Node::Alias(s) => s.push_str(text),
        Node::Property(prop) => prop.value.push_str(text),
        Node::Title(title) => title.value.push_str(text),
        Node::Root | Node::Link(_) | Node::Ignored => {}
    }
}

/// Attribute by local name, so `xml:lang` and `xsi:nil` match whatever
/// prefix the document binds.
fn attr(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, WebFingerError> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn xml_error(e: impl std::fmt::Display) -> WebFingerError {
    WebFingerError::InvalidXrd(e.to_string())
}

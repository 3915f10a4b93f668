#![forbid(unsafe_code)]

//! XML document: parsing into the owned tree and ISO-8859-1 output.

use crate::encoding::{encode_latin1, Encoding};
use crate::tree::{Attribute, Element, Node};
use crate::writer;
use siidte_core::{ns, Error};

/// The exact declaration line of every written envelope.
pub const LATIN1_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n";

/// A parsed document: its root element and the encoding it was read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: Element,
    pub encoding: Encoding,
}

impl XmlDocument {
    /// Parse raw bytes, decoding them as the XML declaration says.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let encoding = Encoding::sniff(bytes);
        let text = encoding.decode(bytes)?;
        let root = parse_element_tree(&text)?;
        Ok(Self { root, encoding })
    }

    /// Parse already-decoded text.
    pub fn parse_str(text: &str) -> Result<Self, Error> {
        Ok(Self {
            root: parse_element_tree(text)?,
            encoding: Encoding::Utf8,
        })
    }

    /// Serialize as ISO-8859-1 with the fixed declaration line.
    pub fn to_latin1_bytes(&self) -> Vec<u8> {
        let mut text = String::from(LATIN1_DECLARATION);
        writer::write_element(&self.root, &mut text);
        text.push('\n');
        encode_latin1(&text)
    }
}

/// Parse `text` (declaration optional) and return its document element.
pub fn parse_element_tree(text: &str) -> Result<Element, Error> {
    let body = strip_declaration(text);
    let doc = roxmltree::Document::parse_with_options(body, crate::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    convert_element(doc.root_element(), body)
}

/// Drop a leading BOM and XML declaration. The declaration's encoding has
/// already been applied, and roxmltree only reads `&str`.
fn strip_declaration(text: &str) -> &str {
    let text = text.trim_start_matches('\u{feff}');
    if text.starts_with("<?xml") {
        if let Some(end) = text.find("?>") {
            return &text[end + 2..];
        }
    }
    text
}

fn convert_element(node: roxmltree::Node<'_, '_>, src: &str) -> Result<Element, Error> {
    let tag = scan_start_tag(&src[node.range().start..]).ok_or_else(|| {
        Error::XmlParse(format!(
            "cannot read start tag of <{}>",
            node.tag_name().name()
        ))
    })?;

    let (prefix, _) = split_qname(tag.qname);
    let mut ns_decls = Vec::new();
    let mut raw_attrs = Vec::new();
    for (qname, raw) in &tag.attrs {
        if *qname == "xmlns" {
            let uri = node.lookup_namespace_uri(None).unwrap_or(raw);
            let uri = if raw.is_empty() { "" } else { uri };
            ns_decls.push((String::new(), uri.to_owned()));
        } else if let Some(p) = qname.strip_prefix("xmlns:") {
            let uri = node.lookup_namespace_uri(Some(p)).unwrap_or(raw);
            ns_decls.push((p.to_owned(), uri.to_owned()));
        } else {
            raw_attrs.push(*qname);
        }
    }

    let mut attributes = Vec::new();
    for (i, attr) in node.attributes().enumerate() {
        let namespace = attr.namespace().map(str::to_owned);
        let prefix = match raw_attrs.get(i).map(|q| split_qname(q)) {
            Some((p, local)) if local == attr.name() => p.map(str::to_owned),
            _ => match attr.namespace() {
                Some(uri) if uri == ns::XML => Some("xml".to_owned()),
                Some(uri) => node.lookup_prefix(uri).map(str::to_owned),
                None => None,
            },
        };
        attributes.push(Attribute {
            prefix,
            name: attr.name().to_owned(),
            namespace,
            value: attr.value().to_owned(),
        });
    }

    let mut children = Vec::new();
    for child in node.children() {
        match child.node_type() {
            roxmltree::NodeType::Element => {
                children.push(Node::Element(convert_element(child, src)?));
            }
            roxmltree::NodeType::Text => {
                children.push(Node::Text(child.text().unwrap_or("").to_owned()));
            }
            roxmltree::NodeType::Comment => {
                children.push(Node::Comment(child.text().unwrap_or("").to_owned()));
            }
            roxmltree::NodeType::PI => {
                if let Some(pi) = child.pi() {
                    children.push(Node::ProcessingInstruction {
                        target: pi.target.to_owned(),
                        data: pi.value.unwrap_or("").to_owned(),
                    });
                }
            }
            roxmltree::NodeType::Root => {}
        }
    }

    Ok(Element {
        prefix: prefix.map(str::to_owned),
        name: node.tag_name().name().to_owned(),
        namespace: node.tag_name().namespace().map(str::to_owned),
        ns_decls,
        attributes,
        children,
    })
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((p, local)) => (Some(p), local),
        None => (None, qname),
    }
}

struct StartTag<'a> {
    qname: &'a str,
    /// `(qname, raw value)` pairs in source order, namespace declarations included.
    attrs: Vec<(&'a str, &'a str)>,
}

/// Read the name and raw attributes of the start tag at the beginning of `s`.
/// roxmltree does not expose prefixes or declaration order, so they are
/// recovered from the source text.
fn scan_start_tag(s: &str) -> Option<StartTag<'_>> {
    let bytes = s.as_bytes();
    let is_space = |b: u8| matches!(b, b' ' | b'\t' | b'\n' | b'\r');
    let is_name_end = |b: u8| is_space(b) || b == b'/' || b == b'>' || b == b'=';

    if bytes.first() != Some(&b'<') {
        return None;
    }
    let mut pos = 1;
    let start = pos;
    while pos < bytes.len() && !is_name_end(bytes[pos]) {
        pos += 1;
    }
    let qname = &s[start..pos];

    let mut attrs = Vec::new();
    loop {
        while pos < bytes.len() && is_space(bytes[pos]) {
            pos += 1;
        }
        match bytes.get(pos)? {
            b'/' | b'>' => break,
            _ => {}
        }
        let name_start = pos;
        while pos < bytes.len() && !is_name_end(bytes[pos]) {
            pos += 1;
        }
        let name = &s[name_start..pos];
        while pos < bytes.len() && is_space(bytes[pos]) {
            pos += 1;
        }
        if bytes.get(pos)? != &b'=' {
            return None;
        }
        pos += 1;
        while pos < bytes.len() && is_space(bytes[pos]) {
            pos += 1;
        }
        let quote = *bytes.get(pos)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        pos += 1;
        let value_start = pos;
        while pos < bytes.len() && bytes[pos] != quote {
            pos += 1;
        }
        let value = s.get(value_start..pos)?;
        pos += 1;
        attrs.push((name, value));
    }
    Some(StartTag { qname, attrs })
}

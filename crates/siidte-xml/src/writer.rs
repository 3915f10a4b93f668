#![forbid(unsafe_code)]

//! Plain (non-canonical) serialization of the element tree.
//!
//! Escaping is chosen so that the written text parses back to the same
//! tree: carriage returns and attribute whitespace are written as
//! character references, which XML parsers do not normalize away.

use crate::tree::{Element, Node};

/// Serialize an element and its subtree. Only the namespace declarations
/// stored on each element are written.
pub fn element_to_string(el: &Element) -> String {
    let mut out = String::new();
    write_element(el, &mut out);
    out
}

pub fn write_element(el: &Element, out: &mut String) {
    let qname = el.qname();
    out.push('<');
    out.push_str(&qname);
    for (prefix, uri) in &el.ns_decls {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attr_into(uri, out);
        out.push('"');
    }
    for attr in &el.attributes {
        out.push(' ');
        out.push_str(&attr.qname());
        out.push_str("=\"");
        escape_attr_into(&attr.value, out);
        out.push('"');
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(e) => write_element(e, out),
        Node::Text(t) => escape_text_into(t, out),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
}

fn escape_text_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

#![forbid(unsafe_code)]

//! Ordering and rendering of namespace declarations and attributes.

use crate::escape;
use std::cmp::Ordering;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl<'a> {
    /// The prefix ("" for default namespace).
    pub prefix: &'a str,
    /// The namespace URI ("" undeclares the default namespace).
    pub uri: &'a str,
}

impl NsDecl<'_> {
    pub fn render(&self, out: &mut String) {
        if self.prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(self.prefix);
            out.push_str("=\"");
        }
        escape::escape_attr(self.uri, out);
        out.push('"');
    }
}

impl Ord for NsDecl<'_> {
    // The empty prefix sorts first on its own, so plain prefix order suffices.
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix.cmp(other.prefix)
    }
}

impl PartialOrd for NsDecl<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr<'a> {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: &'a str,
    pub local_name: &'a str,
    /// The qualified name (prefix:local or just local).
    pub qualified_name: String,
    pub value: &'a str,
}

impl Attr<'_> {
    pub fn render(&self, out: &mut String) {
        out.push(' ');
        out.push_str(&self.qualified_name);
        out.push_str("=\"");
        escape::escape_attr(self.value, out);
        out.push('"');
    }
}

impl Ord for Attr<'_> {
    // Attributes without a namespace come first; the rest sort by
    // (namespace URI, local name).
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(other.ns_uri)
                .then(self.local_name.cmp(other.local_name)),
        }
    }
}

impl PartialOrd for Attr<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

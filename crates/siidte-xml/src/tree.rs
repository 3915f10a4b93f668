#![forbid(unsafe_code)]

//! Owned element tree.
//!
//! Envelopes are rebuilt piece by piece during re-signing, so the tree is
//! plain owned data: elements own their children, there are no parent
//! links, and subtrees move between parents with `Vec` operations.
//!
//! Every element remembers the prefix it was written with and the
//! namespace declarations that appeared on its start tag. The resolved
//! namespace URI is kept alongside so lookups never depend on prefixes.

use siidte_core::ns;
use std::collections::BTreeMap;

/// In-scope namespace bindings, prefix → URI. The default namespace is
/// stored under the empty prefix.
pub type Scope = BTreeMap<String, String>;

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// True for text nodes made only of XML whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if is_xml_blank(t))
    }
}

/// A non-namespace attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            prefix: None,
            name: name.to_owned(),
            namespace: None,
            value: value.to_owned(),
        }
    }

    /// Name as written: `prefix:name` or `name`.
    pub fn qname(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// An element with its attributes, namespace declarations and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    /// Declarations written on this element's start tag, in source order.
    /// `("", uri)` is a default-namespace declaration; `("", "")` undeclares it.
    pub ns_decls: Vec<(String, String)>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// A new unprefixed element in namespace `ns`, relying on an inherited
    /// default-namespace declaration.
    pub fn new(ns: &str, name: &str) -> Self {
        Self {
            prefix: None,
            name: name.to_owned(),
            namespace: if ns.is_empty() { None } else { Some(ns.to_owned()) },
            ns_decls: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A new element that declares `ns` as its own default namespace.
    pub fn new_with_default_ns(ns: &str, name: &str) -> Self {
        let mut el = Self::new(ns, name);
        el.ns_decls.push((String::new(), ns.to_owned()));
        el
    }

    /// A new element in `ns` holding a single text node.
    pub fn with_text(ns: &str, name: &str, text: &str) -> Self {
        let mut el = Self::new(ns, name);
        el.children.push(Node::Text(text.to_owned()));
        el
    }

    /// A copy of this element without its children.
    pub fn shallow_clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            ns_decls: self.ns_decls.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }

    /// Name as written: `prefix:name` or `name`.
    pub fn qname(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Match on namespace URI and local name.
    pub fn is(&self, ns: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref().unwrap_or("") == ns
    }

    // ── Attributes ───────────────────────────────────────────────────

    /// Value of the un-namespaced attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an un-namespaced attribute, keeping its position if present.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == name)
        {
            Some(attr) => attr.value = value.to_owned(),
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    // ── Children ─────────────────────────────────────────────────────

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// First child element with the given namespace and local name.
    pub fn child(&self, ns: &str, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(ns, name))
    }

    pub fn child_mut(&mut self, ns: &str, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(ns, name))
    }

    /// All child elements with the given namespace and local name.
    pub fn children_named<'a>(
        &'a self,
        ns: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(ns, name))
    }

    /// Follow a path of local names through first-match children.
    pub fn path(&self, ns: &str, names: &[&str]) -> Option<&Element> {
        names.iter().try_fold(self, |el, name| el.child(ns, name))
    }

    pub fn path_mut(&mut self, ns: &str, names: &[&str]) -> Option<&mut Element> {
        let mut el = self;
        for name in names {
            el = el.child_mut(ns, name)?;
        }
        Some(el)
    }

    /// Remove every child element matching `pred`, returning them in order.
    pub fn take_children<F>(&mut self, mut pred: F) -> Vec<Element>
    where
        F: FnMut(&Element) -> bool,
    {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match node {
                Node::Element(e) if pred(&e) => taken.push(e),
                other => kept.push(other),
            }
        }
        self.children = kept;
        taken
    }

    /// Remove the first child element with the given name.
    pub fn take_child(&mut self, ns: &str, name: &str) -> Option<Element> {
        let idx = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.is(ns, name)))?;
        match self.children.remove(idx) {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn push_element(&mut self, el: Element) {
        self.children.push(Node::Element(el));
    }

    /// Insert `el` right after the first child named `after`, or append.
    pub fn insert_after(&mut self, ns: &str, after: &str, el: Element) {
        let pos = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.is(ns, after)));
        match pos {
            Some(i) => self.children.insert(i + 1, Node::Element(el)),
            None => self.children.push(Node::Element(el)),
        }
    }

    // ── Text ─────────────────────────────────────────────────────────

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text of the direct text children with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> String {
        self.text().trim().to_owned()
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        self.children.push(Node::Text(text.to_owned()));
    }

    /// Trimmed text of the child `name`, if present.
    pub fn child_text(&self, ns: &str, name: &str) -> Option<String> {
        self.child(ns, name).map(Element::trimmed_text)
    }

    /// Set the text of child `name`, creating it at the end when absent.
    pub fn set_child_text(&mut self, ns: &str, name: &str, text: &str) {
        match self.child_mut(ns, name) {
            Some(child) => child.set_text(text),
            None => self.push_element(Element::with_text(ns, name, text)),
        }
    }

    // ── Traversal ────────────────────────────────────────────────────

    /// Depth-first pre-order search over this element and its descendants.
    pub fn find<F>(&self, pred: &F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.elements().find_map(|c| c.find(pred))
    }

    /// Like [`Element::find`] but also returns the namespace scope the
    /// match inherits from its ancestors (excluding its own declarations).
    pub fn find_with_scope<F>(&self, inherited: &Scope, pred: &F) -> Option<(&Element, Scope)>
    where
        F: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some((self, inherited.clone()));
        }
        let scope = self.scope(inherited);
        self.elements()
            .find_map(|c| c.find_with_scope(&scope, pred))
    }

    /// Collect all descendants (including self) matching `pred`.
    pub fn find_all<'a, F>(&'a self, pred: &F, out: &mut Vec<&'a Element>)
    where
        F: Fn(&Element) -> bool,
    {
        if pred(self) {
            out.push(self);
        }
        for child in self.elements() {
            child.find_all(pred, out);
        }
    }

    /// Visit this element and all descendants mutably, pre-order.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        f(self);
        for child in self.elements_mut() {
            child.walk_mut(f);
        }
    }

    /// The scope seen by this element's children, given the scope it inherits.
    pub fn scope(&self, inherited: &Scope) -> Scope {
        let mut scope = inherited.clone();
        for (prefix, uri) in &self.ns_decls {
            if uri.is_empty() {
                scope.remove(prefix);
            } else {
                scope.insert(prefix.clone(), uri.clone());
            }
        }
        scope
    }
}

/// The scope every document starts with: only the `xml` prefix is bound.
pub fn document_scope() -> Scope {
    let mut scope = Scope::new();
    scope.insert("xml".to_owned(), ns::XML.to_owned());
    scope
}

/// XML whitespace per the `S` production.
pub fn is_xml_blank(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        let mut root = Element::new_with_default_ns(ns::SII_DTE, "EnvioDTE");
        let mut set = Element::new(ns::SII_DTE, "SetDTE");
        set.set_attribute("ID", "SetDoc");
        set.push_element(Element::with_text(ns::SII_DTE, "Caratula", " x "));
        let mut sig = Element::new_with_default_ns(ns::DSIG, "Signature");
        sig.push_element(Element::new(ns::DSIG, "SignedInfo"));
        set.push_element(sig);
        root.push_element(set);
        root
    }

    #[test]
    fn test_navigation() {
        let root = sample();
        let set = root.child(ns::SII_DTE, "SetDTE").unwrap();
        assert_eq!(set.attribute("ID"), Some("SetDoc"));
        assert_eq!(set.child_text(ns::SII_DTE, "Caratula").as_deref(), Some("x"));
        assert!(root
            .path(ns::SII_DTE, &["SetDTE", "Caratula"])
            .is_some());
        assert!(set.child(ns::SII_DTE, "Signature").is_none());
        assert!(set.child(ns::DSIG, "Signature").is_some());
    }

    #[test]
    fn test_take_children() {
        let mut root = sample();
        let set = root.child_mut(ns::SII_DTE, "SetDTE").unwrap();
        let removed = set.take_children(|e| e.is(ns::DSIG, "Signature"));
        assert_eq!(removed.len(), 1);
        assert_eq!(set.elements().count(), 1);
    }

    #[test]
    fn test_find_with_scope_reports_inherited_bindings() {
        let root = sample();
        let (found, scope) = root
            .find_with_scope(&document_scope(), &|e: &Element| e.is(ns::DSIG, "SignedInfo"))
            .unwrap();
        assert_eq!(found.name, "SignedInfo");
        assert_eq!(scope.get("").map(String::as_str), Some(ns::DSIG));
        assert_eq!(scope.get("xml").map(String::as_str), Some(ns::XML));
    }

    #[test]
    fn test_scope_undeclares_default() {
        let mut el = Element::new("", "plain");
        el.ns_decls.push((String::new(), String::new()));
        let mut inherited = Scope::new();
        inherited.insert(String::new(), ns::SII_DTE.to_owned());
        assert!(el.scope(&inherited).get("").is_none());
    }

    #[test]
    fn test_set_child_text_creates_missing() {
        let mut el = Element::new(ns::SII_DTE, "DD");
        el.set_child_text(ns::SII_DTE, "TSTED", "2024-01-01T00:00:00");
        el.set_child_text(ns::SII_DTE, "TSTED", "2024-02-02T00:00:00");
        assert_eq!(el.elements().count(), 1);
        assert_eq!(
            el.child_text(ns::SII_DTE, "TSTED").as_deref(),
            Some("2024-02-02T00:00:00")
        );
    }
}

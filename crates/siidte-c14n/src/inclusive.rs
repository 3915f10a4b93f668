#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0) over an element subtree.
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - renders every in-scope namespace on the apex element, then only the
//!   bindings that differ from the nearest rendered ancestor
//! - outputs namespace declarations sorted by prefix (default first)
//! - outputs attributes sorted by (namespace-URI, local-name)
//! - writes empty elements as start/end tag pairs
//! - escapes text and attribute values per C14N rules
//!
//! Output is UTF-8.

use crate::escape;
use crate::render::{Attr, NsDecl};
use siidte_core::ns;
use siidte_xml::{Element, Node, Scope};

/// Canonicalize `el`, which inherits `inherited` from its ancestors.
pub fn canonicalize(el: &Element, inherited: &Scope, with_comments: bool) -> Vec<u8> {
    let mut out = String::new();
    let ctx = C14nContext { with_comments };
    ctx.process_element(el, inherited, &Scope::new(), &mut out);
    out.into_bytes()
}

struct C14nContext {
    with_comments: bool,
}

impl C14nContext {
    fn process_element(&self, el: &Element, inherited: &Scope, rendered: &Scope, out: &mut String) {
        let current = el.scope(inherited);

        let mut decls: Vec<NsDecl<'_>> = current
            .iter()
            .filter(|(prefix, uri)| !(prefix.as_str() == "xml" && uri.as_str() == ns::XML))
            .filter(|(prefix, uri)| rendered.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl { prefix, uri })
            .collect();
        // The parent rendered a default namespace this element no longer has.
        if !current.contains_key("") && rendered.get("").is_some_and(|u| !u.is_empty()) {
            decls.push(NsDecl { prefix: "", uri: "" });
        }
        decls.sort();

        let mut attrs: Vec<Attr<'_>> = el
            .attributes
            .iter()
            .map(|a| Attr {
                ns_uri: a.namespace.as_deref().unwrap_or(""),
                local_name: &a.name,
                qualified_name: a.qname(),
                value: &a.value,
            })
            .collect();
        attrs.sort();

        let qname = el.qname();
        out.push('<');
        out.push_str(&qname);
        for decl in &decls {
            decl.render(out);
        }
        for attr in &attrs {
            attr.render(out);
        }
        out.push('>');

        for child in &el.children {
            match child {
                Node::Element(e) => self.process_element(e, &current, &current, out),
                Node::Text(t) => escape::escape_text(t, out),
                Node::Comment(c) => {
                    if self.with_comments {
                        out.push_str("<!--");
                        out.push_str(c);
                        out.push_str("-->");
                    }
                }
                Node::ProcessingInstruction { target, data } => {
                    out.push_str("<?");
                    out.push_str(target);
                    if !data.is_empty() {
                        out.push(' ');
                        escape::escape_pi(data, out);
                    }
                    out.push_str("?>");
                }
            }
        }

        out.push_str("</");
        out.push_str(&qname);
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use siidte_xml::{document_scope, XmlDocument};

    fn c14n(xml: &str) -> String {
        let doc = XmlDocument::parse_str(xml).unwrap();
        String::from_utf8(canonicalize(&doc.root, &document_scope(), false)).unwrap()
    }

    #[test]
    fn test_simple_c14n() {
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(
            c14n("<root>a &amp; b &lt; c</root>"),
            "<root>a &amp; b &lt; c</root>"
        );
    }

    // W3C C14N 1.0 §3.3 (start and end tags), without the DTD default attribute.
    #[test]
    fn test_w3c_start_and_end_tags() {
        let input = r#"<doc>
   <e1   />
   <e2   ></e2>
   <e3   name = "elem3"   id="elem3"   />
   <e4   name="elem4"   id="elem4"   ></e4>
   <e5 a:attr="out" b:attr="sorted" attr2="all" attr="I'm"
      xmlns:b="http://www.ietf.org"
      xmlns:a="http://www.w3.org"
      xmlns="http://example.org"/>
   <e6 xmlns="" xmlns:a="http://www.w3.org">
      <e7 xmlns="http://www.ietf.org">
         <e8 xmlns="" xmlns:a="http://www.w3.org">
            <e9 xmlns="" xmlns:a="http://www.ietf.org"/>
         </e8>
      </e7>
   </e6>
</doc>"#;
        let expected = r#"<doc>
   <e1></e1>
   <e2></e2>
   <e3 id="elem3" name="elem3"></e3>
   <e4 id="elem4" name="elem4"></e4>
   <e5 xmlns="http://example.org" xmlns:a="http://www.w3.org" xmlns:b="http://www.ietf.org" attr="I'm" attr2="all" b:attr="sorted" a:attr="out"></e5>
   <e6 xmlns:a="http://www.w3.org">
      <e7 xmlns="http://www.ietf.org">
         <e8 xmlns="">
            <e9 xmlns:a="http://www.ietf.org"></e9>
         </e8>
      </e7>
   </e6>
</doc>"#;
        assert_eq!(c14n(input), expected);
    }

    // W3C C14N 1.0 §3.4 (character modifications and character references),
    // without the entity and DTD-dependent parts.
    #[test]
    fn test_w3c_character_modifications() {
        let input = "<doc>\n   <text>First line&#x0d;&#10;Second line</text>\n   <value>&#x32;</value>\n   <compute><![CDATA[value>\"0\" && value<\"10\" ?\"valid\":\"error\"]]></compute>\n   <compute expr='value>\"0\" &amp;&amp; value&lt;\"10\" ?\"valid\":\"error\"'>valid</compute>\n   <norm attr=' &apos;   &#x20;&#13;&#xa;&#9;   &apos; '/>\n</doc>";
        let expected = "<doc>\n   <text>First line&#xD;\nSecond line</text>\n   <value>2</value>\n   <compute>value&gt;\"0\" &amp;&amp; value&lt;\"10\" ?\"valid\":\"error\"</compute>\n   <compute expr=\"value>&quot;0&quot; &amp;&amp; value&lt;&quot;10&quot; ?&quot;valid&quot;:&quot;error&quot;\">valid</compute>\n   <norm attr=\" '    &#xD;&#xA;&#x9;   ' \"></norm>\n</doc>";
        assert_eq!(c14n(input), expected);
    }

    #[test]
    fn test_subtree_renders_inherited_namespaces() {
        let doc = XmlDocument::parse_str(
            r#"<EnvioDTE xmlns="http://www.sii.cl/SiiDte" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><SetDTE ID="SetDoc"><Caratula/></SetDTE></EnvioDTE>"#,
        )
        .unwrap();
        let scope = doc.root.scope(&document_scope());
        let set = doc.root.child(ns::SII_DTE, "SetDTE").unwrap();
        let out = String::from_utf8(canonicalize(set, &scope, false)).unwrap();
        assert_eq!(
            out,
            r#"<SetDTE xmlns="http://www.sii.cl/SiiDte" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" ID="SetDoc"><Caratula></Caratula></SetDTE>"#
        );
    }

    #[test]
    fn test_comments_follow_mode() {
        let doc = XmlDocument::parse_str("<a><!-- note --><b/></a>").unwrap();
        let without = canonicalize(&doc.root, &document_scope(), false);
        let with = canonicalize(&doc.root, &document_scope(), true);
        assert_eq!(without, b"<a><b></b></a>");
        assert_eq!(with, b"<a><!-- note --><b></b></a>");
    }
}

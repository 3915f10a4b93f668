#![forbid(unsafe_code)]

//! Deterministic two-space indentation.
//!
//! Indentation is applied to a subtree before it is digested or signed,
//! so the pretty-printed output is exactly the signed content. Only
//! element-only content is touched; elements that carry non-blank text
//! are left as they are. Applying it twice changes nothing.

use crate::tree::{Element, Node};

const STEP: &str = "  ";

/// Re-indent `el`, which sits at nesting depth `level` in its document.
pub fn indent(el: &mut Element, level: usize) {
    let has_markup = el.children.iter().any(|n| !matches!(n, Node::Text(_)));
    let has_text = el
        .children
        .iter()
        .any(|n| matches!(n, Node::Text(_)) && !n.is_blank_text());
    if !has_markup || has_text {
        return;
    }

    let inner = newline_indent(level + 1);
    let old = std::mem::take(&mut el.children);
    for node in old {
        if matches!(node, Node::Text(_)) {
            continue;
        }
        el.children.push(Node::Text(inner.clone()));
        el.children.push(node);
    }
    el.children.push(Node::Text(newline_indent(level)));

    for child in el.elements_mut() {
        indent(child, level + 1);
    }
}

fn newline_indent(level: usize) -> String {
    let mut s = String::with_capacity(1 + STEP.len() * level);
    s.push('\n');
    for _ in 0..level {
        s.push_str(STEP);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::element_to_string;
    use crate::XmlDocument;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_indent_nested() {
        let mut root = XmlDocument::parse_str("<a><b><c>x</c></b>\n\t<d/></a>")
            .unwrap()
            .root;
        indent(&mut root, 0);
        assert_eq!(
            element_to_string(&root),
            "<a>\n  <b>\n    <c>x</c>\n  </b>\n  <d/>\n</a>"
        );
    }

    #[test]
    fn test_indent_is_idempotent() {
        let mut el = XmlDocument::parse_str("<a>  <b>1</b><c><d>2</d></c></a>")
            .unwrap()
            .root;
        indent(&mut el, 2);
        let once = el.clone();
        indent(&mut el, 2);
        assert_eq!(el, once);
    }

    #[test]
    fn test_mixed_content_untouched() {
        let mut el = XmlDocument::parse_str("<p>hello <b>world</b></p>").unwrap().root;
        let before = el.clone();
        indent(&mut el, 0);
        assert_eq!(el, before);
    }
}

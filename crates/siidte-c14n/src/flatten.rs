#![forbid(unsafe_code)]

//! The SII flatten transform, input of every TED FRMT signature.
//!
//! The element is serialized with only its own namespace declarations,
//! every whitespace run between `>` and `<` is removed, the result is
//! trimmed, and the text is encoded ISO-8859-1. This is not C14N: empty
//! elements stay self-closed and attribute order is kept as written.

use siidte_xml::encoding::encode_latin1;
use siidte_xml::writer::element_to_string;
use siidte_xml::Element;

/// Flatten `el` into the exact bytes the FRMT signs.
pub fn flatten(el: &Element) -> Vec<u8> {
    encode_latin1(&flatten_str(&element_to_string(el)))
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Remove XML whitespace between tags and trim. Character data, including
/// non-breaking spaces, is untouched.
pub fn flatten_str(text: &str) -> String {
    let trimmed = text.trim_matches(is_xml_space);
    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        out.push(ch);
        if ch != '>' {
            continue;
        }
        let rest = &trimmed[i + 1..];
        let ws_len: usize = rest
            .chars()
            .take_while(|c| is_xml_space(*c))
            .map(char::len_utf8)
            .sum();
        if ws_len > 0 && rest[ws_len..].starts_with('<') {
            while chars.peek().is_some_and(|(j, _)| *j <= i + ws_len) {
                chars.next();
            }
        }
    }
    out
}

#![forbid(unsafe_code)]

//! Character escaping of canonical output.

type Table = &'static [(char, &'static str)];

const TEXT: Table = &[('&', "&amp;"), ('<', "&lt;"), ('>', "&gt;"), ('\r', "&#xD;")];

const ATTR: Table = &[
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('"', "&quot;"),
    ('\t', "&#x9;"),
    ('\n', "&#xA;"),
    ('\r', "&#xD;"),
];

const PI: Table = &[('\r', "&#xD;")];

fn escape(s: &str, table: Table, out: &mut String) {
    for ch in s.chars() {
        match table.iter().find(|(c, _)| *c == ch) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(ch),
        }
    }
}

pub fn escape_text(s: &str, out: &mut String) {
    escape(s, TEXT, out);
}

/// Attribute values keep `>` but escape the whitespace characters that
/// attribute-value normalization would otherwise fold.
pub fn escape_attr(s: &str, out: &mut String) {
    escape(s, ATTR, out);
}

pub fn escape_pi(s: &str, out: &mut String) {
    escape(s, PI, out);
}

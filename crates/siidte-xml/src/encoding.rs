#![forbid(unsafe_code)]

//! Character encodings of SII envelopes.
//!
//! Envelopes are declared `ISO-8859-1`; CAF files sometimes arrive as
//! UTF-8. Decoding follows the XML declaration. Encoding always produces
//! ISO-8859-1, writing characters above U+00FF as numeric references.

use siidte_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    /// Pick the encoding named in the XML declaration of `bytes`.
    /// Without a declaration (or encoding pseudo-attribute) XML defaults to UTF-8.
    pub fn sniff(bytes: &[u8]) -> Self {
        let head = &bytes[..bytes.len().min(200)];
        let Some(end) = find(head, b"?>") else {
            return Self::Utf8;
        };
        if !head.starts_with(b"<?xml") {
            return Self::Utf8;
        }
        let decl = String::from_utf8_lossy(&head[..end]).to_ascii_lowercase();
        let Some(pos) = decl.find("encoding") else {
            return Self::Utf8;
        };
        let rest = decl[pos + "encoding".len()..].trim_start();
        let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();
        let value: String = rest
            .trim_start_matches(['"', '\''])
            .chars()
            .take_while(|c| *c != '"' && *c != '\'')
            .collect();
        match value.as_str() {
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" | "windows-1252" => {
                Self::Latin1
            }
            _ => Self::Utf8,
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, Error> {
        match self {
            Self::Latin1 => Ok(decode_latin1(bytes)),
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode to ISO-8859-1. Characters outside the charset become `&#N;`,
/// so only pass markup whose non-Latin-1 characters sit in text or
/// attribute values.
pub fn encode_latin1(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(b) => out.push(b),
            Err(_) => out.extend_from_slice(format!("&#{};", u32::from(ch)).as_bytes()),
        }
    }
    out
}

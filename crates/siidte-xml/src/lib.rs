#![forbid(unsafe_code)]

//! XML tree support for SII envelopes.
//!
//! Parsing goes through `roxmltree` and lands in an owned, mutable
//! element tree that the re-signing pipeline rebuilds piece by piece.

pub mod document;
pub mod encoding;
pub mod indent;
pub mod tree;
pub mod writer;

pub use document::{XmlDocument, LATIN1_DECLARATION};
pub use encoding::Encoding;
pub use indent::indent;
pub use tree::{document_scope, Attribute, Element, Node, Scope};

/// roxmltree parsing options. DTDs are allowed: roxmltree does not fetch
/// external entities, and older SII samples carry an internal subset.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

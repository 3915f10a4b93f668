#![forbid(unsafe_code)]

//! Canonicalization for SII envelopes.
//!
//! Two unrelated transforms live here:
//! - Canonical XML 1.0 (with and without comments), used for every
//!   XMLDSig digest and signature input
//! - the SII "flatten" serialization of a TED's DD, used for FRMT

pub mod escape;
pub mod flatten;
pub mod inclusive;
pub mod render;

pub use flatten::flatten;

use siidte_core::algorithm;
use siidte_xml::{Element, Scope};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments)
    }
}

/// Canonicalize the subtree rooted at `el`.
///
/// `inherited` is the namespace scope `el` sees from its ancestors in the
/// enclosing document; inclusive C14N renders all of it on the apex.
pub fn canonicalize(el: &Element, inherited: &Scope, mode: C14nMode) -> Vec<u8> {
    inclusive::canonicalize(el, inherited, mode.with_comments())
}

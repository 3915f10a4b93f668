#![forbid(unsafe_code)]

//! XML Digital Signature for SII envelopes.
//!
//! SII signatures are enveloped in spirit but not in form: the
//! `<Signature>` is the next sibling of the element it covers (Documento
//! inside DTE, SetDTE inside EnvioDTE) and references it by `ID`.

pub mod context;
pub mod sign;
pub mod verify;

pub use context::DsigContext;
pub use sign::sign_sibling;
pub use verify::verify_sibling;
